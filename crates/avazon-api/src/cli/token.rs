//! `avazon token <user_id> [--ttl-mins N]`

use anyhow::Context;

use avazon_infra::config::Secrets;
use avazon_infra::crypto::token::TokenSigner;

/// Print a bearer token for `user_id`, signed with `AVAZON_TOKEN_SECRET` and
/// valid for `ttl_mins`.
pub fn issue_token(secrets: Secrets, user_id: &str, ttl_mins: i64) -> anyhow::Result<()> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        anyhow::bail!("user id must not be empty");
    }
    let secret = secrets
        .token_secret
        .with_context(|| format!("{} must be set to issue tokens", Secrets::TOKEN_SECRET))?;
    if ttl_mins <= 0 {
        anyhow::bail!("token lifetime must be positive");
    }
    let token = TokenSigner::new(secret)
        .with_ttl_mins(ttl_mins)
        .issue(user_id)
        .context("signing access token")?;
    println!("{token}");
    Ok(())
}
