//! Image, character and voice generation jobs.
//!
//! Each job runs on its own task, drives its attempt row
//! `ready -> processing -> completed | failed`, persists every change and
//! reports it on the progress channel. Errors never escape a job; they end
//! up as the row's `failed_reason`.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{Instrument, error, info, info_span, warn};

use avazon_types::creation::{
    CharacterCreation, CreationProgress, CreationStep, ImageCreation, ObjectType, SubObject,
    VoiceCreation,
};
use avazon_types::error::{CreationError, PromptError, ProviderError};
use avazon_types::prompt::Agent;
use avazon_types::status::{CreationStatus, Lifecycle};

use crate::generation::{PaintRequest, VoiceDesign};
use crate::prompt::defaults::FALLBACK_GREETING;
use crate::repository::creation::CreationRepository;

use super::state::SessionCore;

#[derive(Debug, Error)]
enum JobError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Session(#[from] CreationError),
}

/// Common surface of the three attempt row types.
trait AttemptRow: Clone + Send + Sync + 'static {
    fn status(&self) -> CreationStatus;
    fn set_status(&mut self, status: CreationStatus, failed_reason: Option<String>);
    fn to_sub_object(&self) -> SubObject;
}

impl AttemptRow for ImageCreation {
    fn status(&self) -> CreationStatus {
        self.status
    }

    fn set_status(&mut self, status: CreationStatus, failed_reason: Option<String>) {
        self.status = status;
        self.failed_reason = failed_reason;
        self.updated_at = Utc::now();
    }

    fn to_sub_object(&self) -> SubObject {
        SubObject::Image(self.clone())
    }
}

impl AttemptRow for CharacterCreation {
    fn status(&self) -> CreationStatus {
        self.status
    }

    fn set_status(&mut self, status: CreationStatus, failed_reason: Option<String>) {
        self.status = status;
        self.failed_reason = failed_reason;
        self.updated_at = Utc::now();
    }

    fn to_sub_object(&self) -> SubObject {
        SubObject::Character(self.clone())
    }
}

impl AttemptRow for VoiceCreation {
    fn status(&self) -> CreationStatus {
        self.status
    }

    fn set_status(&mut self, status: CreationStatus, failed_reason: Option<String>) {
        self.status = status;
        self.failed_reason = failed_reason;
        self.updated_at = Utc::now();
    }

    fn to_sub_object(&self) -> SubObject {
        SubObject::Voice(self.clone())
    }
}

/// A running job: its session, the row it drives and where progress goes.
struct JobRun<R: CreationRepository, T: AttemptRow> {
    core: Arc<SessionCore<R>>,
    row: T,
    progress: mpsc::Sender<CreationProgress>,
}

impl<R: CreationRepository + 'static, T: AttemptRow> JobRun<R, T> {
    /// Optionally move to `next`, persist the row and report `step`.
    ///
    /// `self.row` only changes once the store accepted the new version.
    async fn report(&mut self, step: CreationStep, next: Option<CreationStatus>) -> Result<(), CreationError> {
        let mut row = self.row.clone();
        if let Some(next) = next {
            let status = row.status().transition(next)?;
            row.set_status(status, None);
        }
        self.commit(step, row).await
    }

    async fn finish(mut self, result: Result<(), JobError>) {
        let outcome = match result {
            Ok(()) => self.report(CreationStep::Completed, Some(CreationStatus::Completed)).await,
            Err(e) => self.fail(e.to_string()).await,
        };
        let Err(e) = outcome else { return };
        warn!(error = %e, "could not record job outcome");
        if self.row.status().is_terminal() {
            return;
        }
        if let Err(retry) = self.fail(e.to_string()).await {
            error!(error = %retry, "could not record job failure");
            // Unblock the object type even though the stored row is stale.
            let mut row = self.row.clone();
            row.set_status(CreationStatus::Failed, Some(e.to_string()));
            self.core.release_attempt(row.to_sub_object()).await;
        }
    }

    async fn fail(&mut self, reason: String) -> Result<(), CreationError> {
        let reason = if reason.trim().is_empty() {
            "unknown error".to_string()
        } else {
            reason
        };
        warn!(reason = %reason, "creation job failed");
        let mut row = self.row.clone();
        let status = row.status().transition(CreationStatus::Failed)?;
        row.set_status(status, Some(reason));
        self.commit(CreationStep::Failed, row).await
    }

    /// Persist `row`, adopt it and report `step`.
    async fn commit(&mut self, step: CreationStep, row: T) -> Result<(), CreationError> {
        let snapshot = row.to_sub_object();
        self.core.save_attempt(&snapshot).await?;
        self.row = row;
        // The receiver may be gone after the session closed; the row is
        // persisted either way.
        let _ = self
            .progress
            .send(CreationProgress {
                step,
                creation: snapshot,
            })
            .await;
        Ok(())
    }
}

/// Spawn the job that drives `row`.
pub(crate) fn spawn<R: CreationRepository + 'static>(
    core: Arc<SessionCore<R>>,
    row: SubObject,
    progress: mpsc::Sender<CreationProgress>,
) {
    let span = info_span!(
        "creation_job",
        session_id = %core.id(),
        object_type = %row.object_type(),
        attempt = row.attempt(),
    );
    tokio::spawn(
        async move {
            match row {
                SubObject::Image(row) => {
                    let mut run = JobRun { core, row, progress };
                    let result = image_job(&mut run).await;
                    run.finish(result).await;
                }
                SubObject::Character(row) => {
                    let mut run = JobRun { core, row, progress };
                    let result = character_job(&mut run).await;
                    run.finish(result).await;
                }
                SubObject::Voice(row) => {
                    let mut run = JobRun { core, row, progress };
                    let result = voice_job(&mut run).await;
                    run.finish(result).await;
                }
            }
            info!("creation job finished");
        }
        .instrument(span),
    );
}

fn agent_input(context: &str, request: Option<&str>, transcript: &str) -> String {
    let mut input = context.to_string();
    if let Some(request) = request {
        input.push_str("\n\nRequest:\n");
        input.push_str(request);
    }
    input.push_str("\n\nConversation:\n");
    input.push_str(transcript);
    input
}

async fn image_job<R: CreationRepository + 'static>(
    run: &mut JobRun<R, ImageCreation>,
) -> Result<(), JobError> {
    run.report(CreationStep::Started, Some(CreationStatus::Processing)).await?;

    let prompt = format!("{}\nAppearance: {}", run.core.profile(), run.row.summary);
    let painter = Arc::clone(&run.core.generators.painter);
    let enhanced = painter.enhance_prompt(&prompt).await?;
    run.row.generated_prompt = Some(enhanced.clone());
    run.report(CreationStep::PromptEnhanced, None).await?;

    let image = painter.paint(&PaintRequest::portrait(enhanced)).await?;
    run.report(CreationStep::Generated, None).await?;

    let url = run
        .core
        .generators
        .blobs
        .upload_media(&format!("image{}", run.row.id), image)
        .await?;
    run.row.image_url = Some(url);
    Ok(())
}

async fn character_job<R: CreationRepository + 'static>(
    run: &mut JobRun<R, CharacterCreation>,
) -> Result<(), JobError> {
    run.report(CreationStep::Started, Some(CreationStatus::Processing)).await?;

    let attempt = run.row.attempt;
    let transcript = run.core.transcript(ObjectType::Character, attempt).await?;
    let (agent, context) = if attempt == 0 {
        (Agent::CharacterCreate, run.core.profile())
    } else {
        let previous = run.core.previous_character(attempt).await;
        (
            Agent::CharacterEdit,
            previous.unwrap_or_else(|| run.core.profile()),
        )
    };

    let character = run
        .core
        .prompts
        .use_prompt(agent, &agent_input(&context, None, &transcript))
        .await?;
    run.row.generated_character = Some(character);
    Ok(())
}

async fn voice_job<R: CreationRepository + 'static>(
    run: &mut JobRun<R, VoiceCreation>,
) -> Result<(), JobError> {
    run.report(CreationStep::Started, Some(CreationStatus::Processing)).await?;

    let attempt = run.row.attempt;
    let transcript = run.core.transcript(ObjectType::Voice, attempt).await?;
    let (agent, context) = if attempt == 0 {
        (Agent::VoiceCreate, run.core.profile())
    } else {
        let previous = run.core.previous_voice_prompt(attempt).await;
        (Agent::VoiceEdit, previous.unwrap_or_else(|| run.core.profile()))
    };
    let request = format!(
        "{} (gender: {}, age: {}, accent: {}, accent strength: {:.1})",
        run.row.summary, run.row.gender, run.row.age, run.row.accent, run.row.accent_strength
    );

    let generated = run
        .core
        .prompts
        .use_prompt(agent, &agent_input(&context, Some(&request), &transcript))
        .await?;
    let mut design = VoiceDesign {
        prompt: generated,
        gender: run.row.gender,
        age: run.row.age,
        accent: run.row.accent,
        accent_strength: run.row.accent_strength,
    };
    design.prompt = design.bounded_prompt();
    run.row.generated_prompt = Some(design.prompt.clone());
    run.report(CreationStep::PromptEnhanced, None).await?;

    let synthesizer = Arc::clone(&run.core.generators.voice);
    let voice = synthesizer.design_voice(&design).await?;
    run.row.provider = Some(voice.provider.clone());
    run.row.voice_id = Some(voice.voice_id.clone());
    run.report(CreationStep::Generated, None).await?;

    let sample = match run.core.prompts.use_prompt(Agent::Introduce, &run.core.profile()).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => FALLBACK_GREETING.to_string(),
        Err(e) => {
            warn!(error = %e, "introduction failed, using fallback greeting");
            FALLBACK_GREETING.to_string()
        }
    };
    let audio = synthesizer.text_to_speech(&voice.voice_id, &sample).await?;
    let url = run
        .core
        .generators
        .blobs
        .upload_public(&format!("voice{}.mp3", run.row.id), audio.bytes, "audio/mpeg")
        .await?;
    run.row.sample_text = Some(sample);
    run.row.voice_url = Some(url);
    Ok(())
}
