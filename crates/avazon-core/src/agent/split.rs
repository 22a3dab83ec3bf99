//! Splitting a model reply into narration and inline JSON objects.
//!
//! When a sub-agent calls a function, the streamed reply is the narration
//! text followed by the raw argument fragments. Top-level `{...}` groups are
//! cut out by brace counting; everything else is narration.

/// Split `text` into its narration and the top-level JSON objects it contains.
///
/// Braces inside JSON string literals are ignored. An unterminated `{` is
/// treated as narration.
pub fn separate_text_and_json(text: &str) -> (String, Vec<String>) {
    let mut narration = String::new();
    let mut objects = Vec::new();

    let mut depth = 0usize;
    let mut start = 0usize;
    let mut plain_from = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if depth > 0 && in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '{' => {
                if depth == 0 {
                    narration.push_str(&text[plain_from..i]);
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    objects.push(text[start..=i].to_string());
                    plain_from = i + 1;
                }
            }
            '"' if depth > 0 => in_string = true,
            _ => {}
        }
    }

    if depth > 0 {
        narration.push_str(&text[start..]);
    } else {
        narration.push_str(&text[plain_from..]);
    }

    (narration, objects)
}
