//! Built-in system prompts used when no stored prompt is assigned.

use avazon_types::prompt::Agent;

/// The fallback system prompt for `agent`.
pub fn fallback_prompt(agent: Agent) -> &'static str {
    match agent {
        Agent::ImageChat => {
            "You help the user design the look of their avatar. Ask about appearance, outfit, \
             colors, and mood, one or two questions at a time. When the user is happy with the \
             description, call create_avatar_image with a concise visual summary."
        }
        Agent::CharacterChat => {
            "You help the user shape the personality of their avatar. Talk about temperament, \
             hobbies, speech habits, and backstory. When the user is satisfied, call \
             create_avatar_character."
        }
        Agent::VoiceChat => {
            "You help the user choose a voice for their avatar. Discuss gender, age, accent, \
             and how strong the accent should be. When the user agrees, call \
             create_avatar_voice with every argument filled in."
        }
        Agent::CharacterCreate => {
            "Write a vivid personality description for an avatar from its profile and the \
             conversation below. Reply with the description only."
        }
        Agent::CharacterEdit => {
            "Revise the avatar's current personality description according to the conversation \
             below. Keep what the user did not ask to change. Reply with the description only."
        }
        Agent::VoiceCreate => {
            "Write a short first-person monologue, between 100 and 1000 characters, that this \
             avatar would say in its own voice. Reply with the monologue only."
        }
        Agent::VoiceEdit => {
            "Rewrite the avatar's current voice monologue according to the conversation below, \
             between 100 and 1000 characters. Reply with the monologue only."
        }
        Agent::Introduce => {
            "Write a one or two sentence self-introduction this avatar would say when meeting \
             someone. Reply with the introduction only."
        }
        Agent::VideoPrompt => {
            "Turn the request below into a detailed image prompt for a single video frame \
             featuring the avatar. Reply with the prompt only."
        }
        Agent::MusicSummarizer => {
            "Summarize the song request below in one sentence. Reply with the summary only."
        }
        Agent::MusicImagePrompt => {
            "Write a detailed image prompt for an album cover matching the song request below. \
             Reply with the prompt only."
        }
        Agent::MusicCreate => {
            "Write a description for a music generator that captures the genre, mood, \
             instruments, and tempo of the song request below. Reply with the description only."
        }
    }
}

/// Sample line spoken by a new voice when no introduction can be generated.
pub const FALLBACK_GREETING: &str = "Hello! It's nice to meet you. I can't wait to talk with you.";
