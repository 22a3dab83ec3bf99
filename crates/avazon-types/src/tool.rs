//! Function-call arguments the creation sub-agents may request.
//!
//! The model's raw JSON is parsed into [`ToolCall`] at the boundary, so the
//! session engine only ever sees validated, typed arguments.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::creation::ObjectType;
use crate::error::ValidationError;
use crate::llm::ToolSpec;

pub const CREATE_AVATAR_IMAGE: &str = "create_avatar_image";
pub const CREATE_AVATAR_CHARACTER: &str = "create_avatar_character";
pub const CREATE_AVATAR_VOICE: &str = "create_avatar_voice";

/// Accepted accent strength range (inclusive).
pub const ACCENT_STRENGTH_MIN: f64 = 0.3;
pub const ACCENT_STRENGTH_MAX: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    Male,
    Female,
}

impl fmt::Display for VoiceGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceGender::Male => write!(f, "male"),
            VoiceGender::Female => write!(f, "female"),
        }
    }
}

impl FromStr for VoiceGender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "male" => Ok(VoiceGender::Male),
            "female" => Ok(VoiceGender::Female),
            other => Err(format!("invalid voice gender: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceAge {
    Young,
    MiddleAged,
    Old,
}

impl fmt::Display for VoiceAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceAge::Young => write!(f, "young"),
            VoiceAge::MiddleAged => write!(f, "middle_aged"),
            VoiceAge::Old => write!(f, "old"),
        }
    }
}

impl FromStr for VoiceAge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "young" => Ok(VoiceAge::Young),
            "middle_aged" => Ok(VoiceAge::MiddleAged),
            "old" => Ok(VoiceAge::Old),
            other => Err(format!("invalid voice age: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceAccent {
    American,
    British,
    African,
    Australian,
    Indian,
}

impl fmt::Display for VoiceAccent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceAccent::American => write!(f, "american"),
            VoiceAccent::British => write!(f, "british"),
            VoiceAccent::African => write!(f, "african"),
            VoiceAccent::Australian => write!(f, "australian"),
            VoiceAccent::Indian => write!(f, "indian"),
        }
    }
}

impl FromStr for VoiceAccent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "american" => Ok(VoiceAccent::American),
            "british" => Ok(VoiceAccent::British),
            "african" => Ok(VoiceAccent::African),
            "australian" => Ok(VoiceAccent::Australian),
            "indian" => Ok(VoiceAccent::Indian),
            other => Err(format!("invalid voice accent: '{other}'")),
        }
    }
}

/// Arguments for a voice generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceParams {
    pub summary: String,
    pub gender: VoiceGender,
    pub accent_strength: f64,
    pub age: VoiceAge,
    pub accent: VoiceAccent,
}

impl VoiceParams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(ACCENT_STRENGTH_MIN..=ACCENT_STRENGTH_MAX).contains(&self.accent_strength) {
            return Err(ValidationError::new(
                "accent_strength",
                format!(
                    "must be between {ACCENT_STRENGTH_MIN} and {ACCENT_STRENGTH_MAX}, got {}",
                    self.accent_strength
                ),
            ));
        }
        Ok(())
    }
}

/// Arguments for an image generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageParams {
    pub summary: String,
}

/// A validated function call requested by a creation sub-agent.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    CreateImage(ImageParams),
    CreateCharacter,
    CreateVoice(VoiceParams),
}

impl ToolCall {
    /// Parse and validate a function call by name and raw JSON arguments.
    pub fn parse(name: &str, arguments: &str) -> Result<Self, ValidationError> {
        let args = if arguments.trim().is_empty() {
            "{}"
        } else {
            arguments
        };
        match name {
            CREATE_AVATAR_IMAGE => {
                let params: ImageParams = serde_json::from_str(args)
                    .map_err(|e| ValidationError::new("arguments", e.to_string()))?;
                Ok(ToolCall::CreateImage(params))
            }
            CREATE_AVATAR_CHARACTER => Ok(ToolCall::CreateCharacter),
            CREATE_AVATAR_VOICE => {
                let params: VoiceParams = serde_json::from_str(args)
                    .map_err(|e| ValidationError::new("arguments", e.to_string()))?;
                params.validate()?;
                Ok(ToolCall::CreateVoice(params))
            }
            other => Err(ValidationError::new(
                "name",
                format!("unknown function '{other}'"),
            )),
        }
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            ToolCall::CreateImage(_) => ObjectType::Image,
            ToolCall::CreateCharacter => ObjectType::Character,
            ToolCall::CreateVoice(_) => ObjectType::Voice,
        }
    }

    pub fn function_name(&self) -> &'static str {
        function_name(self.object_type())
    }
}

/// The function a sub-agent of the given type may call.
pub fn function_name(object_type: ObjectType) -> &'static str {
    match object_type {
        ObjectType::Image => CREATE_AVATAR_IMAGE,
        ObjectType::Character => CREATE_AVATAR_CHARACTER,
        ObjectType::Voice => CREATE_AVATAR_VOICE,
    }
}

/// The tool schema offered to the sub-agent of the given type.
pub fn tool_spec(object_type: ObjectType) -> ToolSpec {
    match object_type {
        ObjectType::Image => ToolSpec {
            name: CREATE_AVATAR_IMAGE.to_string(),
            description: "Create the avatar's profile image once the user has agreed on how it should look.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "summary": {
                        "type": "string",
                        "description": "Visual description of the avatar gathered from the conversation"
                    }
                },
                "required": ["summary"]
            }),
        },
        ObjectType::Character => ToolSpec {
            name: CREATE_AVATAR_CHARACTER.to_string(),
            description: "Create or update the avatar's personality once the user is satisfied with the discussion.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        ObjectType::Voice => ToolSpec {
            name: CREATE_AVATAR_VOICE.to_string(),
            description: "Create the avatar's voice once the user has agreed on how it should sound.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "summary": {
                        "type": "string",
                        "description": "Description of the voice gathered from the conversation"
                    },
                    "gender": {"type": "string", "enum": ["male", "female"]},
                    "accent_strength": {
                        "type": "number",
                        "minimum": ACCENT_STRENGTH_MIN,
                        "maximum": ACCENT_STRENGTH_MAX
                    },
                    "age": {"type": "string", "enum": ["young", "middle_aged", "old"]},
                    "accent": {
                        "type": "string",
                        "enum": ["american", "british", "african", "australian", "indian"]
                    }
                },
                "required": ["summary", "gender", "accent_strength", "age", "accent"]
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_voice_call() {
        let call = ToolCall::parse(
            CREATE_AVATAR_VOICE,
            r#"{"summary":"warm","gender":"female","accent_strength":1.2,"age":"middle_aged","accent":"british"}"#,
        )
        .unwrap();
        match call {
            ToolCall::CreateVoice(params) => {
                assert_eq!(params.gender, VoiceGender::Female);
                assert_eq!(params.age, VoiceAge::MiddleAged);
                assert_eq!(params.accent, VoiceAccent::British);
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[test]
    fn rejects_out_of_range_accent_strength() {
        let err = ToolCall::parse(
            CREATE_AVATAR_VOICE,
            r#"{"summary":"x","gender":"male","accent_strength":2.5,"age":"old","accent":"indian"}"#,
        )
        .unwrap_err();
        assert_eq!(err.field, "accent_strength");
    }

    #[test]
    fn rejects_unknown_enum_value() {
        let err = ToolCall::parse(
            CREATE_AVATAR_VOICE,
            r#"{"summary":"x","gender":"robot","accent_strength":1.0,"age":"old","accent":"indian"}"#,
        )
        .unwrap_err();
        assert_eq!(err.field, "arguments");
    }

    #[test]
    fn character_call_ignores_arguments() {
        assert_eq!(
            ToolCall::parse(CREATE_AVATAR_CHARACTER, "").unwrap(),
            ToolCall::CreateCharacter
        );
    }

    #[test]
    fn image_call_requires_summary() {
        assert!(ToolCall::parse(CREATE_AVATAR_IMAGE, "{}").is_err());
        let call = ToolCall::parse(CREATE_AVATAR_IMAGE, r#"{"summary":"a red fox"}"#).unwrap();
        assert_eq!(call.object_type(), ObjectType::Image);
        assert_eq!(call.function_name(), CREATE_AVATAR_IMAGE);
    }

    #[test]
    fn unknown_function_is_rejected() {
        assert!(ToolCall::parse("delete_everything", "{}").is_err());
    }

    #[test]
    fn every_object_type_has_a_spec() {
        for t in ObjectType::ALL {
            assert_eq!(tool_spec(t).name, function_name(t));
        }
    }
}
