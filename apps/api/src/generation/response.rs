//! Decoding of the backend's reply into the two résumé fields.
//!
//! No recovery is attempted: anything that is not a JSON object with both
//! fields as non-empty strings (after fence stripping) is rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("reply is not a JSON object with string fields optimizedResume and coverLetter: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("reply is not a JSON object")]
    NotAnObject,

    #[error("backend envelope is not valid JSON: {0}")]
    Envelope(String),

    #[error("reply field '{0}' is empty")]
    EmptyField(&'static str),
}

/// The only two fields recognized in a backend reply. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReply {
    pub optimized_resume: String,
    pub cover_letter: String,
}

/// Parses raw backend text, tolerating a surrounding ```json fence.
pub fn parse_reply(raw: &str) -> Result<GenerationReply, ParseError> {
    // a derived struct would also accept a positional array
    let value: Value = serde_json::from_str(strip_json_fences(raw))?;
    if !value.is_object() {
        return Err(ParseError::NotAnObject);
    }
    let reply: GenerationReply = serde_json::from_value(value)?;

    if reply.optimized_resume.trim().is_empty() {
        return Err(ParseError::EmptyField("optimizedResume"));
    }
    if reply.cover_letter.trim().is_empty() {
        return Err(ParseError::EmptyField("coverLetter"));
    }
    Ok(reply)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(stripped) = text.strip_prefix("```") else {
        return text;
    };
    let stripped = stripped
        .strip_prefix("json")
        .or_else(|| stripped.strip_prefix("JSON"))
        .unwrap_or(stripped)
        .trim_start();
    stripped
        .strip_suffix("```")
        .map(|s| s.trim())
        .unwrap_or(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "  {\"key\": \"value\"}\n";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_accepts_fenced_reply() {
        let raw = "```json\n{\"optimizedResume\":\"A\",\"coverLetter\":\"B\"}\n```";
        let reply = parse_reply(raw).unwrap();
        assert_eq!(
            reply,
            GenerationReply {
                optimized_resume: "A".to_string(),
                cover_letter: "B".to_string(),
            }
        );
    }

    #[test]
    fn test_accepts_unfenced_reply() {
        let reply = parse_reply(r#"{"optimizedResume":"A","coverLetter":"B"}"#).unwrap();
        assert_eq!(reply.optimized_resume, "A");
        assert_eq!(reply.cover_letter, "B");
    }

    #[test]
    fn test_extra_fields_are_discarded() {
        let raw = r#"{"optimizedResume":"A","coverLetter":"B","score":97,"notes":["x"]}"#;
        let reply = parse_reply(raw).unwrap();
        assert_eq!(reply.optimized_resume, "A");
        assert_eq!(reply.cover_letter, "B");
    }

    #[test]
    fn test_rejects_missing_field() {
        let err = parse_reply(r#"{"optimizedResume": "a"}"#).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn test_rejects_non_json() {
        let err = parse_reply("not json at all").unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn test_rejects_non_string_fields() {
        assert!(parse_reply(r#"{"optimizedResume": 1, "coverLetter": "b"}"#).is_err());
        assert!(parse_reply(r#"{"optimizedResume": "a", "coverLetter": null}"#).is_err());
        assert!(parse_reply(r#"{"optimizedResume": ["a"], "coverLetter": "b"}"#).is_err());
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(matches!(
            parse_reply(r#"["A", "B"]"#).unwrap_err(),
            ParseError::NotAnObject
        ));
        assert!(parse_reply("").is_err());
    }

    #[test]
    fn test_rejects_empty_fields() {
        let err = parse_reply(r#"{"optimizedResume": "  ", "coverLetter": "b"}"#).unwrap_err();
        assert!(matches!(err, ParseError::EmptyField("optimizedResume")));

        let err = parse_reply(r#"{"optimizedResume": "a", "coverLetter": ""}"#).unwrap_err();
        assert!(matches!(err, ParseError::EmptyField("coverLetter")));
    }

    #[test]
    fn test_rejects_prose_around_fence() {
        let raw = "Sure! Here it is:\n```json\n{\"optimizedResume\":\"A\",\"coverLetter\":\"B\"}\n```";
        assert!(parse_reply(raw).is_err());
    }
}
