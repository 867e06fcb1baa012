//! Values exchanged with the analysis service.
//!
//! Wire structs mirror the service's JSON replies and are lenient: every field
//! is optional so partial bodies still parse. Conversion into
//! [`AnalysisResult`] applies the label and response-text defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Response text used when nothing was said and the service sent none.
pub const DEFAULT_ACKNOWLEDGEMENT: &str = "I see you.";

/// Emotion label reported by the analysis service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    #[default]
    Neutral,
    Joy,
    Sorrow,
    Anger,
    Surprise,
    /// Any label outside the known set
    #[serde(other)]
    Unknown,
}

impl Emotion {
    /// Parse a service label. Missing or blank labels mean `Neutral`.
    pub fn from_label(label: Option<&str>) -> Self {
        let Some(label) = label.map(str::trim).filter(|l| !l.is_empty()) else {
            return Emotion::Neutral;
        };

        match label.to_ascii_lowercase().as_str() {
            "neutral" => Emotion::Neutral,
            "joy" => Emotion::Joy,
            "sorrow" => Emotion::Sorrow,
            "anger" => Emotion::Anger,
            "surprise" => Emotion::Surprise,
            _ => Emotion::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Joy => "joy",
            Emotion::Sorrow => "sorrow",
            Emotion::Anger => "anger",
            Emotion::Surprise => "surprise",
            Emotion::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What caused a capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOrigin {
    /// Periodic timer tick
    Automatic,
    /// Caller-initiated capture (e.g. sending a chat message)
    Manual,
}

/// Terminal analysis of one capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub emotion: Emotion,
    pub response_text: String,
}

impl AnalysisResult {
    pub fn new(emotion: Emotion, response_text: impl Into<String>) -> Self {
        Self {
            emotion,
            response_text: response_text.into(),
        }
    }

    /// Build a result from a service reply, filling in defaults.
    ///
    /// `submitted_text` is the text sent with the frame; it seeds the
    /// fallback response when the service returns none.
    pub fn from_reply(reply: &AnalyzeReply, submitted_text: &str) -> Self {
        let emotion = Emotion::from_label(reply.emotion.as_deref());
        let response_text = match reply.chatbot_response.as_deref() {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => fallback_response(submitted_text),
        };
        Self {
            emotion,
            response_text,
        }
    }
}

/// Response text to show when the service sent none.
pub fn fallback_response(submitted_text: &str) -> String {
    let text = submitted_text.trim();
    if text.is_empty() {
        DEFAULT_ACKNOWLEDGEMENT.to_string()
    } else {
        format!("Thanks for saying: {}", text)
    }
}

/// Payload for one cycle. Moved into the transport on submission.
#[derive(Debug, Clone)]
pub struct CaptureInput {
    pub frame: Vec<u8>,
    pub text: String,
    pub origin: TriggerOrigin,
}

impl CaptureInput {
    pub fn new(frame: Vec<u8>, text: impl Into<String>, origin: TriggerOrigin) -> Self {
        Self {
            frame,
            text: text.into(),
            origin,
        }
    }
}

/// Correlates a pending submission with later poll queries.
///
/// The service keeps one processing slot per session, so the handle is keyed
/// by session id rather than a separate job id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    session_id: String,
    submitted_text: String,
}

impl JobHandle {
    pub fn new(session_id: impl Into<String>, submitted_text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            submitted_text: submitted_text.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn submitted_text(&self) -> &str {
        &self.submitted_text
    }
}

/// Result of submitting one [`CaptureInput`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// The service analysed the frame synchronously
    Immediate(AnalysisResult),
    /// The service accepted the frame; poll for the result
    Pending(JobHandle),
    /// Network or protocol fault, with diagnostic detail
    TransportFailure(String),
}

/// Answer to a single poll query.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    NotReady,
    Ready(AnalysisResult),
}

// =============================================================================
// Wire format
// =============================================================================

/// Body of an analyze reply (`{"status":"ok","emotion":..,"chatbot_response":..}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chatbot_response: Option<String>,
}

impl AnalyzeReply {
    pub fn ok(emotion: Emotion, chatbot_response: impl Into<String>) -> Self {
        Self {
            status: Some(status::OK.to_string()),
            emotion: Some(emotion.as_str().to_string()),
            chatbot_response: Some(chatbot_response.into()),
        }
    }

    pub fn accepted() -> Self {
        Self {
            status: Some(status::ACCEPTED.to_string()),
            ..Default::default()
        }
    }
}

/// Body of a poll reply (`{"status":"pending"}` or `{"status":"ok","result":{..}}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollReply {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalyzeReply>,
}

/// Status strings used on the wire.
pub mod status {
    pub const OK: &str = "ok";
    pub const ACCEPTED: &str = "accepted";
    pub const PENDING: &str = "pending";
    pub const NONE: &str = "none";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotion_defaults_to_neutral() {
        assert_eq!(Emotion::from_label(None), Emotion::Neutral);
        assert_eq!(Emotion::from_label(Some("")), Emotion::Neutral);
        assert_eq!(Emotion::from_label(Some("   ")), Emotion::Neutral);
    }

    #[test]
    fn test_emotion_labels() {
        assert_eq!(Emotion::from_label(Some("joy")), Emotion::Joy);
        assert_eq!(Emotion::from_label(Some("Sorrow")), Emotion::Sorrow);
        assert_eq!(Emotion::from_label(Some("ANGER")), Emotion::Anger);
        assert_eq!(Emotion::from_label(Some("surprise")), Emotion::Surprise);
        assert_eq!(Emotion::from_label(Some("confused")), Emotion::Unknown);
    }

    #[test]
    fn test_emotion_serde_uses_lowercase_labels() {
        assert_eq!(serde_json::to_string(&Emotion::Joy).unwrap(), "\"joy\"");
        let parsed: Emotion = serde_json::from_str("\"bewildered\"").unwrap();
        assert_eq!(parsed, Emotion::Unknown);
    }

    #[test]
    fn test_from_reply_keeps_service_text() {
        let reply: AnalyzeReply = serde_json::from_str(
            r#"{"status":"ok","emotion":"joy","chatbot_response":"hi"}"#,
        )
        .unwrap();
        let result = AnalysisResult::from_reply(&reply, "hello");
        assert_eq!(result, AnalysisResult::new(Emotion::Joy, "hi"));
    }

    #[test]
    fn test_from_reply_falls_back_to_submitted_text() {
        let reply: AnalyzeReply = serde_json::from_str(r#"{"chatbot_response":""}"#).unwrap();
        let result = AnalysisResult::from_reply(&reply, "I had a long day");
        assert_eq!(result.emotion, Emotion::Neutral);
        assert_eq!(result.response_text, "Thanks for saying: I had a long day");
    }

    #[test]
    fn test_from_reply_generic_acknowledgement() {
        let result = AnalysisResult::from_reply(&AnalyzeReply::default(), "");
        assert_eq!(result.response_text, DEFAULT_ACKNOWLEDGEMENT);
    }

    #[test]
    fn test_poll_reply_without_result() {
        let reply: PollReply = serde_json::from_str(r#"{"status":"pending"}"#).unwrap();
        assert_eq!(reply.status, status::PENDING);
        assert!(reply.result.is_none());
    }

    #[test]
    fn test_job_handle_is_keyed_by_session() {
        let handle = JobHandle::new("session-1", "hey");
        assert_eq!(handle.session_id(), "session-1");
        assert_eq!(handle.submitted_text(), "hey");
    }
}
