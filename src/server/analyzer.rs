//! Frame analysis behind the reference service.
//!
//! Face detection itself is out of scope; the service only needs something
//! that turns a frame into a label and a message into a reply.

use async_trait::async_trait;

use crate::analysis::Emotion;

#[async_trait]
pub trait FrameAnalyzer: Send + Sync + 'static {
    /// Dominant emotion in `frame`. Errors fall back to neutral at the caller.
    async fn detect(&self, frame: &[u8]) -> anyhow::Result<Emotion>;

    /// Chat reply for `message`. Empty when there is nothing to answer.
    fn compose_reply(&self, emotion: Emotion, message: &str) -> String {
        let message = message.trim();
        if message.is_empty() {
            return String::new();
        }
        match emotion {
            Emotion::Neutral | Emotion::Unknown => {
                format!("You said: '{}'. I'm listening.", message)
            }
            other => format!("You seem to feel {}. You said: '{}'.", other, message),
        }
    }
}

/// Analyzer that reports the same emotion for every non-empty frame.
#[derive(Debug, Clone, Copy)]
pub struct StaticAnalyzer {
    emotion: Emotion,
}

impl StaticAnalyzer {
    pub fn new(emotion: Emotion) -> Self {
        Self { emotion }
    }
}

impl Default for StaticAnalyzer {
    fn default() -> Self {
        Self::new(Emotion::Neutral)
    }
}

#[async_trait]
impl FrameAnalyzer for StaticAnalyzer {
    async fn detect(&self, frame: &[u8]) -> anyhow::Result<Emotion> {
        if frame.is_empty() {
            anyhow::bail!("empty frame");
        }
        Ok(self.emotion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_analyzer_reports_configured_emotion() {
        let analyzer = StaticAnalyzer::new(Emotion::Anger);
        assert_eq!(analyzer.detect(&[1, 2, 3]).await.unwrap(), Emotion::Anger);
        assert!(analyzer.detect(&[]).await.is_err());
    }

    #[test]
    fn reply_mentions_expressed_emotion() {
        let analyzer = StaticAnalyzer::default();
        assert_eq!(analyzer.compose_reply(Emotion::Joy, "  "), "");
        assert!(analyzer
            .compose_reply(Emotion::Joy, "great news")
            .contains("joy"));
        assert!(!analyzer
            .compose_reply(Emotion::Neutral, "hello")
            .contains("neutral"));
    }
}
