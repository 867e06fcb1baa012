//! Analysis service transport.
//!
//! [`AnalysisTransport`] is the seam between the scheduler and the remote
//! service. `submit` never fails: faults come back as
//! [`SubmissionOutcome::TransportFailure`] so the scheduler can treat every
//! outcome as a value.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use url::Url;

use super::types::{
    status, AnalysisResult, AnalyzeReply, CaptureInput, JobHandle, PollReply, PollStatus,
    SubmissionOutcome,
};
use crate::error::{ForgeError, Result};

/// Header carrying the session id on analyze requests.
pub const SESSION_HEADER: &str = "X-Session-Id";

/// Path of the analyze endpoint, relative to the service base URL.
pub const ANALYZE_PATH: &str = "analyze_emotion/";

/// Path of the poll endpoint, relative to the service base URL.
pub const RESULT_PATH: &str = "get_result/";

#[async_trait]
pub trait AnalysisTransport: Send + Sync + 'static {
    /// Submit one capture for analysis.
    async fn submit(&self, session_id: &str, input: CaptureInput) -> SubmissionOutcome;

    /// Ask whether the result for a pending submission is ready.
    async fn query(&self, handle: &JobHandle) -> Result<PollStatus>;
}

/// HTTP client for the analysis service.
pub struct HttpTransport {
    client: reqwest::Client,
    analyze_url: Url,
    result_url: Url,
}

impl HttpTransport {
    /// Create a transport for the service at `base_url`.
    pub fn new(base_url: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        let mut base = Url::parse(base_url)
            .with_context(|| format!("Invalid analysis service URL: {}", base_url))?;
        // Url::join drops the last path segment unless it ends with '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            analyze_url: base.join(ANALYZE_PATH)?,
            result_url: base.join(RESULT_PATH)?,
        })
    }

    pub fn analyze_url(&self) -> &Url {
        &self.analyze_url
    }

    pub fn result_url(&self) -> &Url {
        &self.result_url
    }
}

#[async_trait]
impl AnalysisTransport for HttpTransport {
    async fn submit(&self, session_id: &str, input: CaptureInput) -> SubmissionOutcome {
        let CaptureInput { frame, text, .. } = input;

        let part = match Part::bytes(frame)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")
        {
            Ok(part) => part,
            Err(e) => return SubmissionOutcome::TransportFailure(format!("invalid frame part: {}", e)),
        };
        let form = Form::new().part("file", part).text("message", text.clone());

        let response = match self
            .client
            .post(self.analyze_url.clone())
            .header(SESSION_HEADER, session_id)
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Analyze request failed: {}", e);
                return SubmissionOutcome::TransportFailure(format!("network error: {}", e));
            }
        };

        let code = response.status();
        if code == StatusCode::ACCEPTED {
            tracing::debug!("Analysis queued for session {}", session_id);
            return SubmissionOutcome::Pending(JobHandle::new(session_id, text));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return SubmissionOutcome::TransportFailure(format!(
                    "failed to read response body: {}",
                    e
                ))
            }
        };

        if !code.is_success() {
            return SubmissionOutcome::TransportFailure(format!(
                "server returned {}: {}",
                code.as_u16(),
                body.trim()
            ));
        }

        classify_reply(session_id, &text, &body)
    }

    async fn query(&self, handle: &JobHandle) -> Result<PollStatus> {
        let response = self
            .client
            .get(self.result_url.clone())
            .query(&[("session", handle.session_id())])
            .send()
            .await
            .map_err(|e| ForgeError::Transport(format!("network error: {}", e)))?;

        let code = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ForgeError::Transport(format!("failed to read poll body: {}", e)))?;

        if !code.is_success() {
            return Err(ForgeError::Transport(format!(
                "poll returned {}: {}",
                code.as_u16(),
                body.trim()
            )));
        }

        parse_poll_reply(&body, handle.submitted_text())
    }
}

/// Map a successful analyze body onto a submission outcome.
fn classify_reply(session_id: &str, submitted_text: &str, body: &str) -> SubmissionOutcome {
    let reply: AnalyzeReply = match serde_json::from_str(body) {
        Ok(reply) => reply,
        Err(e) => {
            return SubmissionOutcome::TransportFailure(format!("malformed analyze reply: {}", e))
        }
    };

    match reply.status.as_deref() {
        None | Some(status::OK) => {
            SubmissionOutcome::Immediate(AnalysisResult::from_reply(&reply, submitted_text))
        }
        Some(status::ACCEPTED) => {
            SubmissionOutcome::Pending(JobHandle::new(session_id, submitted_text))
        }
        Some(other) => {
            SubmissionOutcome::TransportFailure(format!("unexpected analyze status '{}'", other))
        }
    }
}

fn parse_poll_reply(body: &str, submitted_text: &str) -> Result<PollStatus> {
    let reply: PollReply = serde_json::from_str(body)
        .map_err(|e| ForgeError::Transport(format!("malformed poll reply: {}", e)))?;

    match reply.status.as_str() {
        status::OK => {
            let result = reply.result.ok_or_else(|| {
                ForgeError::Transport("poll reply marked ok without a result".to_string())
            })?;
            Ok(PollStatus::Ready(AnalysisResult::from_reply(
                &result,
                submitted_text,
            )))
        }
        status::PENDING | status::NONE => Ok(PollStatus::NotReady),
        other => Err(ForgeError::Transport(format!(
            "unexpected poll status '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{Emotion, TriggerOrigin};

    #[test]
    fn test_urls_join_with_and_without_trailing_slash() {
        let transport = HttpTransport::new("http://localhost:8000", Duration::from_secs(5)).unwrap();
        assert_eq!(
            transport.analyze_url().as_str(),
            "http://localhost:8000/analyze_emotion/"
        );

        let transport =
            HttpTransport::new("http://example.com/api", Duration::from_secs(5)).unwrap();
        assert_eq!(
            transport.result_url().as_str(),
            "http://example.com/api/get_result/"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(HttpTransport::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_classify_ok_reply() {
        let outcome = classify_reply(
            "s1",
            "",
            r#"{"status":"ok","emotion":"joy","chatbot_response":"hi"}"#,
        );
        assert_eq!(
            outcome,
            SubmissionOutcome::Immediate(AnalysisResult::new(Emotion::Joy, "hi"))
        );
    }

    #[test]
    fn test_classify_reply_without_status_is_immediate() {
        let outcome = classify_reply("s1", "hello", r#"{"emotion":"surprise"}"#);
        assert_eq!(
            outcome,
            SubmissionOutcome::Immediate(AnalysisResult::new(
                Emotion::Surprise,
                "Thanks for saying: hello"
            ))
        );
    }

    #[test]
    fn test_classify_accepted_body_is_pending() {
        let outcome = classify_reply("s1", "hey", r#"{"status":"accepted"}"#);
        assert_eq!(outcome, SubmissionOutcome::Pending(JobHandle::new("s1", "hey")));
    }

    #[test]
    fn test_classify_unknown_status_is_failure() {
        let outcome = classify_reply("s1", "", r#"{"status":"error"}"#);
        assert!(matches!(outcome, SubmissionOutcome::TransportFailure(reason) if reason.contains("error")));

        let outcome = classify_reply("s1", "", "<html>");
        assert!(matches!(outcome, SubmissionOutcome::TransportFailure(_)));
    }

    #[test]
    fn test_parse_poll_reply_states() {
        assert_eq!(
            parse_poll_reply(r#"{"status":"pending"}"#, "").unwrap(),
            PollStatus::NotReady
        );
        assert_eq!(
            parse_poll_reply(r#"{"status":"none"}"#, "").unwrap(),
            PollStatus::NotReady
        );
        assert_eq!(
            parse_poll_reply(r#"{"status":"ok","result":{"emotion":"sorrow"}}"#, "").unwrap(),
            PollStatus::Ready(AnalysisResult::new(Emotion::Sorrow, "I see you."))
        );
        assert!(parse_poll_reply(r#"{"status":"ok"}"#, "").is_err());
        assert!(parse_poll_reply(r#"{"status":"exploded"}"#, "").is_err());
    }

    #[tokio::test]
    async fn test_submit_to_unreachable_service_is_failure_value() {
        // Bind then drop a listener to get a port nothing is listening on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport =
            HttpTransport::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        let input = CaptureInput::new(vec![0xFF, 0xD8], "", TriggerOrigin::Automatic);

        match transport.submit("s1", input).await {
            SubmissionOutcome::TransportFailure(reason) => {
                assert!(reason.starts_with("network error"))
            }
            other => panic!("expected transport failure, got {:?}", other),
        }

        let err = transport
            .query(&JobHandle::new("s1", ""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "transport_failure");
    }
}
