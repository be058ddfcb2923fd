use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use crate::config::ChatKitConfig;
use crate::errors::{ChatKitError, ChatKitResult};
use crate::types::*;

/// Header name for the OpenAI beta opt-in.
pub const OPENAI_BETA_HEADER: &str = "OpenAI-Beta";
/// Beta flag required by the ChatKit sessions endpoint.
pub const CHATKIT_BETA_VALUE: &str = "chatkit_beta=v1";
/// Upstream calls are abandoned after this long.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the OpenAI ChatKit sessions API
#[derive(Debug, Clone)]
pub struct ChatKitClient {
    client: Client,
    config: ChatKitConfig,
    api_key: String,
}

impl ChatKitClient {
    /// Create a new ChatKit API client
    pub fn new(config: ChatKitConfig) -> ChatKitResult<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ChatKitError::ConfigError(
                "API key is required to initialize the ChatKit client".to_string(),
            )
        })?;

        let client = Client::builder().timeout(UPSTREAM_TIMEOUT).build()?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// Get the session-creation endpoint URL
    fn sessions_url(&self) -> String {
        format!(
            "{}/v1/chatkit/sessions",
            self.config.base_url().trim_end_matches('/')
        )
    }

    /// Create a short-lived ChatKit session for the given workflow and user
    pub async fn create_session(
        &self,
        workflow_id: &str,
        user_id: &str,
    ) -> ChatKitResult<SessionCredentials> {
        let url = self.sessions_url();
        let request = CreateSessionRequest {
            workflow: WorkflowRef {
                id: workflow_id.to_string(),
            },
            user: user_id.to_string(),
        };

        debug!(url = %url, workflow_id = %workflow_id, "Creating ChatKit session");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(OPENAI_BETA_HEADER, CHATKIT_BETA_VALUE)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatKitError::RequestError(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            // The upstream status must survive even when the error body is
            // unreadable, so body failures degrade to the generic message.
            let error_body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(error = %e, "Failed to read upstream error body");
                    String::new()
                }
            };
            let message = extract_error_message(&error_body, status);
            error!(status = %status, message = %message, "ChatKit API returned an error");
            return Err(ChatKitError::HttpError {
                status_code: status.as_u16(),
                message,
            });
        }

        let payload = response
            .json::<SessionPayload>()
            .await
            .map_err(|e| ChatKitError::ParsingError(format!("Failed to parse response: {}", e)))?;

        let client_secret = match payload.client_secret {
            Some(Value::String(secret)) if !secret.is_empty() => secret,
            _ => return Err(ChatKitError::MissingClientSecret),
        };

        Ok(SessionCredentials {
            client_secret,
            expires_after: payload.expires_after,
        })
    }
}

/// Extract a printable message from an upstream error body.
///
/// Accepts `{"error": "..."}` and `{"error": {"message": "..."}}`; any other
/// shape falls back to a generic status line.
fn extract_error_message(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<UpstreamErrorBody>(body)
        .ok()
        .and_then(UpstreamErrorBody::message)
        .unwrap_or_else(|| format!("HTTP Error {}", status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    struct MockUpstream {
        url: String,
        handle: JoinHandle<String>,
    }

    /// Serve exactly one connection, returning the raw request once the
    /// canned response has been written.
    async fn spawn_upstream(response: String) -> MockUpstream {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
            String::from_utf8(request).unwrap()
        });

        MockUpstream { url, handle }
    }

    fn request_complete(request: &[u8]) -> bool {
        match request.windows(4).position(|w| w == b"\r\n\r\n") {
            Some(split) => {
                let head = String::from_utf8_lossy(&request[..split]);
                request.len() >= split + 4 + content_length(&head)
            }
            None => false,
        }
    }

    fn content_length(head: &str) -> usize {
        head.lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0)
    }

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        )
    }

    fn client_for(url: &str) -> ChatKitClient {
        ChatKitClient::new(ChatKitConfig {
            api_key: Some("sk-test".to_string()),
            api_base: Some(url.to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_new_requires_api_key() {
        let err = ChatKitClient::new(ChatKitConfig::default()).unwrap_err();
        match err {
            ChatKitError::ConfigError(message) => assert!(message.contains("API key")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_sessions_url_tolerates_trailing_slash() {
        let client = client_for("https://proxy.example/");
        assert_eq!(
            client.sessions_url(),
            "https://proxy.example/v1/chatkit/sessions"
        );
    }

    #[test]
    fn test_sessions_url_defaults_to_openai() {
        let client = ChatKitClient::new(ChatKitConfig {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.sessions_url(),
            "https://api.openai.com/v1/chatkit/sessions"
        );
    }

    #[tokio::test]
    async fn test_create_session_sends_wire_contract() {
        let upstream = spawn_upstream(http_response(
            "200 OK",
            r#"{"client_secret":"cs_abc","expires_after":123}"#,
        ))
        .await;

        let client = client_for(&upstream.url);
        let credentials = client.create_session("wf_1", "user_1").await.unwrap();
        assert_eq!(
            credentials,
            SessionCredentials {
                client_secret: "cs_abc".to_string(),
                expires_after: Some(json!(123)),
            }
        );

        let captured = upstream.handle.await.unwrap();
        let (head, body) = captured.split_once("\r\n\r\n").unwrap();
        assert!(head.starts_with("POST /v1/chatkit/sessions HTTP/1.1"));
        assert!(head.contains("\r\nauthorization: Bearer sk-test"));
        assert!(head.contains("\r\nopenai-beta: chatkit_beta=v1"));
        assert!(head.contains("\r\ncontent-type: application/json"));

        let sent: Value = serde_json::from_str(body).unwrap();
        assert_eq!(sent, json!({"workflow": {"id": "wf_1"}, "user": "user_1"}));
    }

    #[tokio::test]
    async fn test_create_session_relays_null_expiry() {
        let upstream = spawn_upstream(http_response(
            "200 OK",
            r#"{"client_secret":"cs_abc","expires_after":null}"#,
        ))
        .await;

        let client = client_for(&upstream.url);
        let credentials = client.create_session("wf_1", "user_1").await.unwrap();
        assert_eq!(credentials.client_secret, "cs_abc");
        assert_eq!(credentials.expires_after, None);
    }

    #[tokio::test]
    async fn test_create_session_rejects_absent_or_empty_client_secret() {
        for body in [
            r#"{"expires_after":123}"#,
            r#"{"client_secret":""}"#,
            r#"{"client_secret":42}"#,
        ] {
            let upstream = spawn_upstream(http_response("200 OK", body)).await;
            let client = client_for(&upstream.url);
            let err = client.create_session("wf_1", "user_1").await.unwrap_err();
            assert!(
                matches!(err, ChatKitError::MissingClientSecret),
                "body {body:?} gave {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_create_session_extracts_nested_error_message() {
        let upstream = spawn_upstream(http_response(
            "401 Unauthorized",
            r#"{"error":{"message":"bad key","type":"invalid_request_error"}}"#,
        ))
        .await;

        let client = client_for(&upstream.url);
        let err = client.create_session("wf_1", "user_1").await.unwrap_err();
        match err {
            ChatKitError::HttpError {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 401);
                assert_eq!(message, "bad key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_session_extracts_string_error_message() {
        let upstream =
            spawn_upstream(http_response("429 Too Many Requests", r#"{"error":"over quota"}"#))
                .await;

        let client = client_for(&upstream.url);
        let err = client.create_session("wf_1", "user_1").await.unwrap_err();
        match err {
            ChatKitError::HttpError {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 429);
                assert_eq!(message, "over quota");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_session_generic_message_for_unparseable_error() {
        let upstream =
            spawn_upstream(http_response("503 Service Unavailable", "upstream exploded")).await;

        let client = client_for(&upstream.url);
        let err = client.create_session("wf_1", "user_1").await.unwrap_err();
        match err {
            ChatKitError::HttpError {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 503);
                assert_eq!(message, "HTTP Error 503 Service Unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_session_unreachable_upstream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = client_for(&url);
        let err = client.create_session("wf_1", "user_1").await.unwrap_err();
        assert!(
            matches!(err, ChatKitError::RequestError(_)),
            "unexpected error: {err:?}"
        );
    }

    #[tokio::test]
    async fn test_create_session_unparseable_success_body() {
        let upstream = spawn_upstream(http_response("200 OK", "not json")).await;

        let client = client_for(&upstream.url);
        let err = client.create_session("wf_1", "user_1").await.unwrap_err();
        assert!(
            matches!(err, ChatKitError::ParsingError(_)),
            "unexpected error: {err:?}"
        );
    }
}
