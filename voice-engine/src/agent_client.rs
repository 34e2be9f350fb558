//! Agent Client (C8).
//!
//! Sends a transcript to the agent gateway over localhost HTTP and returns
//! its reply. No retries; the client never fabricates a reply on failure —
//! the caller (C12) surfaces the error instead.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;
use voice_core::ports::{AgentTransportError, AgentTransportPort};
use voice_core::AgentReply;

use crate::config::AgentConfig;

#[derive(Debug, Serialize)]
struct AgentRequestBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct AgentResponseBody {
    text: String,
    #[serde(default)]
    session_id: Option<String>,
}

pub struct HttpAgentTransport {
    client: reqwest::Client,
    endpoint: Url,
    deadline: Duration,
}

impl HttpAgentTransport {
    /// Construct a transport for `config.endpoint`. Rejects any endpoint
    /// that does not resolve to localhost, per §6.
    pub fn new(config: &AgentConfig) -> Result<Self, AgentTransportError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| AgentTransportError::Rejected(format!("invalid endpoint: {e}")))?;

        if !is_localhost(&endpoint) {
            return Err(AgentTransportError::Rejected(format!(
                "endpoint {} does not resolve to localhost",
                endpoint
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.deadline)
            .build()
            .map_err(|e| AgentTransportError::Rejected(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            deadline: config.deadline,
        })
    }
}

#[async_trait]
impl AgentTransportPort for HttpAgentTransport {
    async fn send(
        &self,
        text: &str,
        session_id: Option<&str>,
    ) -> Result<AgentReply, AgentTransportError> {
        let body = AgentRequestBody { message: text, session_id };
        let start = Instant::now();

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentTransportError::Timeout(self.deadline)
                } else {
                    AgentTransportError::Unreachable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(AgentTransportError::Rejected(format!(
                "agent returned HTTP {}",
                response.status()
            )));
        }

        let parsed: AgentResponseBody = response
            .json()
            .await
            .map_err(|e| AgentTransportError::Rejected(format!("malformed agent reply: {e}")))?;

        Ok(AgentReply {
            text: parsed.text,
            session_id: parsed.session_id,
            latency_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    async fn health_check(&self) -> bool {
        match self.client.head(self.endpoint.clone()).send().await {
            Ok(resp) => resp.status().is_success() || resp.status().is_client_error(),
            Err(e) => {
                warn!(error = %e, "agent health check failed");
                false
            }
        }
    }
}

fn is_localhost(url: &Url) -> bool {
    matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "::1"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> AgentConfig {
        AgentConfig {
            endpoint: endpoint.to_string(),
            deadline: Duration::from_secs(5),
        }
    }

    #[test]
    fn rejects_non_localhost_endpoints() {
        let result = HttpAgentTransport::new(&config("http://example.com/chat"));
        assert!(matches!(result, Err(AgentTransportError::Rejected(_))));
    }

    #[test]
    fn accepts_localhost_endpoint() {
        let result = HttpAgentTransport::new(&config("http://127.0.0.1:8765/chat"));
        assert!(result.is_ok());
    }

    #[test]
    fn accepts_localhost_hostname() {
        let result = HttpAgentTransport::new(&config("http://localhost:8765/chat"));
        assert!(result.is_ok());
    }
}
