use anyhow::{bail, Context, Result};
use medbot_shared::{ChatRequest, ChatResponse};
use reqwest::StatusCode;
use tracing::debug;

pub struct RelayClient {
    http: reqwest::Client,
    url: String,
}

impl RelayClient {
    pub fn new(url: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("medbot-cli/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Posts one message and returns the relay's reply.
    ///
    /// A 500 from a relay running the strict error policy still carries a
    /// displayable `reply`, so it is returned rather than treated as a failure.
    pub async fn send(&self, message: &str) -> Result<String> {
        let request = ChatRequest {
            message: message.to_string(),
        };

        debug!("Sending message to {}", self.url);
        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to reach relay at {}", self.url))?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::INTERNAL_SERVER_ERROR {
            bail!("Relay returned unexpected status {}", status);
        }

        let body: ChatResponse = response
            .json()
            .await
            .with_context(|| format!("Relay returned an invalid body (status {})", status))?;
        Ok(body.reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn client_for(server: &MockServer) -> RelayClient {
        RelayClient::new(format!("{}/api/chat", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn sends_message_and_reads_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({ "message": "I have a mild headache" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "reply": "### Advice\n- Rest" })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server).send("I have a mild headache").await.unwrap();
        assert_eq!(reply, "### Advice\n- Rest");
    }

    #[tokio::test]
    async fn shows_strict_policy_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({ "reply": "Error: completion service returned status 503" })),
            )
            .mount(&server)
            .await;

        let reply = client_for(&server).send("hello").await.unwrap();
        assert_eq!(reply, "Error: completion service returned status 503");
    }

    #[tokio::test]
    async fn other_statuses_are_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server).send("hello").await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }
}
