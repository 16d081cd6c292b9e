use chrono::{DateTime, Utc};
use futures::StreamExt as _;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use tracing::debug;

use crate::errors::{ChatError, TransportError};
use crate::transport::{AgentResponse, AgentTransport, ByteStream, InvokeRequest};

use super::config::AgentCoreConfig;
use super::signing::{SignableRequest, Signer, amz_date};

const SERVICE: &str = "bedrock-agentcore";
const SESSION_HEADER: &str = "x-amzn-bedrock-agentcore-runtime-session-id";

/// Transport for agent runtimes hosted on Amazon Bedrock AgentCore.
///
/// Holds one HTTP client bound to one set of credentials. To switch
/// credentials, build a new client from a new `AgentCoreConfig`.
pub struct AgentCoreClient {
    client: reqwest::Client,
    config: AgentCoreConfig,
    url: reqwest::Url,
}

impl AgentCoreClient {
    /// Creates a client from explicit configuration.
    pub fn new(config: AgentCoreConfig) -> Result<Self, ChatError> {
        config.validate()?;
        let url = reqwest::Url::parse(&config.invocations_url())
            .map_err(|e| ChatError::Config(format!("invalid agent runtime endpoint: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            url,
        })
    }

    /// Creates a client from `AWS_*` variables and `AGENTCORE_RUNTIME_ARN`.
    pub fn from_env() -> Result<Self, ChatError> {
        Self::new(AgentCoreConfig::from_env()?)
    }

    pub fn config(&self) -> &AgentCoreConfig {
        &self.config
    }

    pub(crate) fn build_http_request(
        &self,
        req: &InvokeRequest,
        at: DateTime<Utc>,
    ) -> Result<reqwest::Request, TransportError> {
        let body = req.payload.to_string().into_bytes();
        let host = match (self.url.host_str(), self.url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(TransportError::Network(format!(
                    "endpoint {} has no host",
                    self.url
                )));
            }
        };
        let date = amz_date(at);
        let pairs: Vec<(String, String)> = self.url.query_pairs().into_owned().collect();
        let query: Vec<(&str, &str)> = pairs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut signed: Vec<(&str, &str)> = vec![
            ("content-type", "application/json"),
            ("host", host.as_str()),
            ("x-amz-date", date.as_str()),
        ];
        if let Some(token) = self.config.credentials.session_token.as_deref() {
            signed.push(("x-amz-security-token", token));
        }
        let authorization = Signer {
            credentials: &self.config.credentials,
            region: &self.config.region,
            service: SERVICE,
        }
        .sign(
            &SignableRequest {
                method: "POST",
                path: self.url.path(),
                query: &query,
                headers: &signed,
                payload: &body,
            },
            at,
        );

        let mut builder = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .header("x-amz-date", date.as_str())
            .header(AUTHORIZATION, authorization);
        if let Some(token) = self.config.credentials.session_token.as_deref() {
            builder = builder.header("x-amz-security-token", token);
        }
        if let Some(timeout) = req.timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .body(body)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build request: {e}")))
    }
}

#[async_trait::async_trait]
impl AgentTransport for AgentCoreClient {
    async fn invoke(&self, req: InvokeRequest) -> Result<AgentResponse, TransportError> {
        let http_req = self.build_http_request(&req, Utc::now())?;
        debug!(
            request_id = %req.request_id,
            region = %self.config.region,
            "invoking agent runtime"
        );

        let response = self
            .client
            .execute(http_req)
            .await
            .map_err(|e| TransportError::Network(format!("agent runtime request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToOwned::to_owned)
        };
        let content_type = header(CONTENT_TYPE.as_str());
        let session_id = header(SESSION_HEADER);

        let body: ByteStream = Box::pin(response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| TransportError::Network(format!("agent runtime read failed: {e}")))
        }));
        Ok(AgentResponse {
            content_type,
            session_id,
            body,
        })
    }
}
