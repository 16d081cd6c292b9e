//! Seam between the request runtime and the remote agent call.

use std::pin::Pin;
use std::time::Duration;

use crate::errors::TransportError;

/// Response bytes in arrival order.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, TransportError>> + Send + 'static>>;

/// One invocation of the remote agent.
#[derive(Clone, Debug)]
pub struct InvokeRequest {
    pub request_id: uuid::Uuid,
    /// Request envelope, see `payload::build_payload`.
    pub payload: serde_json::Value,
    pub timeout: Option<Duration>,
}

/// Response returned once the call has been accepted.
pub struct AgentResponse {
    pub content_type: Option<String>,
    /// Runtime session id echoed by the service, when present.
    pub session_id: Option<String>,
    pub body: ByteStream,
}

impl AgentResponse {
    /// `true` for server-sent-event responses, which are read line by line.
    /// Anything else is read as one batched body.
    pub fn is_event_stream(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("text/event-stream"))
    }
}

impl std::fmt::Debug for AgentResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentResponse")
            .field("content_type", &self.content_type)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

/// Issues agent invocations. Implemented by `vendors::agentcore::AgentCoreClient`
/// and by in-memory fakes in tests.
#[async_trait::async_trait]
pub trait AgentTransport: Send + Sync {
    async fn invoke(&self, req: InvokeRequest) -> Result<AgentResponse, TransportError>;
}
