use crate::envelope::message::NoAnswer;

/// Line framing failures raised while splitting a response stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    /// A complete line was not valid UTF-8.
    #[error("invalid UTF-8 in response line {line}: {message}")]
    InvalidUtf8 { line: u64, message: String },
}

/// Errors returned by an `AgentTransport` before they are normalized for the
/// public run stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The remote runtime answered with a non-success status (credential
    /// rejection, malformed runtime ARN, throttling, ...).
    #[error("agent runtime returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// Sending the request or reading the response failed.
    #[error("network error: {0}")]
    Network(String),
    /// The response stream could not be decoded into lines.
    #[error(transparent)]
    Framing(#[from] FramingError),
}

impl TransportError {
    /// Returns the HTTP status for status errors.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Terminal run failure sent through `ChatEvent::Error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum RunFailure {
    /// The remote runtime rejected the call.
    #[error("agent runtime rejected the request (status {status}): {message}")]
    Rejected { status: u16, message: String },
    /// Network or stream transport failed.
    #[error("transport failure: {message}")]
    Transport { message: String },
    /// The harness detected a protocol or invariant error.
    #[error("protocol failure: {message}")]
    Protocol { message: String },
}

impl From<&TransportError> for RunFailure {
    fn from(err: &TransportError) -> Self {
        match err {
            TransportError::Status { status, body } => RunFailure::Rejected {
                status: *status,
                message: body.clone(),
            },
            TransportError::Network(message) => RunFailure::Transport {
                message: message.clone(),
            },
            TransportError::Framing(framing) => RunFailure::Transport {
                message: framing.to_string(),
            },
        }
    }
}

/// Top-level error type for the public chat API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Invalid client configuration (missing credentials, region, runtime ARN).
    #[error("config error: {0}")]
    Config(String),
    /// Invalid user input to the builder API.
    #[error("validation error: {0}")]
    Validation(String),
    /// Transport error surfaced outside the run stream.
    #[error(transparent)]
    Transport(TransportError),
    /// Terminal failure returned from a started run.
    #[error(transparent)]
    RunFailed(RunFailure),
    /// The response completed without any text.
    #[error("agent returned an empty response")]
    EmptyResponse,
    /// A final message event arrived but carried no usable assistant answer.
    #[error("no valid assistant answer: {0}")]
    NoValidAnswer(NoAnswer),
    /// Internal protocol misuse or invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ChatError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

impl From<RunFailure> for ChatError {
    fn from(value: RunFailure) -> Self {
        ChatError::RunFailed(value)
    }
}

impl From<TransportError> for ChatError {
    fn from(value: TransportError) -> Self {
        ChatError::Transport(value)
    }
}
