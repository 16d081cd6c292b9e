use crate::content::ChatOutcome;
use crate::envelope::DebugRecord;
use crate::errors::RunFailure;

/// Normalized events exposed by `RunStream`.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatEvent {
    /// First event for every request.
    Started { request_id: uuid::Uuid },
    /// The runtime accepted the call and the response is being read.
    Responding {
        request_id: uuid::Uuid,
        content_type: Option<String>,
        session_id: Option<String>,
    },
    /// Text appended to the rendered answer.
    Fragment {
        request_id: uuid::Uuid,
        seq: u64,
        text: String,
    },
    /// Sanitized copy of a parsed event (only with `capture_debug`).
    Debug {
        request_id: uuid::Uuid,
        record: DebugRecord,
    },
    /// Terminal event for a response that was read to the end.
    Completed {
        request_id: uuid::Uuid,
        outcome: ChatOutcome,
    },
    /// Terminal transport failure.
    Error {
        request_id: uuid::Uuid,
        error: RunFailure,
    },
}

impl ChatEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::Completed { .. } | ChatEvent::Error { .. })
    }
}

/// Lifecycle of one request as observed by the consumer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequestState {
    #[default]
    Idle,
    AwaitingResponse,
    Streaming,
    Finalized,
    EmptyWarning,
    NoValidAnswer,
    Error,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::Finalized
                | RequestState::EmptyWarning
                | RequestState::NoValidAnswer
                | RequestState::Error
        )
    }

    /// State after observing `event`. Terminal states are sticky.
    pub fn after(self, event: &ChatEvent) -> Self {
        if self.is_terminal() {
            return self;
        }
        match event {
            ChatEvent::Started { .. } => RequestState::AwaitingResponse,
            ChatEvent::Responding { .. } | ChatEvent::Debug { .. } => self,
            ChatEvent::Fragment { .. } => RequestState::Streaming,
            ChatEvent::Completed { outcome, .. } => match outcome {
                ChatOutcome::Answered(_) => RequestState::Finalized,
                ChatOutcome::Empty => RequestState::EmptyWarning,
                ChatOutcome::NoValidAnswer(_) => RequestState::NoValidAnswer,
            },
            ChatEvent::Error { .. } => RequestState::Error,
        }
    }
}
