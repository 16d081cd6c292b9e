use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt as _;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::content::ChatOutcome;
use crate::envelope::{EnvelopeNormalizer, LineDecoder, NormalizedEvent, NormalizerPolicy};
use crate::errors::{ChatError, RunFailure, TransportError};
use crate::harness::HarnessInner;
use crate::payload::{PayloadOptions, PayloadShape, build_payload};
use crate::stream::{ChatEvent, RequestState};
use crate::transport::{AgentTransport, ByteStream, InvokeRequest};

/// Generic request behavior options.
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Optional per-request timeout.
    pub timeout: Option<Duration>,
    /// Bounded event buffer size used by the streaming channel.
    pub stream_buffer_capacity: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            stream_buffer_capacity: 128,
        }
    }
}

/// Builder for configuring and starting a single request.
pub struct RunBuilder {
    harness: Arc<HarnessInner>,
    prompt: String,
    payload: PayloadOptions,
    policy: NormalizerPolicy,
    options: RunOptions,
}

impl RunBuilder {
    pub(crate) fn new(harness: Arc<HarnessInner>, prompt: String) -> Self {
        let payload = harness.payload.clone();
        let policy = harness.policy;
        Self {
            harness,
            prompt,
            payload,
            policy,
            options: RunOptions::default(),
        }
    }

    pub fn payload_shape(mut self, shape: PayloadShape) -> Self {
        self.payload.shape = shape;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.payload.max_tokens = max_tokens;
        self
    }

    /// Third-party search key forwarded in the request envelope.
    pub fn search_api_key(mut self, key: impl Into<String>) -> Self {
        self.payload.search_api_key = Some(key.into());
        self
    }

    pub fn policy(mut self, policy: NormalizerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets an optional per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Sets the bounded buffer size between the request task and the consumer.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.options.stream_buffer_capacity = capacity;
        self
    }

    /// Validates the builder state and starts the request.
    ///
    /// The returned `RunStream` yields `Started`, then `Responding`,
    /// `Fragment` and `Debug` events, and one terminal `Completed`/`Error`.
    pub async fn start_stream(self) -> Result<RunStream, ChatError> {
        self.validate()?;
        let request = InvokeRequest {
            request_id: uuid::Uuid::new_v4(),
            payload: build_payload(&self.prompt, &self.payload),
            timeout: self.options.timeout,
        };
        let request_id = request.request_id;

        let (tx, rx) = mpsc::channel(self.options.stream_buffer_capacity);
        let (final_tx, final_rx) = oneshot::channel();
        tokio::spawn(run_task(
            self.harness.transport.clone(),
            request,
            self.policy,
            tx,
            final_tx,
        ));

        Ok(RunStream {
            request_id,
            rx,
            final_rx,
            state: RequestState::Idle,
        })
    }

    /// Runs to completion and returns the terminal outcome.
    pub async fn collect_outcome(self) -> Result<ChatOutcome, ChatError> {
        self.start_stream().await?.finish().await
    }

    /// Runs to completion and returns the answer text.
    ///
    /// Empty responses and unusable final messages become distinct errors.
    pub async fn collect_text(self) -> Result<String, ChatError> {
        match self.collect_outcome().await? {
            ChatOutcome::Answered(answer) => Ok(answer.text),
            ChatOutcome::Empty => Err(ChatError::EmptyResponse),
            ChatOutcome::NoValidAnswer(reason) => Err(ChatError::NoValidAnswer(reason)),
        }
    }

    fn validate(&self) -> Result<(), ChatError> {
        if self.prompt.trim().is_empty() {
            return Err(ChatError::Validation("prompt must not be empty".into()));
        }
        if self.options.stream_buffer_capacity == 0 {
            return Err(ChatError::Validation(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }
        if self.payload.shape == PayloadShape::Converse && self.payload.max_tokens == 0 {
            return Err(ChatError::Validation(
                "max_tokens must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Streaming handle returned by `RunBuilder::start_stream`.
pub struct RunStream {
    request_id: uuid::Uuid,
    rx: mpsc::Receiver<ChatEvent>,
    final_rx: oneshot::Receiver<Result<ChatOutcome, ChatError>>,
    state: RequestState,
}

impl RunStream {
    pub fn request_id(&self) -> uuid::Uuid {
        self.request_id
    }

    /// Lifecycle state after the events consumed so far.
    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Waits for and returns the next event.
    ///
    /// Returns `None` after the stream channel is closed.
    pub async fn next_event(&mut self) -> Option<ChatEvent> {
        let event = self.rx.recv().await;
        if let Some(event) = &event {
            self.state = self.state.after(event);
        }
        event
    }

    /// Drains the stream (if needed) and returns the terminal result.
    ///
    /// Safe to call after consuming events manually with `next_event()`.
    pub async fn finish(mut self) -> Result<ChatOutcome, ChatError> {
        while !self.state.is_terminal() {
            if self.next_event().await.is_none() {
                break;
            }
        }

        match self.final_rx.await {
            Ok(result) => result,
            Err(_) => Err(ChatError::protocol_msg(format!(
                "request task ended without final result (request_id={})",
                self.request_id
            ))),
        }
    }
}

enum ReadError {
    Transport(TransportError),
    ReceiverDropped,
}

impl From<TransportError> for ReadError {
    fn from(value: TransportError) -> Self {
        ReadError::Transport(value)
    }
}

struct Emitter {
    request_id: uuid::Uuid,
    tx: mpsc::Sender<ChatEvent>,
    seq: u64,
}

impl Emitter {
    async fn send(&self, event: ChatEvent) -> Result<(), ReadError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ReadError::ReceiverDropped)
    }

    async fn forward(&mut self, events: Vec<NormalizedEvent>) -> Result<(), ReadError> {
        for event in events {
            match event {
                NormalizedEvent::Fragment(text) => {
                    debug!(request_id = %self.request_id, seq = self.seq, len = text.len(), "answer fragment");
                    let event = ChatEvent::Fragment {
                        request_id: self.request_id,
                        seq: self.seq,
                        text,
                    };
                    self.seq = self.seq.saturating_add(1);
                    self.send(event).await?;
                }
                NormalizedEvent::Debug(record) => {
                    self.send(ChatEvent::Debug {
                        request_id: self.request_id,
                        record,
                    })
                    .await?;
                }
                NormalizedEvent::FinalMessage => {
                    debug!(request_id = %self.request_id, "retained final message event");
                }
                NormalizedEvent::Stop => {
                    debug!(request_id = %self.request_id, "messageStop received");
                }
            }
        }
        Ok(())
    }
}

async fn run_task(
    transport: Arc<dyn AgentTransport>,
    request: InvokeRequest,
    policy: NormalizerPolicy,
    tx: mpsc::Sender<ChatEvent>,
    final_tx: oneshot::Sender<Result<ChatOutcome, ChatError>>,
) {
    let request_id = request.request_id;
    let mut emitter = Emitter {
        request_id,
        tx,
        seq: 0,
    };

    let result = read_response(&mut emitter, transport, request, policy).await;
    let final_result = match result {
        Ok(outcome) => {
            match &outcome {
                ChatOutcome::Answered(answer) => {
                    info!(request_id = %request_id, source = ?answer.source, stopped = answer.stopped, "answer resolved")
                }
                ChatOutcome::Empty => warn!(request_id = %request_id, "agent returned an empty response"),
                ChatOutcome::NoValidAnswer(reason) => {
                    warn!(request_id = %request_id, %reason, "no valid assistant answer")
                }
            }
            let completed = ChatEvent::Completed {
                request_id,
                outcome: outcome.clone(),
            };
            match emitter.send(completed).await {
                Ok(()) => Ok(outcome),
                Err(_) => Err(ChatError::protocol_msg(
                    "run stream receiver dropped before completion",
                )),
            }
        }
        Err(ReadError::Transport(err)) => {
            warn!(request_id = %request_id, error = %err, "agent call failed");
            let failure = RunFailure::from(&err);
            let _ = emitter
                .send(ChatEvent::Error {
                    request_id,
                    error: failure.clone(),
                })
                .await;
            Err(ChatError::RunFailed(failure))
        }
        Err(ReadError::ReceiverDropped) => Err(ChatError::protocol_msg(
            "run stream receiver dropped during output",
        )),
    };
    let _ = final_tx.send(final_result);
}

async fn read_response(
    emitter: &mut Emitter,
    transport: Arc<dyn AgentTransport>,
    request: InvokeRequest,
    policy: NormalizerPolicy,
) -> Result<ChatOutcome, ReadError> {
    emitter
        .send(ChatEvent::Started {
            request_id: emitter.request_id,
        })
        .await?;

    let response = transport.invoke(request).await?;
    let streaming = response.is_event_stream();
    debug!(request_id = %emitter.request_id, content_type = ?response.content_type, streaming, "agent call accepted");
    emitter
        .send(ChatEvent::Responding {
            request_id: emitter.request_id,
            content_type: response.content_type.clone(),
            session_id: response.session_id.clone(),
        })
        .await?;

    let mut normalizer = EnvelopeNormalizer::new(policy);
    if let Some(record) = normalizer.response_debug_record(
        response.content_type.as_deref(),
        response.session_id.as_deref(),
    ) {
        emitter
            .send(ChatEvent::Debug {
                request_id: emitter.request_id,
                record,
            })
            .await?;
    }
    if streaming {
        read_event_stream(emitter, &mut normalizer, response.body).await?;
    } else {
        read_body(emitter, &mut normalizer, response.body).await?;
    }

    if let Some(record) = normalizer.final_debug_record() {
        emitter
            .send(ChatEvent::Debug {
                request_id: emitter.request_id,
                record,
            })
            .await?;
    }
    Ok(normalizer.finish())
}

async fn read_event_stream(
    emitter: &mut Emitter,
    normalizer: &mut EnvelopeNormalizer,
    mut body: ByteStream,
) -> Result<(), ReadError> {
    let mut decoder = LineDecoder::default();
    while let Some(chunk) = body.next().await {
        let lines = decoder.push_chunk(&chunk?).map_err(TransportError::from)?;
        for line in lines {
            emitter.forward(normalizer.push_line(&line)).await?;
            if normalizer.is_stopped() {
                return Ok(());
            }
        }
    }
    if let Some(line) = decoder.finish().map_err(TransportError::from)? {
        emitter.forward(normalizer.push_line(&line)).await?;
    }
    Ok(())
}

async fn read_body(
    emitter: &mut Emitter,
    normalizer: &mut EnvelopeNormalizer,
    mut body: ByteStream,
) -> Result<(), ReadError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        bytes.extend_from_slice(&chunk?);
    }
    let events = normalizer
        .push_body(&bytes)
        .map_err(TransportError::from)?;
    emitter.forward(events).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{AnswerSource, FinalAnswer};
    use crate::envelope::{DebugKind, NoAnswer, NonDataLines};
    use crate::transport::AgentResponse;
    use futures::stream;
    use std::sync::Mutex;

    enum FakeBehavior {
        Reject(TransportError),
        Respond {
            content_type: Option<&'static str>,
            chunks: Vec<Result<&'static [u8], TransportError>>,
        },
    }

    struct FakeTransport {
        behavior: FakeBehavior,
        seen: Mutex<Vec<InvokeRequest>>,
    }

    impl FakeTransport {
        fn new(behavior: FakeBehavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn sse(chunks: &[&'static str]) -> Arc<Self> {
            Self::new(FakeBehavior::Respond {
                content_type: Some("text/event-stream"),
                chunks: chunks.iter().map(|chunk| Ok(chunk.as_bytes())).collect(),
            })
        }
    }

    #[async_trait::async_trait]
    impl AgentTransport for FakeTransport {
        async fn invoke(&self, req: InvokeRequest) -> Result<AgentResponse, TransportError> {
            self.seen.lock().expect("lock").push(req);
            match &self.behavior {
                FakeBehavior::Reject(err) => Err(err.clone()),
                FakeBehavior::Respond {
                    content_type,
                    chunks,
                } => {
                    let chunks: Vec<Result<bytes::Bytes, TransportError>> = chunks
                        .iter()
                        .map(|chunk| chunk.clone().map(bytes::Bytes::from_static))
                        .collect();
                    Ok(AgentResponse {
                        content_type: content_type.map(ToOwned::to_owned),
                        session_id: Some("session-1".into()),
                        body: Box::pin(stream::iter(chunks)),
                    })
                }
            }
        }
    }

    fn harness(transport: Arc<FakeTransport>) -> crate::Harness {
        crate::Harness::builder()
            .transport(transport)
            .build()
            .expect("build harness")
    }

    async fn drain(stream: &mut RunStream) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Some(event) = stream.next_event().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }

    #[tokio::test]
    async fn validation_rejects_blank_prompt() {
        let err = harness(FakeTransport::sse(&[]))
            .chat("   ")
            .start_stream()
            .await;
        let err = match err {
            Ok(_) => panic!("blank prompt should fail"),
            Err(err) => err,
        };
        assert!(matches!(err, ChatError::Validation(msg) if msg.contains("prompt")));
    }

    #[tokio::test]
    async fn validation_rejects_zero_buffer_capacity() {
        let result = harness(FakeTransport::sse(&[]))
            .chat("hi")
            .stream_buffer_capacity(0)
            .start_stream()
            .await;
        assert!(matches!(result, Err(ChatError::Validation(_))));
    }

    #[tokio::test]
    async fn streams_fragments_split_across_chunks() {
        let transport = FakeTransport::sse(&[
            "data: {\"delta\":{\"text\":\"He",
            "llo\"}}\n\ndata: {\"event\":{\"contentBlockDelta\":{\"delta\":{\"text\":\", \"}}}}\n",
            "data: \"world\"\n",
        ]);
        let mut stream = harness(transport.clone())
            .chat("greet me")
            .search_api_key("tvly-key")
            .start_stream()
            .await
            .expect("start");

        assert_eq!(stream.state(), RequestState::Idle);
        let events = drain(&mut stream).await;
        assert!(matches!(events[0], ChatEvent::Started { .. }));
        assert!(matches!(
            &events[1],
            ChatEvent::Responding { session_id: Some(id), .. } if id == "session-1"
        ));
        let fragments: Vec<(u64, String)> = events
            .iter()
            .filter_map(|event| match event {
                ChatEvent::Fragment { seq, text, .. } => Some((*seq, text.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            fragments,
            vec![
                (0, "Hello".to_string()),
                (1, ", ".to_string()),
                (2, "world".to_string())
            ]
        );
        assert_eq!(stream.state(), RequestState::Finalized);
        assert_eq!(
            stream.finish().await.expect("finish"),
            ChatOutcome::Answered(FinalAnswer {
                text: "Hello, world".into(),
                source: AnswerSource::Fragments,
                stopped: false,
            })
        );

        let seen = transport.seen.lock().expect("lock");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].payload["prompt"], "greet me");
        assert_eq!(seen[0].payload["sessionAttributes"]["tavily_api_key"], "tvly-key");
    }

    #[tokio::test]
    async fn message_stop_ends_reading_early() {
        let transport = FakeTransport::sse(&[
            "data: {\"delta\":{\"text\":\"ab\"}}\n",
            "data: {\"eventType\":\"messageStop\"}\ndata: {\"delta\":{\"text\":\"zz\"}}\n",
        ]);
        let outcome = harness(transport)
            .chat("q")
            .collect_outcome()
            .await
            .expect("outcome");
        assert_eq!(
            outcome,
            ChatOutcome::Answered(FinalAnswer {
                text: "ab".into(),
                source: AnswerSource::Fragments,
                stopped: true,
            })
        );
    }

    #[tokio::test]
    async fn final_message_variant_resolves_last_message() {
        let transport = FakeTransport::sse(&[
            "data: {\"message\":{\"role\":\"assistant\",\"content\":[{\"text\":\"draft\"}]}}\n",
            "data: {\"message\":\"{\\\"role\\\":\\\"assistant\\\",\\\"content\\\":[{\\\"text\\\":\\\"final\\\"}]}\"}\n",
        ]);
        let text = harness(transport)
            .chat("q")
            .collect_text()
            .await
            .expect("text");
        assert_eq!(text, "final");
    }

    #[tokio::test]
    async fn empty_stream_is_empty_warning_not_error() {
        let transport = FakeTransport::sse(&[": ping\n\n"]);
        let mut stream = harness(transport.clone())
            .chat("q")
            .start_stream()
            .await
            .expect("start");
        let events = drain(&mut stream).await;
        assert!(matches!(
            events.last(),
            Some(ChatEvent::Completed {
                outcome: ChatOutcome::Empty,
                ..
            })
        ));
        assert_eq!(stream.state(), RequestState::EmptyWarning);
        assert_eq!(stream.finish().await, Ok(ChatOutcome::Empty));

        let err = harness(transport)
            .chat("q")
            .collect_text()
            .await
            .expect_err("empty");
        assert_eq!(err, ChatError::EmptyResponse);
    }

    #[tokio::test]
    async fn unusable_message_is_no_valid_answer() {
        let transport = FakeTransport::sse(&[
            "data: {\"message\":{\"role\":\"user\",\"content\":[{\"text\":\"q\"}]}}\n",
        ]);
        let err = harness(transport)
            .chat("q")
            .collect_text()
            .await
            .expect_err("no answer");
        assert_eq!(
            err,
            ChatError::NoValidAnswer(NoAnswer::NotAssistant(Some("user".into())))
        );
    }

    #[tokio::test]
    async fn rejected_call_becomes_terminal_error() {
        let transport = FakeTransport::new(FakeBehavior::Reject(TransportError::Status {
            status: 403,
            body: "UnrecognizedClientException".into(),
        }));
        let mut stream = harness(transport)
            .chat("q")
            .start_stream()
            .await
            .expect("start");
        let events = drain(&mut stream).await;
        assert!(matches!(events.last(), Some(ChatEvent::Error { .. })));
        assert_eq!(stream.state(), RequestState::Error);
        assert!(matches!(
            stream.finish().await,
            Err(ChatError::RunFailed(RunFailure::Rejected { status: 403, .. }))
        ));
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_fragments_then_errors() {
        let transport = FakeTransport::new(FakeBehavior::Respond {
            content_type: Some("text/event-stream"),
            chunks: vec![
                Ok("data: \"partial\"\n".as_bytes()),
                Err(TransportError::Network("connection reset".into())),
            ],
        });
        let mut stream = harness(transport)
            .chat("q")
            .start_stream()
            .await
            .expect("start");
        let events = drain(&mut stream).await;
        assert!(events.iter().any(|event| matches!(
            event,
            ChatEvent::Fragment { text, .. } if text == "partial"
        )));
        assert!(matches!(
            stream.finish().await,
            Err(ChatError::RunFailed(RunFailure::Transport { message })) if message.contains("reset")
        ));
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_a_transport_failure() {
        let transport = FakeTransport::new(FakeBehavior::Respond {
            content_type: Some("text/event-stream"),
            chunks: vec![Ok(b"data: \xff\n".as_slice())],
        });
        let result = harness(transport).chat("q").collect_outcome().await;
        assert!(matches!(
            result,
            Err(ChatError::RunFailed(RunFailure::Transport { .. }))
        ));
    }

    #[tokio::test]
    async fn json_body_response_is_read_as_one_answer() {
        let transport = FakeTransport::new(FakeBehavior::Respond {
            content_type: Some("application/json"),
            chunks: vec![Ok("{\"comp".as_bytes()), Ok("letion\":\"batched\"}".as_bytes())],
        });
        let text = harness(transport)
            .chat("q")
            .collect_text()
            .await
            .expect("text");
        assert_eq!(text, "batched");
    }

    #[tokio::test]
    async fn plain_text_policy_and_debug_records() {
        let transport = FakeTransport::sse(&[
            "raw line\n",
            "data: {\"outputText\":\"x\"}\n",
            "data: {\"message\":\"done\"}\n",
        ]);
        let policy = NormalizerPolicy::default()
            .non_data_lines(NonDataLines::RawText)
            .capture_debug(true);
        let mut stream = harness(transport)
            .chat("q")
            .policy(policy)
            .start_stream()
            .await
            .expect("start");
        let events = drain(&mut stream).await;
        let kinds: Vec<DebugKind> = events
            .iter()
            .filter_map(|event| match event {
                ChatEvent::Debug { record, .. } => Some(record.kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                DebugKind::Response,
                DebugKind::Event,
                DebugKind::Event,
                DebugKind::FinalMessage
            ]
        );
        let rendered: String = events
            .iter()
            .filter_map(|event| match event {
                ChatEvent::Fragment { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(rendered, "raw line\nx");
        assert_eq!(
            stream.finish().await.expect("finish").text(),
            Some("done")
        );
    }

    #[tokio::test]
    async fn data_lines_without_event_stream_content_type_are_framed() {
        for content_type in [None, Some("text/plain"), Some("application/octet-stream")] {
            let transport = FakeTransport::new(FakeBehavior::Respond {
                content_type,
                chunks: vec![
                    Ok(b"data: {\"delta\":{\"text\":\"a\"}}\nda".as_slice()),
                    Ok(b"ta: {\"delta\":{\"text\":\"b\"}}\n".as_slice()),
                ],
            });
            let outcome = harness(transport)
                .chat("q")
                .collect_outcome()
                .await
                .expect("outcome");
            assert_eq!(outcome.text(), Some("ab"), "content type {content_type:?}");
        }
    }
}
