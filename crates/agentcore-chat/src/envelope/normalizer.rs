//! The envelope normalizer turns framed lines (or one batched body) into an
//! append-only answer buffer plus a terminal `ChatOutcome`.

use serde_json::Value;
use tracing::debug;

use super::body::{BodyOutcome, extract_body_text};
use super::lines::{DATA_PREFIX, Line, LineDecoder, classify_line};
use super::message::extract_final_answer;
use super::sanitize::{DebugKind, DebugRecord, DebugValue};
use super::Envelope;
use crate::content::{AnswerSource, ChatOutcome, FinalAnswer};
use crate::errors::FramingError;

/// Treatment of non-empty lines without the `data: ` prefix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonDataLines {
    /// Structured streams: such lines carry no answer text.
    #[default]
    Ignore,
    /// Plain-text fallback: the line (with its newline) is answer text.
    RawText,
}

/// Treatment of `data: ` payloads that are not JSON.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unparseable {
    /// Append the payload verbatim as a fragment.
    #[default]
    Literal,
    /// Drop the payload.
    Discard,
}

/// Per-request parsing policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NormalizerPolicy {
    pub non_data_lines: NonDataLines,
    pub unparseable: Unparseable,
    /// Emit a sanitized `DebugRecord` for every parsed event.
    pub capture_debug: bool,
}

impl NormalizerPolicy {
    pub fn non_data_lines(mut self, value: NonDataLines) -> Self {
        self.non_data_lines = value;
        self
    }

    pub fn unparseable(mut self, value: Unparseable) -> Self {
        self.unparseable = value;
        self
    }

    pub fn capture_debug(mut self, enabled: bool) -> Self {
        self.capture_debug = enabled;
        self
    }
}

/// Output of feeding one line or body to the normalizer.
#[derive(Clone, Debug, PartialEq)]
pub enum NormalizedEvent {
    /// Text appended to the answer buffer.
    Fragment(String),
    /// A final `message` was retained (replacing any earlier one).
    FinalMessage,
    /// `messageStop` was seen; later input is ignored.
    Stop,
    /// Operator-only copy of a parsed event.
    Debug(DebugRecord),
}

/// Accumulates one request's response. Owned by the task handling it.
#[derive(Debug, Default)]
pub struct EnvelopeNormalizer {
    policy: NormalizerPolicy,
    buffer: String,
    final_message: Option<Value>,
    // Whole event that carried `final_message`, kept only for debug capture.
    final_event: Option<Value>,
    stopped: bool,
    debug_seq: u64,
}

impl EnvelopeNormalizer {
    pub fn new(policy: NormalizerPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Text rendered so far. Only ever grows.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Value of the last retained `message` key.
    pub fn final_message(&self) -> Option<&Value> {
        self.final_message.as_ref()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Feeds one framed line.
    pub fn push_line(&mut self, line: &str) -> Vec<NormalizedEvent> {
        if self.stopped {
            return Vec::new();
        }
        match classify_line(line) {
            Line::Blank => Vec::new(),
            Line::Other(text) => match self.policy.non_data_lines {
                NonDataLines::Ignore => Vec::new(),
                NonDataLines::RawText => self.append(format!("{text}\n")).into_iter().collect(),
            },
            Line::Data(payload) => self.push_payload(payload),
        }
    }

    fn push_payload(&mut self, payload: &str) -> Vec<NormalizedEvent> {
        let mut events = Vec::new();
        let mut raw = None;
        let envelope = match serde_json::from_str::<Value>(payload) {
            Ok(value) => {
                if self.policy.capture_debug {
                    events.push(NormalizedEvent::Debug(
                        self.debug_record(DebugKind::Event, value.clone()),
                    ));
                    raw = Some(value.clone());
                }
                Envelope::from_value(value)
            }
            Err(_) => Envelope::Literal(payload.to_string()),
        };

        match envelope {
            Envelope::Text(text)
            | Envelope::Delta(text)
            | Envelope::ContentBlockDelta(text)
            | Envelope::OutputText(text) => events.extend(self.append(text)),
            Envelope::Literal(text) => match self.policy.unparseable {
                Unparseable::Literal => events.extend(self.append(text)),
                Unparseable::Discard => debug!(len = text.len(), "discarding unparseable event"),
            },
            Envelope::Message(message) => {
                self.final_message = Some(message);
                self.final_event = raw;
                events.push(NormalizedEvent::FinalMessage);
            }
            Envelope::MessageStop => {
                self.stopped = true;
                events.push(NormalizedEvent::Stop);
            }
            Envelope::Unrecognized(_) => {}
        }
        events
    }

    /// Feeds a complete, non-streamed response body.
    ///
    /// A non-JSON body made of `data: ` lines is framed and fed line by line,
    /// whatever content type it was served with.
    pub fn push_body(&mut self, body: &[u8]) -> Result<Vec<NormalizedEvent>, FramingError> {
        let parsed = serde_json::from_slice::<Value>(body).ok();
        if parsed.is_none() && has_data_lines(body) {
            return self.push_framed(body);
        }

        let mut events = Vec::new();
        if self.policy.capture_debug {
            let value = match &parsed {
                Some(value) => DebugValue::from(value.clone()),
                None => DebugValue::Bytes(body.to_vec()),
            };
            let seq = self.next_debug_seq();
            events.push(NormalizedEvent::Debug(DebugRecord::new(
                seq,
                DebugKind::Body,
                &value,
            )));
        }
        match extract_body_text(body)? {
            BodyOutcome::Text(text) => events.extend(self.append(text)),
            BodyOutcome::Message(message) => {
                self.final_message = Some(message);
                if self.policy.capture_debug {
                    self.final_event = parsed;
                }
                events.push(NormalizedEvent::FinalMessage);
            }
            BodyOutcome::Empty => {}
        }
        Ok(events)
    }

    fn push_framed(&mut self, body: &[u8]) -> Result<Vec<NormalizedEvent>, FramingError> {
        let mut decoder = LineDecoder::default();
        let mut lines = decoder.push_chunk(body)?;
        lines.extend(decoder.finish()?);
        let mut events = Vec::new();
        for line in lines {
            if self.stopped {
                break;
            }
            events.extend(self.push_line(&line));
        }
        Ok(events)
    }

    /// Debug copy of the response metadata, when debug capture is on.
    pub fn response_debug_record(
        &mut self,
        content_type: Option<&str>,
        session_id: Option<&str>,
    ) -> Option<DebugRecord> {
        if !self.policy.capture_debug {
            return None;
        }
        let value = serde_json::json!({
            "content_type": content_type,
            "session_id": session_id,
        });
        Some(self.debug_record(DebugKind::Response, value))
    }

    /// Debug copy of the whole event that carried the retained final
    /// message, when debug capture is on.
    pub fn final_debug_record(&mut self) -> Option<DebugRecord> {
        if !self.policy.capture_debug {
            return None;
        }
        let event = self.final_event.clone()?;
        Some(self.debug_record(DebugKind::FinalMessage, event))
    }

    /// Resolves the terminal outcome.
    ///
    /// A retained `message` is authoritative; otherwise the concatenated
    /// fragments are the answer.
    pub fn finish(self) -> ChatOutcome {
        if let Some(message) = &self.final_message {
            return match extract_final_answer(message) {
                Ok(text) => ChatOutcome::Answered(FinalAnswer {
                    text,
                    source: AnswerSource::Message,
                    stopped: self.stopped,
                }),
                Err(reason) => ChatOutcome::NoValidAnswer(reason),
            };
        }
        if self.buffer.is_empty() {
            return ChatOutcome::Empty;
        }
        ChatOutcome::Answered(FinalAnswer {
            text: self.buffer,
            source: AnswerSource::Fragments,
            stopped: self.stopped,
        })
    }

    fn append(&mut self, text: String) -> Option<NormalizedEvent> {
        if text.is_empty() {
            return None;
        }
        self.buffer.push_str(&text);
        Some(NormalizedEvent::Fragment(text))
    }

    fn debug_record(&mut self, kind: DebugKind, value: Value) -> DebugRecord {
        let seq = self.next_debug_seq();
        DebugRecord::new(seq, kind, &DebugValue::from(value))
    }

    fn next_debug_seq(&mut self) -> u64 {
        let seq = self.debug_seq;
        self.debug_seq += 1;
        seq
    }
}

fn has_data_lines(body: &[u8]) -> bool {
    body.split(|b| *b == b'\n')
        .any(|line| line.starts_with(DATA_PREFIX.as_bytes()))
}
