//! Chat client core for agent runtimes hosted on Amazon Bedrock AgentCore.
//!
//! A request sends one prompt to a remote agent and turns whatever comes back
//! (server-sent `data: ` lines or a single batched body) into plain answer
//! text. Vendor-specific APIs are namespaced under `vendors::*`.
//!
//! # Streaming a reply
//!
//! ```no_run
//! use agentcore_chat::prelude::*;
//! use agentcore_chat::vendors::agentcore::{AgentCoreConfig, AgentCoreHarnessExt};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ChatError> {
//! let harness = Harness::builder()
//!     .agentcore(AgentCoreConfig::from_env()?)?
//!     .build()?;
//!
//! let mut run = harness
//!     .chat("What changed in the latest release?")
//!     .search_api_key("tvly-...")
//!     .start_stream()
//!     .await?;
//!
//! while let Some(event) = run.next_event().await {
//!     if let ChatEvent::Fragment { text, .. } = event {
//!         print!("{text}");
//!     }
//! }
//! match run.finish().await? {
//!     ChatOutcome::Answered(answer) => println!("\n{}", answer.text),
//!     ChatOutcome::Empty => eprintln!("empty response"),
//!     ChatOutcome::NoValidAnswer(reason) => eprintln!("no valid answer: {reason}"),
//! }
//! # Ok(())
//! # }
//! ```

/// Final answer and outcome types.
pub mod content;
/// Decoding of streamed and batched response envelopes.
pub mod envelope;
/// Public error types.
pub mod errors;
/// Harness entry point and builder.
pub mod harness;
/// Process-wide tracing setup.
pub mod observability;
/// Request envelope construction.
pub mod payload;
/// Common imports for typical usage.
pub mod prelude;
/// Request builder and streaming handle.
pub mod run;
/// Public per-request events and request state.
pub mod stream;
/// Transport seam for invoking a remote agent.
pub mod transport;
/// Vendor-specific integrations and extension traits.
pub mod vendors;

pub use content::{AnswerSource, ChatOutcome, FinalAnswer};
pub use envelope::{DebugKind, DebugRecord, NoAnswer, NonDataLines, NormalizerPolicy, Unparseable};
pub use errors::{ChatError, FramingError, RunFailure, TransportError};
pub use harness::{Harness, HarnessBuilder};
pub use observability::init_observability;
pub use payload::{PayloadOptions, PayloadShape};
pub use run::{RunBuilder, RunOptions, RunStream};
pub use stream::{ChatEvent, RequestState};
pub use transport::{AgentResponse, AgentTransport, ByteStream, InvokeRequest};
