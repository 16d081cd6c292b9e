//! Common imports for typical chat usage.
pub use crate::{
    ChatError, ChatEvent, ChatOutcome, FinalAnswer, Harness, HarnessBuilder, NormalizerPolicy,
    PayloadShape, RequestState, RunBuilder, RunStream,
};
