use std::sync::Arc;

use crate::envelope::NormalizerPolicy;
use crate::errors::ChatError;
use crate::payload::PayloadOptions;
use crate::run::RunBuilder;
use crate::transport::AgentTransport;

pub(crate) struct HarnessInner {
    pub(crate) transport: Arc<dyn AgentTransport>,
    pub(crate) policy: NormalizerPolicy,
    pub(crate) payload: PayloadOptions,
}

/// Entry point for sending prompts to an agent runtime.
///
/// Cloning is cheap; every clone shares the same transport. Each call to
/// `chat` starts an independent request with its own answer buffer.
#[derive(Clone)]
pub struct Harness {
    pub(crate) inner: Arc<HarnessInner>,
}

impl Harness {
    /// Starts a builder for configuring the transport and request defaults.
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Starts building a request for `prompt`.
    pub fn chat(&self, prompt: impl Into<String>) -> RunBuilder {
        RunBuilder::new(self.inner.clone(), prompt.into())
    }
}

/// Builder used to create a `Harness`.
#[derive(Default)]
pub struct HarnessBuilder {
    transport: Option<Arc<dyn AgentTransport>>,
    policy: NormalizerPolicy,
    payload: PayloadOptions,
}

impl HarnessBuilder {
    /// Sets the transport used for every request.
    pub fn transport(mut self, transport: Arc<dyn AgentTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Default parsing policy for requests (overridable per request).
    pub fn policy(mut self, policy: NormalizerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Default request envelope options (overridable per request).
    pub fn payload_options(mut self, payload: PayloadOptions) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Result<Harness, ChatError> {
        let transport = self
            .transport
            .ok_or_else(|| ChatError::Config("no agent transport configured".into()))?;
        Ok(Harness {
            inner: Arc::new(HarnessInner {
                transport,
                policy: self.policy,
                payload: self.payload,
            }),
        })
    }
}
