//! Amazon Bedrock AgentCore integration.
//!
//! Request signing and endpoint details stay in this module so the root
//! chat API only sees the `AgentTransport` seam.
mod adapter;
mod config;
pub(crate) mod signing;

pub use adapter::AgentCoreClient;
pub use config::{AgentCoreConfig, AgentCoreCredentials, DEFAULT_QUALIFIER, DEFAULT_REGION};

use std::sync::Arc;

use crate::errors::ChatError;
use crate::harness::HarnessBuilder;

/// Extension trait for wiring an AgentCore client into a `HarnessBuilder`.
pub trait AgentCoreHarnessExt: Sized {
    /// Builds an `AgentCoreClient` from `config` and uses it as the transport.
    fn agentcore(self, config: AgentCoreConfig) -> Result<Self, ChatError>;
}

impl AgentCoreHarnessExt for HarnessBuilder {
    fn agentcore(self, config: AgentCoreConfig) -> Result<Self, ChatError> {
        let client = AgentCoreClient::new(config)?;
        Ok(self.transport(Arc::new(client)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Harness;

    #[test]
    fn agentcore_ext_installs_transport() {
        let config = AgentCoreConfig::new(AgentCoreCredentials::new("AKID", "secret"), "arn:x");
        let harness = Harness::builder()
            .agentcore(config)
            .expect("valid config")
            .build();
        assert!(harness.is_ok());
    }

    #[test]
    fn agentcore_ext_surfaces_config_errors() {
        let config = AgentCoreConfig::new(AgentCoreCredentials::new("", "secret"), "arn:x");
        let result = Harness::builder().agentcore(config);
        assert!(matches!(result, Err(ChatError::Config(_))));
    }
}
