use std::fmt;
use std::time::Duration;

use crate::errors::ChatError;

/// Region used when neither the caller nor the environment names one.
pub const DEFAULT_REGION: &str = "ap-northeast-1";
/// Runtime endpoint qualifier used when none is given.
pub const DEFAULT_QUALIFIER: &str = "DEFAULT";

/// Caller-supplied access keys. Passed through to request signing only.
#[derive(Clone, PartialEq, Eq)]
pub struct AgentCoreCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Temporary-credential session token, when using STS credentials.
    pub session_token: Option<String>,
}

impl AgentCoreCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into()).filter(|t: &String| !t.trim().is_empty());
        self
    }

    /// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`.
    /// Missing values are left empty for `AgentCoreConfig::validate` to report.
    pub fn from_env() -> Self {
        let creds = Self::new(env_or_empty("AWS_ACCESS_KEY_ID"), env_or_empty("AWS_SECRET_ACCESS_KEY"));
        creds.session_token(env_or_empty("AWS_SESSION_TOKEN"))
    }
}

impl fmt::Debug for AgentCoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentCoreCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Configuration for the managed agent runtime client.
///
/// Built once per set of credentials. Changing credentials means building a
/// new config and a new `AgentCoreClient`.
#[derive(Clone, Debug)]
pub struct AgentCoreConfig {
    pub credentials: AgentCoreCredentials,
    pub region: String,
    /// ARN of the agent runtime to invoke.
    pub runtime_arn: String,
    pub qualifier: String,
    /// Overrides the regional endpoint (for proxies or test servers).
    pub endpoint: Option<String>,
    /// Default HTTP timeout for requests.
    pub timeout: Duration,
}

impl AgentCoreConfig {
    /// Creates a config with default region, qualifier and timeout.
    pub fn new(credentials: AgentCoreCredentials, runtime_arn: impl Into<String>) -> Self {
        Self {
            credentials,
            region: DEFAULT_REGION.to_string(),
            runtime_arn: runtime_arn.into(),
            qualifier: DEFAULT_QUALIFIER.to_string(),
            endpoint: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Builds a config from `AWS_*` variables and `AGENTCORE_RUNTIME_ARN`.
    pub fn from_env() -> Result<Self, ChatError> {
        let region = std::env::var("AWS_DEFAULT_REGION")
            .or_else(|_| std::env::var("AWS_REGION"))
            .ok()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let config = Self::new(
            AgentCoreCredentials::from_env(),
            env_or_empty("AGENTCORE_RUNTIME_ARN"),
        )
        .region(region);
        config.validate()?;
        Ok(config)
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = qualifier.into();
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks that every field needed to sign and address a call is present.
    /// Values are not otherwise inspected; the service rejects bad ones.
    pub fn validate(&self) -> Result<(), ChatError> {
        let required = [
            ("AWS access key id", &self.credentials.access_key_id),
            ("AWS secret access key", &self.credentials.secret_access_key),
            ("region", &self.region),
            ("agent runtime ARN", &self.runtime_arn),
            ("qualifier", &self.qualifier),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ChatError::Config(format!("missing {name}")));
            }
        }
        Ok(())
    }

    pub(crate) fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-agentcore.{}.amazonaws.com", self.region),
        }
    }

    pub(crate) fn invocations_url(&self) -> String {
        format!(
            "{}/runtimes/{}/invocations?qualifier={}",
            self.base_url(),
            urlencoding::encode(&self.runtime_arn),
            urlencoding::encode(&self.qualifier)
        )
    }
}

fn env_or_empty(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARN: &str = "arn:aws:bedrock-agentcore:ap-northeast-1:123456789012:runtime/search_agent-AbC123";

    fn config() -> AgentCoreConfig {
        AgentCoreConfig::new(AgentCoreCredentials::new("AKIDEXAMPLE", "secret"), ARN)
    }

    #[test]
    fn defaults_region_qualifier_and_timeout() {
        let config = config();
        assert_eq!(config.region, "ap-northeast-1");
        assert_eq!(config.qualifier, "DEFAULT");
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invocation_url_percent_encodes_the_arn() {
        assert_eq!(
            config().invocations_url(),
            "https://bedrock-agentcore.ap-northeast-1.amazonaws.com/runtimes/\
             arn%3Aaws%3Abedrock-agentcore%3Aap-northeast-1%3A123456789012%3Aruntime%2Fsearch_agent-AbC123\
             /invocations?qualifier=DEFAULT"
        );
        assert!(
            config()
                .endpoint("http://127.0.0.1:9000/")
                .invocations_url()
                .starts_with("http://127.0.0.1:9000/runtimes/arn%3A")
        );
    }

    #[test]
    fn validate_names_the_missing_field() {
        let err = AgentCoreConfig::new(AgentCoreCredentials::new("AKID", "secret"), "  ")
            .validate()
            .expect_err("missing arn");
        assert!(matches!(err, ChatError::Config(msg) if msg.contains("runtime ARN")));

        let err = AgentCoreConfig::new(AgentCoreCredentials::new("", "secret"), ARN)
            .validate()
            .expect_err("missing key");
        assert!(matches!(err, ChatError::Config(msg) if msg.contains("access key id")));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let creds = AgentCoreCredentials::new("AKID", "very-secret").session_token("tok");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("AKID"));
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("tok\""));
    }

    #[test]
    fn blank_session_token_is_dropped() {
        let creds = AgentCoreCredentials::new("AKID", "s").session_token("  ");
        assert_eq!(creds.session_token, None);
    }
}
