/// Amazon Bedrock AgentCore runtime transport.
pub mod agentcore;
