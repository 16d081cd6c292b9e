//! Terminal chat front-end for an agent runtime hosted on Bedrock AgentCore.
//!
//! Sends one prompt (`--prompt`) or reads prompts from stdin, one request at a
//! time, and streams the answer to stdout. Notices, warnings and debug records
//! go to stderr.

use std::time::Duration;

use agentcore_chat::prelude::*;
use agentcore_chat::vendors::agentcore::{
    AgentCoreConfig, AgentCoreCredentials, AgentCoreHarnessExt, DEFAULT_REGION,
};
use agentcore_chat::{AnswerSource, NonDataLines, PayloadOptions, Unparseable};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "agentcore-chat", about = "Chat with a Bedrock AgentCore agent runtime")]
struct Cli {
    /// Send a single prompt and exit. Without it, prompts are read from stdin.
    #[arg(short, long)]
    prompt: Option<String>,

    /// ARN of the agent runtime to invoke.
    #[arg(long, env = "AGENTCORE_RUNTIME_ARN", default_value = "")]
    runtime_arn: String,

    /// Falls back to `AWS_REGION`, then to the built-in default.
    #[arg(long, env = "AWS_DEFAULT_REGION")]
    region: Option<String>,

    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true, default_value = "")]
    access_key_id: String,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true, default_value = "")]
    secret_access_key: String,

    #[arg(long, env = "AWS_SESSION_TOKEN", hide_env_values = true)]
    session_token: Option<String>,

    /// Search API key forwarded to the agent untouched.
    #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true)]
    search_api_key: Option<String>,

    /// Override the regional endpoint (proxies, local test servers).
    #[arg(long, env = "AGENTCORE_ENDPOINT")]
    endpoint: Option<String>,

    #[arg(long, value_enum, default_value_t = ShapeArg::Converse)]
    payload_shape: ShapeArg,

    #[arg(long, default_value_t = agentcore_chat::payload::DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Treat lines without a `data: ` prefix as answer text.
    #[arg(long)]
    raw_text_lines: bool,

    /// Drop `data: ` payloads that are not JSON instead of showing them.
    #[arg(long)]
    discard_unparseable: bool,

    /// Print every parsed event as pretty JSON on stderr.
    #[arg(long)]
    debug: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ShapeArg {
    Converse,
    InputTextWithSearchKey,
    InputText,
}

impl From<ShapeArg> for PayloadShape {
    fn from(value: ShapeArg) -> Self {
        match value {
            ShapeArg::Converse => PayloadShape::Converse,
            ShapeArg::InputTextWithSearchKey => PayloadShape::InputTextWithSearchKey,
            ShapeArg::InputText => PayloadShape::InputText,
        }
    }
}

impl Cli {
    fn agent_config(&self) -> AgentCoreConfig {
        let mut credentials =
            AgentCoreCredentials::new(&self.access_key_id, &self.secret_access_key);
        if let Some(token) = &self.session_token {
            credentials = credentials.session_token(token);
        }
        let region = resolve_region(self.region.as_deref(), std::env::var("AWS_REGION").ok());
        let mut config = AgentCoreConfig::new(credentials, &self.runtime_arn)
            .region(region)
            .timeout(Duration::from_secs(self.timeout_secs));
        if let Some(endpoint) = &self.endpoint {
            config = config.endpoint(endpoint);
        }
        config
    }

    fn policy(&self) -> NormalizerPolicy {
        NormalizerPolicy::default()
            .non_data_lines(if self.raw_text_lines {
                NonDataLines::RawText
            } else {
                NonDataLines::Ignore
            })
            .unparseable(if self.discard_unparseable {
                Unparseable::Discard
            } else {
                Unparseable::Literal
            })
            .capture_debug(self.debug)
    }

    fn payload_options(&self) -> PayloadOptions {
        let options = PayloadOptions::default()
            .shape(self.payload_shape.into())
            .max_tokens(self.max_tokens);
        match &self.search_api_key {
            Some(key) => options.search_api_key(key),
            None => options,
        }
    }
}

fn resolve_region(explicit: Option<&str>, aws_region: Option<String>) -> String {
    explicit
        .map(str::to_owned)
        .into_iter()
        .chain(aws_region)
        .map(|region| region.trim().to_string())
        .find(|region| !region.is_empty())
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    agentcore_chat::init_observability();
    let cli = Cli::parse();

    let config = cli.agent_config();
    if let Err(err) = config.validate() {
        eprintln!("warning: {err}; set it in .env, the environment, or on the command line");
        return Err(err).context("agent runtime is not configured");
    }
    let harness = Harness::builder()
        .agentcore(config)?
        .policy(cli.policy())
        .payload_options(cli.payload_options())
        .build()?;

    match cli.prompt.as_deref() {
        Some(prompt) => ask(&harness, prompt, cli.timeout_secs).await,
        None => interactive(&harness, cli.timeout_secs).await,
    }
}

async fn interactive(harness: &Harness, timeout_secs: u64) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            break;
        };
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if matches!(prompt, "exit" | "quit") {
            break;
        }
        // Failures end the request, not the session.
        if let Err(err) = ask(harness, prompt, timeout_secs).await {
            eprintln!("error: {err:#}");
        }
    }
    Ok(())
}

async fn ask(harness: &Harness, prompt: &str, timeout_secs: u64) -> Result<()> {
    let mut run = harness
        .chat(prompt)
        .timeout(Duration::from_secs(timeout_secs))
        .start_stream()
        .await?;
    info!(request_id = %run.request_id(), "request sent");

    let mut stdout = tokio::io::stdout();
    let mut shown = String::new();
    while let Some(event) = run.next_event().await {
        match event {
            ChatEvent::Fragment { text, .. } => {
                stdout.write_all(text.as_bytes()).await?;
                stdout.flush().await?;
                shown.push_str(&text);
            }
            ChatEvent::Debug { record, .. } => {
                eprintln!("[debug #{} {:?}]\n{}", record.seq, record.kind, record.to_pretty_json());
            }
            ChatEvent::Error { error, .. } => {
                if !shown.is_empty() {
                    stdout.write_all(b"\n").await?;
                }
                return Err(error).context("agent request failed");
            }
            ChatEvent::Started { .. } | ChatEvent::Responding { .. } | ChatEvent::Completed { .. } => {}
        }
    }

    match run.finish().await? {
        ChatOutcome::Answered(answer) => {
            // A final message replaces whatever was streamed before it.
            if answer.source == AnswerSource::Message && answer.text != shown {
                if !shown.is_empty() {
                    stdout.write_all(b"\n").await?;
                }
                stdout.write_all(answer.text.as_bytes()).await?;
            }
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
            eprintln!("response received");
        }
        ChatOutcome::Empty => {
            warn!("empty response");
            eprintln!("warning: the agent returned no text and no final message");
        }
        ChatOutcome::NoValidAnswer(reason) => {
            if !shown.is_empty() {
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            warn!(%reason, "no valid assistant answer");
            eprintln!("warning: no valid assistant response ({reason})");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_policy_and_payload() {
        let cli = Cli::try_parse_from([
            "agentcore-chat",
            "--prompt",
            "hi",
            "--runtime-arn",
            "arn:x",
            "--access-key-id",
            "AKID",
            "--secret-access-key",
            "secret",
            "--payload-shape",
            "input-text",
            "--raw-text-lines",
            "--discard-unparseable",
            "--debug",
        ])
        .expect("parse");

        let policy = cli.policy();
        assert_eq!(policy.non_data_lines, NonDataLines::RawText);
        assert_eq!(policy.unparseable, Unparseable::Discard);
        assert!(policy.capture_debug);
        assert_eq!(cli.payload_options().shape, PayloadShape::InputText);
        assert!(cli.agent_config().validate().is_ok());
    }

    #[test]
    fn region_falls_back_to_aws_region_then_default() {
        assert_eq!(
            resolve_region(Some("us-west-2"), Some("eu-west-1".into())),
            "us-west-2"
        );
        assert_eq!(resolve_region(None, Some("eu-west-1".into())), "eu-west-1");
        assert_eq!(resolve_region(Some("  "), Some("eu-west-1".into())), "eu-west-1");
        assert_eq!(resolve_region(None, None), DEFAULT_REGION);
    }
}
