use serde_json::{Value, json};

/// Default `inferenceConfig.maxTokens` for converse-shaped requests.
pub const DEFAULT_MAX_TOKENS: u32 = 512;

/// JSON envelope sent to the agent runtime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    /// `{prompt, input.messages, inferenceConfig, sessionAttributes}`.
    #[default]
    Converse,
    /// `{inputText, tavily_api_key}`.
    InputTextWithSearchKey,
    /// `{inputText}`.
    InputText,
}

/// Per-request envelope options.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PayloadOptions {
    pub shape: PayloadShape,
    pub max_tokens: u32,
    /// Third-party search API key, forwarded without inspection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_api_key: Option<String>,
}

impl Default for PayloadOptions {
    fn default() -> Self {
        Self {
            shape: PayloadShape::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
            search_api_key: None,
        }
    }
}

impl PayloadOptions {
    pub fn shape(mut self, shape: PayloadShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn search_api_key(mut self, key: impl Into<String>) -> Self {
        self.search_api_key = Some(key.into());
        self
    }
}

/// Builds the request envelope for one prompt.
pub fn build_payload(prompt: &str, options: &PayloadOptions) -> Value {
    let search_key = options.search_api_key.as_deref().unwrap_or("");
    match options.shape {
        PayloadShape::Converse => json!({
            "prompt": prompt,
            "input": {
                "messages": [
                    { "role": "user", "content": [{ "text": prompt }] }
                ]
            },
            "inferenceConfig": { "maxTokens": options.max_tokens },
            "sessionAttributes": { "tavily_api_key": search_key },
        }),
        PayloadShape::InputTextWithSearchKey => json!({
            "inputText": prompt,
            "tavily_api_key": search_key,
        }),
        PayloadShape::InputText => json!({ "inputText": prompt }),
    }
}
