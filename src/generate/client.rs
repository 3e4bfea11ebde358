//! Text-generation service abstraction: the request/response contract the
//! pipeline consumes, an OpenAI-backed implementation, and a scripted
//! client for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenError;

/// Request into the generation service.
#[derive(Debug, Clone)]
pub struct TextGenRequest {
    pub prompt: String,
    /// Ask the provider for a strict-JSON response body.
    pub json_mode: bool,
}

/// Response out of the generation service.
#[derive(Debug, Clone)]
pub struct TextGenResponse {
    pub text: String,
    /// Total tokens consumed, when the provider reports it.
    pub token_count: Option<u32>,
}

#[async_trait]
pub trait TextGenClient: Send + Sync {
    async fn generate(&self, req: TextGenRequest) -> Result<TextGenResponse, GenError>;
    fn provider_name(&self) -> &'static str;
}

/// OpenAI chat-completions provider. Requires an API key; the 60s timeout
/// covers the whole call so a hung generation is a normal failure.
pub struct OpenAiTextGen {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiTextGen {
    pub fn new(api_key: String, model: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("content-gap-analyzer/0.1 (+github.com/wheretoteach/content-gap-analyzer)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            model,
        }
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}
#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}
#[derive(Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}
#[derive(Deserialize)]
struct ChatResp {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}
#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
    #[serde(default)]
    finish_reason: Option<String>,
}
#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}
#[derive(Deserialize)]
struct Usage {
    total_tokens: u32,
}

#[async_trait]
impl TextGenClient for OpenAiTextGen {
    async fn generate(&self, req: TextGenRequest) -> Result<TextGenResponse, GenError> {
        if self.api_key.is_empty() {
            return Err(GenError::MissingCredentials("openai"));
        }

        let body = ChatReq {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: &req.prompt,
            }],
            temperature: 0.4,
            response_format: req.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(GenError::Transport(format!(
                "provider returned {}",
                resp.status()
            )));
        }

        let parsed: ChatResp = resp
            .json()
            .await
            .map_err(|e| GenError::Transport(e.to_string()))?;
        let token_count = parsed.usage.map(|u| u.total_tokens);
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenError::EmptyOutput("no choices returned".into()))?;

        let finish = choice.finish_reason.unwrap_or_default();
        match choice.message.content {
            Some(text) if !text.trim().is_empty() => Ok(TextGenResponse { text, token_count }),
            // Surface the provider's block/finish reason verbatim.
            _ if finish == "content_filter" => Err(GenError::Blocked(finish)),
            _ => Err(GenError::EmptyOutput(if finish.is_empty() {
                "no content".into()
            } else {
                finish
            })),
        }
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Scripted client for tests and local runs: pops one canned response per
/// call and records every prompt so tests can assert call counts and
/// repair-prompt contents.
#[derive(Default)]
pub struct ScriptedTextGen {
    responses: Mutex<VecDeque<Result<String, GenError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedTextGen {
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|s| Ok(s.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push_error(&self, err: GenError) {
        self.responses.lock().expect("scripted gen").push_back(Err(err));
    }

    /// All prompts seen so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("scripted gen").clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().expect("scripted gen").len()
    }
}

#[async_trait]
impl TextGenClient for ScriptedTextGen {
    async fn generate(&self, req: TextGenRequest) -> Result<TextGenResponse, GenError> {
        self.prompts.lock().expect("scripted gen").push(req.prompt);
        match self.responses.lock().expect("scripted gen").pop_front() {
            Some(Ok(text)) => Ok(TextGenResponse {
                text,
                token_count: Some(100),
            }),
            Some(Err(e)) => Err(e),
            None => Err(GenError::EmptyOutput("script exhausted".into())),
        }
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}
