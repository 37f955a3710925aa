use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::debug;

// --- Provider trait ---

pub trait AIProvider {
    fn complete(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String>;

    /// Same as `complete`, for prompts that expect a JSON document back.
    /// Providers with a native JSON mode override this.
    fn complete_json(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        self.complete(system, prompt, max_tokens)
    }

    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub enum ProviderKind {
    Gemini,
    Anthropic,
    OpenAI,
    ClaudeCode,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
    pub short_name: String,
}

fn spec(provider: ProviderKind, model_id: &str, short_name: &str) -> ModelSpec {
    ModelSpec {
        provider,
        model_id: model_id.to_string(),
        short_name: short_name.to_string(),
    }
}

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    match name {
        // Gemini (requires GEMINI_API_KEY)
        "gemini-flash" | "flash" => Ok(spec(ProviderKind::Gemini, "gemini-2.5-flash", "gemini-flash")),
        "gemini-pro" => Ok(spec(ProviderKind::Gemini, "gemini-2.5-pro", "gemini-pro")),
        // Claude Code provider (uses `claude` CLI, no API key needed)
        "claude-sonnet" | "sonnet" => Ok(spec(
            ProviderKind::ClaudeCode,
            "claude-sonnet-4-5-20250929",
            "claude-sonnet",
        )),
        "claude-haiku" | "haiku" => Ok(spec(
            ProviderKind::ClaudeCode,
            "claude-haiku-4-5-20251001",
            "claude-haiku",
        )),
        // Direct Anthropic API (requires ANTHROPIC_API_KEY)
        "api-sonnet" => Ok(spec(
            ProviderKind::Anthropic,
            "claude-sonnet-4-5-20250929",
            "api-sonnet",
        )),
        "api-haiku" => Ok(spec(
            ProviderKind::Anthropic,
            "claude-haiku-4-5-20251001",
            "api-haiku",
        )),
        // OpenAI (requires OPENAI_API_KEY)
        "gpt-4o" => Ok(spec(ProviderKind::OpenAI, "gpt-4o", "gpt-4o")),
        "gpt-4o-mini" => Ok(spec(ProviderKind::OpenAI, "gpt-4o-mini", "gpt-4o-mini")),
        _ => Err(anyhow!(
            "Unknown model '{}'. Available: gemini-flash (default), gemini-pro, claude-sonnet, \
             claude-haiku, api-sonnet, api-haiku, gpt-4o, gpt-4o-mini",
            name
        )),
    }
}

pub fn create_provider(spec: &ModelSpec) -> Result<Box<dyn AIProvider>> {
    match spec.provider {
        ProviderKind::Gemini => Ok(Box::new(GeminiProvider::new(spec.model_id.clone())?)),
        ProviderKind::ClaudeCode => Ok(Box::new(ClaudeCodeProvider::new(spec.model_id.clone())?)),
        ProviderKind::Anthropic => Ok(Box::new(AnthropicProvider::new(spec.model_id.clone())?)),
        ProviderKind::OpenAI => Ok(Box::new(OpenAIProvider::new(spec.model_id.clone())?)),
    }
}

fn read_api_key(var: &str) -> Result<String> {
    env::var(var).with_context(|| {
        format!(
            "{var} environment variable not set. Set it with: export {var}=your-key-here"
        )
    })
}

fn check_status(response: reqwest::blocking::Response, api: &str) -> Result<reqwest::blocking::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response.text().unwrap_or_default();
    Err(anyhow!(
        "{} API request failed with status {}: {}",
        api,
        status,
        error_text
    ))
}

// --- Gemini provider ---

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiSystemInstruction,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug)]
pub struct GeminiProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl GeminiProvider {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = read_api_key("GEMINI_API_KEY")?;
        let client = reqwest::blocking::Client::new();
        Ok(Self { api_key, model_id, client })
    }

    fn generate(&self, system: &str, prompt: &str, max_tokens: u32, json: bool) -> Result<String> {
        let request = GeminiRequest {
            system_instruction: GeminiSystemInstruction {
                parts: vec![GeminiPart { text: system.to_string() }],
            },
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart { text: prompt.to_string() }],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: max_tokens,
                response_mime_type: json.then(|| "application/json".to_string()),
            },
        };

        debug!(model = %self.model_id, prompt_len = prompt.len(), json, "Gemini request");

        let response = self
            .client
            .post(format!("{}/{}:generateContent", GEMINI_API_BASE, self.model_id))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .context("Failed to send request to Gemini API")?;

        let api_response: GeminiResponse = check_status(response, "Gemini")?
            .json()
            .context("Failed to parse Gemini API response")?;

        let text: String = api_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .ok_or_else(|| anyhow!("No candidates in Gemini API response"))?;

        Ok(text)
    }
}

impl AIProvider for GeminiProvider {
    fn complete(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        self.generate(system, prompt, max_tokens, false)
    }

    fn complete_json(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        self.generate(system, prompt, max_tokens, true)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Anthropic provider ---

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug)]
pub struct AnthropicProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl AnthropicProvider {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = read_api_key("ANTHROPIC_API_KEY")?;
        let client = reqwest::blocking::Client::new();
        Ok(Self { api_key, model_id, client })
    }
}

impl AIProvider for AnthropicProvider {
    fn complete(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model_id.clone(),
            max_tokens,
            system: system.to_string(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        debug!(model = %self.model_id, prompt_len = prompt.len(), "Anthropic request");

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .context("Failed to send request to Anthropic API")?;

        let api_response: AnthropicResponse = check_status(response, "Anthropic")?
            .json()
            .context("Failed to parse Anthropic API response")?;

        api_response
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| anyhow!("No content in Anthropic API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Claude Code provider (shells out to `claude` CLI) ---

#[derive(Debug)]
pub struct ClaudeCodeProvider {
    model_id: String,
}

impl ClaudeCodeProvider {
    pub fn new(model_id: String) -> Result<Self> {
        // Verify claude CLI is available
        std::process::Command::new("claude")
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .context("'claude' CLI not found. Install it or use gemini-flash/api-sonnet instead.")?;
        Ok(Self { model_id })
    }
}

impl AIProvider for ClaudeCodeProvider {
    fn complete(&self, system: &str, prompt: &str, _max_tokens: u32) -> Result<String> {
        let output = std::process::Command::new("claude")
            .arg("-p")
            .arg(prompt)
            .arg("--append-system-prompt")
            .arg(system)
            .arg("--model")
            .arg(&self.model_id)
            .output()
            .context("Failed to run 'claude' CLI")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("claude CLI failed: {}", stderr));
        }

        let response = String::from_utf8(output.stdout)
            .context("Invalid UTF-8 in claude CLI output")?;

        if response.trim().is_empty() {
            return Err(anyhow!("Empty response from claude CLI"));
        }

        Ok(response)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- OpenAI provider ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAIResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug)]
pub struct OpenAIProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl OpenAIProvider {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = read_api_key("OPENAI_API_KEY")?;
        let client = reqwest::blocking::Client::new();
        Ok(Self { api_key, model_id, client })
    }

    fn chat(&self, system: &str, prompt: &str, max_tokens: u32, json: bool) -> Result<String> {
        let request = OpenAIRequest {
            model: self.model_id.clone(),
            max_tokens,
            messages: vec![
                OpenAIMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                OpenAIMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            response_format: json.then(|| OpenAIResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        debug!(model = %self.model_id, prompt_len = prompt.len(), json, "OpenAI request");

        let response = self
            .client
            .post(OPENAI_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .context("Failed to send request to OpenAI API")?;

        let api_response: OpenAIResponse = check_status(response, "OpenAI")?
            .json()
            .context("Failed to parse OpenAI API response")?;

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("No choices in OpenAI API response"))
    }
}

impl AIProvider for OpenAIProvider {
    fn complete(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        self.chat(system, prompt, max_tokens, false)
    }

    // json_object mode only accepts a top-level object
    fn complete_json(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        self.chat(system, prompt, max_tokens, true)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
