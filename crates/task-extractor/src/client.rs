use crate::error::ExtractorError;
use crate::parse::parse_proposals;
use crate::prompt::build_prompt;
use chrono::NaiveDate;
use followup_core::gateway::TaskExtractor;
use followup_core::types::TaskProposal;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub api_key: String,
    pub model: String,
    /// OpenAI-compatible API root, without `/chat/completions`.
    pub base_url: String,
    pub temperature: f64,
    pub timeout: Duration,
    /// Time-of-day the model is told to use when the text names none.
    pub placeholder: String,
}

impl ExtractorSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.1,
            timeout: Duration::from_secs(120),
            placeholder: "10:00".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions backed extractor.
pub struct OpenAiExtractor {
    settings: ExtractorSettings,
    http: Client,
}

impl OpenAiExtractor {
    pub fn new(settings: ExtractorSettings) -> Result<Self, ExtractorError> {
        if settings.api_key.trim().is_empty() {
            return Err(ExtractorError::Settings("API key is empty".into()));
        }
        let http = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { settings, http })
    }

    /// One chat-completions round trip; returns the assistant message text.
    pub fn complete(&self, prompt: &str) -> Result<String, ExtractorError> {
        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.settings.model,
            "temperature": self.settings.temperature,
            "messages": [{"role": "user", "content": prompt}],
        });

        let resp = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .json(&body)
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(ExtractorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = resp.json()?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ExtractorError::EmptyResponse)
    }

    pub fn try_extract(
        &self,
        text: &str,
        today: NaiveDate,
    ) -> Result<Vec<TaskProposal>, ExtractorError> {
        let prompt = build_prompt(text, today, &self.settings.placeholder);
        let raw = self.complete(&prompt)?;
        debug!(raw = %raw, "model answer");
        parse_proposals(&raw)
    }
}

impl TaskExtractor for OpenAiExtractor {
    fn extract(&self, text: &str, today: NaiveDate) -> Vec<TaskProposal> {
        match self.try_extract(text, today) {
            Ok(tasks) => {
                debug!(count = tasks.len(), "proposals extracted");
                tasks
            }
            Err(e) => {
                warn!(error = %e, "extraction failed, treating as no tasks");
                Vec::new()
            }
        }
    }
}
