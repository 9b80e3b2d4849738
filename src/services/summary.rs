use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::SummaryConfig;
use crate::models::upload::ColumnData;

pub const SAMPLE_ROWS: usize = 50;
pub const DISABLED_MESSAGE: &str =
    "AI summary generation is disabled. No OpenAI API key configured.";

const SYSTEM_PROMPT: &str =
    "You are a data analyst expert. Provide concise insights from data.";

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("Failed to generate AI summary: column '{0}' not found")]
    ColumnNotFound(String),
    #[error("Failed to generate AI summary: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Failed to generate AI summary: service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to generate AI summary: service returned no content")]
    EmptyResponse,
    #[error("Failed to generate AI summary: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct SummaryClient {
    http: reqwest::Client,
    config: SummaryConfig,
}

impl SummaryClient {
    pub fn new(config: SummaryConfig) -> Result<Self, SummaryError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub async fn generate(
        &self,
        columns: &[ColumnData],
        x_axis: &str,
        y_axis: &str,
    ) -> Result<String, SummaryError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Ok(DISABLED_MESSAGE.to_string());
        };

        let sample = build_sample(columns, x_axis, y_axis)?;
        let prompt = format!(
            "Analyze this Excel data and provide a brief summary (3-5 bullet points)\n\
             of key insights, trends, patterns, or correlations.\n\n\
             Data columns: {x_axis} (X-axis) and {y_axis} (Y-axis)\n\
             Sample data ({} rows):\n{}\n\n\
             Provide actionable insights in a concise format.",
            sample.len(),
            serde_json::to_string_pretty(&sample)?,
        );

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        tracing::info!("Summary | requesting insights | model={} | rows={}", self.config.model, sample.len());

        let resp = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SummaryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(SummaryError::EmptyResponse)
    }
}

/// Pairs the two named columns row by row, bounded to the first [`SAMPLE_ROWS`] rows.
pub fn build_sample(
    columns: &[ColumnData],
    x_axis: &str,
    y_axis: &str,
) -> Result<Vec<Value>, SummaryError> {
    let find = |name: &str| {
        columns
            .iter()
            .find(|c| c.header == name)
            .ok_or_else(|| SummaryError::ColumnNotFound(name.to_string()))
    };
    let x_col = find(x_axis)?;
    let y_col = find(y_axis)?;

    let rows = x_col.values.len().min(y_col.values.len()).min(SAMPLE_ROWS);
    (0..rows)
        .map(|i| -> Result<Value, SummaryError> {
            let mut row = Map::new();
            row.insert(x_axis.to_string(), serde_json::to_value(&x_col.values[i])?);
            row.insert(y_axis.to_string(), serde_json::to_value(&y_col.values[i])?);
            Ok(Value::Object(row))
        })
        .collect()
}
