use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::config::GeminiConfig;
use reqwest::{Client, StatusCode};
use tracing::{debug, error, warn};

use crate::{
    conversation::{Conversation, ModelTurn, ToolCall, Turn},
    error::SignalError,
    remote::gemini_types::{
        GeminiContent, GeminiFunctionCall, GeminiFunctionDeclaration, GeminiFunctionResponse,
        GeminiGenerationConfig, GeminiPart, GeminiRequest, GeminiResponse, GeminiTool,
    },
    traits::GenerationBackend,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TEMPERATURE: f32 = 0.7;

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, SignalError> {
        let client = Client::builder()
            .user_agent("signal_stream/0.1.0")
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    async fn generate(&self, conversation: &Conversation) -> Result<ModelTurn, SignalError> {
        let body = to_request(conversation);
        let started = Instant::now();

        let resp = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Gemini rate limit hit for model {}", self.model);
            return Err(SignalError::RateLimited);
        }
        if !status.is_success() {
            let error_text = resp.text().await?;
            error!("Gemini request failed: {} {}", status, error_text);
            return Err(SignalError::Api {
                status: status.as_u16(),
                body: error_text,
            });
        }

        let response = resp.json::<GeminiResponse>().await?;
        if let Some(usage) = &response.usage_metadata {
            debug!(
                "Gemini answered in {} ms (prompt={} completion={} tokens)",
                started.elapsed().as_millis(),
                usage.prompt_token_count,
                usage.candidates_token_count
            );
        }

        from_response(response)
    }
}

pub fn to_request(conversation: &Conversation) -> GeminiRequest {
    let contents = conversation
        .turns
        .iter()
        .map(|turn| match turn {
            Turn::User(text) => content("user", vec![text_part(text)]),
            Turn::Model(ModelTurn::Text(text)) => content("model", vec![text_part(text)]),
            Turn::Model(ModelTurn::ToolCalls(calls)) => content(
                "model",
                calls
                    .iter()
                    .map(|call| GeminiPart {
                        function_call: Some(GeminiFunctionCall {
                            name: call.name.clone(),
                            args: call.args.clone(),
                        }),
                        ..Default::default()
                    })
                    .collect(),
            ),
            Turn::ToolResults(responses) => content(
                "user",
                responses
                    .iter()
                    .map(|r| GeminiPart {
                        function_response: Some(GeminiFunctionResponse {
                            name: r.name.clone(),
                            response: r.response.clone(),
                        }),
                        ..Default::default()
                    })
                    .collect(),
            ),
        })
        .collect();

    let tools = if conversation.tools.is_empty() {
        Vec::new()
    } else {
        vec![GeminiTool {
            function_declarations: conversation
                .tools
                .iter()
                .map(|t| GeminiFunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                })
                .collect(),
        }]
    };

    GeminiRequest {
        contents,
        system_instruction: Some(GeminiContent {
            role: None,
            parts: vec![text_part(&conversation.system)],
        }),
        tools,
        generation_config: Some(GeminiGenerationConfig {
            temperature: Some(TEMPERATURE),
            max_output_tokens: None,
        }),
    }
}

/// Function calls win over text when a candidate carries both.
pub fn from_response(response: GeminiResponse) -> Result<ModelTurn, SignalError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(SignalError::EmptyResponse)?;

    if let Some(reason) = &candidate.finish_reason {
        debug!("Gemini finish reason: {}", reason);
    }

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    let calls: Vec<ToolCall> = parts
        .iter()
        .filter_map(|p| p.function_call.as_ref())
        .map(|fc| ToolCall {
            name: fc.name.clone(),
            args: fc.args.clone(),
        })
        .collect();
    if !calls.is_empty() {
        return Ok(ModelTurn::ToolCalls(calls));
    }

    let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
    if text.trim().is_empty() {
        return Err(SignalError::EmptyResponse);
    }
    Ok(ModelTurn::Text(text))
}

fn content(role: &str, parts: Vec<GeminiPart>) -> GeminiContent {
    GeminiContent {
        role: Some(role.to_string()),
        parts,
    }
}

fn text_part(text: &str) -> GeminiPart {
    GeminiPart {
        text: Some(text.to_string()),
        ..Default::default()
    }
}
