use common::models::SchemaViolation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("rate limited by the generation service")]
    RateLimited,
    #[error("generation service returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("model returned no content")]
    EmptyResponse,
    #[error("model output is not valid JSON: {0}")]
    MalformedOutput(#[from] serde_json::Error),
    #[error("model output violates the signal schema: {0}")]
    Schema(#[from] SchemaViolation),
    #[error("model kept calling tools after {0} rounds")]
    ToolLoopExceeded(usize),
    #[error("a request for {0} is already in flight")]
    InFlight(String),
}
