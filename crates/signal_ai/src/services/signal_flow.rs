use std::sync::Arc;

use common::models::{SignalRequest, SignalResult, SchemaViolation};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    conversation::{Conversation, ModelTurn},
    error::SignalError,
    prompt::{PromptTemplate, SIGNAL_PROMPT, SYSTEM_INSTRUCTION},
    tools::ToolRegistry,
    traits::GenerationBackend,
};

pub const MAX_TOOL_ROUNDS: usize = 5;

/// `generate(SignalRequest) -> SignalResult`: one prompt, a bounded tool loop
/// and schema validation. Stateless between calls.
pub struct SignalFlow {
    backend: Arc<dyn GenerationBackend>,
    tools: ToolRegistry,
    prompt: PromptTemplate,
}

impl SignalFlow {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            tools: ToolRegistry::signal_tools(),
            prompt: SIGNAL_PROMPT,
        }
    }

    pub async fn generate(&self, request: &SignalRequest) -> Result<SignalResult, SignalError> {
        let pair = request.pair.trim();
        if pair.is_empty() {
            return Err(SignalError::InvalidRequest("pair must not be empty".to_string()));
        }

        let mut conversation = Conversation::new(
            SYSTEM_INSTRUCTION,
            self.prompt.render(&[("pair", pair)]),
        )
        .with_tools(self.tools.declarations());

        let mut tool_rounds = 0;
        loop {
            match self.backend.generate(&conversation).await? {
                ModelTurn::Text(text) => {
                    let result = parse_signal(&text, request)?;
                    info!(
                        "{} signal for {} at {} (confidence {:.2})",
                        result.direction, result.pair, result.price, result.confidence
                    );
                    return Ok(result);
                }
                ModelTurn::ToolCalls(calls) => {
                    if tool_rounds == MAX_TOOL_ROUNDS {
                        return Err(SignalError::ToolLoopExceeded(MAX_TOOL_ROUNDS));
                    }
                    tool_rounds += 1;
                    debug!(
                        "{} prompt round {}: {} tool call(s)",
                        self.prompt.name,
                        tool_rounds,
                        calls.len()
                    );

                    let responses = calls.iter().map(|c| self.tools.dispatch(c)).collect();
                    conversation.push_tool_round(calls, responses);
                }
            }
        }
    }
}

/// Parses the model's final answer. A ```json fence around the object is tolerated.
pub fn parse_signal(text: &str, request: &SignalRequest) -> Result<SignalResult, SignalError> {
    let body = strip_code_fence(text);
    let value: Value = serde_json::from_str(body)?;

    let mut result: SignalResult = serde_json::from_value(value)
        .map_err(|e| SignalError::Schema(SchemaViolation::Shape(e.to_string())))?;
    result.validate(request)?;

    result.pair = request.pair.trim().to_string();
    Ok(result)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        conversation::{ToolCall, Turn},
        tools::TAKE_PROFIT_STOP_LOSS_TOOL,
        traits::MockGenerationBackend,
    };
    use common::models::Direction;
    use serde_json::json;
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    const BTC_JSON: &str = r#"{"pair":"BTC/USD","direction":"buy","price":100,"confidence":0.81,
        "takeProfit":102,"stopLoss":98,"timestamp":"2025-03-05T14:03:09Z"}"#;

    fn flow(mock: MockGenerationBackend) -> SignalFlow {
        SignalFlow::new(Arc::new(mock))
    }

    #[tokio::test]
    async fn end_to_end_with_tool_round() {
        let calls = AtomicUsize::new(0);
        let seen_tool_answer = Arc::new(Mutex::new(None));
        let seen = seen_tool_answer.clone();

        let mut mock = MockGenerationBackend::new();
        mock.expect_generate().times(2).returning(move |conversation| {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 => {
                    assert!(matches!(&conversation.turns[0], Turn::User(p) if p.contains("BTC/USD")));
                    assert_eq!(conversation.tools[0].name, TAKE_PROFIT_STOP_LOSS_TOOL);
                    Ok(ModelTurn::ToolCalls(vec![ToolCall {
                        name: TAKE_PROFIT_STOP_LOSS_TOOL.to_string(),
                        args: json!({"pair": "BTC/USD", "price": 100.0, "direction": "buy"}),
                    }]))
                }
                _ => {
                    if let Some(Turn::ToolResults(responses)) = conversation.turns.last() {
                        *seen.lock().unwrap() = Some(responses[0].response.clone());
                    }
                    Ok(ModelTurn::Text(format!("```json\n{}\n```", BTC_JSON)))
                }
            }
        });

        let result = flow(mock)
            .generate(&SignalRequest::new("BTC/USD"))
            .await
            .unwrap();

        assert_eq!(result.pair, "BTC/USD");
        assert_eq!(result.direction, Direction::Buy);
        assert_eq!(result.take_profit, 102.0);
        assert_eq!(result.stop_loss, 98.0);
        assert!(result.generated_at().is_some());
        assert_eq!(
            seen_tool_answer.lock().unwrap().clone(),
            Some(json!({"takeProfit": 102.0, "stopLoss": 98.0}))
        );
    }

    #[tokio::test]
    async fn empty_pair_is_rejected_before_dispatch() {
        let mut mock = MockGenerationBackend::new();
        mock.expect_generate().never();

        let err = flow(mock).generate(&SignalRequest::new("  ")).await.unwrap_err();
        assert!(matches!(err, SignalError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn schema_mismatch_is_rejected() {
        let mut mock = MockGenerationBackend::new();
        mock.expect_generate().times(1).returning(|_| {
            Ok(ModelTurn::Text(
                r#"{"pair":"BTC/USD","direction":"buy","price":100,"confidence":7,
                    "takeProfit":102,"stopLoss":98,"timestamp":"2025-03-05T14:03:09Z"}"#
                    .to_string(),
            ))
        });

        let err = flow(mock).generate(&SignalRequest::new("BTC/USD")).await.unwrap_err();
        assert!(matches!(
            err,
            SignalError::Schema(SchemaViolation::ConfidenceOutOfRange(_))
        ));
    }

    #[tokio::test]
    async fn partial_record_is_never_returned() {
        let mut mock = MockGenerationBackend::new();
        mock.expect_generate()
            .times(1)
            .returning(|_| Ok(ModelTurn::Text(r#"{"pair":"BTC/USD","direction":"buy"}"#.to_string())));

        let err = flow(mock).generate(&SignalRequest::new("BTC/USD")).await.unwrap_err();
        assert!(matches!(err, SignalError::Schema(SchemaViolation::Shape(_))));
    }

    #[tokio::test]
    async fn service_failure_propagates() {
        let mut mock = MockGenerationBackend::new();
        mock.expect_generate().times(1).returning(|_| {
            Err(SignalError::Api {
                status: 503,
                body: "unavailable".to_string(),
            })
        });

        let err = flow(mock).generate(&SignalRequest::new("ETH/USD")).await.unwrap_err();
        assert!(matches!(err, SignalError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn endless_tool_calls_are_cut_off() {
        let mut mock = MockGenerationBackend::new();
        mock.expect_generate()
            .times(MAX_TOOL_ROUNDS + 1)
            .returning(|_| {
                Ok(ModelTurn::ToolCalls(vec![ToolCall {
                    name: TAKE_PROFIT_STOP_LOSS_TOOL.to_string(),
                    args: json!({"pair": "BTC/USD", "price": 1.0, "direction": "sell"}),
                }]))
            });

        let err = flow(mock).generate(&SignalRequest::new("BTC/USD")).await.unwrap_err();
        assert!(matches!(err, SignalError::ToolLoopExceeded(MAX_TOOL_ROUNDS)));
    }

    #[test]
    fn parse_normalises_pair_and_rejects_garbage() {
        let result = parse_signal(BTC_JSON, &SignalRequest::new(" BTC/USD ")).unwrap();
        assert_eq!(result.pair, "BTC/USD");

        assert!(matches!(
            parse_signal("not json", &SignalRequest::new("BTC/USD")),
            Err(SignalError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_signal(BTC_JSON, &SignalRequest::new("ETH/USD")),
            Err(SignalError::Schema(SchemaViolation::PairMismatch { .. }))
        ));
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```  "), "{}");
        assert_eq!(strip_code_fence("  {} "), "{}");
    }
}
