use std::collections::HashMap;

use common::models::{Direction, compute_take_profit_stop_loss};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::conversation::{ToolCall, ToolDeclaration, ToolResponse};

pub const TAKE_PROFIT_STOP_LOSS_TOOL: &str = "calculateTakeProfitAndStopLoss";

/// A local capability the model may invoke during generation.
pub trait Tool: Send + Sync {
    fn declaration(&self) -> ToolDeclaration;

    /// Errors are reported back to the model as `{"error": ...}` payloads.
    fn call(&self, args: Value) -> Result<Value, String>;
}

pub struct TakeProfitStopLossTool;

#[derive(Deserialize)]
struct TakeProfitStopLossArgs {
    #[allow(dead_code)]
    pair: String,
    price: f64,
    direction: Direction,
}

impl Tool for TakeProfitStopLossTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: TAKE_PROFIT_STOP_LOSS_TOOL.to_string(),
            description: "Calculates reasonable take profit and stop loss values based on the current price and trading pair.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "pair": {
                        "type": "string",
                        "description": "The cryptocurrency trading pair (e.g., BTC/USD)."
                    },
                    "price": {
                        "type": "number",
                        "description": "The current price of the cryptocurrency."
                    },
                    "direction": {
                        "type": "string",
                        "enum": ["buy", "sell"],
                        "description": "The trading direction (buy or sell)."
                    }
                },
                "required": ["pair", "price", "direction"]
            }),
        }
    }

    fn call(&self, args: Value) -> Result<Value, String> {
        let args: TakeProfitStopLossArgs =
            serde_json::from_value(args).map_err(|e| format!("Invalid parameters: {}", e))?;
        if !args.price.is_finite() {
            return Err("price must be a finite number".to_string());
        }

        let band = compute_take_profit_stop_loss(args.price, args.direction);
        serde_json::to_value(band).map_err(|e| e.to_string())
    }
}

pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry offered to the signal prompt.
    pub fn signal_tools() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(TakeProfitStopLossTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.declaration().name, tool);
    }

    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        let mut declarations: Vec<ToolDeclaration> =
            self.tools.values().map(|t| t.declaration()).collect();
        declarations.sort_by(|a, b| a.name.cmp(&b.name));
        declarations
    }

    pub fn dispatch(&self, call: &ToolCall) -> ToolResponse {
        let response = match self.tools.get(&call.name) {
            Some(tool) => match tool.call(call.args.clone()) {
                Ok(value) => {
                    debug!("Tool {} answered {}", call.name, value);
                    value
                }
                Err(e) => {
                    warn!("Tool {} rejected arguments {}: {}", call.name, call.args, e);
                    json!({ "error": e })
                }
            },
            None => {
                warn!("Model requested unknown tool {}", call.name);
                json!({ "error": format!("Unknown tool: {}", call.name) })
            }
        };

        ToolResponse {
            name: call.name.clone(),
            response,
        }
    }
}
