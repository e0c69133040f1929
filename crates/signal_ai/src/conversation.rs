//! Provider-neutral conversation types passed to a [`GenerationBackend`].
//!
//! [`GenerationBackend`]: crate::traits::GenerationBackend

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    User(String),
    Model(ModelTurn),
    ToolResults(Vec<ToolResponse>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub system: String,
    pub turns: Vec<Turn>,
    pub tools: Vec<ToolDeclaration>,
}

impl Conversation {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            turns: vec![Turn::User(prompt.into())],
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = tools;
        self
    }

    /// Records a tool round: the model's calls followed by our answers.
    pub fn push_tool_round(&mut self, calls: Vec<ToolCall>, responses: Vec<ToolResponse>) {
        self.turns.push(Turn::Model(ModelTurn::ToolCalls(calls)));
        self.turns.push(Turn::ToolResults(responses));
    }
}
