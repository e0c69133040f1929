/// Minimal `{{{name}}}` template, enough for the single signal prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub template: &'static str,
}

impl PromptTemplate {
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut rendered = self.template.to_string();
        for (key, value) in vars {
            rendered = rendered.replace(&format!("{{{{{{{key}}}}}}}"), value);
        }
        rendered
    }
}

pub const SYSTEM_INSTRUCTION: &str = "You are an expert cryptocurrency trading signal generator.";

pub const SIGNAL_PROMPT: PromptTemplate = PromptTemplate {
    name: "generateCryptoSignalPrompt",
    template: "Based on the current market conditions, generate a trading signal for the following cryptocurrency pair: {{{pair}}}.

Include the trading pair, direction (buy or sell), current price, confidence level (0 to 1), take profit price, stop loss price, and the current timestamp.

Use the calculateTakeProfitAndStopLoss tool to determine reasonable take profit and stop loss values.

Make sure the timestamp is in ISO format.

Output should be in JSON format with exactly these fields: pair, direction, price, confidence, takeProfit, stopLoss, timestamp.",
};
