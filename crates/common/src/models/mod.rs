pub mod mock_signal;
pub mod signal;

pub use mock_signal::{Analysis, Expiration, MockSignal, Volatility};
pub use signal::{
    Direction, SchemaViolation, SignalRequest, SignalResult, TakeProfitStopLoss,
    compute_take_profit_stop_loss,
};
