pub mod conversation;
pub mod error;
pub mod feed;
pub mod prompt;
pub mod remote;
pub mod services;
pub mod single_flight;
pub mod throttle;
pub mod tools;
pub mod traits;

pub use error::SignalError;
pub use feed::{FeedEvent, PairFilter, SignalFeed};
pub use services::signal_desk::SignalDesk;
pub use services::signal_flow::SignalFlow;
