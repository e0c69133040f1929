pub mod refresh_service;
pub mod signal_desk;
pub mod signal_flow;

pub use refresh_service::SignalRefreshService;
pub use signal_desk::SignalDesk;
pub use signal_flow::SignalFlow;
