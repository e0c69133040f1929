pub mod countdown;
pub mod crowd;
pub mod generator;
pub mod machine;
pub mod schedule;
pub mod session;

pub use countdown::{Countdown, CountdownPhase};
pub use crowd::{CrowdCounters, CrowdService};
pub use machine::{MockError, MockMachine, Msg, Outcome, Phase, Snapshot};
pub use session::{SessionHandle, SessionMsg};
