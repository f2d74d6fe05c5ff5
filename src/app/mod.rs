pub mod bootstrap;
pub mod controller;
pub mod state;

pub use bootstrap::run;
pub use controller::AppController;
pub use state::{ApplyOutcome, SessionState, TradeForm};
