mod config;
mod ledger;
mod types;

pub use config::*;
pub use ledger::SignalLedger;
pub use types::*;
