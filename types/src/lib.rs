//! Money Matters domain types.
//!
//! Defines the catalog, account/ledger, session, configuration and replica
//! synchronization types shared by the execution layer and the simulator.

mod account;
mod catalog;
mod config;
mod money;
mod protocol;
mod session;

pub use account::*;
pub use catalog::*;
pub use config::*;
pub use money::*;
pub use protocol::*;
pub use session::*;

#[cfg(test)]
mod tests;
