//! Lockdown engine
//!
//! Classifies public channels, rewrites their send permissions on lock and
//! unlock, tracks what it changed and decides when a message is a raid.

mod announce;
mod channel;
mod directory;
mod error;
mod executor;
mod overwrite;
mod recent;
pub mod select;
mod service;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testing;

pub use announce::Announcer;
pub use channel::{ChannelInfo, is_public};
pub use directory::{ChannelDirectory, SerenityDirectory};
pub use error::{LockdownError, LockdownResult};
pub use executor::{LockdownExecutor, LockdownReport};
pub use overwrite::{LockMode, Overwrite, OverwriteTarget, PermState};
pub use recent::RecentJoins;
pub use service::LockdownService;
pub use trigger::{AutoTrigger, MessageSignal, SkipReason, TriggerOutcome, TriggerState};
