//! Error types for the lockdown engine
//!
//! This module defines the errors that can occur while reading or rewriting
//! channel permissions and while announcing lockdowns.

use poise::serenity_prelude::{ChannelId, GuildId};
use thiserror::Error;

/// Errors that can occur during lockdown operations
#[derive(Debug, Error)]
pub enum LockdownError {
    /// Discord API error
    #[error("Discord API error: {0}")]
    DiscordApi(#[from] Box<poise::serenity_prelude::Error>),

    /// The monitored guild is not in the cache yet
    #[error("Guild not cached: {0}")]
    GuildNotCached(GuildId),

    /// Channel is not part of the monitored guild
    #[error("Channel not found: {0}")]
    ChannelNotFound(ChannelId),

    /// Unlock was requested without targets and nothing is known to be locked
    #[error(
        "Error: No locked down channels were cached (or had no permissions to modify them).\nPlease specify list of IDs to unlockdown."
    )]
    NothingToUnlock,
}

impl From<poise::serenity_prelude::Error> for LockdownError {
    fn from(error: poise::serenity_prelude::Error) -> Self {
        Self::DiscordApi(Box::new(error))
    }
}

/// Result type for lockdown operations
pub type LockdownResult<T> = Result<T, LockdownError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = LockdownError::ChannelNotFound(ChannelId::new(42));
        assert_eq!(error.to_string(), "Channel not found: 42");

        let error = LockdownError::from(poise::serenity_prelude::Error::Other("missing access"));
        assert_eq!(error.to_string(), "Discord API error: missing access");

        let error = LockdownError::NothingToUnlock;
        assert!(error.to_string().starts_with("Error: No locked down channels"));
        assert!(error.to_string().ends_with("list of IDs to unlockdown."));
    }
}
