//! Channel snapshots and the public-channel classifier

use crate::lockdown::{Overwrite, OverwriteTarget, PermState};
use poise::serenity_prelude::{ChannelId, Permissions};
use std::collections::HashMap;

/// Point-in-time view of a guild channel, as far as the engine cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub name: String,
    /// Text or announcement channel (as opposed to voice, category, ...)
    pub is_text: bool,
    /// Overwrites for the managed identities; absent means no overwrite
    pub overwrites: HashMap<OverwriteTarget, Overwrite>,
    /// The bot's effective permissions in this channel
    pub bot_permissions: Permissions,
}

impl ChannelInfo {
    #[must_use]
    pub fn new(id: ChannelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_text: true,
            overwrites: HashMap::new(),
            bot_permissions: Permissions::empty(),
        }
    }

    #[must_use]
    pub fn with_overwrite(mut self, target: OverwriteTarget, overwrite: Overwrite) -> Self {
        self.overwrites.insert(target, overwrite);
        self
    }

    #[must_use]
    pub fn with_bot_permissions(mut self, permissions: Permissions) -> Self {
        self.bot_permissions = permissions;
        self
    }

    /// Overwrite for `target`, empty if none is set
    #[must_use]
    pub fn overwrite_for(&self, target: OverwriteTarget) -> Overwrite {
        self.overwrites.get(&target).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }

    #[must_use]
    pub fn can_manage(&self) -> bool {
        self.bot_permissions.contains(Permissions::MANAGE_CHANNELS)
    }

    #[must_use]
    pub fn can_send(&self) -> bool {
        self.bot_permissions.contains(Permissions::SEND_MESSAGES)
    }

    #[must_use]
    pub fn can_manage_messages(&self) -> bool {
        self.bot_permissions.contains(Permissions::MANAGE_MESSAGES)
    }

    /// See [`is_public`]
    #[must_use]
    pub fn is_public(&self) -> bool {
        is_public(self)
    }
}

/// A channel is public when neither `@everyone` nor the authorized role is
/// explicitly denied reading or sending there.
#[must_use]
pub fn is_public(channel: &ChannelInfo) -> bool {
    [OverwriteTarget::Everyone, OverwriteTarget::AuthorizedRole]
        .into_iter()
        .map(|target| channel.overwrite_for(target))
        .all(|overwrite| {
            [Permissions::VIEW_CHANNEL, Permissions::SEND_MESSAGES]
                .into_iter()
                .all(|permission| overwrite.get(permission) != PermState::Deny)
        })
}
