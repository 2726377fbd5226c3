//! Lockdown announcements
//!
//! Posts the configured notice when channels are locked, pins it where the
//! bot is allowed to, and unpins it again on unlock. Nothing in here is
//! allowed to fail a lockdown: every error is logged and dropped.

use crate::config::AnnounceTarget;
use crate::lockdown::{ChannelDirectory, ChannelInfo, LockMode};
use dashmap::DashMap;
use poise::serenity_prelude::{ChannelId, MessageId};
use tracing::{debug, warn};

const PIN_REASON: &str = "[Mass Lockdown Announcement]";
const UNPIN_REASON: &str = "[Mass Unlockdown Announcement]";

/// Tracks pinned lockdown notices per channel
#[derive(Debug, Default)]
pub struct Announcer {
    target: Option<AnnounceTarget>,
    lock_text: Option<String>,
    unlock_text: Option<String>,
    pinned: DashMap<ChannelId, MessageId>,
}

impl Announcer {
    #[must_use]
    pub fn new(
        target: Option<AnnounceTarget>,
        lock_text: Option<String>,
        unlock_text: Option<String>,
    ) -> Self {
        Self {
            target,
            lock_text,
            unlock_text,
            pinned: DashMap::new(),
        }
    }

    /// Pinned notice for `channel`, if one is tracked
    #[must_use]
    pub fn pinned_message(&self, channel: ChannelId) -> Option<MessageId> {
        self.pinned.get(&channel).map(|entry| *entry.value())
    }

    /// All tracked notices in channel order
    #[must_use]
    pub fn pinned_messages(&self) -> Vec<(ChannelId, MessageId)> {
        let mut pinned: Vec<_> = self
            .pinned
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        pinned.sort_unstable();
        pinned
    }

    fn text_for(&self, mode: LockMode) -> Option<&str> {
        let text = match mode {
            LockMode::Lock => self.lock_text.as_deref(),
            LockMode::Unlock => self.unlock_text.as_deref(),
        };
        text.filter(|text| !text.trim().is_empty())
    }

    /// Announce a finished batch. `processed` are the channels that were
    /// successfully locked or unlocked.
    pub async fn announce(
        &self,
        directory: &dyn ChannelDirectory,
        processed: &[ChannelInfo],
        mode: LockMode,
    ) {
        let targets = match self.target {
            None => return,
            // Permissions may have changed with the batch, so read them again
            Some(AnnounceTarget::All) => processed
                .iter()
                .filter_map(|channel| directory.channel(channel.id))
                .collect(),
            Some(AnnounceTarget::Channel(id)) => match directory.channel(id) {
                Some(channel) => vec![channel],
                None => {
                    warn!(channel_id = %id, "Announcement channel is not in the guild");
                    return;
                }
            },
        };

        for channel in &targets {
            if !channel.can_send() {
                debug!(channel_id = %channel.id, "Cannot send announcements here, skipping");
                continue;
            }
            match mode {
                LockMode::Lock => self.announce_lock(directory, channel).await,
                LockMode::Unlock => self.announce_unlock(directory, channel).await,
            }
        }
    }

    async fn announce_lock(&self, directory: &dyn ChannelDirectory, channel: &ChannelInfo) {
        let Some(text) = self.text_for(LockMode::Lock) else {
            return;
        };
        let message = match directory.send_message(channel.id, text).await {
            Ok(message) => message,
            Err(e) => {
                warn!(channel_id = %channel.id, error = %e, "Failed to send lockdown announcement");
                return;
            }
        };

        if !channel.can_manage_messages() {
            return;
        }
        match directory.pin(channel.id, message, PIN_REASON).await {
            Ok(()) => {
                self.pinned.insert(channel.id, message);
            }
            Err(e) => {
                warn!(channel_id = %channel.id, error = %e, "Failed to pin lockdown announcement");
            }
        }
    }

    async fn announce_unlock(&self, directory: &dyn ChannelDirectory, channel: &ChannelInfo) {
        if let Some(text) = self.text_for(LockMode::Unlock) {
            if let Err(e) = directory.send_message(channel.id, text).await {
                warn!(channel_id = %channel.id, error = %e, "Failed to send unlock announcement");
            }
        }

        if !channel.can_manage_messages() {
            return;
        }
        let Some((_, message)) = self.pinned.remove(&channel.id) else {
            return;
        };
        if let Err(e) = directory.unpin(channel.id, message, UNPIN_REASON).await {
            warn!(channel_id = %channel.id, error = %e, "Failed to unpin lockdown announcement");
        }
    }
}
