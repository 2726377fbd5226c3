//! In-memory [`ChannelDirectory`] used by the engine's tests

use crate::lockdown::{
    ChannelDirectory, ChannelInfo, LockdownError, LockdownResult, Overwrite, OverwriteTarget,
};
use dashmap::{DashMap, DashSet};
use poise::serenity_prelude::{ChannelId, MessageId, Permissions, UserId};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A recorded overwrite write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub channel: ChannelId,
    pub target: OverwriteTarget,
    pub overwrite: Option<Overwrite>,
    pub reason: String,
}

/// Error the fake returns for injected failures
fn rejected(what: &'static str) -> LockdownError {
    poise::serenity_prelude::Error::Other(what).into()
}

/// Permissions that let the bot lock, announce and pin
pub const FULL_BOT_PERMISSIONS: Permissions = Permissions::MANAGE_CHANNELS
    .union(Permissions::SEND_MESSAGES)
    .union(Permissions::MANAGE_MESSAGES);

#[derive(Default)]
pub struct FakeDirectory {
    channels: DashMap<ChannelId, ChannelInfo>,
    members: DashSet<UserId>,
    failing_channels: DashSet<ChannelId>,
    fail_sends: AtomicBool,
    fail_pins: AtomicBool,
    next_message: AtomicU64,
    pub writes: Mutex<Vec<WriteRecord>>,
    pub sent: Mutex<Vec<(ChannelId, MessageId, String)>>,
    pub pinned: DashSet<MessageId>,
    pub unpinned: DashSet<MessageId>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self {
            next_message: AtomicU64::new(1000),
            ..Default::default()
        }
    }

    /// Directory with public text channels the bot fully manages
    pub fn with_public_channels(ids: &[u64]) -> Self {
        let directory = Self::new();
        for id in ids {
            directory.add_channel(
                ChannelInfo::new(ChannelId::new(*id), format!("channel-{id}"))
                    .with_bot_permissions(FULL_BOT_PERMISSIONS),
            );
        }
        directory
    }

    pub fn add_channel(&self, channel: ChannelInfo) {
        self.channels.insert(channel.id, channel);
    }

    pub fn add_member(&self, user: UserId) {
        self.members.insert(user);
    }

    pub fn fail_writes_for(&self, channel: ChannelId) {
        self.failing_channels.insert(channel);
    }

    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub fn fail_pins(&self) {
        self.fail_pins.store(true, Ordering::SeqCst);
    }

    pub fn stored_overwrite(
        &self,
        channel: ChannelId,
        target: OverwriteTarget,
    ) -> Option<Overwrite> {
        self.channels
            .get(&channel)
            .and_then(|info| info.overwrites.get(&target).copied())
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn sent_texts(&self) -> Vec<(ChannelId, String)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(channel, _, text)| (*channel, text.clone()))
            .collect()
    }
}

#[async_trait::async_trait]
impl ChannelDirectory for FakeDirectory {
    fn channels(&self) -> Vec<ChannelInfo> {
        let mut channels: Vec<ChannelInfo> =
            self.channels.iter().map(|entry| entry.value().clone()).collect();
        channels.sort_by_key(|channel| channel.id);
        channels
    }

    fn channel(&self, id: ChannelId) -> Option<ChannelInfo> {
        self.channels.get(&id).map(|entry| entry.value().clone())
    }

    fn current_overwrite(&self, channel: ChannelId, target: OverwriteTarget) -> Overwrite {
        self.stored_overwrite(channel, target).unwrap_or_default()
    }

    fn is_member(&self, user: UserId) -> bool {
        self.members.contains(&user)
    }

    async fn write_overwrite(
        &self,
        channel: ChannelId,
        target: OverwriteTarget,
        overwrite: Option<Overwrite>,
        reason: &str,
    ) -> LockdownResult<()> {
        // Give other tasks a chance to run, like a real round-trip would
        tokio::task::yield_now().await;

        if self.failing_channels.contains(&channel) {
            return Err(rejected("write rejected"));
        }
        let mut info = self
            .channels
            .get_mut(&channel)
            .ok_or(LockdownError::ChannelNotFound(channel))?;
        match overwrite {
            Some(overwrite) => {
                info.overwrites.insert(target, overwrite);
            }
            None => {
                info.overwrites.remove(&target);
            }
        }
        drop(info);

        self.writes.lock().unwrap().push(WriteRecord {
            channel,
            target,
            overwrite,
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn send_message(&self, channel: ChannelId, text: &str) -> LockdownResult<MessageId> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(rejected("send rejected"));
        }
        let id = MessageId::new(self.next_message.fetch_add(1, Ordering::SeqCst));
        self.sent.lock().unwrap().push((channel, id, text.to_string()));
        Ok(id)
    }

    async fn pin(
        &self,
        _channel: ChannelId,
        message: MessageId,
        _reason: &str,
    ) -> LockdownResult<()> {
        if self.fail_pins.load(Ordering::SeqCst) {
            return Err(rejected("pin rejected"));
        }
        self.pinned.insert(message);
        Ok(())
    }

    async fn unpin(
        &self,
        _channel: ChannelId,
        message: MessageId,
        _reason: &str,
    ) -> LockdownResult<()> {
        if self.fail_pins.load(Ordering::SeqCst) {
            return Err(rejected("unpin rejected"));
        }
        self.pinned.remove(&message);
        self.unpinned.insert(message);
        Ok(())
    }
}
