//! Lockdown executor
//!
//! Computes and applies the send-messages overwrite changes for a batch of
//! channels and keeps track of which channels the bot currently has locked.
//! Channels are handled independently: a rejected write fails that channel
//! only, the rest of the batch carries on.

use crate::lockdown::{
    ChannelDirectory, ChannelInfo, LockMode, LockdownResult, OverwriteTarget,
};
use dashmap::{DashMap, DashSet};
use poise::serenity_prelude::{ChannelId, Permissions};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of one lock or unlock batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockdownReport {
    /// Correlates log events of one batch
    pub run_id: Uuid,
    pub mode: LockMode,
    pub succeeded: Vec<ChannelId>,
    /// Mentions of channels whose writes were rejected
    pub failed: Vec<String>,
}

impl LockdownReport {
    #[must_use]
    pub fn new(mode: LockMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl Display for LockdownReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ids = self
            .succeeded
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        write!(
            f,
            "{}ocked down the following channels:\n```\n{ids}\n```",
            self.mode.prefix(true)
        )?;
        if !self.failed.is_empty() {
            write!(
                f,
                "\nFailed to {}ockdown the following channels: {}",
                self.mode.prefix(false),
                self.failed.join(" ")
            )?;
        }
        Ok(())
    }
}

/// Applies lockdown overwrites and owns the locked-channel set
#[derive(Debug, Default)]
pub struct LockdownExecutor {
    locked: DashSet<ChannelId>,
    // One writer per channel at a time, so the three overwrites of a channel
    // are never interleaved with another batch's writes
    guards: DashMap<ChannelId, Arc<Mutex<()>>>,
}

impl LockdownExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Channels the bot believes it has locked
    #[must_use]
    pub fn locked(&self) -> &DashSet<ChannelId> {
        &self.locked
    }

    /// Locked channels in id order
    #[must_use]
    pub fn locked_channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = self.locked.iter().map(|id| *id).collect();
        channels.sort_unstable();
        channels
    }

    #[must_use]
    pub fn is_locked(&self, channel: ChannelId) -> bool {
        self.locked.contains(&channel)
    }

    /// Lock or unlock every channel in `channels`, best effort
    pub async fn apply(
        &self,
        directory: &dyn ChannelDirectory,
        channels: &[ChannelInfo],
        mode: LockMode,
    ) -> LockdownReport {
        let mut report = LockdownReport::new(mode);

        for channel in channels {
            match self.apply_channel(directory, channel.id, mode).await {
                Ok(()) => {
                    match mode {
                        LockMode::Lock => {
                            self.locked.insert(channel.id);
                        }
                        LockMode::Unlock => {
                            self.locked.remove(&channel.id);
                        }
                    }
                    info!(
                        target: crate::LOCKDOWN_TARGET,
                        run_id = %report.run_id,
                        channel_id = %channel.id,
                        mode = %mode,
                        event = "channel_applied",
                        "Channel overwrites updated"
                    );
                    report.succeeded.push(channel.id);
                }
                Err(e) => {
                    warn!(
                        target: crate::LOCKDOWN_TARGET,
                        run_id = %report.run_id,
                        channel_id = %channel.id,
                        mode = %mode,
                        error = %e,
                        event = "channel_failed",
                        "Failed to update channel overwrites"
                    );
                    report.failed.push(channel.mention());
                }
            }
        }

        report
    }

    /// Rewrite the three managed overwrites of one channel
    async fn apply_channel(
        &self,
        directory: &dyn ChannelDirectory,
        channel: ChannelId,
        mode: LockMode,
    ) -> LockdownResult<()> {
        let guard = self.guards.entry(channel).or_default().clone();
        let _held = guard.lock().await;

        for target in OverwriteTarget::ALL {
            let mut overwrite = directory.current_overwrite(channel, target);
            overwrite.set(Permissions::SEND_MESSAGES, mode.send_state(target));
            directory
                .write_overwrite(channel, target, overwrite.into_stored(), mode.audit_reason())
                .await?;
        }

        Ok(())
    }
}
