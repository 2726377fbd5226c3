//! Lockdown service
//!
//! Entry point for manual and automatic lockdowns: resolves the targets,
//! runs the executor and announces the result.

use crate::lockdown::select::{ChannelQuery, default_lock_targets, default_unlock_targets};
use crate::lockdown::{
    Announcer, ChannelDirectory, ChannelInfo, LockMode, LockdownError, LockdownExecutor,
    LockdownReport, LockdownResult,
};
use crate::logging;

/// Owns the engine's lockdown state
#[derive(Debug, Default)]
pub struct LockdownService {
    pub executor: LockdownExecutor,
    pub announcer: Announcer,
}

impl LockdownService {
    #[must_use]
    pub fn new(announcer: Announcer) -> Self {
        Self {
            executor: LockdownExecutor::new(),
            announcer,
        }
    }

    /// Channels a lock command targets: the listed ones, or every public
    /// channel the bot can manage
    #[must_use]
    pub fn lock_targets(&self, directory: &dyn ChannelDirectory, args: &str) -> Vec<ChannelInfo> {
        let channels = directory.channels();
        let selected = ChannelQuery::parse(args).select(&channels);
        if selected.is_empty() {
            default_lock_targets(&channels)
        } else {
            selected
        }
    }

    /// Channels an unlock command targets: the listed ones, or every channel
    /// the bot locked and can still manage
    ///
    /// # Errors
    /// Returns [`LockdownError::NothingToUnlock`] if neither yields a channel
    pub fn unlock_targets(
        &self,
        directory: &dyn ChannelDirectory,
        args: &str,
    ) -> LockdownResult<Vec<ChannelInfo>> {
        let channels = directory.channels();
        let selected = ChannelQuery::parse(args).select(&channels);
        if !selected.is_empty() {
            return Ok(selected);
        }
        let locked = default_unlock_targets(&channels, self.executor.locked());
        if locked.is_empty() {
            Err(LockdownError::NothingToUnlock)
        } else {
            Ok(locked)
        }
    }

    /// Apply `mode` to `channels`, then announce the channels that succeeded
    pub async fn perform(
        &self,
        directory: &dyn ChannelDirectory,
        channels: &[ChannelInfo],
        mode: LockMode,
    ) -> LockdownReport {
        let report = self.executor.apply(directory, channels, mode).await;

        if !report.succeeded.is_empty() {
            let processed: Vec<ChannelInfo> = channels
                .iter()
                .filter(|channel| report.succeeded.contains(&channel.id))
                .cloned()
                .collect();
            self.announcer.announce(directory, &processed, mode).await;
        }

        logging::log_lockdown_report(&report);
        report
    }

    /// Lock the channels named in `args`, or all public channels
    pub async fn lock(&self, directory: &dyn ChannelDirectory, args: &str) -> LockdownReport {
        let targets = self.lock_targets(directory, args);
        self.perform(directory, &targets, LockMode::Lock).await
    }

    /// Unlock the channels named in `args`, or all channels locked earlier
    ///
    /// # Errors
    /// Returns [`LockdownError::NothingToUnlock`] without touching anything
    /// when there is nothing to unlock
    pub async fn unlock(
        &self,
        directory: &dyn ChannelDirectory,
        args: &str,
    ) -> LockdownResult<LockdownReport> {
        let targets = self.unlock_targets(directory, args)?;
        Ok(self.perform(directory, &targets, LockMode::Unlock).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnnounceTarget;
    use crate::lockdown::testing::FakeDirectory;
    use crate::lockdown::{Overwrite, OverwriteTarget};
    use poise::serenity_prelude::{ChannelId, Permissions};

    fn service() -> LockdownService {
        LockdownService::new(Announcer::new(
            Some(AnnounceTarget::All),
            Some("Locked".to_string()),
            Some("Unlocked".to_string()),
        ))
    }

    #[tokio::test]
    async fn test_default_lock_targets_public_channels() {
        let directory = FakeDirectory::with_public_channels(&[1, 2]);
        directory.add_channel(
            directory.channel(ChannelId::new(2)).unwrap().with_overwrite(
                OverwriteTarget::Everyone,
                Overwrite::new(Permissions::empty(), Permissions::VIEW_CHANNEL),
            ),
        );
        let service = service();

        let report = service.lock(&directory, "").await;

        assert_eq!(report.succeeded, vec![ChannelId::new(1)]);
        assert_eq!(directory.sent_texts(), vec![(ChannelId::new(1), "Locked".to_string())]);
    }

    #[tokio::test]
    async fn test_explicit_targets_win() {
        let directory = FakeDirectory::with_public_channels(&[1, 2, 3]);
        let service = service();

        let report = service.lock(&directory, "<#2> channel-3").await;

        assert_eq!(report.succeeded, vec![ChannelId::new(2), ChannelId::new(3)]);
        assert!(!service.executor.is_locked(ChannelId::new(1)));
    }

    #[tokio::test]
    async fn test_unlock_without_locked_channels_errors() {
        let directory = FakeDirectory::with_public_channels(&[1]);
        let service = service();

        let result = service.unlock(&directory, "").await;

        assert!(matches!(result, Err(LockdownError::NothingToUnlock)));
        assert_eq!(directory.write_count(), 0);
    }

    #[tokio::test]
    async fn test_unlock_defaults_to_locked_channels() {
        let directory = FakeDirectory::with_public_channels(&[1, 2, 3]);
        let service = service();
        service.lock(&directory, "1 2").await;

        let report = service.unlock(&directory, "").await.unwrap();

        assert_eq!(report.succeeded, vec![ChannelId::new(1), ChannelId::new(2)]);
        assert!(service.executor.locked().is_empty());
        assert!(service.announcer.pinned_messages().is_empty());
        assert_eq!(directory.unpinned.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_channels_are_not_announced() {
        let directory = FakeDirectory::with_public_channels(&[1, 2]);
        directory.fail_writes_for(ChannelId::new(1));
        let service = service();

        let report = service.lock(&directory, "").await;

        assert_eq!(report.failed, vec!["<#1>".to_string()]);
        assert_eq!(directory.sent_texts(), vec![(ChannelId::new(2), "Locked".to_string())]);
    }

    #[tokio::test]
    async fn test_nothing_succeeded_skips_announcements() {
        let directory = FakeDirectory::with_public_channels(&[1]);
        directory.fail_writes_for(ChannelId::new(1));
        let service = service();

        service.lock(&directory, "").await;

        assert!(directory.sent_texts().is_empty());
    }
}
