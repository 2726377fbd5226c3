use std::{
    ops::Deref,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::commands::CommandRegistry;
use crate::config::Config;
use crate::lockdown::{
    Announcer, AutoTrigger, ChannelDirectory, LockdownService, RecentJoins, TriggerState,
};
use chrono::{DateTime, Utc};
use poise::serenity_prelude::UserId;
use std::fmt::Write as _;

/// Engine context shared by the event handler and the command framework
#[derive(Clone)]
pub struct Data(pub Arc<DataInner>);

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("config", &self.config)
            .field("lockdown", &self.lockdown)
            .field("recent", &self.recent)
            .field("trigger", &self.trigger)
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl Deref for Data {
    type Target = DataInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Data {
    /// Create a new Data instance from the loaded configuration
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self(DataInner::new(config).into())
    }

    /// Whether one-time setup has run
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// One-time setup once the guild is cached: seed the recent-join cache
    /// with current members and mark the engine ready
    pub fn setup(
        &self,
        directory: &dyn ChannelDirectory,
        members: impl IntoIterator<Item = (UserId, DateTime<Utc>)>,
        now: DateTime<Utc>,
    ) {
        if self.recent.is_enabled() {
            for (member, joined_at) in members {
                self.recent.record(member, joined_at);
            }
            self.recent.prune(now, |member| directory.is_member(member));
        }
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Human readable engine summary for moderators
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = String::new();
        let locked = self.lockdown.executor.locked_channels();
        let _ = writeln!(summary, "Auto-lockdown: {}", self.trigger_summary());
        let _ = writeln!(summary, "Locked channels: {}", locked.len());
        let _ = writeln!(
            summary,
            "Pinned announcements: {}",
            self.lockdown.announcer.pinned_messages().len()
        );
        if self.recent.is_enabled() {
            let _ = write!(
                summary,
                "Recent joins (last {}s): {}",
                self.recent.window_secs(),
                self.recent.len()
            );
        } else {
            let _ = write!(summary, "Recent joins: disabled");
        }
        summary
    }

    fn trigger_summary(&self) -> String {
        match (self.trigger.threshold(), self.trigger.state()) {
            (0, _) => "disabled".to_string(),
            (threshold, TriggerState::Idle) => format!("idle (threshold {threshold} mentions)"),
            (threshold, TriggerState::Triggering) => {
                format!("triggered, waiting for unlock (threshold {threshold} mentions)")
            }
        }
    }
}

/// State behind [`Data`]
#[derive(Debug)]
pub struct DataInner {
    pub config: Config,
    pub lockdown: LockdownService,
    pub recent: RecentJoins,
    pub trigger: AutoTrigger,
    pub commands: CommandRegistry,
    ready: AtomicBool,
}

impl DataInner {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let announcer = Announcer::new(
            config.announce_channel,
            config.lockdown_announcement.clone(),
            config.unlockdown_announcement.clone(),
        );
        Self {
            lockdown: LockdownService::new(announcer),
            recent: RecentJoins::new(config.recent_join_threshold),
            trigger: AutoTrigger::new(config.mention_threshold),
            commands: CommandRegistry::from_config(&config),
            ready: AtomicBool::new(false),
            config,
        }
    }
}
