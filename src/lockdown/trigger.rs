//! Auto-lockdown trigger
//!
//! Watches incoming messages for mass mentions from members without roles
//! and locks every public channel when one crosses the threshold. Once fired,
//! the trigger stays armed-off until a moderator runs an unlock.

use crate::data::Data;
use crate::lockdown::select::default_lock_targets;
use crate::lockdown::{ChannelDirectory, ChannelInfo, LockMode, LockdownReport};
use chrono::{DateTime, Utc};
use derive_more::Display;
use poise::serenity_prelude::{ChannelId, Mentionable, UserId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// The parts of a message the trigger looks at
#[derive(Debug, Clone)]
pub struct MessageSignal {
    pub author: UserId,
    /// Roles the author has besides `@everyone`
    pub author_roles: usize,
    pub channel: ChannelId,
    pub mentioned: Vec<UserId>,
    pub timestamp: DateTime<Utc>,
}

impl MessageSignal {
    /// Number of distinct members mentioned
    #[must_use]
    pub fn mention_count(&self) -> usize {
        self.mentioned.iter().collect::<HashSet<_>>().len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TriggerState {
    Idle,
    Triggering,
}

/// Why a message did not fire the trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SkipReason {
    #[display("auto-lockdown disabled")]
    Disabled,
    #[display("auto-lockdown already in progress")]
    InProgress,
    #[display("channel is not public")]
    ChannelNotPublic,
    #[display("author has roles")]
    AuthorHasRoles,
    #[display("below mention threshold")]
    BelowThreshold,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Skipped(SkipReason),
    Fired(LockdownReport),
}

/// Threshold policy plus the single in-flight guard
#[derive(Debug, Default)]
pub struct AutoTrigger {
    threshold: u32,
    triggering: AtomicBool,
}

impl AutoTrigger {
    #[must_use]
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            triggering: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    #[must_use]
    pub fn state(&self) -> TriggerState {
        if self.triggering.load(Ordering::SeqCst) {
            TriggerState::Triggering
        } else {
            TriggerState::Idle
        }
    }

    /// Evaluate the guard for `signal` posted in `channel`
    ///
    /// # Errors
    /// Returns the first guard condition that does not hold
    pub fn check(
        &self,
        signal: &MessageSignal,
        channel: Option<&ChannelInfo>,
    ) -> Result<(), SkipReason> {
        if self.threshold == 0 {
            return Err(SkipReason::Disabled);
        }
        if self.state() == TriggerState::Triggering {
            return Err(SkipReason::InProgress);
        }
        if !channel.is_some_and(ChannelInfo::is_public) {
            return Err(SkipReason::ChannelNotPublic);
        }
        if signal.author_roles > 0 {
            return Err(SkipReason::AuthorHasRoles);
        }
        if signal.mention_count() < self.threshold as usize {
            return Err(SkipReason::BelowThreshold);
        }
        Ok(())
    }

    /// Move from Idle to Triggering. False if another run got there first.
    fn begin(&self) -> bool {
        self.triggering
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Back to Idle, done by the manual unlock command
    pub fn reset(&self) {
        self.triggering.store(false, Ordering::SeqCst);
    }
}

fn staff_alert(data: &Data, signal: &MessageSignal, targets: &[ChannelInfo]) -> String {
    let mut alert = format!(
        "{} ({}) mentioned `{}` members in {}.",
        signal.author.mention(),
        signal.author,
        signal.mention_count(),
        signal.channel.mention()
    );

    if data.recent.is_enabled() {
        let recent = data
            .recent
            .members()
            .iter()
            .map(|member| member.mention().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        alert.push_str(&format!(
            "\nMembers who joined in the last {} seconds: {recent}",
            data.recent.window_secs()
        ));
    }

    let channels = targets
        .iter()
        .map(ChannelInfo::mention)
        .collect::<Vec<_>>()
        .join(" ");
    alert.push_str(&format!("\n\nNow locking down the following channels: {channels}"));
    alert
}

/// Feed one qualifying message to the trigger, locking down if it fires
pub async fn on_message(
    data: &Data,
    directory: &dyn ChannelDirectory,
    signal: &MessageSignal,
) -> TriggerOutcome {
    let channel = directory.channel(signal.channel);
    if let Err(reason) = data.trigger.check(signal, channel.as_ref()) {
        return TriggerOutcome::Skipped(reason);
    }
    if !data.trigger.begin() {
        return TriggerOutcome::Skipped(SkipReason::InProgress);
    }

    info!(
        target: crate::LOCKDOWN_TARGET,
        author_id = %signal.author,
        channel_id = %signal.channel,
        mentions = signal.mention_count(),
        event = "auto_lockdown",
        "Mention threshold reached, starting auto-lockdown"
    );

    data.recent
        .prune(signal.timestamp, |member| directory.is_member(member));
    let targets = default_lock_targets(&directory.channels());

    let staff = data
        .config
        .staff_channel()
        .and_then(|id| directory.channel(id))
        .filter(ChannelInfo::can_send);

    if let Some(staff) = &staff {
        let alert = staff_alert(data, signal, &targets);
        if let Err(e) = directory.send_message(staff.id, &alert).await {
            warn!(channel_id = %staff.id, error = %e, "Failed to send staff alert");
        }
    }

    let report = data
        .lockdown
        .perform(directory, &targets, LockMode::Lock)
        .await;

    if let Some(staff) = &staff {
        if let Err(e) = directory.send_message(staff.id, &report.to_string()).await {
            warn!(channel_id = %staff.id, error = %e, "Failed to send lockdown report");
        }
    }

    TriggerOutcome::Fired(report)
}
