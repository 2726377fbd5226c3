//! Channel selection
//!
//! Turns a command's argument string into a concrete channel list, and
//! provides the default target rules used when no arguments are given.

use crate::lockdown::ChannelInfo;
use dashmap::DashSet;
use poise::serenity_prelude::ChannelId;
use std::collections::HashSet;

/// Parsed channel arguments: numeric ids and lowercase names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelQuery {
    ids: HashSet<u64>,
    names: HashSet<String>,
}

impl ChannelQuery {
    /// Parse a whitespace separated list of channel mentions, ids or names
    #[must_use]
    pub fn parse(args: &str) -> Self {
        let mut query = Self::default();
        for token in args.split_whitespace() {
            let token = token.to_lowercase();
            let stripped = token.trim_matches(|c| matches!(c, '<' | '#' | '>'));
            match stripped.parse::<u64>() {
                Ok(id) => {
                    query.ids.insert(id);
                }
                Err(_) => {
                    query.names.insert(token);
                }
            }
        }
        query
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.names.is_empty()
    }

    #[must_use]
    pub fn matches(&self, channel: &ChannelInfo) -> bool {
        self.ids.contains(&channel.id.get()) || self.names.contains(&channel.name.to_lowercase())
    }

    /// Channels matching this query. Unmatched tokens are ignored.
    #[must_use]
    pub fn select(&self, channels: &[ChannelInfo]) -> Vec<ChannelInfo> {
        channels
            .iter()
            .filter(|channel| self.matches(channel))
            .cloned()
            .collect()
    }
}

/// Public text channels the bot can manage
#[must_use]
pub fn default_lock_targets(channels: &[ChannelInfo]) -> Vec<ChannelInfo> {
    channels
        .iter()
        .filter(|channel| channel.is_text && channel.can_manage() && channel.is_public())
        .cloned()
        .collect()
}

/// Text channels the bot can manage that it previously locked
#[must_use]
pub fn default_unlock_targets(
    channels: &[ChannelInfo],
    locked: &DashSet<ChannelId>,
) -> Vec<ChannelInfo> {
    channels
        .iter()
        .filter(|channel| channel.is_text && channel.can_manage() && locked.contains(&channel.id))
        .cloned()
        .collect()
}
