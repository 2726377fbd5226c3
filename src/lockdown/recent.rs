//! Recent-join cache
//!
//! Remembers who joined the guild within the configured window so the staff
//! alert can point at accounts that arrived together with a raid.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use poise::serenity_prelude::UserId;

/// Members that joined within a sliding time window
#[derive(Debug, Default)]
pub struct RecentJoins {
    /// `None` when the cache is disabled
    window: Option<Duration>,
    joins: DashMap<UserId, DateTime<Utc>>,
}

impl RecentJoins {
    /// A cache keeping joins from the last `threshold_secs` seconds.
    /// Zero or negative thresholds disable it.
    #[must_use]
    pub fn new(threshold_secs: i64) -> Self {
        Self {
            window: (threshold_secs > 0).then(|| Duration::seconds(threshold_secs)),
            joins: DashMap::new(),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.window.is_some()
    }

    /// Window length in seconds, zero when disabled
    #[must_use]
    pub fn window_secs(&self) -> i64 {
        self.window.map_or(0, |window| window.num_seconds())
    }

    /// Record a join. A member who rejoins keeps only the latest join time.
    pub fn record(&self, member: UserId, joined_at: DateTime<Utc>) {
        if self.is_enabled() {
            self.joins.insert(member, joined_at);
        }
    }

    /// Drop members that left or joined before `now - window`. Joins exactly
    /// at the cutoff are kept.
    pub fn prune(&self, now: DateTime<Utc>, is_member: impl Fn(UserId) -> bool) {
        let Some(window) = self.window else {
            return;
        };
        let cutoff = now - window;
        self.joins
            .retain(|member, joined_at| *joined_at >= cutoff && is_member(*member));
    }

    /// Cached members, oldest join first
    #[must_use]
    pub fn members(&self) -> Vec<UserId> {
        let mut joins: Vec<(DateTime<Utc>, UserId)> = self
            .joins
            .iter()
            .map(|entry| (*entry.value(), *entry.key()))
            .collect();
        joins.sort_unstable();
        joins.into_iter().map(|(_, member)| member).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.joins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn joined_five_seconds_ago(threshold: i64) -> RecentJoins {
        let cache = RecentJoins::new(threshold);
        cache.record(UserId::new(1), now() - Duration::seconds(5));
        cache
    }

    #[test]
    fn test_window_boundaries() {
        let cache = joined_five_seconds_ago(10);
        cache.prune(now(), |_| true);
        assert_eq!(cache.members(), vec![UserId::new(1)]);

        // Cutoff is inclusive
        let cache = joined_five_seconds_ago(5);
        cache.prune(now(), |_| true);
        assert_eq!(cache.members(), vec![UserId::new(1)]);

        let cache = joined_five_seconds_ago(4);
        cache.prune(now(), |_| true);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_departed_members_are_pruned() {
        let cache = RecentJoins::new(60);
        cache.record(UserId::new(1), now());
        cache.record(UserId::new(2), now());

        cache.prune(now(), |member| member == UserId::new(2));

        assert_eq!(cache.members(), vec![UserId::new(2)]);
    }

    #[test]
    fn test_disabled_cache_holds_nothing() {
        for threshold in [0, -5] {
            let cache = RecentJoins::new(threshold);
            assert!(!cache.is_enabled());
            cache.record(UserId::new(1), now());
            cache.prune(now(), |_| false);
            assert!(cache.is_empty());
            assert_eq!(cache.window_secs(), 0);
        }
    }

    #[test]
    fn test_members_ordered_by_join_time() {
        let cache = RecentJoins::new(300);
        cache.record(UserId::new(3), now() - Duration::seconds(10));
        cache.record(UserId::new(1), now() - Duration::seconds(5));
        cache.record(UserId::new(2), now() - Duration::seconds(30));

        assert_eq!(
            cache.members(),
            vec![UserId::new(2), UserId::new(3), UserId::new(1)]
        );
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_rejoin_keeps_latest_time() {
        let cache = RecentJoins::new(20);
        cache.record(UserId::new(1), now() - Duration::seconds(60));
        cache.record(UserId::new(1), now() - Duration::seconds(2));

        cache.prune(now(), |_| true);

        assert_eq!(cache.members(), vec![UserId::new(1)]);
    }
}
