//! Tri-state permission overwrites
//!
//! Discord stores a channel overwrite as a pair of allow/deny bitsets. The
//! engine reasons about single permissions as a three-valued state, and only
//! ever touches the three identities it manages.

use derive_more::Display;
use poise::serenity_prelude::Permissions;

/// State of a single permission inside an overwrite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum PermState {
    #[display("deny")]
    Deny,
    #[display("allow")]
    Allow,
    /// Not set on this overwrite, falls back to role defaults
    #[display("inherit")]
    Inherit,
}

/// A channel overwrite for one identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overwrite {
    pub allow: Permissions,
    pub deny: Permissions,
}

impl Default for Overwrite {
    fn default() -> Self {
        Self {
            allow: Permissions::empty(),
            deny: Permissions::empty(),
        }
    }
}

impl Overwrite {
    #[must_use]
    pub const fn new(allow: Permissions, deny: Permissions) -> Self {
        Self { allow, deny }
    }

    /// State of `permission` on this overwrite. Deny wins if both bits are set.
    #[must_use]
    pub fn get(&self, permission: Permissions) -> PermState {
        if self.deny.contains(permission) {
            PermState::Deny
        } else if self.allow.contains(permission) {
            PermState::Allow
        } else {
            PermState::Inherit
        }
    }

    /// Set `permission` to `state`, leaving every other permission untouched
    pub fn set(&mut self, permission: Permissions, state: PermState) {
        self.allow.remove(permission);
        self.deny.remove(permission);
        match state {
            PermState::Allow => self.allow.insert(permission),
            PermState::Deny => self.deny.insert(permission),
            PermState::Inherit => {}
        }
    }

    /// True when every permission is at `Inherit`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }

    /// The overwrite to store, or `None` when the entry should be deleted
    #[must_use]
    pub fn into_stored(self) -> Option<Self> {
        (!self.is_empty()).then_some(self)
    }
}

/// The identities whose overwrites the engine manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum OverwriteTarget {
    /// The guild's `@everyone` role
    #[display("everyone")]
    Everyone,
    /// The configured role that keeps posting rights during a lockdown
    #[display("authorized role")]
    AuthorizedRole,
    /// The bot's own member
    #[display("bot")]
    Bot,
}

impl OverwriteTarget {
    /// Write order used by the executor
    pub const ALL: [Self; 3] = [Self::Everyone, Self::AuthorizedRole, Self::Bot];
}

/// Direction of a lockdown batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum LockMode {
    #[display("lock")]
    Lock,
    #[display("unlock")]
    Unlock,
}

impl LockMode {
    /// The send-messages state each managed identity gets in this mode
    #[must_use]
    pub const fn send_state(self, target: OverwriteTarget) -> PermState {
        match (self, target) {
            (Self::Lock, OverwriteTarget::Everyone) => PermState::Deny,
            (Self::Lock, OverwriteTarget::AuthorizedRole | OverwriteTarget::Bot) => {
                PermState::Allow
            }
            (Self::Unlock, _) => PermState::Inherit,
        }
    }

    /// Audit log reason attached to permission writes
    #[must_use]
    pub const fn audit_reason(self) -> &'static str {
        match self {
            Self::Lock => "[Mass Lockdown]",
            Self::Unlock => "[Mass Unlockdown]",
        }
    }

    /// "L" or "Unl", the prefix used in user-facing reports
    #[must_use]
    pub const fn prefix(self, capitalized: bool) -> &'static str {
        match (self, capitalized) {
            (Self::Lock, true) => "L",
            (Self::Lock, false) => "l",
            (Self::Unlock, true) => "Unl",
            (Self::Unlock, false) => "unl",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_leaves_other_permissions_alone() {
        let mut overwrite = Overwrite::new(
            Permissions::VIEW_CHANNEL | Permissions::ADD_REACTIONS,
            Permissions::ATTACH_FILES,
        );

        overwrite.set(Permissions::SEND_MESSAGES, PermState::Deny);
        assert_eq!(overwrite.get(Permissions::SEND_MESSAGES), PermState::Deny);
        assert_eq!(overwrite.get(Permissions::VIEW_CHANNEL), PermState::Allow);
        assert_eq!(overwrite.get(Permissions::ATTACH_FILES), PermState::Deny);

        overwrite.set(Permissions::SEND_MESSAGES, PermState::Allow);
        assert_eq!(overwrite.get(Permissions::SEND_MESSAGES), PermState::Allow);
        assert!(!overwrite.deny.contains(Permissions::SEND_MESSAGES));

        overwrite.set(Permissions::SEND_MESSAGES, PermState::Inherit);
        assert_eq!(overwrite.get(Permissions::SEND_MESSAGES), PermState::Inherit);
        assert_eq!(
            overwrite.allow,
            Permissions::VIEW_CHANNEL | Permissions::ADD_REACTIONS
        );
    }

    #[test]
    fn test_empty_overwrite_is_not_stored() {
        let mut overwrite = Overwrite::default();
        assert!(overwrite.is_empty());
        assert_eq!(overwrite.into_stored(), None);

        overwrite.set(Permissions::SEND_MESSAGES, PermState::Allow);
        assert_eq!(overwrite.into_stored(), Some(overwrite));

        overwrite.set(Permissions::SEND_MESSAGES, PermState::Inherit);
        assert_eq!(overwrite.into_stored(), None);
    }

    #[test]
    fn test_lock_mode_states() {
        assert_eq!(
            LockMode::Lock.send_state(OverwriteTarget::Everyone),
            PermState::Deny
        );
        assert_eq!(
            LockMode::Lock.send_state(OverwriteTarget::AuthorizedRole),
            PermState::Allow
        );
        assert_eq!(LockMode::Lock.send_state(OverwriteTarget::Bot), PermState::Allow);
        for target in OverwriteTarget::ALL {
            assert_eq!(LockMode::Unlock.send_state(target), PermState::Inherit);
        }
        assert_eq!(LockMode::Unlock.to_string(), "unlock");
        assert_eq!(OverwriteTarget::AuthorizedRole.to_string(), "authorized role");
    }
}
