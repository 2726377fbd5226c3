//! Bot configuration
//!
//! Loaded once at startup from a YAML file and never changed afterwards.

use poise::serenity_prelude::{ChannelId, GuildId, RoleId, UserId};
use serde::Deserialize;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file, relative to the working directory
pub const CONFIG_FILE: &str = "config.yaml";
/// Environment variable overriding [`CONFIG_FILE`]
pub const CONFIG_ENV: &str = "LOCKDOWN_CONFIG";
/// Environment variable that takes precedence over the token in the file
pub const TOKEN_ENV: &str = "DISCORD_TOKEN";

/// Longest recent-join window accepted, one year
const MAX_RECENT_JOIN_SECS: i64 = 365 * 24 * 60 * 60;

/// Errors raised while loading the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("No bot token: set {TOKEN_ENV} or `token` in the config file")]
    MissingToken,
}

/// Where lockdown notices are posted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "AnnounceSetting")]
pub enum AnnounceTarget {
    /// Every channel that was just locked or unlocked
    All,
    /// One fixed channel
    Channel(ChannelId),
}

/// Raw YAML form of [`AnnounceTarget`]: `all` or a channel id
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum AnnounceSetting {
    Id(u64),
    Keyword(String),
}

impl TryFrom<AnnounceSetting> for AnnounceTarget {
    type Error = String;

    fn try_from(setting: AnnounceSetting) -> Result<Self, Self::Error> {
        let id = match setting {
            AnnounceSetting::Keyword(keyword) if keyword.trim().eq_ignore_ascii_case("all") => {
                return Ok(Self::All);
            }
            AnnounceSetting::Keyword(keyword) => keyword
                .trim()
                .parse::<u64>()
                .map_err(|_| {
                    format!("announce_channel must be `all` or a channel id, got `{keyword}`")
                })?,
            AnnounceSetting::Id(id) => id,
        };
        if id == 0 {
            return Err("announce_channel must not be 0".to_string());
        }
        Ok(Self::Channel(ChannelId::new(id)))
    }
}

fn default_lockdown_commands() -> Vec<String> {
    vec!["!lockdown".to_string()]
}

fn default_unlockdown_commands() -> Vec<String> {
    vec!["!unlockdown".to_string()]
}

/// Process-wide settings
#[derive(Clone, Deserialize)]
pub struct Config {
    /// Bot token, used when [`TOKEN_ENV`] is not set
    #[serde(default)]
    pub token: Option<String>,
    /// The guild being protected
    pub guild_id: u64,
    /// Role that keeps posting rights during a lockdown
    pub authorized_role_id: u64,
    /// Role allowed to run lockdown commands
    #[serde(default)]
    pub staff_role_id: Option<u64>,
    #[serde(default)]
    pub announce_channel: Option<AnnounceTarget>,
    /// Where auto-lockdown alerts go
    #[serde(default)]
    pub staff_channel_id: Option<u64>,
    /// Distinct mentions in one message that trigger an auto-lockdown, 0 disables
    #[serde(default)]
    pub mention_threshold: u32,
    /// Seconds a join counts as recent, 0 or less disables the cache
    #[serde(default)]
    pub recent_join_threshold: i64,
    #[serde(default)]
    pub developer_id: Option<u64>,
    #[serde(default)]
    pub lockdown_announcement: Option<String>,
    #[serde(default)]
    pub unlockdown_announcement: Option<String>,
    #[serde(default = "default_lockdown_commands")]
    pub lockdown_commands: Vec<String>,
    #[serde(default = "default_unlockdown_commands")]
    pub unlockdown_commands: Vec<String>,
    /// Keyword of the developer-only inspect command
    #[serde(default)]
    pub eval_command: Option<String>,
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("guild_id", &self.guild_id)
            .field("authorized_role_id", &self.authorized_role_id)
            .field("staff_role_id", &self.staff_role_id)
            .field("announce_channel", &self.announce_channel)
            .field("staff_channel_id", &self.staff_channel_id)
            .field("mention_threshold", &self.mention_threshold)
            .field("recent_join_threshold", &self.recent_join_threshold)
            .field("developer_id", &self.developer_id)
            .field("lockdown_commands", &self.lockdown_commands)
            .field("unlockdown_commands", &self.unlockdown_commands)
            .field("eval_command", &self.eval_command)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Path of the config file, honouring [`CONFIG_ENV`]
    #[must_use]
    pub fn path_from_env() -> PathBuf {
        std::env::var_os(CONFIG_ENV).map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from)
    }

    /// Load and validate the config file at `path`
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a YAML document
    ///
    /// # Errors
    /// Returns an error if the YAML is malformed or a value is out of range
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        config.normalize()?;
        Ok(config)
    }

    fn normalize(&mut self) -> Result<(), ConfigError> {
        if self.guild_id == 0 {
            return Err(ConfigError::Invalid("guild_id must not be 0".to_string()));
        }
        if self.authorized_role_id == 0 {
            return Err(ConfigError::Invalid(
                "authorized_role_id must not be 0".to_string(),
            ));
        }
        for (name, value) in [
            ("staff_role_id", self.staff_role_id),
            ("staff_channel_id", self.staff_channel_id),
            ("developer_id", self.developer_id),
        ] {
            if value == Some(0) {
                return Err(ConfigError::Invalid(format!("{name} must not be 0")));
            }
        }
        if self.recent_join_threshold > MAX_RECENT_JOIN_SECS {
            return Err(ConfigError::Invalid(format!(
                "recent_join_threshold must be at most {MAX_RECENT_JOIN_SECS} seconds"
            )));
        }

        for keywords in [&mut self.lockdown_commands, &mut self.unlockdown_commands] {
            for keyword in keywords.iter_mut() {
                *keyword = keyword.trim().to_lowercase();
                if keyword.is_empty() {
                    return Err(ConfigError::Invalid(
                        "command keywords must not be empty".to_string(),
                    ));
                }
            }
        }
        self.eval_command = self
            .eval_command
            .take()
            .map(|keyword| keyword.trim().to_lowercase())
            .filter(|keyword| !keyword.is_empty());

        Ok(())
    }

    /// The bot token, from [`TOKEN_ENV`] or the config file
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingToken`] if neither is set
    pub fn resolve_token(&self) -> Result<String, ConfigError> {
        std::env::var(TOKEN_ENV)
            .ok()
            .or_else(|| self.token.clone())
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::MissingToken)
    }

    #[must_use]
    pub fn guild(&self) -> GuildId {
        GuildId::new(self.guild_id)
    }

    #[must_use]
    pub fn authorized_role(&self) -> RoleId {
        RoleId::new(self.authorized_role_id)
    }

    #[must_use]
    pub fn staff_role(&self) -> Option<RoleId> {
        self.staff_role_id.map(RoleId::new)
    }

    #[must_use]
    pub fn staff_channel(&self) -> Option<ChannelId> {
        self.staff_channel_id.map(ChannelId::new)
    }

    #[must_use]
    pub fn developer(&self) -> Option<UserId> {
        self.developer_id.map(UserId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
token: "abc"
guild_id: 100
authorized_role_id: 200
staff_role_id: 300
announce_channel: all
staff_channel_id: 400
mention_threshold: 8
recent_join_threshold: 120
developer_id: 500
lockdown_announcement: "Server locked"
unlockdown_announcement: "Server unlocked"
lockdown_commands: ["!Lockdown", " !ld "]
unlockdown_commands: ["!unlockdown"]
eval_command: "!Inspect"
"#;

    #[test]
    fn test_full_config() {
        let config = Config::from_yaml(FULL).expect("valid config");
        assert_eq!(config.guild(), GuildId::new(100));
        assert_eq!(config.authorized_role(), RoleId::new(200));
        assert_eq!(config.staff_role(), Some(RoleId::new(300)));
        assert_eq!(config.staff_channel(), Some(ChannelId::new(400)));
        assert_eq!(config.developer(), Some(UserId::new(500)));
        assert_eq!(config.announce_channel, Some(AnnounceTarget::All));
        assert_eq!(config.mention_threshold, 8);
        assert_eq!(config.recent_join_threshold, 120);
        assert_eq!(config.lockdown_commands, vec!["!lockdown", "!ld"]);
        assert_eq!(config.eval_command.as_deref(), Some("!inspect"));
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = Config::from_yaml("guild_id: 1\nauthorized_role_id: 2\n").unwrap();
        assert_eq!(config.announce_channel, None);
        assert_eq!(config.mention_threshold, 0);
        assert_eq!(config.recent_join_threshold, 0);
        assert_eq!(config.lockdown_commands, vec!["!lockdown"]);
        assert_eq!(config.unlockdown_commands, vec!["!unlockdown"]);
        assert!(config.eval_command.is_none());
        assert!(config.staff_channel().is_none());
    }

    #[test]
    fn test_announce_channel_forms() {
        let yaml = "guild_id: 1\nauthorized_role_id: 2\nannounce_channel: 555\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(
            config.announce_channel,
            Some(AnnounceTarget::Channel(ChannelId::new(555)))
        );

        let yaml = "guild_id: 1\nauthorized_role_id: 2\nannounce_channel: \"556\"\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(
            config.announce_channel,
            Some(AnnounceTarget::Channel(ChannelId::new(556)))
        );

        let yaml = "guild_id: 1\nauthorized_role_id: 2\nannounce_channel: ALL\n";
        assert_eq!(
            Config::from_yaml(yaml).unwrap().announce_channel,
            Some(AnnounceTarget::All)
        );

        let yaml = "guild_id: 1\nauthorized_role_id: 2\nannounce_channel: general\n";
        assert!(matches!(Config::from_yaml(yaml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_yaml("guild_id: 0\nauthorized_role_id: 2\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_yaml("guild_id: 1\nauthorized_role_id: 2\nstaff_channel_id: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_yaml("guild_id: 1\nauthorized_role_id: 2\nlockdown_commands: [\" \"]\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_yaml("authorized_role_id: 2\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_blank_eval_command_is_disabled() {
        let config =
            Config::from_yaml("guild_id: 1\nauthorized_role_id: 2\neval_command: \"\"\n").unwrap();
        assert!(config.eval_command.is_none());
    }

    #[test]
    fn test_debug_hides_token() {
        let config = Config::from_yaml(FULL).unwrap();
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("<redacted>"));
        assert!(!debug_output.contains("abc"));
    }
}
