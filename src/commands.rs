//! Moderator commands
//!
//! Lockdown commands are plain-text keywords from the config file, matched
//! as message prefixes in the order they were registered. `status` is a
//! regular slash command.

use crate::config::Config;
use crate::lockdown::ChannelDirectory;
use crate::{COMMAND_TARGET, Context, Data, Error};
use derive_more::Display;
use poise::serenity_prelude::{Mentionable, RoleId, UserId};
use poise::command;
use std::str::FromStr;
use tracing::info;

/// What a keyword runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CommandKind {
    #[display("lockdown")]
    Lockdown,
    #[display("unlockdown")]
    Unlockdown,
    #[display("inspect")]
    Inspect,
}

/// Ordered keyword table, first prefix match wins
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    entries: Vec<(String, CommandKind)>,
}

impl CommandRegistry {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::default();
        for keyword in &config.lockdown_commands {
            registry.register(keyword, CommandKind::Lockdown);
        }
        for keyword in &config.unlockdown_commands {
            registry.register(keyword, CommandKind::Unlockdown);
        }
        if let Some(keyword) = &config.eval_command {
            registry.register(keyword, CommandKind::Inspect);
        }
        registry
    }

    pub fn register(&mut self, keyword: &str, kind: CommandKind) {
        self.entries.push((keyword.to_lowercase(), kind));
    }

    /// Match `content` against the registered keywords, case-insensitively.
    /// Returns the command and its trimmed arguments.
    #[must_use]
    pub fn resolve<'a>(&self, content: &'a str) -> Option<(CommandKind, &'a str)> {
        self.entries.iter().find_map(|(keyword, kind)| {
            let head = content.get(..keyword.len())?;
            (head.to_lowercase() == *keyword).then(|| (*kind, content[keyword.len()..].trim()))
        })
    }
}

/// Who sent a command
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: UserId,
    pub roles: Vec<RoleId>,
    /// Holds the manage-guild permission
    pub manage_guild: bool,
}

/// Managers, the developer and staff may run lockdown commands
#[must_use]
pub fn is_authorized(config: &Config, caller: &Caller) -> bool {
    caller.manage_guild
        || config.developer() == Some(caller.id)
        || config
            .staff_role()
            .is_some_and(|staff| caller.roles.contains(&staff))
}

/// Whether `caller` may run a `kind` command. Inspect is developer-only.
#[must_use]
pub fn may_run(config: &Config, caller: &Caller, kind: CommandKind) -> bool {
    match kind {
        CommandKind::Inspect => config.developer() == Some(caller.id),
        CommandKind::Lockdown | CommandKind::Unlockdown => is_authorized(config, caller),
    }
}

/// The fixed set of diagnostics the inspect command answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum InspectQuery {
    #[display("status")]
    Status,
    #[display("locked")]
    Locked,
    #[display("pins")]
    Pins,
    #[display("recent")]
    Recent,
    #[display("trigger")]
    Trigger,
    #[display("config")]
    Config,
}

impl InspectQuery {
    pub const ALL: [Self; 6] = [
        Self::Status,
        Self::Locked,
        Self::Pins,
        Self::Recent,
        Self::Trigger,
        Self::Config,
    ];
}

impl FromStr for InspectQuery {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let query = s.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Self::Status);
        }
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.to_string() == query)
            .ok_or_else(|| {
                let known = Self::ALL.map(|q| q.to_string()).join(", ");
                format!("Unknown query `{query}`, expected one of: {known}")
            })
    }
}

fn join_or_none(items: Vec<String>) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(" ")
    }
}

/// Answer an inspect query
#[must_use]
pub fn inspect(data: &Data, args: &str) -> String {
    let query = match args.parse::<InspectQuery>() {
        Ok(query) => query,
        Err(e) => return format!("```\n{e}\n```"),
    };

    match query {
        InspectQuery::Status => data.summary(),
        InspectQuery::Locked => {
            let locked = data
                .lockdown
                .executor
                .locked_channels()
                .iter()
                .map(|channel| channel.mention().to_string())
                .collect();
            format!("Locked channels: {}", join_or_none(locked))
        }
        InspectQuery::Pins => {
            let pins = data
                .lockdown
                .announcer
                .pinned_messages()
                .iter()
                .map(|(channel, message)| format!("{}:{message}", channel.mention()))
                .collect();
            format!("Pinned announcements: {}", join_or_none(pins))
        }
        InspectQuery::Recent => {
            if !data.recent.is_enabled() {
                return "Recent-join tracking is disabled".to_string();
            }
            let members = data
                .recent
                .members()
                .iter()
                .map(|member| member.mention().to_string())
                .collect();
            format!(
                "Joined in the last {} seconds: {}",
                data.recent.window_secs(),
                join_or_none(members)
            )
        }
        InspectQuery::Trigger => format!("Auto-lockdown state: {}", data.trigger.state()),
        InspectQuery::Config => format!("```\n{:#?}\n```", data.config),
    }
}

/// Run the command in `content` if it is one and `caller` may run it.
/// Returns the reply to post, if any.
pub async fn dispatch(
    data: &Data,
    directory: &dyn ChannelDirectory,
    caller: &Caller,
    content: &str,
) -> Option<String> {
    let (kind, args) = data.commands.resolve(content)?;
    if !may_run(&data.config, caller, kind) {
        return None;
    }

    info!(
        target: COMMAND_TARGET,
        command = %kind,
        user_id = %caller.id,
        arguments = %args,
        event = "start",
        "Command execution started"
    );

    match kind {
        CommandKind::Lockdown => Some(data.lockdown.lock(directory, args).await.to_string()),
        CommandKind::Unlockdown => match data.lockdown.unlock(directory, args).await {
            Ok(report) => {
                data.trigger.reset();
                Some(report.to_string())
            }
            Err(e) => Some(e.to_string()),
        },
        CommandKind::Inspect => Some(inspect(data, args)),
    }
}

/// Show the lockdown engine's current state
#[command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say(ctx.data().summary()).await?;
    Ok(())
}
