//! Channel directory
//!
//! The engine never talks to Discord directly. Everything it reads or writes
//! goes through [`ChannelDirectory`], which the bot implements on top of the
//! serenity cache and HTTP client.

use crate::lockdown::{ChannelInfo, LockdownError, LockdownResult, Overwrite, OverwriteTarget};
use poise::serenity_prelude::{
    Cache, ChannelId, ChannelType, Context, Guild, GuildChannel, GuildId, Http, Member, MessageId,
    PermissionOverwrite, PermissionOverwriteType, Permissions, RoleId, UserId,
};
use std::sync::Arc;
use tracing::debug;

/// Read and write access to the monitored guild's channels
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// Snapshot of every channel in the guild
    fn channels(&self) -> Vec<ChannelInfo>;

    /// Snapshot of a single channel
    fn channel(&self, id: ChannelId) -> Option<ChannelInfo>;

    /// Current overwrite for `target` in `channel`, empty if none is set
    fn current_overwrite(&self, channel: ChannelId, target: OverwriteTarget) -> Overwrite;

    /// Whether `user` is still a member of the guild
    fn is_member(&self, user: UserId) -> bool;

    /// Store `overwrite` for `target`, or delete the entry when `None`
    async fn write_overwrite(
        &self,
        channel: ChannelId,
        target: OverwriteTarget,
        overwrite: Option<Overwrite>,
        reason: &str,
    ) -> LockdownResult<()>;

    async fn send_message(&self, channel: ChannelId, text: &str) -> LockdownResult<MessageId>;

    async fn pin(&self, channel: ChannelId, message: MessageId, reason: &str)
    -> LockdownResult<()>;

    async fn unpin(
        &self,
        channel: ChannelId,
        message: MessageId,
        reason: &str,
    ) -> LockdownResult<()>;
}

/// [`ChannelDirectory`] backed by the serenity cache (reads) and HTTP (writes)
#[derive(Clone)]
pub struct SerenityDirectory {
    cache: Arc<Cache>,
    http: Arc<Http>,
    guild_id: GuildId,
    authorized_role: RoleId,
}

impl SerenityDirectory {
    #[must_use]
    pub fn new(ctx: &Context, guild_id: GuildId, authorized_role: RoleId) -> Self {
        Self {
            cache: Arc::clone(&ctx.cache),
            http: Arc::clone(&ctx.http),
            guild_id,
            authorized_role,
        }
    }

    fn overwrite_kind(&self, target: OverwriteTarget) -> PermissionOverwriteType {
        match target {
            // The @everyone role shares the guild's id
            OverwriteTarget::Everyone => {
                PermissionOverwriteType::Role(RoleId::new(self.guild_id.get()))
            }
            OverwriteTarget::AuthorizedRole => PermissionOverwriteType::Role(self.authorized_role),
            OverwriteTarget::Bot => PermissionOverwriteType::Member(self.cache.current_user().id),
        }
    }

    /// Writes only ever go to channels of the monitored guild
    fn ensure_in_guild(&self, channel: ChannelId) -> LockdownResult<()> {
        let known = self
            .cache
            .guild(self.guild_id)
            .is_some_and(|guild| guild.channels.contains_key(&channel));
        if known {
            Ok(())
        } else {
            Err(LockdownError::ChannelNotFound(channel))
        }
    }

    fn find_overwrite(&self, channel: &GuildChannel, target: OverwriteTarget) -> Option<Overwrite> {
        let kind = self.overwrite_kind(target);
        channel
            .permission_overwrites
            .iter()
            .find(|overwrite| overwrite.kind == kind)
            .map(|overwrite| Overwrite::new(overwrite.allow, overwrite.deny))
    }

    fn snapshot(&self, guild: &Guild, channel: &GuildChannel, bot: Option<&Member>) -> ChannelInfo {
        let overwrites = OverwriteTarget::ALL
            .into_iter()
            .filter_map(|target| {
                self.find_overwrite(channel, target)
                    .map(|overwrite| (target, overwrite))
            })
            .collect();

        let bot_permissions = bot.map_or_else(Permissions::empty, |member| {
            guild.user_permissions_in(channel, member)
        });

        ChannelInfo {
            id: channel.id,
            name: channel.name.clone(),
            is_text: matches!(channel.kind, ChannelType::Text | ChannelType::News),
            overwrites,
            bot_permissions,
        }
    }
}

#[async_trait::async_trait]
impl ChannelDirectory for SerenityDirectory {
    fn channels(&self) -> Vec<ChannelInfo> {
        let bot_id = self.cache.current_user().id;
        let Some(guild) = self.cache.guild(self.guild_id) else {
            return Vec::new();
        };
        let bot = guild.members.get(&bot_id);
        guild
            .channels
            .values()
            .map(|channel| self.snapshot(&guild, channel, bot))
            .collect()
    }

    fn channel(&self, id: ChannelId) -> Option<ChannelInfo> {
        let bot_id = self.cache.current_user().id;
        let guild = self.cache.guild(self.guild_id)?;
        let channel = guild.channels.get(&id)?;
        Some(self.snapshot(&guild, channel, guild.members.get(&bot_id)))
    }

    fn current_overwrite(&self, channel: ChannelId, target: OverwriteTarget) -> Overwrite {
        self.cache
            .guild(self.guild_id)
            .and_then(|guild| {
                guild
                    .channels
                    .get(&channel)
                    .and_then(|channel| self.find_overwrite(channel, target))
            })
            .unwrap_or_default()
    }

    fn is_member(&self, user: UserId) -> bool {
        self.cache
            .guild(self.guild_id)
            .is_some_and(|guild| guild.members.contains_key(&user))
    }

    async fn write_overwrite(
        &self,
        channel: ChannelId,
        target: OverwriteTarget,
        overwrite: Option<Overwrite>,
        reason: &str,
    ) -> LockdownResult<()> {
        self.ensure_in_guild(channel)?;
        let kind = self.overwrite_kind(target);
        debug!(%channel, %target, ?overwrite, reason, "Writing permission overwrite");

        match overwrite {
            Some(overwrite) => {
                channel
                    .create_permission(
                        &*self.http,
                        PermissionOverwrite {
                            allow: overwrite.allow,
                            deny: overwrite.deny,
                            kind,
                        },
                    )
                    .await?;
            }
            None => channel.delete_permission(&*self.http, kind).await?,
        }

        Ok(())
    }

    async fn send_message(&self, channel: ChannelId, text: &str) -> LockdownResult<MessageId> {
        self.ensure_in_guild(channel)?;
        let message = channel.say(&*self.http, text).await?;
        Ok(message.id)
    }

    async fn pin(
        &self,
        channel: ChannelId,
        message: MessageId,
        reason: &str,
    ) -> LockdownResult<()> {
        self.ensure_in_guild(channel)?;
        debug!(%channel, %message, reason, "Pinning message");
        channel.pin(&*self.http, message).await?;
        Ok(())
    }

    async fn unpin(
        &self,
        channel: ChannelId,
        message: MessageId,
        reason: &str,
    ) -> LockdownResult<()> {
        self.ensure_in_guild(channel)?;
        debug!(%channel, %message, reason, "Unpinning message");
        channel.unpin(&*self.http, message).await?;
        Ok(())
    }
}
