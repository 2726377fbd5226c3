use crate::commands::{self, Caller};
use crate::lockdown::{
    ChannelDirectory, LockdownError, MessageSignal, SerenityDirectory, TriggerOutcome, trigger,
};
use crate::{Data, EVENT_TARGET, logging};
use chrono::{DateTime, Utc};
use poise::serenity_prelude::{
    self as serenity, ChunkGuildFilter, Context, EventHandler, GuildId, GuildMembersChunkEvent,
    Member, Message, Permissions, Ready, Timestamp,
};
use tracing::{debug, error, info, warn};

fn to_utc(timestamp: Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp.unix_timestamp(), 0).unwrap_or_else(Utc::now)
}

/// Messages the engine looks at: after setup, from humans, with text, in the
/// monitored guild
pub(crate) fn qualifies(
    data: &Data,
    author_bot: bool,
    content: &str,
    guild: Option<GuildId>,
) -> bool {
    data.is_ready()
        && !author_bot
        && !content.is_empty()
        && guild == Some(data.config.guild())
}

/// Large guilds only send part of their member list up front
fn needs_chunking(cached_members: usize, member_count: u64) -> bool {
    u64::try_from(cached_members).unwrap_or(u64::MAX) < member_count
}

fn is_last_chunk(chunk_index: u32, chunk_count: u32) -> bool {
    chunk_index + 1 >= chunk_count
}

/// Routes gateway events into the lockdown engine
pub struct Handler {
    data: Data,
}

impl Handler {
    #[must_use]
    pub fn new(data: Data) -> Self {
        Self { data }
    }

    fn directory(&self, ctx: &Context) -> SerenityDirectory {
        SerenityDirectory::new(
            ctx,
            self.data.config.guild(),
            self.data.config.authorized_role(),
        )
    }

    /// Seed the recent-join cache from the cached member list and go live
    fn finish_setup(&self, ctx: &Context) {
        if self.data.is_ready() {
            return;
        }

        let guild_id = self.data.config.guild();
        let members: Option<Vec<_>> = ctx.cache.guild(guild_id).map(|guild| {
            guild
                .members
                .values()
                .filter_map(|member| Some((member.user.id, to_utc(member.joined_at?))))
                .collect()
        });
        let Some(members) = members else {
            error!(
                target: EVENT_TARGET,
                error = %LockdownError::GuildNotCached(guild_id),
                "Lockdown engine stays disabled"
            );
            return;
        };

        let member_count = members.len();
        self.data.setup(&self.directory(ctx), members, Utc::now());
        logging::log_console(format!(
            "Watching guild {guild_id} ({member_count} members cached, {} recent joins)",
            self.data.recent.len()
        ));
    }

    /// Roles the author holds besides `@everyone`
    fn author_roles(&self, ctx: &Context, msg: &Message) -> usize {
        if let Some(member) = &msg.member {
            return member.roles.len();
        }
        ctx.cache
            .guild(self.data.config.guild())
            .and_then(|guild| {
                guild
                    .members
                    .get(&msg.author.id)
                    .map(|member| member.roles.len())
            })
            .unwrap_or_default()
    }

    fn caller(&self, ctx: &Context, msg: &Message) -> Caller {
        let mut caller = Caller {
            id: msg.author.id,
            roles: msg
                .member
                .as_ref()
                .map(|member| member.roles.clone())
                .unwrap_or_default(),
            manage_guild: false,
        };

        let Some(guild) = ctx.cache.guild(self.data.config.guild()) else {
            return caller;
        };
        let permissions = if let Some(member) = guild.members.get(&msg.author.id) {
            caller.roles.clone_from(&member.roles);
            guild.member_permissions(member)
        } else if let Some(member) = &msg.member {
            guild.partial_member_permissions(msg.author.id, member)
        } else {
            Permissions::empty()
        };
        caller.manage_guild = permissions.contains(Permissions::MANAGE_GUILD);
        caller
    }
}

#[serenity::async_trait]
impl EventHandler for Handler {
    /// Called when the bot is ready, but the cache may not be fully populated yet.
    async fn ready(&self, ctx: Context, ready: Ready) {
        let user_name = ready.user.name.clone();
        let shard_id = ctx.shard_id;
        info!(target: EVENT_TARGET, "Connected as {user_name}, shard {shard_id}");
    }

    /// Called when the cache is fully populated. Setup runs here, or once the
    /// full member list has arrived.
    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        let guild_count_cache = ctx.cache.guild_count();
        let guild_count = guilds.len();
        if guild_count != guild_count_cache {
            warn!(
                "Cache guild count mismatch: {guild_count_cache} (cache) vs {guild_count} (actual)"
            );
        }

        if self.data.is_ready() {
            return;
        }

        let guild_id = self.data.config.guild();
        let counts = ctx
            .cache
            .guild(guild_id)
            .map(|guild| (guild.members.len(), guild.member_count));
        match counts {
            Some((cached, total)) if needs_chunking(cached, total) => {
                info!(
                    target: EVENT_TARGET,
                    guild_id = %guild_id,
                    cached,
                    total,
                    "Requesting the full member list"
                );
                ctx.shard
                    .chunk_guild(guild_id, None, false, ChunkGuildFilter::None, None);
            }
            _ => self.finish_setup(&ctx),
        }
    }

    async fn guild_members_chunk(&self, ctx: Context, chunk: GuildMembersChunkEvent) {
        if chunk.guild_id != self.data.config.guild() {
            return;
        }
        debug!(
            target: EVENT_TARGET,
            chunk_index = chunk.chunk_index,
            chunk_count = chunk.chunk_count,
            members = chunk.members.len(),
            "Member chunk received"
        );
        if is_last_chunk(chunk.chunk_index, chunk.chunk_count) {
            self.finish_setup(&ctx);
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if !qualifies(&self.data, msg.author.bot, &msg.content, msg.guild_id) {
            return;
        }

        let directory = self.directory(&ctx);
        let signal = MessageSignal {
            author: msg.author.id,
            author_roles: self.author_roles(&ctx, &msg),
            channel: msg.channel_id,
            mentioned: msg.mentions.iter().map(|user| user.id).collect(),
            timestamp: to_utc(msg.timestamp),
        };

        match trigger::on_message(&self.data, &directory, &signal).await {
            TriggerOutcome::Fired(report) => info!(
                target: EVENT_TARGET,
                run_id = %report.run_id,
                message_id = %msg.id,
                "Auto-lockdown fired"
            ),
            TriggerOutcome::Skipped(reason) => {
                debug!(target: EVENT_TARGET, message_id = %msg.id, %reason, "No auto-lockdown");
            }
        }

        let Some((kind, _)) = self.data.commands.resolve(&msg.content) else {
            return;
        };
        let caller = self.caller(&ctx, &msg);
        if !commands::may_run(&self.data.config, &caller, kind) {
            return;
        }

        let typing = msg.channel_id.start_typing(&ctx.http);
        let reply = commands::dispatch(&self.data, &directory, &caller, &msg.content).await;
        typing.stop();

        if let Some(reply) = reply {
            if let Err(e) = msg.channel_id.say(&ctx, reply).await {
                error!(
                    target: EVENT_TARGET,
                    channel_id = %msg.channel_id,
                    error = %e,
                    "Failed to reply to command"
                );
            }
        }
    }

    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        if !self.data.is_ready() || new_member.guild_id != self.data.config.guild() {
            return;
        }

        let joined_at = new_member.joined_at.map_or_else(Utc::now, to_utc);
        self.data.recent.record(new_member.user.id, joined_at);

        let directory = self.directory(&ctx);
        self.data
            .recent
            .prune(Utc::now(), |member| directory.is_member(member));
        debug!(
            target: EVENT_TARGET,
            user_id = %new_member.user.id,
            recent_joins = self.data.recent.len(),
            "Member joined"
        );
    }
}
