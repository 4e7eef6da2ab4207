use std::sync::{Arc, OnceLock};

use serenity::all::{Context, EventHandler, GuildId, Member, Ready};
use serenity::async_trait;
use tracing::{error, info, warn};

use crate::EVENT_TARGET;
use crate::config::WardenConfig;
use crate::gateway::DiscordGateway;
use crate::service::WardenService;

/// Gateway event handler: runs the startup reconciliation once the session
/// is ready, then screens every joining member against the current lists.
pub struct Handler {
    config: WardenConfig,
    // Built on first ready, when an HTTP client handle becomes available.
    service: OnceLock<WardenService>,
}

impl Handler {
    #[must_use]
    pub fn new(config: WardenConfig) -> Self {
        Self {
            config,
            service: OnceLock::new(),
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    /// Called when the session is ready, but the cache may not be fully populated yet.
    async fn ready(&self, ctx: Context, ready: Ready) {
        let user_name = ready.user.name.clone();
        let shard_id = ctx.shard_id;
        info!("Connected as {user_name}, shard {shard_id}");

        let mut first_session = false;
        let service = self.service.get_or_init(|| {
            first_session = true;
            let gateway = Arc::new(DiscordGateway::new(ctx.http.clone()));
            WardenService::new(gateway, self.config.guild(), self.config.banlist_dir.clone())
        });

        if first_session {
            if let Err(err) = service.startup().await {
                error!(
                    target: crate::ERROR_TARGET,
                    error = %err,
                    "Warden startup failed; member joins are still screened"
                );
            }
        } else {
            info!("Session resumed, warden already running");
        }
    }

    /// Called when the cache is fully populated.
    async fn cache_ready(&self, _ctx: Context, guilds: Vec<GuildId>) {
        let guild_count = guilds.len();
        info!("Cache ready! The bot is in {guild_count} guild(s)");
        if !guilds.contains(&self.config.guild()) {
            warn!(
                target: EVENT_TARGET,
                guild_id = self.config.guild_id,
                "Configured guild is not among the guilds this bot can see"
            );
        }
    }

    /// Called when a member joins a guild the bot is in.
    async fn guild_member_addition(&self, _ctx: Context, new_member: Member) {
        if new_member.guild_id != self.config.guild() {
            return;
        }
        let Some(service) = self.service.get() else {
            warn!(
                target: EVENT_TARGET,
                user_id = %new_member.user.id,
                "Member joined before startup completed, skipping screening"
            );
            return;
        };

        let user_id = new_member.user.id;
        let tag = new_member.user.tag();
        info!(target: EVENT_TARGET, %user_id, tag = %tag, "New member joined");

        // Snapshot at dispatch: a concurrent reload swaps the store out from
        // under us without tearing this evaluation.
        let snapshot = service.store().current();
        match service.engine().enforce_member(&snapshot, user_id, &tag).await {
            Some(reason) => {
                info!(
                    target: EVENT_TARGET,
                    %user_id,
                    tag = %tag,
                    %reason,
                    "Joining member matched a ban list"
                );
            }
            None => {
                info!(target: EVENT_TARGET, %user_id, tag = %tag, "Member is allowed to stay");
            }
        }
    }
}
