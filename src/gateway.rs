//! Membership gateway
//!
//! Thin seam over the remote membership operations the enforcement engine
//! depends on: fetching the guild's membership and issuing bans. Both are
//! network bound and fail independently per call.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{GuildId, Http, UserId};

use crate::error::{WardenError, WardenResult};

/// Page size for member fetches; the API caps a single page at 1000.
const MEMBER_PAGE_SIZE: u64 = 1000;

/// A guild member as the engine sees one: the id plus a display tag for
/// log lines. Fetched per enforcement pass, never cached across passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildMember {
    pub user_id: UserId,
    pub tag: String,
}

impl GuildMember {
    #[must_use]
    pub fn new(user_id: UserId, tag: impl Into<String>) -> Self {
        Self {
            user_id,
            tag: tag.into(),
        }
    }
}

/// Remote membership operations the engine depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipGateway: Send + Sync {
    /// Fetch the guild's complete membership.
    async fn fetch_members(&self, guild_id: GuildId) -> WardenResult<Vec<GuildMember>>;

    /// Ban a member, attaching `audit_reason` to the guild's audit log.
    async fn ban(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        audit_reason: &str,
    ) -> WardenResult<()>;
}

/// Production gateway backed by serenity's HTTP client.
#[derive(Clone)]
pub struct DiscordGateway {
    http: Arc<Http>,
}

impl DiscordGateway {
    #[must_use]
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl MembershipGateway for DiscordGateway {
    async fn fetch_members(&self, guild_id: GuildId) -> WardenResult<Vec<GuildMember>> {
        let mut members = Vec::new();
        let mut after: Option<UserId> = None;

        loop {
            let page = guild_id
                .members(&self.http, Some(MEMBER_PAGE_SIZE), after)
                .await
                .map_err(|err| WardenError::MemberFetch(Box::new(err)))?;

            let full_page = page.len() as u64 == MEMBER_PAGE_SIZE;
            after = page.last().map(|member| member.user.id);
            members.extend(
                page.into_iter()
                    .map(|member| GuildMember::new(member.user.id, member.user.tag())),
            );

            if !full_page {
                break;
            }
        }

        Ok(members)
    }

    async fn ban(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        audit_reason: &str,
    ) -> WardenResult<()> {
        // 0: keep the banned member's message history.
        guild_id
            .ban_with_reason(&self.http, user_id, 0, audit_reason)
            .await
            .map_err(|err| WardenError::Ban {
                user_id: user_id.get(),
                reason: audit_reason.to_owned(),
                source: Box::new(err),
            })
    }
}
