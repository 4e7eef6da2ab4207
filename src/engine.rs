//! Enforcement engine
//!
//! Reconciles guild membership against a ban-list snapshot and issues the
//! ban calls. One ban at most per member per pass; an individual failure is
//! logged and the batch continues. Members banned once during this process
//! run are skipped by later passes, so repeating a pass against unchanged
//! lists issues no new gateway calls.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use dashmap::DashMap;
use serenity::all::{GuildId, UserId};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::WardenResult;
use crate::gateway::{GuildMember, MembershipGateway};
use crate::store::{BanListSnapshot, Reason};
use crate::{AUDIT_TAG, ENFORCEMENT_TARGET, ERROR_TARGET};

/// Outcome counts for one enforcement pass.
#[derive(Debug, Clone)]
pub struct PassSummary {
    /// Correlates every log line belonging to this pass.
    pub pass_id: String,
    /// Members evaluated against the lists.
    pub evaluated: usize,
    /// Ban calls that succeeded.
    pub banned: usize,
    /// Ban calls that failed (logged, tolerated).
    pub failed: usize,
    /// Matching members skipped because this run already banned them.
    pub skipped: usize,
}

impl PassSummary {
    fn new() -> Self {
        Self {
            pass_id: Uuid::new_v4().to_string(),
            evaluated: 0,
            banned: 0,
            failed: 0,
            skipped: 0,
        }
    }
}

impl Display for PassSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "evaluated {} member(s): {} banned, {} failed, {} already banned this run",
            self.evaluated, self.banned, self.failed, self.skipped
        )
    }
}

/// Drives ban enforcement against one guild through the membership gateway.
pub struct EnforcementEngine {
    gateway: Arc<dyn MembershipGateway>,
    guild_id: GuildId,
    /// Members this process has already banned, and the reason used.
    banned_this_run: DashMap<UserId, Reason>,
}

impl EnforcementEngine {
    #[must_use]
    pub fn new(gateway: Arc<dyn MembershipGateway>, guild_id: GuildId) -> Self {
        Self {
            gateway,
            guild_id,
            banned_this_run: DashMap::new(),
        }
    }

    /// Full reconciliation: evaluate every guild member against every list.
    ///
    /// Used at startup and after every successful reload. Safe to repeat at
    /// any time: the run-local skip set keeps repeats from re-issuing calls
    /// for members already banned, while a member whose ban failed stays
    /// outside the set and is re-attempted on the next pass.
    ///
    /// # Errors
    /// Returns `MemberFetch` if the membership cannot be fetched; the caller
    /// logs it and skips the pass.
    pub async fn enforce_all(&self, snapshot: &BanListSnapshot) -> WardenResult<PassSummary> {
        let mut summary = PassSummary::new();
        if snapshot.is_empty() {
            info!(
                target: ENFORCEMENT_TARGET,
                pass_id = %summary.pass_id,
                "No ban lists loaded, nothing to enforce"
            );
            return Ok(summary);
        }

        let members = self.gateway.fetch_members(self.guild_id).await?;
        info!(
            target: ENFORCEMENT_TARGET,
            pass_id = %summary.pass_id,
            member_count = members.len(),
            reason_count = snapshot.reason_count(),
            "Reconciling guild membership against ban lists"
        );

        for member in &members {
            self.evaluate(snapshot, member, &mut summary).await;
        }

        info!(
            target: ENFORCEMENT_TARGET,
            pass_id = %summary.pass_id,
            outcome = %summary,
            "Enforcement pass complete"
        );
        Ok(summary)
    }

    /// Evaluate a single joining member against the current lists, banning
    /// on the first matching reason.
    ///
    /// Returns the matched reason if the member was on any list; the ban is
    /// attempted even if an earlier run banned them, since a banned member
    /// can only rejoin after being unbanned externally. Failures are logged
    /// and tolerated.
    pub async fn enforce_member(
        &self,
        snapshot: &BanListSnapshot,
        user_id: UserId,
        tag: &str,
    ) -> Option<Reason> {
        let reason = snapshot.first_match(user_id)?.clone();
        let audit_reason = audit_reason(&reason);

        match self.gateway.ban(self.guild_id, user_id, &audit_reason).await {
            Ok(()) => {
                self.banned_this_run.insert(user_id, reason.clone());
                info!(
                    target: ENFORCEMENT_TARGET,
                    %user_id,
                    tag,
                    %reason,
                    "Banned joining member from ban list"
                );
            }
            Err(err) => {
                error!(
                    target: ERROR_TARGET,
                    %user_id,
                    tag,
                    %reason,
                    error = %err,
                    "Failed to ban joining member"
                );
            }
        }
        Some(reason)
    }

    /// Evaluate one fetched member within a pass; at most one ban call.
    async fn evaluate(
        &self,
        snapshot: &BanListSnapshot,
        member: &GuildMember,
        summary: &mut PassSummary,
    ) {
        summary.evaluated += 1;
        let Some(reason) = snapshot.first_match(member.user_id) else {
            return;
        };
        if self.banned_this_run.contains_key(&member.user_id) {
            summary.skipped += 1;
            return;
        }

        let audit_reason = audit_reason(reason);
        match self
            .gateway
            .ban(self.guild_id, member.user_id, &audit_reason)
            .await
        {
            Ok(()) => {
                self.banned_this_run
                    .insert(member.user_id, reason.clone());
                summary.banned += 1;
                info!(
                    target: ENFORCEMENT_TARGET,
                    pass_id = %summary.pass_id,
                    user_id = %member.user_id,
                    tag = %member.tag,
                    %reason,
                    "Banned member from ban list"
                );
            }
            Err(err) => {
                summary.failed += 1;
                error!(
                    target: ERROR_TARGET,
                    pass_id = %summary.pass_id,
                    user_id = %member.user_id,
                    tag = %member.tag,
                    %reason,
                    error = %err,
                    "Failed to ban member, continuing with the batch"
                );
            }
        }
    }
}

/// Human-readable reason attached to the guild's own audit log.
fn audit_reason(reason: &Reason) -> String {
    format!("{AUDIT_TAG} - {reason}")
}
