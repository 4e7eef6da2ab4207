//! Warden service
//!
//! Wires the store, loader, watcher, and engine together: one full load and
//! reconciliation at startup, then a reload task that consumes debounced
//! change signals for the lifetime of the process. A failed load never
//! touches the store; a dead watcher is surfaced and join screening keeps
//! running against the last good lists.

use std::path::PathBuf;
use std::sync::Arc;

use serenity::all::GuildId;
use tokio::sync::mpsc::{self, Receiver};
use tracing::{error, info, warn};

use crate::engine::EnforcementEngine;
use crate::error::WardenResult;
use crate::gateway::MembershipGateway;
use crate::loader;
use crate::store::BanListStore;
use crate::watcher::{ChangeWatcher, ReloadRequest};
use crate::ERROR_TARGET;

/// Capacity of the reload request channel. Requests are already debounced;
/// a small buffer is plenty.
const RELOAD_CHANNEL_CAPACITY: usize = 16;

/// Owns the ban-list store and the enforcement engine for one guild.
#[derive(Clone)]
pub struct WardenService {
    store: BanListStore,
    engine: Arc<EnforcementEngine>,
    banlist_dir: PathBuf,
}

impl WardenService {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn MembershipGateway>,
        guild_id: GuildId,
        banlist_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store: BanListStore::new(),
            engine: Arc::new(EnforcementEngine::new(gateway, guild_id)),
            banlist_dir: banlist_dir.into(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &BanListStore {
        &self.store
    }

    #[must_use]
    pub fn engine(&self) -> &EnforcementEngine {
        &self.engine
    }

    /// One full load plus reconciliation pass, then start watching.
    ///
    /// A failed initial load leaves the store empty rather than aborting:
    /// the watcher may still deliver a later, loadable state of the
    /// directory, and join screening works against whatever is loaded.
    ///
    /// # Errors
    /// Returns `WatcherInit` if the filesystem watch cannot be installed.
    pub async fn startup(&self) -> WardenResult<()> {
        match loader::load_dir(&self.banlist_dir).await {
            Ok(snapshot) => {
                info!(
                    reasons = snapshot.reason_count(),
                    members = snapshot.member_count(),
                    "Loaded ban lists"
                );
                self.store.replace(snapshot);
            }
            Err(err) => {
                error!(
                    target: ERROR_TARGET,
                    error = %err,
                    "Initial ban-list load failed, starting with empty lists"
                );
            }
        }

        let current = self.store.current();
        if let Err(err) = self.engine.enforce_all(&current).await {
            error!(
                target: ERROR_TARGET,
                error = %err,
                "Startup reconciliation failed, skipping the pass"
            );
        }

        let (reload_tx, reload_rx) = mpsc::channel(RELOAD_CHANNEL_CAPACITY);

        // Ctrl-C ends the reload task cleanly; the gateway client shuts the
        // shards down on the same signal.
        let shutdown_tx = reload_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(ReloadRequest::Shutdown).await;
            }
        });

        ChangeWatcher::new(self.banlist_dir.clone()).spawn(reload_tx)?;

        let service = self.clone();
        tokio::spawn(async move {
            service.reload_task(reload_rx).await;
        });

        Ok(())
    }

    /// Consumes debounced reload requests until shutdown or watcher death.
    async fn reload_task(self, mut rx: Receiver<ReloadRequest>) {
        while let Some(request) = rx.recv().await {
            match request {
                ReloadRequest::Reload => self.reload_once().await,
                ReloadRequest::WatcherFailed(message) => {
                    error!(
                        target: ERROR_TARGET,
                        error = %message,
                        "Filesystem watch died; ban lists are frozen until restart"
                    );
                    break;
                }
                ReloadRequest::Shutdown => {
                    info!("Reload task shutting down");
                    break;
                }
            }
        }
    }

    /// One reload cycle: load, atomic swap, full enforcement pass.
    ///
    /// The pass re-evaluates everyone: the engine's run-local skip set keeps
    /// already-banned members from re-issuing calls, and a member whose
    /// earlier ban failed gets re-attempted here.
    pub(crate) async fn reload_once(&self) {
        match loader::load_dir(&self.banlist_dir).await {
            Ok(snapshot) => {
                info!(
                    reasons = snapshot.reason_count(),
                    members = snapshot.member_count(),
                    "Reloaded ban lists"
                );
                self.store.replace(snapshot);
                let current = self.store.current();
                if let Err(err) = self.engine.enforce_all(&current).await {
                    error!(
                        target: ERROR_TARGET,
                        error = %err,
                        "Post-reload enforcement failed, skipping the pass"
                    );
                }
            }
            Err(err) => {
                let retained = self.store.current();
                warn!(
                    target: ERROR_TARGET,
                    error = %err,
                    lists_loaded_at = %retained.loaded_at(),
                    "Ban-list reload failed, keeping the previous lists"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockMembershipGateway;
    use crate::store::Reason;
    use serenity::all::UserId;
    use std::fs;
    use tempfile::tempdir;

    const GUILD: u64 = 67890;

    fn service(gateway: MockMembershipGateway, dir: &std::path::Path) -> WardenService {
        WardenService::new(Arc::new(gateway), GuildId::new(GUILD), dir)
    }

    #[tokio::test]
    async fn test_reload_replaces_the_store() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("spam.txt"), "456\n").expect("write");

        let mut gateway = MockMembershipGateway::new();
        // The post-reload pass fetches membership; nobody on the roster
        // matches.
        gateway
            .expect_fetch_members()
            .returning(|_| Ok(Vec::new()));

        let service = service(gateway, dir.path());
        service.reload_once().await;

        assert!(service
            .store()
            .lookup(&Reason::from("spam"), UserId::new(456)));
    }

    #[tokio::test]
    async fn test_failed_ban_is_reattempted_on_the_next_reload() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("spam.txt"), "456\n").expect("write");

        let mut gateway = MockMembershipGateway::new();
        let roster = vec![crate::gateway::GuildMember::new(
            UserId::new(456),
            "intruder#0456",
        )];
        gateway
            .expect_fetch_members()
            .times(2)
            .returning(move |_| Ok(roster.clone()));
        // First attempt fails transiently; a second reload with the list
        // unchanged must still re-attempt the ban.
        let attempts = Arc::new(std::sync::Mutex::new(0u32));
        let counter = Arc::clone(&attempts);
        gateway.expect_ban().times(2).returning(move |_, _, _| {
            let mut calls = counter.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                Err(crate::error::WardenError::Other(
                    "connection reset".to_string(),
                ))
            } else {
                Ok(())
            }
        });

        let service = service(gateway, dir.path());
        service.reload_once().await;
        service.reload_once().await;

        assert_eq!(*attempts.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_the_previous_store() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("spam.txt"), "456\n").expect("write");

        let mut gateway = MockMembershipGateway::new();
        gateway
            .expect_fetch_members()
            .returning(|_| Ok(Vec::new()));

        let service = service(gateway, dir.path());
        service.reload_once().await;
        assert!(service
            .store()
            .lookup(&Reason::from("spam"), UserId::new(456)));

        // Directory disappears out from under the loader.
        let path = dir.path().to_path_buf();
        drop(dir);
        assert!(!path.exists());

        service.reload_once().await;
        assert!(
            service
                .store()
                .lookup(&Reason::from("spam"), UserId::new(456)),
            "previous store must survive a failed load"
        );
    }

    #[tokio::test]
    async fn test_unreadable_file_keeps_the_previous_store() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("spam.txt"), "456\n").expect("write");

        let mut gateway = MockMembershipGateway::new();
        // Only the first reload commits and runs a pass; the second fails
        // during the load, before any enforcement.
        gateway
            .expect_fetch_members()
            .times(1)
            .returning(|_| Ok(Vec::new()));

        let service = service(gateway, dir.path());
        service.reload_once().await;
        assert!(service
            .store()
            .lookup(&Reason::from("spam"), UserId::new(456)));

        // One file among several turns unreadable: the whole load fails and
        // nothing from it, not even the still-good files, is committed.
        fs::write(dir.path().join("raids.txt"), b"\xff\xfe\x00garbage").expect("write");
        service.reload_once().await;

        let current = service.store().current();
        assert!(current.contains(&Reason::from("spam"), UserId::new(456)));
        assert_eq!(current.reason_count(), 1, "no partial mapping committed");
    }

    #[tokio::test]
    async fn test_shutdown_request_stops_the_reload_task() {
        let dir = tempdir().expect("tempdir");
        let service = service(MockMembershipGateway::new(), dir.path());

        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(service.clone().reload_task(rx));

        tx.send(ReloadRequest::Shutdown).await.expect("send");
        task.await.expect("reload task");

        // Receiver side is gone once the task has exited.
        assert!(tx.send(ReloadRequest::Reload).await.is_err());
    }

    #[tokio::test]
    async fn test_startup_with_empty_directory() {
        let dir = tempdir().expect("tempdir");

        // Empty lists short-circuit the reconciliation pass, so no gateway
        // expectations are registered here.
        let gateway = MockMembershipGateway::new();
        let service = service(gateway, dir.path());

        service.startup().await.expect("startup");
        assert!(service.store().current().is_empty());
    }

    #[tokio::test]
    async fn test_startup_reconciles_existing_members() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("spam.txt"), "456\n").expect("write");

        let mut gateway = MockMembershipGateway::new();
        gateway.expect_fetch_members().times(1).returning(|_| {
            Ok(vec![crate::gateway::GuildMember::new(
                UserId::new(456),
                "intruder#0456",
            )])
        });
        gateway
            .expect_ban()
            .times(1)
            .returning(|_, user_id, audit| {
                assert_eq!(user_id.get(), 456);
                assert!(audit.contains("spam"));
                Ok(())
            });

        let service = service(gateway, dir.path());
        service.startup().await.expect("startup");
    }
}
