pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod loader;
pub mod logging;
pub mod service;
pub mod store;
pub mod watcher;

// Customize these constants for your warden
pub const BOT_NAME: &str = "spectrum_warden";
pub const ENFORCEMENT_TARGET: &str = "spectrum_warden::enforcement";
pub const ERROR_TARGET: &str = "spectrum_warden::error";
pub const EVENT_TARGET: &str = "spectrum_warden::handlers";
pub const CONSOLE_TARGET: &str = "spectrum_warden";

/// Fixed tag prepended to every ban's audit-log reason.
pub const AUDIT_TAG: &str = "[Spectrum]";

pub use config::WardenConfig;
pub use engine::{EnforcementEngine, PassSummary};
pub use error::{WardenError, WardenResult};
pub use gateway::{DiscordGateway, GuildMember, MembershipGateway};
pub use service::WardenService;
pub use store::{BanListSnapshot, BanListStore, Reason};
pub use watcher::{ChangeWatcher, DEBOUNCE_WINDOW, ReloadRequest};

pub type Error = Box<dyn std::error::Error + Send + Sync>;
