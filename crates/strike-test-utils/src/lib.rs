//! Testing utilities for the strike workspace
//!
//! Shared fixtures: a staffed configuration, actors holding each permission,
//! a fault-injecting guild, and a dispatcher wired to a temporary directory.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strike_core::{
    Actor, ChannelId, Command, CommandError, ConfigStore, Configuration, Dispatcher,
    GuildPlatform, InMemoryGuild, Invocation, LedgerDocument, Member, OutboundMessage, Outcome,
    PlatformError, RoleId, SubjectId, WarningLedger,
};
use strike_store::JsonDocument;
use tempfile::TempDir;

pub const MOD_ROLE: &str = "role-mod";
pub const LEAD_ROLE: &str = "role-lead";
pub const ADMIN_ROLE: &str = "role-admin";
pub const STAFF_ROLE: &str = "role-staff";
pub const HELPER_ROLE: &str = "role-helper";
pub const PROTECTED_ROLE: &str = "role-family";
pub const LOG_CHANNEL: &str = "chan-log";

fn roles(ids: &[&str]) -> BTreeSet<RoleId> {
    ids.iter().map(|id| RoleId::new(*id)).collect()
}

/// Configuration with every permission set, a warning channel, demotion roles
/// and a protected role that is itself listed for demotion
pub fn staffed_config() -> Configuration {
    Configuration {
        warning_channel_id: Some(ChannelId::new(LOG_CHANNEL)),
        warn_permission_roles: roles(&[MOD_ROLE]),
        reset_permission_roles: roles(&[LEAD_ROLE]),
        config_permission_roles: roles(&[ADMIN_ROLE]),
        demote_roles: roles(&[STAFF_ROLE, HELPER_ROLE, PROTECTED_ROLE]),
        protected_role: Some(RoleId::new(PROTECTED_ROLE)),
        embed_footer: Some("Staff Team".to_string()),
        ..Configuration::default()
    }
}

pub fn moderator() -> Actor {
    Actor::new("actor-mod", "mod#0001").with_roles([MOD_ROLE])
}

pub fn lead() -> Actor {
    Actor::new("actor-lead", "lead#0002").with_roles([LEAD_ROLE])
}

pub fn admin() -> Actor {
    Actor::new("actor-admin", "admin#0003").with_roles([ADMIN_ROLE])
}

pub fn outsider() -> Actor {
    Actor::new("actor-out", "random#0004")
}

pub fn staff_member(id: &str) -> Member {
    Member::new(id, format!("staff#{id}"))
}

pub fn warn(member: &Member, reason: &str) -> Command {
    Command::Warn {
        user: member.clone(),
        reason: reason.to_string(),
    }
}

/// Guild double with injectable faults
///
/// Wraps an [`InMemoryGuild`]; role removals for selected roles are rejected,
/// the warning channel can be taken down or refuse selected texts, and every
/// call can be delayed.
#[derive(Debug, Default)]
pub struct FlakyGuild {
    inner: InMemoryGuild,
    failing_removals: RwLock<BTreeSet<RoleId>>,
    channel_down: AtomicBool,
    refused_texts: RwLock<Vec<String>>,
    latency: Mutex<Option<Duration>>,
    add_role_calls: AtomicUsize,
    remove_role_calls: AtomicUsize,
}

impl FlakyGuild {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryGuild {
        &self.inner
    }

    pub fn insert_member(&self, subject: &str, roles: &[&str]) {
        self.inner.insert_member(subject, roles.iter().copied());
    }

    pub fn roles_of(&self, subject: &str) -> BTreeSet<RoleId> {
        self.inner
            .roles_of(&SubjectId::new(subject))
            .unwrap_or_default()
    }

    pub fn fail_removal_of(&self, role: &str) {
        self.failing_removals.write().insert(RoleId::new(role));
    }

    pub fn take_channel_down(&self) {
        self.channel_down.store(true, Ordering::SeqCst);
    }

    /// Reject plain-text posts containing `fragment`
    pub fn refuse_texts_containing(&self, fragment: &str) {
        self.refused_texts.write().push(fragment.to_string());
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn add_role_calls(&self) -> usize {
        self.add_role_calls.load(Ordering::SeqCst)
    }

    pub fn remove_role_calls(&self) -> usize {
        self.remove_role_calls.load(Ordering::SeqCst)
    }

    /// Plain-text messages posted so far
    pub fn texts(&self) -> Vec<String> {
        self.inner
            .sent()
            .into_iter()
            .filter_map(|(_, message)| message.content)
            .collect()
    }

    async fn delay(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl GuildPlatform for FlakyGuild {
    async fn member_roles(&self, subject: &SubjectId) -> Result<BTreeSet<RoleId>, PlatformError> {
        self.delay().await;
        self.inner.member_roles(subject).await
    }

    async fn remove_role(&self, subject: &SubjectId, role: &RoleId) -> Result<(), PlatformError> {
        self.delay().await;
        self.remove_role_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_removals.read().contains(role) {
            return Err(PlatformError::rejected("remove role", "missing permissions"));
        }
        self.inner.remove_role(subject, role).await
    }

    async fn add_role(&self, subject: &SubjectId, role: &RoleId) -> Result<(), PlatformError> {
        self.delay().await;
        self.add_role_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.add_role(subject, role).await
    }

    async fn send_message(
        &self,
        channel: &ChannelId,
        message: &OutboundMessage,
    ) -> Result<(), PlatformError> {
        self.delay().await;
        if self.channel_down.load(Ordering::SeqCst) {
            return Err(PlatformError::not_found(format!("channel {channel}")));
        }
        if let Some(text) = &message.content {
            if self.refused_texts.read().iter().any(|f| text.contains(f.as_str())) {
                return Err(PlatformError::rejected("post message", "missing access"));
            }
        }
        self.inner.send_message(channel, message).await
    }
}

/// Dispatcher over documents in a temporary directory
pub struct TestBot {
    pub dir: TempDir,
    pub guild: Arc<FlakyGuild>,
    pub dispatcher: Dispatcher,
}

impl TestBot {
    /// Bot with [`staffed_config`] and an empty guild
    pub async fn start() -> Self {
        Self::with_guild(staffed_config(), Arc::new(FlakyGuild::new())).await
    }

    pub async fn with_config(config: Configuration) -> Self {
        Self::with_guild(config, Arc::new(FlakyGuild::new())).await
    }

    pub async fn with_guild(config: Configuration, guild: Arc<FlakyGuild>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config_doc = JsonDocument::new(dir.path().join("config.json"));
        config_doc.write(&config).await.unwrap();

        let config = ConfigStore::open(config_doc).await.unwrap();
        let ledger = WarningLedger::open(JsonDocument::new(dir.path().join("warnings.json")))
            .await
            .unwrap();
        let platform: Arc<dyn GuildPlatform> = guild.clone();
        let dispatcher = Dispatcher::new(Arc::new(ledger), Arc::new(config), platform);

        Self {
            dir,
            guild,
            dispatcher,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.dispatcher = self.dispatcher.with_call_timeout(timeout);
        self
    }

    pub fn warnings_path(&self) -> PathBuf {
        self.dir.path().join("warnings.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.json")
    }

    pub async fn run(&self, actor: Actor, command: Command) -> Result<Outcome, CommandError> {
        self.dispatcher
            .dispatch(&Invocation::new(actor, command))
            .await
    }

    /// Ledger document as currently on disk
    pub async fn warnings_on_disk(&self) -> LedgerDocument {
        JsonDocument::<LedgerDocument>::new(self.warnings_path())
            .load()
            .await
            .unwrap()
    }

    /// Configuration document as currently on disk
    pub async fn config_on_disk(&self) -> Configuration {
        JsonDocument::<Configuration>::new(self.config_path())
            .load()
            .await
            .unwrap()
    }
}
