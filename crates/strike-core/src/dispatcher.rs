//! Command dispatcher
//!
//! Routes an invocation to its handler:
//!
//! ```text
//! permission check ──► input validation ──► ledger / config mutation (write-through)
//!                                              │
//!                                              ▼
//!                               escalation ──► demotion ──► channel posts
//! ```
//!
//! Commands targeting the same member are serialized on a per-member lock, so
//! append, evaluate and demote run as one step with respect to that member.
//! Commands on other members proceed independently.

use crate::command::{Command, CommandKind};
use crate::config::{ConfigKey, ConfigStore, Configuration};
use crate::error::{CommandError, PlatformError};
use crate::escalation::{EscalationDecision, EscalationPolicy};
use crate::executor::{DemotionOutcome, RoleTransitionExecutor};
use crate::ledger::WarningLedger;
use crate::message::{self, OutboundMessage, Reply};
use crate::permission::is_authorized;
use crate::platform::{bounded, GuildPlatform, DEFAULT_CALL_TIMEOUT};
use crate::types::{Actor, InvocationId, Member, SubjectId, WarningRecord};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::Instrument;

/// One command invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Invocation ID
    pub id: InvocationId,
    /// Invoking member
    pub actor: Actor,
    /// Parsed command
    pub command: Command,
    /// When the platform received the command
    pub issued_at: DateTime<Utc>,
}

impl Invocation {
    /// Create invocation stamped now
    #[inline]
    #[must_use]
    pub fn new(actor: Actor, command: Command) -> Self {
        Self {
            id: InvocationId::new(),
            actor,
            command,
            issued_at: Utc::now(),
        }
    }

    /// With explicit timestamp
    #[inline]
    #[must_use]
    pub fn at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.issued_at = issued_at;
        self
    }
}

/// Delivery of a message to the warning channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Message posted
    Posted,
    /// No warning channel configured
    NotConfigured,
    /// Post failed
    Failed(PlatformError),
}

/// Everything that happened for a `warn`
#[derive(Debug, Clone)]
pub struct WarnReport {
    /// Member warned
    pub subject: Member,
    /// Record appended
    pub record: WarningRecord,
    /// Escalation decision for the new count
    pub decision: EscalationDecision,
    /// Warning card delivery
    pub log_delivery: Delivery,
    /// Demotion result, when the threshold was crossed
    pub demotion: Option<Result<DemotionOutcome, PlatformError>>,
    /// Demotion notice delivery, when a demotion ran
    pub notice_delivery: Option<Delivery>,
}

/// Result of a successful command
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Warning recorded
    Warned(WarnReport),
    /// Warnings listed
    Listed {
        subject: Member,
        records: Vec<WarningRecord>,
    },
    /// Warnings cleared
    Reset { subject: Member, cleared: usize },
    /// Configuration key replaced
    ConfigUpdated(ConfigKey),
}

/// Permission-gated command router
pub struct Dispatcher {
    ledger: Arc<WarningLedger>,
    config: Arc<ConfigStore>,
    platform: Arc<dyn GuildPlatform>,
    executor: RoleTransitionExecutor,
    policy: EscalationPolicy,
    call_timeout: Duration,
    subject_locks: DashMap<SubjectId, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("policy", &self.policy)
            .field("call_timeout", &self.call_timeout)
            .field("locked_subjects", &self.subject_locks.len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create dispatcher over shared state and a platform
    #[must_use]
    pub fn new(
        ledger: Arc<WarningLedger>,
        config: Arc<ConfigStore>,
        platform: Arc<dyn GuildPlatform>,
    ) -> Self {
        Self {
            executor: RoleTransitionExecutor::new(Arc::clone(&platform)),
            ledger,
            config,
            platform,
            policy: EscalationPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            subject_locks: DashMap::new(),
        }
    }

    /// With escalation policy
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: EscalationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// With bound on each platform call
    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self.executor =
            RoleTransitionExecutor::new(Arc::clone(&self.platform)).with_call_timeout(call_timeout);
        self
    }

    /// Ledger handle
    #[inline]
    #[must_use]
    pub fn ledger(&self) -> &WarningLedger {
        &self.ledger
    }

    /// Configuration handle
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Handle an invocation and compose the reply
    ///
    /// Never fails: errors become their user-facing reply.
    pub async fn handle(&self, invocation: Invocation) -> Reply {
        match self.dispatch(&invocation).await {
            Ok(outcome) => message::reply_for(&outcome, &self.config.snapshot()),
            Err(e) => message::reply_for_error(&e),
        }
    }

    /// Run an invocation
    ///
    /// # Errors
    /// - `CommandError::Unauthorized` if the actor holds none of the required roles
    /// - `CommandError::MalformedInput` if an input is rejected
    /// - `CommandError::Persistence` if the mutation could not be written
    pub async fn dispatch(&self, invocation: &Invocation) -> Result<Outcome, CommandError> {
        let kind = invocation.command.kind();
        let span = tracing::info_span!(
            "command",
            id = %invocation.id,
            command = %kind,
            actor = %invocation.actor.id,
            subject = invocation.command.target().map(|m| m.id.as_str()),
        );

        async {
            let result = self.route(invocation, kind).await;
            match &result {
                Ok(_) => tracing::debug!("command completed"),
                Err(e @ CommandError::Unauthorized { .. }) => {
                    tracing::warn!(error = %e, "command refused");
                }
                Err(e) if e.is_terminal() => tracing::info!(error = %e, "command rejected"),
                Err(e) => tracing::error!(error = %e, "command failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn route(&self, invocation: &Invocation, kind: CommandKind) -> Result<Outcome, CommandError> {
        let config = self.config.snapshot();
        if !is_authorized(kind.permission(), &invocation.actor.roles, &config) {
            return Err(CommandError::Unauthorized { command: kind });
        }

        match &invocation.command {
            Command::Warn { user, reason } => {
                let reason = reason.trim();
                if reason.is_empty() {
                    return Err(CommandError::malformed("reason", "must not be empty"));
                }
                let record = WarningRecord::new(reason, invocation.actor.tag.clone(), invocation.issued_at);
                self.serialized(&user.id, self.warn(user, record))
                    .await
                    .map(Outcome::Warned)
            }
            Command::Warnings { user } => Ok(Outcome::Listed {
                subject: user.clone(),
                records: self.ledger.list(&user.id),
            }),
            Command::ResetWarnings { user } => {
                let cleared = self
                    .serialized(&user.id, self.ledger.reset(&user.id))
                    .await?;
                tracing::info!(cleared, "warnings reset");
                Ok(Outcome::Reset {
                    subject: user.clone(),
                    cleared,
                })
            }
            Command::SetEmbedIcon { .. }
            | Command::SetWarningChannel { .. }
            | Command::SetWarnPermission { .. }
            | Command::SetResetPermission { .. }
            | Command::SetConfigPermission { .. } => self.update_config(&invocation.command).await,
        }
    }

    async fn update_config(&self, command: &Command) -> Result<Outcome, CommandError> {
        let Some(update) = command.config_update() else {
            return Err(CommandError::UnknownCommand(command.kind().to_string()));
        };
        let update = update?;
        let key = update.key();
        self.config.update(update).await?;
        Ok(Outcome::ConfigUpdated(key))
    }

    /// Caller holds the subject's lock
    async fn warn(&self, subject: &Member, record: WarningRecord) -> Result<WarnReport, CommandError> {
        let count = self.ledger.append(&subject.id, record.clone()).await?;
        let decision = self.policy.evaluate(count);
        tracing::info!(count, severity = ?decision.severity, demote = decision.triggers_demotion, "warning recorded");

        // read after the append so the card reflects current assets
        let config = self.config.snapshot();
        let card = message::warning_log_message(subject, &record, &decision, &config);
        let log_delivery = self.post(&config, &card).await;

        let (demotion, notice_delivery) = if decision.triggers_demotion {
            let outcome = self
                .executor
                .demote(&subject.id, &config.demote_roles, config.protected_role.as_ref())
                .await;
            let notice = match &outcome {
                Ok(demotion) => {
                    let text = OutboundMessage::text(message::demotion_report(demotion));
                    Some(self.post(&config, &text).await)
                }
                Err(_) => None,
            };
            (Some(outcome), notice)
        } else {
            (None, None)
        };

        Ok(WarnReport {
            subject: subject.clone(),
            record,
            decision,
            log_delivery,
            demotion,
            notice_delivery,
        })
    }

    async fn post(&self, config: &Configuration, msg: &OutboundMessage) -> Delivery {
        let Some(channel) = &config.warning_channel_id else {
            tracing::warn!("no warning channel configured");
            return Delivery::NotConfigured;
        };

        match bounded(
            "post to warning channel",
            self.call_timeout,
            self.platform.send_message(channel, msg),
        )
        .await
        {
            Ok(()) => Delivery::Posted,
            Err(e) => {
                tracing::error!(%channel, error = %e, "warning channel post failed");
                Delivery::Failed(e)
            }
        }
    }

    /// Run `work` while holding the subject's lock
    ///
    /// The lock entry is dropped once no other command holds or waits on it.
    async fn serialized<T>(&self, subject: &SubjectId, work: impl Future<Output = T>) -> T {
        let lock = Arc::clone(
            self.subject_locks
                .entry(subject.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );

        let result = {
            let _guard = lock.lock().await;
            work.await
        };

        drop(lock);
        self.subject_locks
            .remove_if(subject, |_, lock| Arc::strong_count(lock) == 1);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigUpdate;
    use crate::platform::InMemoryGuild;
    use crate::types::{ChannelId, RoleId};
    use strike_store::JsonDocument;

    struct Harness {
        _dir: tempfile::TempDir,
        guild: Arc<InMemoryGuild>,
        dispatcher: Dispatcher,
    }

    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let ledger = WarningLedger::open(JsonDocument::new(dir.path().join("warnings.json")))
            .await
            .unwrap();
        let config = ConfigStore::open(JsonDocument::new(dir.path().join("config.json")))
            .await
            .unwrap();
        config
            .update(ConfigUpdate::WarnPermission([RoleId::new("mods")].into_iter().collect()))
            .await
            .unwrap();
        config
            .update(ConfigUpdate::WarningChannel(ChannelId::new("log")))
            .await
            .unwrap();

        let guild = Arc::new(InMemoryGuild::new());
        guild.insert_member("42", ["staff"]);
        let dispatcher = Dispatcher::new(Arc::new(ledger), Arc::new(config), guild.clone());

        Harness {
            _dir: dir,
            guild,
            dispatcher,
        }
    }

    fn moderator() -> Actor {
        Actor::new("1", "mod#0001").with_roles(["mods"])
    }

    fn warn(reason: &str) -> Command {
        Command::Warn {
            user: Member::new("42", "staff#0042"),
            reason: reason.into(),
        }
    }

    #[tokio::test]
    async fn unauthorized_warn_changes_nothing() {
        let h = harness().await;
        let outsider = Actor::new("2", "rando#0002").with_roles(["members"]);

        let err = h
            .dispatcher
            .dispatch(&Invocation::new(outsider, warn("spam")))
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Unauthorized { command: CommandKind::Warn }));
        assert_eq!(h.dispatcher.ledger().count(&SubjectId::new("42")), 0);
        assert!(h.guild.sent().is_empty());
    }

    #[tokio::test]
    async fn warn_posts_card_to_channel() {
        let h = harness().await;

        let outcome = h
            .dispatcher
            .dispatch(&Invocation::new(moderator(), warn("spam")))
            .await
            .unwrap();

        let Outcome::Warned(report) = outcome else {
            panic!("expected warn outcome");
        };
        assert_eq!(report.decision.tier, 1);
        assert_eq!(report.log_delivery, Delivery::Posted);
        assert!(report.demotion.is_none());
        assert_eq!(report.record.issuer, "mod#0001");

        let sent = h.guild.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ChannelId::new("log"));
    }

    #[tokio::test]
    async fn blank_reason_is_rejected() {
        let h = harness().await;

        let err = h
            .dispatcher
            .dispatch(&Invocation::new(moderator(), warn("   ")))
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::MalformedInput { field: "reason", .. }));
        assert_eq!(h.dispatcher.ledger().count(&SubjectId::new("42")), 0);
    }

    #[tokio::test]
    async fn third_warning_demotes() {
        let h = harness().await;
        for reason in ["spam", "late", "AFK"] {
            h.dispatcher
                .dispatch(&Invocation::new(moderator(), warn(reason)))
                .await
                .unwrap();
        }

        // demote set is empty in this harness; only the notice is observable
        let notices = h
            .guild
            .sent()
            .into_iter()
            .filter(|(_, m)| m.content.as_deref().is_some_and(|c| c.starts_with("🔴")))
            .count();
        assert_eq!(notices, 1);
    }

    #[tokio::test]
    async fn subject_locks_are_released() {
        let h = harness().await;

        let first_inv = Invocation::new(moderator(), warn("spam"));
        let second_inv = Invocation::new(moderator(), warn("late"));
        let (first, second) = tokio::join!(
            h.dispatcher.dispatch(&first_inv),
            h.dispatcher.dispatch(&second_inv),
        );
        first.unwrap();
        second.unwrap();

        assert_eq!(h.dispatcher.ledger().count(&SubjectId::new("42")), 2);
        assert!(h.dispatcher.subject_locks.is_empty());
    }

    #[tokio::test]
    async fn warnings_is_public() {
        let h = harness().await;
        let nobody = Actor::new("3", "nobody#0003");

        let outcome = h
            .dispatcher
            .dispatch(&Invocation::new(
                nobody,
                Command::Warnings {
                    user: Member::new("42", "staff#0042"),
                },
            ))
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Listed { ref records, .. } if records.is_empty()));
    }

    #[tokio::test]
    async fn handle_renders_unauthorized_reply() {
        let h = harness().await;

        let reply = h
            .dispatcher
            .handle(Invocation::new(
                Actor::new("2", "x#2"),
                Command::SetEmbedIcon { url: "u".into() },
            ))
            .await;

        assert!(reply.ephemeral);
        assert_eq!(
            reply.content.as_deref(),
            Some("❌ You do not have permission to change config.")
        );
    }

    #[tokio::test]
    async fn missing_channel_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = WarningLedger::open(JsonDocument::new(dir.path().join("w.json")))
            .await
            .unwrap();
        let config = ConfigStore::open(JsonDocument::new(dir.path().join("c.json")))
            .await
            .unwrap();
        config
            .update(ConfigUpdate::WarnPermission([RoleId::new("mods")].into_iter().collect()))
            .await
            .unwrap();
        let guild = Arc::new(InMemoryGuild::new());
        guild.insert_member("42", ["staff"]);
        let dispatcher = Dispatcher::new(Arc::new(ledger), Arc::new(config), guild.clone());

        let Outcome::Warned(report) = dispatcher
            .dispatch(&Invocation::new(moderator(), warn("spam")))
            .await
            .unwrap()
        else {
            panic!("expected warn outcome");
        };
        assert_eq!(report.log_delivery, Delivery::NotConfigured);
        assert!(guild.sent().is_empty());
    }
}
