//! Chat platform boundary
//!
//! The engine never talks to the chat platform directly. Role membership
//! changes and channel posts go through [`GuildPlatform`], and every call is
//! bounded by [`bounded`] so a stalled platform surfaces as
//! [`PlatformError::Timeout`] instead of hanging a command.

use crate::error::PlatformError;
use crate::message::OutboundMessage;
use crate::types::{ChannelId, RoleId, SubjectId};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::time::Duration;

/// Default bound on a single platform call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Membership and messaging operations the engine needs from the platform
#[async_trait]
pub trait GuildPlatform: Send + Sync {
    /// Roles the member currently holds
    async fn member_roles(&self, subject: &SubjectId) -> Result<BTreeSet<RoleId>, PlatformError>;

    /// Revoke one role from the member
    async fn remove_role(&self, subject: &SubjectId, role: &RoleId) -> Result<(), PlatformError>;

    /// Grant one role to the member
    async fn add_role(&self, subject: &SubjectId, role: &RoleId) -> Result<(), PlatformError>;

    /// Post a message to a channel
    async fn send_message(
        &self,
        channel: &ChannelId,
        message: &OutboundMessage,
    ) -> Result<(), PlatformError>;
}

/// Run a platform call with an upper time bound
///
/// # Errors
/// Returns `PlatformError::Timeout` when `limit` elapses first, otherwise the
/// call's own result
pub async fn bounded<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T, PlatformError>
where
    F: Future<Output = Result<T, PlatformError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(operation, limit_ms = limit.as_millis() as u64, "platform call timed out");
            Err(PlatformError::Timeout {
                operation,
                after: limit,
            })
        }
    }
}

/// In-process guild: a membership table and an outbox
///
/// Used by the console intake and as the base of test doubles. Unknown
/// members are reported as not found; every channel accepts messages.
#[derive(Debug, Default)]
pub struct InMemoryGuild {
    members: RwLock<BTreeMap<SubjectId, BTreeSet<RoleId>>>,
    outbox: Mutex<Vec<(ChannelId, OutboundMessage)>>,
}

impl InMemoryGuild {
    /// Create empty guild
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create guild from a membership snapshot
    #[must_use]
    pub fn from_members(members: BTreeMap<SubjectId, BTreeSet<RoleId>>) -> Self {
        Self {
            members: RwLock::new(members),
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// Add or replace a member
    pub fn insert_member<I, R>(&self, subject: impl Into<SubjectId>, roles: I)
    where
        I: IntoIterator<Item = R>,
        R: Into<RoleId>,
    {
        self.members
            .write()
            .insert(subject.into(), roles.into_iter().map(Into::into).collect());
    }

    /// Roles held by a member, if known
    #[must_use]
    pub fn roles_of(&self, subject: &SubjectId) -> Option<BTreeSet<RoleId>> {
        self.members.read().get(subject).cloned()
    }

    /// Messages posted so far
    #[must_use]
    pub fn sent(&self) -> Vec<(ChannelId, OutboundMessage)> {
        self.outbox.lock().clone()
    }

    fn with_member<T>(
        &self,
        subject: &SubjectId,
        f: impl FnOnce(&mut BTreeSet<RoleId>) -> T,
    ) -> Result<T, PlatformError> {
        let mut members = self.members.write();
        let roles = members
            .get_mut(subject)
            .ok_or_else(|| PlatformError::not_found(format!("member {subject}")))?;
        Ok(f(roles))
    }
}

#[async_trait]
impl GuildPlatform for InMemoryGuild {
    async fn member_roles(&self, subject: &SubjectId) -> Result<BTreeSet<RoleId>, PlatformError> {
        self.roles_of(subject)
            .ok_or_else(|| PlatformError::not_found(format!("member {subject}")))
    }

    async fn remove_role(&self, subject: &SubjectId, role: &RoleId) -> Result<(), PlatformError> {
        self.with_member(subject, |roles| {
            roles.remove(role);
        })
    }

    async fn add_role(&self, subject: &SubjectId, role: &RoleId) -> Result<(), PlatformError> {
        self.with_member(subject, |roles| {
            roles.insert(role.clone());
        })
    }

    async fn send_message(
        &self,
        channel: &ChannelId,
        message: &OutboundMessage,
    ) -> Result<(), PlatformError> {
        tracing::info!(
            %channel,
            content = message.content.as_deref().unwrap_or_default(),
            embeds = message.embeds.len(),
            "message posted"
        );
        self.outbox.lock().push((channel.clone(), message.clone()));
        Ok(())
    }
}
