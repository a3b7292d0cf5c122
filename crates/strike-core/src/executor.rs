//! Role-transition executor
//!
//! Applies a demotion to a member: revoke the configured demotion roles the
//! member holds, never the protected role, then grant the protected role if it
//! is missing. Each removal is attempted on its own; a failure is recorded and
//! the remaining removals still run. Nothing is rolled back and nothing is
//! retried.

use crate::error::PlatformError;
use crate::platform::{bounded, GuildPlatform, DEFAULT_CALL_TIMEOUT};
use crate::types::{RoleId, SubjectId};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Roles to revoke: held by the member, listed for demotion, and not protected
#[must_use]
pub fn roles_to_remove(
    current: &BTreeSet<RoleId>,
    demote_roles: &BTreeSet<RoleId>,
    protected_role: Option<&RoleId>,
) -> BTreeSet<RoleId> {
    current
        .intersection(demote_roles)
        .filter(|role| Some(*role) != protected_role)
        .cloned()
        .collect()
}

/// What happened to the protected role during a demotion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtectedRoleChange {
    /// Granted by this demotion
    Added,
    /// Member already held it
    AlreadyPresent,
    /// No protected role configured
    NotConfigured,
    /// Grant failed
    Failed(PlatformError),
}

/// Result of a demotion attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemotionOutcome {
    /// Member demoted
    pub subject: SubjectId,
    /// Roles successfully revoked
    pub removed: Vec<RoleId>,
    /// Roles that could not be revoked
    pub failed: Vec<(RoleId, PlatformError)>,
    /// Protected role handling
    pub protected_role: ProtectedRoleChange,
}

impl DemotionOutcome {
    /// Whether every step succeeded
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !matches!(self.protected_role, ProtectedRoleChange::Failed(_))
    }
}

/// Applies demotions through the platform
#[derive(Clone)]
pub struct RoleTransitionExecutor {
    platform: Arc<dyn GuildPlatform>,
    call_timeout: Duration,
}

impl std::fmt::Debug for RoleTransitionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleTransitionExecutor")
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl RoleTransitionExecutor {
    /// Create executor with the default call timeout
    #[inline]
    #[must_use]
    pub fn new(platform: Arc<dyn GuildPlatform>) -> Self {
        Self {
            platform,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// With call timeout
    #[inline]
    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Demote a member
    ///
    /// # Errors
    /// Returns `PlatformError` only if the member's current roles cannot be
    /// read; nothing has been changed in that case. Failures of individual
    /// role changes are reported in the [`DemotionOutcome`].
    pub async fn demote(
        &self,
        subject: &SubjectId,
        demote_roles: &BTreeSet<RoleId>,
        protected_role: Option<&RoleId>,
    ) -> Result<DemotionOutcome, PlatformError> {
        let current = bounded(
            "fetch member",
            self.call_timeout,
            self.platform.member_roles(subject),
        )
        .await?;

        let mut outcome = DemotionOutcome {
            subject: subject.clone(),
            removed: Vec::new(),
            failed: Vec::new(),
            protected_role: ProtectedRoleChange::NotConfigured,
        };

        for role in roles_to_remove(&current, demote_roles, protected_role) {
            match bounded(
                "remove role",
                self.call_timeout,
                self.platform.remove_role(subject, &role),
            )
            .await
            {
                Ok(()) => outcome.removed.push(role),
                Err(e) => {
                    tracing::error!(%subject, %role, error = %e, "role removal failed");
                    outcome.failed.push((role, e));
                }
            }
        }

        if let Some(protected) = protected_role {
            outcome.protected_role = if current.contains(protected) {
                ProtectedRoleChange::AlreadyPresent
            } else {
                match bounded(
                    "add role",
                    self.call_timeout,
                    self.platform.add_role(subject, protected),
                )
                .await
                {
                    Ok(()) => ProtectedRoleChange::Added,
                    Err(e) => {
                        tracing::error!(%subject, role = %protected, error = %e, "protected role grant failed");
                        ProtectedRoleChange::Failed(e)
                    }
                }
            };
        }

        if outcome.is_complete() {
            tracing::info!(%subject, removed = outcome.removed.len(), "member demoted");
        } else {
            tracing::warn!(
                %subject,
                removed = outcome.removed.len(),
                failed = outcome.failed.len(),
                "member partially demoted"
            );
        }

        Ok(outcome)
    }
}
