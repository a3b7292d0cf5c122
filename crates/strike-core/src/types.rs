//! Core types for Strike
//!
//! Defines the fundamental types shared across the engine:
//! - Platform identifiers (members, roles, channels)
//! - Actors and warned members
//! - Warning records
//! - Invocation identity

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use ulid::Ulid;

macro_rules! platform_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw platform identifier
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Raw identifier
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

platform_id!(
    /// Stable identifier of a platform member (the ledger key)
    SubjectId
);

platform_id!(
    /// Platform role identifier
    RoleId
);

platform_id!(
    /// Platform channel identifier
    ChannelId
);

impl SubjectId {
    /// Mention markup for this member
    #[inline]
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

impl RoleId {
    /// Mention markup for this role
    #[inline]
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<@&{}>", self.0)
    }
}

/// Unique invocation identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InvocationId(pub Ulid);

impl InvocationId {
    /// Generate new invocation ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The member invoking a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Actor member ID
    pub id: SubjectId,
    /// Display tag, recorded as the warning issuer
    pub tag: String,
    /// Roles the actor currently holds
    #[serde(default)]
    pub roles: BTreeSet<RoleId>,
}

impl Actor {
    /// Create actor without roles
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<SubjectId>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            roles: BTreeSet::new(),
        }
    }

    /// With roles
    #[inline]
    #[must_use]
    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RoleId>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }
}

/// A member named as the target of a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Member ID
    pub id: SubjectId,
    /// Display tag
    pub tag: String,
    /// Avatar URL, when the platform supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Member {
    /// Create member reference
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<SubjectId>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            avatar_url: None,
        }
    }

    /// With avatar
    #[inline]
    #[must_use]
    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }
}

/// Format used for the `date` field of new records
pub const RECORD_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// One warning issued to a member
///
/// Immutable once appended to the ledger. The `date` field is kept as the
/// display string it was written with, since older documents carry
/// locale-formatted dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningRecord {
    /// Why the warning was issued
    pub reason: String,
    /// When the warning was issued
    pub date: String,
    /// Tag of the issuing staff member
    pub issuer: String,
}

impl WarningRecord {
    /// Create a record stamped at `issued_at`
    #[must_use]
    pub fn new(reason: impl Into<String>, issuer: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            reason: reason.into(),
            date: issued_at.format(RECORD_DATE_FORMAT).to_string(),
            issuer: issuer.into(),
        }
    }

    /// Issue time, if the date was written in the current format
    #[must_use]
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(&self.date, RECORD_DATE_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}
