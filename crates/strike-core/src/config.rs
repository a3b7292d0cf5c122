//! Persisted bot configuration
//!
//! [`Configuration`] is the process-wide settings record (permission role
//! sets, warning channel, demotion roles, card assets). [`ConfigStore`] owns
//! the live value and its document; every mutation is persisted before it
//! becomes visible.

use crate::types::{ChannelId, RoleId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use strike_store::{JsonDocument, StoreError};
use tokio::sync::Mutex;

/// Bot configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    /// Thumbnail on warning cards
    pub embed_icon: Option<String>,
    /// Banner image on warning cards
    pub embed_banner: Option<String>,
    /// Footer text on cards
    pub embed_footer: Option<String>,
    /// Channel receiving warning cards and demotion notices
    pub warning_channel_id: Option<ChannelId>,
    /// Roles allowed to issue warnings
    pub warn_permission_roles: BTreeSet<RoleId>,
    /// Roles allowed to reset warnings
    pub reset_permission_roles: BTreeSet<RoleId>,
    /// Roles allowed to change configuration
    pub config_permission_roles: BTreeSet<RoleId>,
    /// Roles revoked on demotion
    pub demote_roles: BTreeSet<RoleId>,
    /// Role granted on demotion and never revoked
    pub protected_role: Option<RoleId>,
}

impl Configuration {
    /// Create empty configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a field update
    pub fn apply(&mut self, update: ConfigUpdate) {
        match update {
            ConfigUpdate::EmbedIcon(url) => self.embed_icon = Some(url),
            ConfigUpdate::WarningChannel(channel) => self.warning_channel_id = Some(channel),
            ConfigUpdate::WarnPermission(roles) => self.warn_permission_roles = roles,
            ConfigUpdate::ResetPermission(roles) => self.reset_permission_roles = roles,
            ConfigUpdate::ConfigPermission(roles) => self.config_permission_roles = roles,
        }
    }

    /// Problems an operator should know about; none of them block startup
    #[must_use]
    pub fn lint(&self) -> Vec<String> {
        let mut notes = Vec::new();

        if self.warning_channel_id.is_none() {
            notes.push("warningChannelId is not set; warning cards will not be posted".to_string());
        }
        if self.warn_permission_roles.is_empty() {
            notes.push("warnPermissionRoles is empty; nobody can issue warnings".to_string());
        }
        if self.reset_permission_roles.is_empty() {
            notes.push("resetPermissionRoles is empty; nobody can reset warnings".to_string());
        }
        if self.config_permission_roles.is_empty() {
            notes.push("configPermissionRoles is empty; configuration is frozen".to_string());
        }
        if self.demote_roles.is_empty() {
            notes.push("demoteRoles is empty; demotion will not revoke anything".to_string());
        }
        match &self.protected_role {
            None => notes.push("protectedRole is not set".to_string()),
            Some(role) if self.demote_roles.contains(role) => notes.push(format!(
                "protectedRole {role} is listed in demoteRoles; it will be kept on demotion"
            )),
            Some(_) => {}
        }

        notes
    }
}

/// A single configuration change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigUpdate {
    /// Replace the card thumbnail
    EmbedIcon(String),
    /// Replace the warning channel
    WarningChannel(ChannelId),
    /// Replace the warn permission set
    WarnPermission(BTreeSet<RoleId>),
    /// Replace the reset permission set
    ResetPermission(BTreeSet<RoleId>),
    /// Replace the config permission set
    ConfigPermission(BTreeSet<RoleId>),
}

impl ConfigUpdate {
    /// Document key touched by this update
    #[inline]
    #[must_use]
    pub fn key(&self) -> ConfigKey {
        match self {
            Self::EmbedIcon(_) => ConfigKey::EmbedIcon,
            Self::WarningChannel(_) => ConfigKey::WarningChannel,
            Self::WarnPermission(_) => ConfigKey::WarnPermission,
            Self::ResetPermission(_) => ConfigKey::ResetPermission,
            Self::ConfigPermission(_) => ConfigKey::ConfigPermission,
        }
    }
}

/// Configuration key editable at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    EmbedIcon,
    WarningChannel,
    WarnPermission,
    ResetPermission,
    ConfigPermission,
}

impl ConfigKey {
    /// Key as written in the configuration document
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmbedIcon => "embedIcon",
            Self::WarningChannel => "warningChannelId",
            Self::WarnPermission => "warnPermissionRoles",
            Self::ResetPermission => "resetPermissionRoles",
            Self::ConfigPermission => "configPermissionRoles",
        }
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live configuration with write-through persistence
#[derive(Debug)]
pub struct ConfigStore {
    current: RwLock<Arc<Configuration>>,
    document: JsonDocument<Configuration>,
    /// Serializes read-modify-write cycles
    writer: Mutex<()>,
}

impl ConfigStore {
    /// Load configuration from its document
    ///
    /// # Errors
    /// Returns `StoreError` if the document exists but cannot be read or decoded
    pub async fn open(document: JsonDocument<Configuration>) -> Result<Self, StoreError> {
        let loaded = document.load().await?;
        tracing::info!(path = %document.path().display(), "configuration loaded");
        Ok(Self {
            current: RwLock::new(Arc::new(loaded)),
            document,
            writer: Mutex::new(()),
        })
    }

    /// Current configuration
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Arc<Configuration> {
        Arc::clone(&self.current.read())
    }

    /// Apply an update, persist it, then publish it
    ///
    /// # Errors
    /// Returns `StoreError` if the write fails; the live value is left unchanged
    pub async fn update(&self, update: ConfigUpdate) -> Result<Arc<Configuration>, StoreError> {
        let _writer = self.writer.lock().await;
        let key = update.key();

        let mut next = Configuration::clone(&self.snapshot());
        next.apply(update);
        self.document.write(&next).await?;

        let next = Arc::new(next);
        *self.current.write() = Arc::clone(&next);
        tracing::info!(%key, "configuration updated");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(ids: &[&str]) -> BTreeSet<RoleId> {
        ids.iter().map(|id| RoleId::new(*id)).collect()
    }

    #[test]
    fn document_keys_are_camel_case() {
        let mut config = Configuration::new();
        config.warning_channel_id = Some(ChannelId::new("9"));
        config.demote_roles = roles(&["1"]);

        let value = serde_json::to_value(&config).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "embedIcon",
            "embedBanner",
            "embedFooter",
            "warningChannelId",
            "warnPermissionRoles",
            "resetPermissionRoles",
            "configPermissionRoles",
            "demoteRoles",
            "protectedRole",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
        assert_eq!(obj.len(), 9);
        assert_eq!(value["demoteRoles"], serde_json::json!(["1"]));
    }

    #[test]
    fn update_keys_name_document_fields() {
        let mut config = Configuration::new();
        config.warning_channel_id = Some(ChannelId::new("9"));
        config.embed_icon = Some("i.png".into());
        let value = serde_json::to_value(&config).unwrap();

        for update in [
            ConfigUpdate::EmbedIcon("i.png".into()),
            ConfigUpdate::WarningChannel(ChannelId::new("9")),
            ConfigUpdate::WarnPermission(roles(&["1"])),
            ConfigUpdate::ResetPermission(roles(&["1"])),
            ConfigUpdate::ConfigPermission(roles(&["1"])),
        ] {
            let key = update.key();
            assert!(value.get(key.as_str()).is_some(), "no document field {key}");
        }
    }

    #[test]
    fn partial_document_fills_defaults() {
        let config: Configuration =
            serde_json::from_str(r#"{"warnPermissionRoles":["111"],"protectedRole":"5"}"#).unwrap();
        assert_eq!(config.warn_permission_roles, roles(&["111"]));
        assert_eq!(config.protected_role, Some(RoleId::new("5")));
        assert!(config.demote_roles.is_empty());
    }

    #[test]
    fn apply_replaces_role_sets() {
        let mut config = Configuration::new();
        config.warn_permission_roles = roles(&["1", "2"]);

        config.apply(ConfigUpdate::WarnPermission(roles(&["3"])));
        assert_eq!(config.warn_permission_roles, roles(&["3"]));
    }

    #[test]
    fn lint_flags_protected_role_in_demote_set() {
        let mut config = Configuration::new();
        config.demote_roles = roles(&["1", "5"]);
        config.protected_role = Some(RoleId::new("5"));

        assert!(config.lint().iter().any(|n| n.contains("protectedRole 5")));
    }

    #[tokio::test]
    async fn update_is_written_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = ConfigStore::open(JsonDocument::new(&path)).await.unwrap();

        store
            .update(ConfigUpdate::EmbedIcon("https://x/icon.png".into()))
            .await
            .unwrap();

        let reopened = ConfigStore::open(JsonDocument::new(&path)).await.unwrap();
        assert_eq!(
            reopened.snapshot().embed_icon.as_deref(),
            Some("https://x/icon.png")
        );
    }

    #[tokio::test]
    async fn failed_write_leaves_config_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(JsonDocument::new(dir.path().join("gone").join("c.json")))
            .await
            .unwrap();

        let result = store
            .update(ConfigUpdate::WarnPermission(roles(&["1"])))
            .await;

        assert!(result.is_err());
        assert!(store.snapshot().warn_permission_roles.is_empty());
    }
}
