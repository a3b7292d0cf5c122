//! Offline document check

use anyhow::Context;
use std::fmt::Write as _;
use std::path::Path;
use strike_core::message::record_line;
use strike_core::{ConfigStore, SubjectId, WarningLedger};
use strike_store::JsonDocument;

/// Load both documents and describe them
///
/// # Errors
/// Fails when either document exists but cannot be read or decoded
pub(crate) async fn report(
    config_path: &Path,
    warnings_path: &Path,
    subject: Option<&SubjectId>,
) -> anyhow::Result<String> {
    let config = ConfigStore::open(JsonDocument::new(config_path))
        .await
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    let ledger = WarningLedger::open(JsonDocument::new(warnings_path))
        .await
        .with_context(|| format!("loading warnings from {}", warnings_path.display()))?;

    let config = config.snapshot();
    let mut out = String::new();
    writeln!(out, "configuration: {}", config_path.display())?;
    writeln!(out, "  warn roles:   {}", config.warn_permission_roles.len())?;
    writeln!(out, "  reset roles:  {}", config.reset_permission_roles.len())?;
    writeln!(out, "  config roles: {}", config.config_permission_roles.len())?;
    writeln!(out, "  demote roles: {}", config.demote_roles.len())?;
    writeln!(out, "warnings: {}", warnings_path.display())?;
    writeln!(out, "  members warned: {}", ledger.subject_count())?;
    writeln!(out, "  total warnings: {}", ledger.total_warnings())?;

    let notes = config.lint();
    if !notes.is_empty() {
        writeln!(out, "notes:")?;
        for note in notes {
            writeln!(out, "  - {note}")?;
        }
    }

    if let Some(subject) = subject {
        let records = ledger.list(subject);
        writeln!(out, "{} ({} warnings):", subject.mention(), records.len())?;
        for (i, record) in records.iter().enumerate() {
            writeln!(out, "  {}", record_line(i + 1, record))?;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_documents_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let out = report(
            &dir.path().join("config.json"),
            &dir.path().join("warnings.json"),
            None,
        )
        .await
        .unwrap();

        assert!(out.contains("members warned: 0"));
        assert!(out.contains("warningChannelId is not set"));
    }

    #[tokio::test]
    async fn lists_a_subject() {
        let dir = tempfile::tempdir().unwrap();
        let warnings = dir.path().join("warnings.json");
        std::fs::write(
            &warnings,
            r#"{"42":[{"reason":"spam","date":"1/2/2025, 10:00:00 AM","issuer":"mod#0001"}]}"#,
        )
        .unwrap();

        let out = report(
            &dir.path().join("config.json"),
            &warnings,
            Some(&SubjectId::new("42")),
        )
        .await
        .unwrap();

        assert!(out.contains("total warnings: 1"));
        assert!(out.contains("1. spam (by mod#0001 on 1/2/2025, 10:00:00 AM)"));
    }

    #[tokio::test]
    async fn malformed_document_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.json");
        std::fs::write(&config, "{ not json").unwrap();

        let err = report(&config, &dir.path().join("warnings.json"), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("loading configuration"));
    }
}
