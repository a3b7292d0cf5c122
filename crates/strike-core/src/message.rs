//! Message composition
//!
//! Everything the bot says is built here, from the command outcome and the
//! current configuration. Output depends only on those inputs.

use crate::config::{ConfigKey, Configuration};
use crate::dispatcher::{Delivery, Outcome, WarnReport};
use crate::error::CommandError;
use crate::escalation::EscalationDecision;
use crate::executor::{DemotionOutcome, ProtectedRoleChange};
use crate::types::{Member, SubjectId, WarningRecord};
use serde::{Deserialize, Serialize};

/// Color of the warnings list card
pub const LIST_COLOR: u32 = 0x0034_98DB;

/// Rich card author line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedAuthor {
    /// Author name
    pub name: String,
    /// Author icon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// Rich card field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    /// Field name
    pub name: String,
    /// Field value
    pub value: String,
}

/// Rich card
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
}

impl Embed {
    fn field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.push(EmbedField {
            name: name.to_string(),
            value: value.into(),
        });
        self
    }
}

/// Message posted to a channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Plain text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Attached cards
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

impl OutboundMessage {
    /// Plain text message
    #[inline]
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            embeds: Vec::new(),
        }
    }
}

/// Response to the invoking actor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Plain text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Attached cards
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    /// Visible only to the actor
    #[serde(default)]
    pub ephemeral: bool,
}

impl Reply {
    /// Text reply
    #[inline]
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Mark as visible only to the actor
    #[inline]
    #[must_use]
    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }
}

/// One warning without its ordinal
#[must_use]
pub fn record_summary(record: &WarningRecord) -> String {
    format!("{} (by {} on {})", record.reason, record.issuer, record.date)
}

/// One warning rendered as a list line
#[must_use]
pub fn record_line(ordinal: usize, record: &WarningRecord) -> String {
    format!("{ordinal}. {}", record_summary(record))
}

/// Notice posted when a member is demoted
#[must_use]
pub fn demotion_notice(subject: &SubjectId) -> String {
    format!("🔴 {} has been demoted. Staff roles removed.", subject.mention())
}

/// Channel text describing a demotion
///
/// A complete demotion gets the standard notice; otherwise every removed and
/// failed role is listed.
#[must_use]
pub fn demotion_report(outcome: &DemotionOutcome) -> String {
    demotion_lines(outcome).join("\n")
}

/// Card posted to the warning channel for a new warning
#[must_use]
pub fn warning_card(
    subject: &Member,
    record: &WarningRecord,
    decision: &EscalationDecision,
    config: &Configuration,
) -> Embed {
    Embed {
        title: Some(format!("⚠️ Warning #{}", decision.tier)),
        color: Some(decision.severity.color()),
        author: Some(EmbedAuthor {
            name: subject.tag.clone(),
            icon_url: subject.avatar_url.clone(),
        }),
        thumbnail: config.embed_icon.clone(),
        image: config.embed_banner.clone(),
        footer: config.embed_footer.clone(),
        ..Embed::default()
    }
    .field("Reason", record.reason.clone())
    .field("Issued by", record.issuer.clone())
    .field("Date", record.date.clone())
}

/// Warning channel message for a new warning
#[must_use]
pub fn warning_log_message(
    subject: &Member,
    record: &WarningRecord,
    decision: &EscalationDecision,
    config: &Configuration,
) -> OutboundMessage {
    OutboundMessage {
        content: Some(subject.id.mention()),
        embeds: vec![warning_card(subject, record, decision, config)],
    }
}

/// Card listing a member's warnings
#[must_use]
pub fn warnings_card(subject: &Member, records: &[WarningRecord], config: &Configuration) -> Embed {
    let description = records
        .iter()
        .enumerate()
        .map(|(i, r)| format!("**{}.** {}\n", i + 1, record_summary(r)))
        .collect::<String>();

    Embed {
        title: Some(format!("📋 Warnings for {}", subject.tag)),
        description: Some(description),
        color: Some(LIST_COLOR),
        footer: config.embed_footer.clone(),
        ..Embed::default()
    }
}

/// Reply for a successful command
#[must_use]
pub fn reply_for(outcome: &Outcome, config: &Configuration) -> Reply {
    match outcome {
        Outcome::Warned(report) => Reply::text(warn_ack(report)).ephemeral(),
        Outcome::Listed { subject, records } if records.is_empty() => {
            Reply::text(format!("✅ {} has no warnings.", subject.tag))
        }
        Outcome::Listed { subject, records } => Reply {
            embeds: vec![warnings_card(subject, records, config)],
            ..Reply::default()
        },
        Outcome::Reset { subject, .. } => {
            Reply::text(format!("♻️ All warnings for {} have been reset.", subject.tag))
        }
        Outcome::ConfigUpdated(key) => Reply::text(config_ack(*key)),
    }
}

/// Reply for a failed command
#[must_use]
pub fn reply_for_error(error: &CommandError) -> Reply {
    Reply::text(error.user_message()).ephemeral()
}

fn config_ack(key: ConfigKey) -> &'static str {
    match key {
        ConfigKey::EmbedIcon => "✅ Embed icon updated.",
        ConfigKey::WarningChannel => "✅ Warning channel updated.",
        ConfigKey::WarnPermission => "✅ Warn permission roles updated.",
        ConfigKey::ResetPermission => "✅ Reset permission roles updated.",
        ConfigKey::ConfigPermission => "✅ Config permission roles updated.",
    }
}

fn warn_ack(report: &WarnReport) -> String {
    let mut lines = vec![format!("✅ Warning issued to {}", report.subject.tag)];

    match &report.log_delivery {
        Delivery::Posted => {}
        Delivery::NotConfigured => {
            lines.push("⚠️ No warning channel is configured; the warning was not posted.".to_string());
        }
        Delivery::Failed(e) => {
            lines.push(format!("⚠️ Could not post to the warning channel: {e}"));
        }
    }

    match &report.demotion {
        None => {}
        Some(Ok(outcome)) => lines.push(demotion_report(outcome)),
        Some(Err(e)) => lines.push(format!(
            "⚠️ Demotion of {} failed: {e}",
            report.subject.id.mention()
        )),
    }

    match &report.notice_delivery {
        Some(Delivery::Failed(e)) => {
            lines.push(format!("⚠️ Could not post the demotion notice: {e}"));
        }
        // an unset channel is already reported for the warning card
        Some(Delivery::Posted | Delivery::NotConfigured) | None => {}
    }

    lines.join("\n")
}

fn demotion_lines(outcome: &DemotionOutcome) -> Vec<String> {
    if outcome.is_complete() {
        return vec![demotion_notice(&outcome.subject)];
    }

    let mut lines = vec![format!(
        "⚠️ {} was only partially demoted.",
        outcome.subject.mention()
    )];
    for role in &outcome.removed {
        lines.push(format!("- removed {}", role.mention()));
    }
    for (role, e) in &outcome.failed {
        lines.push(format!("- could not remove {}: {e}", role.mention()));
    }
    if let ProtectedRoleChange::Failed(e) = &outcome.protected_role {
        lines.push(format!("- could not grant the protected role: {e}"));
    }
    lines
}
