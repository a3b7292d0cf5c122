//! Command surface
//!
//! Stable, case-sensitive command names with their options and required
//! permission, plus parsing of the option bag the routing collaborator hands
//! over into a typed [`Command`].

use crate::config::ConfigUpdate;
use crate::error::CommandError;
use crate::permission::Permission;
use crate::types::{ChannelId, Member, RoleId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Recognised command kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Issue a warning
    Warn,
    /// List a member's warnings
    Warnings,
    /// Clear a member's warnings
    ResetWarnings,
    /// Set the card thumbnail
    SetEmbedIcon,
    /// Set the warning channel
    SetWarningChannel,
    /// Replace the warn permission roles
    SetWarnPermission,
    /// Replace the reset permission roles
    SetResetPermission,
    /// Replace the config permission roles
    SetConfigPermission,
}

/// Option value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    /// A guild member
    User,
    /// Free text
    Text,
}

/// Declared command option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandOption {
    /// Option name
    pub name: &'static str,
    /// Option help text
    pub description: &'static str,
    /// Value type
    pub kind: OptionKind,
}

const fn user(description: &'static str) -> CommandOption {
    CommandOption {
        name: "user",
        description,
        kind: OptionKind::User,
    }
}

const fn text(name: &'static str, description: &'static str) -> CommandOption {
    CommandOption {
        name,
        description,
        kind: OptionKind::Text,
    }
}

impl CommandKind {
    /// Every command, in registration order
    pub const ALL: [CommandKind; 8] = [
        CommandKind::Warn,
        CommandKind::Warnings,
        CommandKind::ResetWarnings,
        CommandKind::SetEmbedIcon,
        CommandKind::SetWarningChannel,
        CommandKind::SetWarnPermission,
        CommandKind::SetResetPermission,
        CommandKind::SetConfigPermission,
    ];

    /// Stable command name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Warn => "warn",
            CommandKind::Warnings => "warnings",
            CommandKind::ResetWarnings => "resetwarnings",
            CommandKind::SetEmbedIcon => "setembedicon",
            CommandKind::SetWarningChannel => "setwarningchannel",
            CommandKind::SetWarnPermission => "setwarnpermission",
            CommandKind::SetResetPermission => "setresetpermission",
            CommandKind::SetConfigPermission => "setconfigpermission",
        }
    }

    /// Help text
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            CommandKind::Warn => "Issue a warning to a staff member",
            CommandKind::Warnings => "View warnings of a user",
            CommandKind::ResetWarnings => "Reset warnings of a user",
            CommandKind::SetEmbedIcon => "Set the embed icon URL",
            CommandKind::SetWarningChannel => "Set the warning log channel ID",
            CommandKind::SetWarnPermission => "Set roles allowed to warn",
            CommandKind::SetResetPermission => "Set roles allowed to reset warnings",
            CommandKind::SetConfigPermission => "Set roles allowed to change bot config",
        }
    }

    /// Declared options; all are required
    #[must_use]
    pub fn options(self) -> &'static [CommandOption] {
        const WARN: &[CommandOption] = &[
            user("User to warn"),
            text("reason", "Reason for warning"),
        ];
        const WARNINGS: &[CommandOption] = &[user("User to check")];
        const RESET: &[CommandOption] = &[user("User to reset")];
        const ICON: &[CommandOption] = &[text("url", "New embed icon URL")];
        const CHANNEL: &[CommandOption] = &[text("channelid", "New warning channel ID")];
        const ROLES: &[CommandOption] = &[text("roleids", "Comma-separated role IDs")];

        match self {
            CommandKind::Warn => WARN,
            CommandKind::Warnings => WARNINGS,
            CommandKind::ResetWarnings => RESET,
            CommandKind::SetEmbedIcon => ICON,
            CommandKind::SetWarningChannel => CHANNEL,
            CommandKind::SetWarnPermission
            | CommandKind::SetResetPermission
            | CommandKind::SetConfigPermission => ROLES,
        }
    }

    /// Permission required to invoke
    #[must_use]
    pub fn permission(self) -> Permission {
        match self {
            CommandKind::Warn => Permission::Warn,
            CommandKind::Warnings => Permission::Public,
            CommandKind::ResetWarnings => Permission::Reset,
            CommandKind::SetEmbedIcon
            | CommandKind::SetWarningChannel
            | CommandKind::SetWarnPermission
            | CommandKind::SetResetPermission
            | CommandKind::SetConfigPermission => Permission::Config,
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandKind {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| CommandError::UnknownCommand(s.to_string()))
    }
}

/// Option value as delivered by the routing collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Resolved member
    User(Member),
    /// Free text
    Text(String),
}

/// Named option values of one invocation
pub type CommandArgs = BTreeMap<String, OptionValue>;

/// A parsed command with its inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `warn(user, reason)`
    Warn { user: Member, reason: String },
    /// `warnings(user)`
    Warnings { user: Member },
    /// `resetwarnings(user)`
    ResetWarnings { user: Member },
    /// `setembedicon(url)`
    SetEmbedIcon { url: String },
    /// `setwarningchannel(channelid)`
    SetWarningChannel { channel_id: String },
    /// `setwarnpermission(roleids)`
    SetWarnPermission { role_ids: String },
    /// `setresetpermission(roleids)`
    SetResetPermission { role_ids: String },
    /// `setconfigpermission(roleids)`
    SetConfigPermission { role_ids: String },
}

impl Command {
    /// Build a command from its name and option bag
    ///
    /// # Errors
    /// - `CommandError::UnknownCommand` for an unrecognised name
    /// - `CommandError::MalformedInput` for a missing or mistyped option
    pub fn from_options(name: &str, args: &CommandArgs) -> Result<Self, CommandError> {
        let kind = CommandKind::from_str(name)?;

        let command = match kind {
            CommandKind::Warn => Command::Warn {
                user: user_arg(args)?,
                reason: text_arg(args, "reason")?,
            },
            CommandKind::Warnings => Command::Warnings {
                user: user_arg(args)?,
            },
            CommandKind::ResetWarnings => Command::ResetWarnings {
                user: user_arg(args)?,
            },
            CommandKind::SetEmbedIcon => Command::SetEmbedIcon {
                url: text_arg(args, "url")?,
            },
            CommandKind::SetWarningChannel => Command::SetWarningChannel {
                channel_id: text_arg(args, "channelid")?,
            },
            CommandKind::SetWarnPermission => Command::SetWarnPermission {
                role_ids: text_arg(args, "roleids")?,
            },
            CommandKind::SetResetPermission => Command::SetResetPermission {
                role_ids: text_arg(args, "roleids")?,
            },
            CommandKind::SetConfigPermission => Command::SetConfigPermission {
                role_ids: text_arg(args, "roleids")?,
            },
        };

        Ok(command)
    }

    /// Command kind
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Warn { .. } => CommandKind::Warn,
            Command::Warnings { .. } => CommandKind::Warnings,
            Command::ResetWarnings { .. } => CommandKind::ResetWarnings,
            Command::SetEmbedIcon { .. } => CommandKind::SetEmbedIcon,
            Command::SetWarningChannel { .. } => CommandKind::SetWarningChannel,
            Command::SetWarnPermission { .. } => CommandKind::SetWarnPermission,
            Command::SetResetPermission { .. } => CommandKind::SetResetPermission,
            Command::SetConfigPermission { .. } => CommandKind::SetConfigPermission,
        }
    }

    /// Member the command targets, if any
    #[must_use]
    pub fn target(&self) -> Option<&Member> {
        match self {
            Command::Warn { user, .. }
            | Command::Warnings { user }
            | Command::ResetWarnings { user } => Some(user),
            _ => None,
        }
    }

    /// Validated configuration change for the `set*` commands
    ///
    /// Returns `None` for commands that do not touch configuration.
    ///
    /// # Errors
    /// Returns `CommandError::MalformedInput` naming the invalid field
    pub fn config_update(&self) -> Option<Result<ConfigUpdate, CommandError>> {
        let update = match self {
            Command::SetEmbedIcon { url } => {
                non_empty("url", url).map(|url| ConfigUpdate::EmbedIcon(url.to_string()))
            }
            Command::SetWarningChannel { channel_id } => non_empty("channelid", channel_id)
                .map(|id| ConfigUpdate::WarningChannel(ChannelId::new(id))),
            Command::SetWarnPermission { role_ids } => {
                parse_role_list(role_ids).map(ConfigUpdate::WarnPermission)
            }
            Command::SetResetPermission { role_ids } => {
                parse_role_list(role_ids).map(ConfigUpdate::ResetPermission)
            }
            Command::SetConfigPermission { role_ids } => {
                parse_role_list(role_ids).map(ConfigUpdate::ConfigPermission)
            }
            Command::Warn { .. } | Command::Warnings { .. } | Command::ResetWarnings { .. } => {
                return None
            }
        };
        Some(update)
    }
}

/// Split a comma-separated role list, trimming blanks
///
/// # Errors
/// Returns `CommandError::MalformedInput` for `roleids` when no role ID remains
/// or an entry contains whitespace
pub fn parse_role_list(raw: &str) -> Result<BTreeSet<RoleId>, CommandError> {
    let mut roles = BTreeSet::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if part.chars().any(char::is_whitespace) {
            return Err(CommandError::malformed(
                "roleids",
                format!("'{part}' is not a single role ID"),
            ));
        }
        roles.insert(RoleId::new(part));
    }

    if roles.is_empty() {
        return Err(CommandError::malformed("roleids", "no role IDs given"));
    }
    Ok(roles)
}

fn non_empty<'a>(field: &'static str, value: &'a str) -> Result<&'a str, CommandError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(CommandError::malformed(field, "must not be empty"))
    } else {
        Ok(trimmed)
    }
}

fn user_arg(args: &CommandArgs) -> Result<Member, CommandError> {
    match args.get("user") {
        Some(OptionValue::User(member)) => Ok(member.clone()),
        Some(OptionValue::Text(_)) => Err(CommandError::malformed("user", "expected a member")),
        None => Err(CommandError::malformed("user", "missing")),
    }
}

fn text_arg(args: &CommandArgs, field: &'static str) -> Result<String, CommandError> {
    match args.get(field) {
        Some(OptionValue::Text(value)) => Ok(value.clone()),
        Some(OptionValue::User(_)) => Err(CommandError::malformed(field, "expected text")),
        None => Err(CommandError::malformed(field, "missing")),
    }
}
