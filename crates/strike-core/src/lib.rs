//! Strike Core - staff moderation escalation engine
//!
//! The engine that:
//! - Records warnings against staff members in a persistent ledger
//! - Maps a member's warning count to a severity tier
//! - Demotes a member once their count reaches the threshold
//! - Gates every mutating command behind configured staff roles
//! - Keeps bot configuration editable at runtime
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use strike_core::prelude::*;
//! use strike_store::JsonDocument;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = WarningLedger::open(JsonDocument::new("warnings.json")).await?;
//! let config = ConfigStore::open(JsonDocument::new("config.json")).await?;
//! let guild = Arc::new(InMemoryGuild::new());
//! let dispatcher = Dispatcher::new(Arc::new(ledger), Arc::new(config), guild);
//!
//! let actor = Actor::new("100", "mod#0001").with_roles(["mods"]);
//! let command = Command::Warn {
//!     user: Member::new("42", "staff#0042"),
//!     reason: "AFK during event".into(),
//! };
//! let reply = dispatcher.handle(Invocation::new(actor, command)).await;
//! println!("{:?}", reply.content);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod escalation;
pub mod executor;
pub mod ledger;
pub mod message;
pub mod permission;
pub mod platform;
pub mod types;

// Re-exports for convenience
pub use command::{
    parse_role_list, Command, CommandArgs, CommandKind, CommandOption, OptionKind, OptionValue,
};
pub use config::{ConfigKey, ConfigStore, ConfigUpdate, Configuration};
pub use dispatcher::{Delivery, Dispatcher, Invocation, Outcome, WarnReport};
pub use error::{CommandError, PlatformError};
pub use escalation::{
    evaluate, EscalationDecision, EscalationPolicy, Severity, DEFAULT_DEMOTION_THRESHOLD,
};
pub use executor::{roles_to_remove, DemotionOutcome, ProtectedRoleChange, RoleTransitionExecutor};
pub use ledger::{LedgerDocument, WarningLedger};
pub use message::{Embed, OutboundMessage, Reply};
pub use permission::{is_authorized, Permission};
pub use platform::{bounded, GuildPlatform, InMemoryGuild, DEFAULT_CALL_TIMEOUT};
pub use types::{Actor, ChannelId, InvocationId, Member, RoleId, SubjectId, WarningRecord};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Strike Core
    pub use crate::{
        Actor, Command, CommandError, ConfigStore, ConfigUpdate, Configuration, Dispatcher,
        GuildPlatform, InMemoryGuild, Invocation, Member, Outcome, Reply, RoleId, SubjectId,
        WarningLedger,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use strike_store::JsonDocument;

    #[tokio::test]
    async fn console_style_invocation_round() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = WarningLedger::open(JsonDocument::new(dir.path().join("warnings.json")))
            .await
            .unwrap();
        let config = ConfigStore::open(JsonDocument::new(dir.path().join("config.json")))
            .await
            .unwrap();
        let guild = Arc::new(InMemoryGuild::new());
        let dispatcher = Dispatcher::new(Arc::new(ledger), Arc::new(config), guild);

        let mut args = CommandArgs::new();
        args.insert(
            "user".into(),
            OptionValue::User(Member::new("42", "staff#0042")),
        );
        let command = Command::from_options("warnings", &args).unwrap();
        let reply = dispatcher
            .handle(Invocation::new(Actor::new("1", "anyone#0001"), command))
            .await;

        assert_eq!(reply.content.as_deref(), Some("✅ staff#0042 has no warnings."));
        assert!(!reply.ephemeral);
    }

    #[test]
    fn every_command_has_a_name_and_options() {
        let names: BTreeMap<_, _> = CommandKind::ALL
            .iter()
            .map(|k| (k.name(), k.options().len()))
            .collect();
        assert_eq!(names.len(), CommandKind::ALL.len());
        assert_eq!(names["warn"], 2);
        assert_eq!(names["setwarnpermission"], 1);
    }

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
