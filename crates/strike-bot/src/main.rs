//! Strike staff bot
//!
//! `serve` loads the warning ledger and configuration, exposes the liveness
//! endpoint and dispatches JSON command envelopes read from stdin. `check`
//! inspects the documents offline.

mod check;
mod console;
mod health;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use strike_core::{
    ConfigStore, Dispatcher, EscalationPolicy, InMemoryGuild, RoleId, SubjectId, WarningLedger,
};
use strike_store::JsonDocument;
use tracing_subscriber::EnvFilter;

/// Membership snapshot: member ID to held roles
type Members = BTreeMap<SubjectId, BTreeSet<RoleId>>;

fn cli() -> Command {
    Command::new("strike-bot")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Staff warning ledger with threshold-triggered demotion")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .env("STRIKE_CONFIG_PATH")
                .default_value("./config.json")
                .value_parser(value_parser!(PathBuf))
                .global(true)
                .help("Configuration document"),
        )
        .arg(
            Arg::new("warnings")
                .long("warnings")
                .env("STRIKE_WARNINGS_PATH")
                .default_value("./warnings.json")
                .value_parser(value_parser!(PathBuf))
                .global(true)
                .help("Warning ledger document"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("serve")
                .about("Serve the liveness endpoint and dispatch commands from stdin")
                .arg(
                    Arg::new("port")
                        .long("port")
                        .env("PORT")
                        .default_value("3000")
                        .value_parser(value_parser!(u16))
                        .help("Liveness endpoint port"),
                )
                .arg(
                    Arg::new("platform-timeout-ms")
                        .long("platform-timeout-ms")
                        .env("STRIKE_PLATFORM_TIMEOUT_MS")
                        .default_value("5000")
                        .value_parser(value_parser!(u64).range(1..))
                        .help("Upper bound on each platform call"),
                )
                .arg(
                    Arg::new("demotion-threshold")
                        .long("demotion-threshold")
                        .env("STRIKE_DEMOTION_THRESHOLD")
                        .default_value("3")
                        .value_parser(value_parser!(usize))
                        .help("Warning count that triggers demotion"),
                )
                .arg(
                    Arg::new("members")
                        .long("members")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON membership snapshot: member ID to role IDs"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Load both documents and report their state")
                .arg(
                    Arg::new("subject")
                        .long("subject")
                        .help("Also list the warnings of this member"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries command replies
    let fmt = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        fmt.json().init();
    } else {
        fmt.init();
    }
}

fn arg<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> anyhow::Result<T> {
    matches
        .get_one::<T>(id)
        .cloned()
        .with_context(|| format!("--{id} not set"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let config_path: PathBuf = arg(&matches, "config")?;
    let warnings_path: PathBuf = arg(&matches, "warnings")?;

    match matches.subcommand() {
        Some(("serve", args)) => serve(config_path, warnings_path, args).await,
        Some(("check", args)) => {
            let subject = args.get_one::<String>("subject").map(SubjectId::new);
            let report = check::report(&config_path, &warnings_path, subject.as_ref()).await?;
            print!("{report}");
            Ok(())
        }
        _ => Ok(()),
    }
}

async fn serve(config_path: PathBuf, warnings_path: PathBuf, args: &ArgMatches) -> anyhow::Result<()> {
    let port: u16 = arg(args, "port")?;
    let timeout_ms: u64 = arg(args, "platform-timeout-ms")?;
    let threshold: usize = arg(args, "demotion-threshold")?;

    let config = ConfigStore::open(JsonDocument::new(&config_path))
        .await
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    for note in config.snapshot().lint() {
        tracing::warn!(%note, "configuration");
    }
    let ledger = WarningLedger::open(JsonDocument::new(&warnings_path))
        .await
        .with_context(|| format!("loading warnings from {}", warnings_path.display()))?;

    let members = match args.get_one::<PathBuf>("members") {
        Some(path) => JsonDocument::<Members>::new(path)
            .load()
            .await
            .with_context(|| format!("loading members from {}", path.display()))?,
        None => Members::new(),
    };
    tracing::info!(members = members.len(), "membership loaded");

    let guild = Arc::new(InMemoryGuild::from_members(members));
    let dispatcher = Dispatcher::new(Arc::new(ledger), Arc::new(config), guild)
        .with_policy(EscalationPolicy::new(threshold))
        .with_call_timeout(Duration::from_millis(timeout_ms));

    let (_, liveness) = health::spawn(port).context("binding liveness endpoint")?;

    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let session = console::run(Arc::new(dispatcher), input, tokio::io::stdout());

    tokio::select! {
        stats = session => {
            let stats = stats?;
            tracing::info!(dispatched = stats.dispatched, rejected = stats.rejected, "shutting down");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for ctrl-c")?;
            tracing::info!("interrupted, shutting down");
        }
    }

    liveness.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn serve_defaults() {
        let matches = cli()
            .try_get_matches_from(["strike-bot", "serve"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();

        assert_eq!(arg::<PathBuf>(&matches, "config").unwrap(), PathBuf::from("./config.json"));
        assert_eq!(arg::<u64>(args, "platform-timeout-ms").unwrap(), 5000);
        assert_eq!(
            arg::<usize>(args, "demotion-threshold").unwrap(),
            strike_core::DEFAULT_DEMOTION_THRESHOLD
        );
        assert!(args.get_one::<PathBuf>("members").is_none());
    }

    #[test]
    fn global_paths_after_subcommand() {
        let matches = cli()
            .try_get_matches_from(["strike-bot", "check", "--warnings", "/tmp/w.json"])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();

        assert_eq!(name, "check");
        assert_eq!(arg::<PathBuf>(args, "warnings").unwrap(), PathBuf::from("/tmp/w.json"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(cli()
            .try_get_matches_from(["strike-bot", "serve", "--platform-timeout-ms", "0"])
            .is_err());
    }
}
