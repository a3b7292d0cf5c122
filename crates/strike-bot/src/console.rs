//! Line-delimited JSON command intake
//!
//! Each input line is one envelope:
//!
//! ```text
//! {"actor":{"id":"1","tag":"mod#0001","roles":["10"]},"command":"warn",
//!  "args":{"user":{"id":"42","tag":"staff#0042"},"reason":"AFK"}}
//! ```
//!
//! Commands run on lanes: one per targeted member and one shared by the
//! configuration commands. Lanes run concurrently; within a lane commands run
//! in input order. Each envelope produces exactly one output line carrying the
//! invocation ID, so replies can be matched even when lanes finish out of order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use strike_core::message::reply_for_error;
use strike_core::{
    Actor, Command, CommandArgs, Dispatcher, Invocation, InvocationId, Reply, SubjectId,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

#[derive(Debug, Deserialize)]
struct Envelope {
    actor: Actor,
    command: String,
    #[serde(default)]
    args: CommandArgs,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    invocation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<Reply>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ReplyLine {
    fn reply(invocation: Option<InvocationId>, command: &str, reply: Reply) -> Self {
        Self {
            invocation: invocation.map(|id| id.to_string()),
            command: Some(command.to_string()),
            reply: Some(reply),
            error: None,
        }
    }

    fn undecodable(error: &serde_json::Error) -> Self {
        Self {
            invocation: None,
            command: None,
            reply: None,
            error: Some(format!("invalid envelope: {error}")),
        }
    }
}

/// Ordering domain of a command
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Lane {
    Member(SubjectId),
    Config,
}

impl Lane {
    fn of(command: &Command) -> Self {
        command
            .target()
            .map_or(Self::Config, |member| Self::Member(member.id.clone()))
    }
}

#[derive(Debug)]
struct Queued {
    invocation: Invocation,
    command: String,
}

/// Totals for one intake session
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionStats {
    pub(crate) dispatched: usize,
    pub(crate) rejected: usize,
}

/// Read envelopes until end of input, dispatch them, and write one reply line each
///
/// Returns after every dispatched command has replied.
pub(crate) async fn run<R, W>(
    dispatcher: Arc<Dispatcher>,
    input: R,
    output: W,
) -> anyhow::Result<SessionStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<ReplyLine>();
    let writer = tokio::spawn(write_lines(rx, output));

    let mut stats = SessionStats::default();
    let mut lanes: BTreeMap<Lane, mpsc::UnboundedSender<Queued>> = BTreeMap::new();
    let mut workers = JoinSet::new();
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let envelope = match serde_json::from_str::<Envelope>(line) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "undecodable envelope");
                stats.rejected += 1;
                let _ = tx.send(ReplyLine::undecodable(&e));
                continue;
            }
        };

        let command = match Command::from_options(&envelope.command, &envelope.args) {
            Ok(command) => command,
            Err(e) => {
                tracing::info!(command = %envelope.command, error = %e, "command rejected");
                stats.rejected += 1;
                let _ = tx.send(ReplyLine::reply(None, &envelope.command, reply_for_error(&e)));
                continue;
            }
        };

        stats.dispatched += 1;
        let lane = lanes.entry(Lane::of(&command)).or_insert_with(|| {
            let (lane_tx, lane_rx) = mpsc::unbounded_channel();
            workers.spawn(drain_lane(Arc::clone(&dispatcher), lane_rx, tx.clone()));
            lane_tx
        });
        let _ = lane.send(Queued {
            invocation: Invocation::new(envelope.actor, command),
            command: envelope.command,
        });
    }

    // closing every lane lets its worker finish the queued commands and exit
    drop(lanes);
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "command lane failed");
        }
    }

    drop(tx);
    writer.await??;

    tracing::info!(
        dispatched = stats.dispatched,
        rejected = stats.rejected,
        "input closed"
    );
    Ok(stats)
}

async fn drain_lane(
    dispatcher: Arc<Dispatcher>,
    mut queue: mpsc::UnboundedReceiver<Queued>,
    out: mpsc::UnboundedSender<ReplyLine>,
) {
    while let Some(Queued { invocation, command }) = queue.recv().await {
        let id = invocation.id;
        let reply = dispatcher.handle(invocation).await;
        let _ = out.send(ReplyLine::reply(Some(id), &command, reply));
    }
}

async fn write_lines<W>(mut rx: mpsc::UnboundedReceiver<ReplyLine>, mut output: W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        let mut encoded = serde_json::to_vec(&line)?;
        encoded.push(b'\n');
        output.write_all(&encoded).await?;
        output.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use strike_core::{ConfigStore, ConfigUpdate, InMemoryGuild, RoleId, WarningLedger};
    use strike_store::JsonDocument;

    async fn dispatcher(dir: &tempfile::TempDir) -> Arc<Dispatcher> {
        let ledger = WarningLedger::open(JsonDocument::new(dir.path().join("warnings.json")))
            .await
            .unwrap();
        let config = ConfigStore::open(JsonDocument::new(dir.path().join("config.json")))
            .await
            .unwrap();
        config
            .update(ConfigUpdate::WarnPermission([RoleId::new("10")].into_iter().collect()))
            .await
            .unwrap();
        config
            .update(ConfigUpdate::ResetPermission([RoleId::new("10")].into_iter().collect()))
            .await
            .unwrap();
        let guild = Arc::new(InMemoryGuild::new());
        Arc::new(Dispatcher::new(Arc::new(ledger), Arc::new(config), guild))
    }

    async fn session(input: &str) -> (SessionStats, Vec<Value>, Arc<Dispatcher>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(&dir).await;
        let (client, mut server) = tokio::io::duplex(64 * 1024);

        let stats = run(Arc::clone(&dispatcher), input.as_bytes(), client)
            .await
            .unwrap();

        let mut raw = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut server, &mut raw)
            .await
            .unwrap();
        let lines = raw
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (stats, lines, dispatcher, dir)
    }

    #[tokio::test]
    async fn warn_envelope_is_dispatched() {
        let input = r#"{"actor":{"id":"1","tag":"mod#0001","roles":["10"]},"command":"warn","args":{"user":{"id":"42","tag":"staff#0042"},"reason":"AFK"}}"#;

        let (stats, lines, dispatcher, _dir) = session(input).await;

        assert_eq!(stats, SessionStats { dispatched: 1, rejected: 0 });
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["command"], "warn");
        assert!(lines[0]["invocation"].is_string());
        assert!(lines[0]["reply"]["content"]
            .as_str()
            .unwrap()
            .starts_with("✅ Warning issued to staff#0042"));
        assert_eq!(dispatcher.ledger().count(&"42".into()), 1);
    }

    #[tokio::test]
    async fn bad_lines_get_error_replies() {
        let input = concat!(
            "not json\n",
            "\n",
            r#"{"actor":{"id":"1","tag":"x#1"},"command":"Warn","args":{}}"#,
            "\n",
        );

        let (stats, lines, _dispatcher, _dir) = session(input).await;

        assert_eq!(stats, SessionStats { dispatched: 0, rejected: 2 });
        assert_eq!(lines.len(), 2);
        assert!(lines[0]["error"].as_str().unwrap().starts_with("invalid envelope"));
        assert_eq!(lines[1]["reply"]["content"], "❌ Unknown command `Warn`.");
    }

    #[tokio::test]
    async fn every_envelope_gets_one_reply() {
        let warn = r#"{"actor":{"id":"1","tag":"mod#0001","roles":["10"]},"command":"warn","args":{"user":{"id":"42","tag":"staff#0042"},"reason":"late"}}"#;
        let list = r#"{"actor":{"id":"2","tag":"anyone#0002"},"command":"warnings","args":{"user":{"id":"7","tag":"staff#0007"}}}"#;
        let input = [warn, list, warn, list, warn].join("\n");

        let (stats, lines, dispatcher, _dir) = session(&input).await;

        assert_eq!(stats.dispatched, 5);
        assert_eq!(lines.len(), 5);
        assert_eq!(dispatcher.ledger().count(&"42".into()), 3);
    }

    #[tokio::test]
    async fn same_member_commands_run_in_input_order() {
        let actor = r#"{"id":"1","tag":"mod#0001","roles":["10"]}"#;
        let user = r#"{"id":"42","tag":"staff#0042"}"#;
        let input = [
            format!(r#"{{"actor":{actor},"command":"warn","args":{{"user":{user},"reason":"late"}}}}"#),
            format!(r#"{{"actor":{actor},"command":"resetwarnings","args":{{"user":{user}}}}}"#),
            format!(r#"{{"actor":{actor},"command":"warnings","args":{{"user":{user}}}}}"#),
        ]
        .join("\n");

        let (stats, lines, dispatcher, _dir) = session(&input).await;

        assert_eq!(stats.dispatched, 3);
        let commands: Vec<_> = lines.iter().map(|l| l["command"].clone()).collect();
        assert_eq!(commands, ["warn", "resetwarnings", "warnings"]);
        assert_eq!(lines[2]["reply"]["content"], "✅ staff#0042 has no warnings.");
        assert_eq!(dispatcher.ledger().count(&"42".into()), 0);
    }
}
