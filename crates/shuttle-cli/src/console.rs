//! Line console on stdin.
//!
//! Input is validated here so the core only ever sees well-formed submissions.

use std::sync::Arc;

use anyhow::{Context, bail};
use shuttle_core::domain::validate_task_name;
use shuttle_core::{Priority, QueueService};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

pub const HELP: &str = "\
commands:
  add <priority 1-10> <name...>   submit a task
  clear                           clear completed tasks
  state                           print the queue state as JSON
  stats                           print pending/completed/processing
  start                           start scheduling
  stop                            stop scheduling
  help                            show this help";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Add { name: String, priority: Priority },
    Clear,
    State,
    Stats,
    Start,
    Stop,
    Help,
}

/// Parse one console line. `Ok(None)` for a blank line.
pub fn parse_line(line: &str) -> anyhow::Result<Option<Command>> {
    let line = line.trim();
    let Some((head, rest)) = split_word(line) else {
        return Ok(None);
    };

    let cmd = match head {
        "add" => {
            let Some((raw_priority, raw_name)) = split_word(rest) else {
                bail!("usage: add <priority> <name...>");
            };
            let value: i64 = raw_priority
                .parse()
                .with_context(|| format!("priority must be an integer, got {raw_priority:?}"))?;
            Command::Add {
                priority: Priority::try_from(value)?,
                name: validate_task_name(raw_name)?,
            }
        }
        "clear" => Command::Clear,
        "state" => Command::State,
        "stats" => Command::Stats,
        "start" => Command::Start,
        "stop" => Command::Stop,
        "help" | "?" => Command::Help,
        other => bail!("unknown command {other:?} (try `help`)"),
    };
    Ok(Some(cmd))
}

fn split_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    Some(match s.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim_start()),
        None => (s, ""),
    })
}

async fn execute(service: &QueueService, cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Add { name, priority } => {
            let task = service.submit(name, priority).await;
            println!("added {} ({}, priority {})", task.id, task.name, task.priority);
        }
        Command::Clear => {
            let cleared = service.clear_completed().await;
            println!("cleared {cleared} completed task(s)");
        }
        Command::State => {
            let state = service.queue_state().await;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Command::Stats => {
            let stats = service.stats().await;
            println!(
                "Active: {} | Completed: {} | Processing: {}",
                stats.pending,
                stats.completed,
                if stats.processing { "yes" } else { "no" }
            );
        }
        Command::Start => {
            if !service.start_scheduling() {
                println!("already scheduling");
            }
        }
        Command::Stop => {
            if !service.stop_scheduling() {
                println!("not scheduling");
            }
        }
        Command::Help => println!("{HELP}"),
    }
    Ok(())
}

/// Read commands until stdin closes.
pub async fn run(service: Arc<QueueService>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        };

        let result = match parse_line(&line) {
            Ok(Some(cmd)) => execute(&service, cmd).await,
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            println!("error: {e:#}");
        }
    }
    info!("console closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_with_multi_word_name() {
        assert_eq!(
            parse_line("add 7   Encode  video ").unwrap(),
            Some(Command::Add {
                name: "Encode  video".into(),
                priority: Priority::new(7).unwrap(),
            })
        );
    }

    #[test]
    fn blank_line_is_ignored() {
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn simple_commands() {
        assert_eq!(parse_line("clear").unwrap(), Some(Command::Clear));
        assert_eq!(parse_line(" stats ").unwrap(), Some(Command::Stats));
        assert_eq!(parse_line("?").unwrap(), Some(Command::Help));
    }

    #[test]
    fn add_rejects_bad_input() {
        assert!(parse_line("add").is_err());
        assert!(parse_line("add high Render").is_err());
        assert!(parse_line("add 11 Render").is_err());
        assert!(parse_line("add 5").is_err());
        assert!(parse_line("add 5    ").is_err());
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(parse_line("launch").is_err());
    }
}
