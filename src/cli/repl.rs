//! Interactive REPL for emotionforge-cli.
//!
//! Entered when neither `-e` nor `--live` is given. Commands:
//! - `/start`, `/stop` - control the adaptive capture loop
//! - `/status` - scheduler state, interval and last result
//! - `/interval MS` - override the capture interval
//! - `/capture` - capture one frame without a message
//! - `/config KEY` - show a setting by dot-notation key
//! - `/quit`, `/exit`, `/q` - exit
//!
//! Any other line is sent along with a fresh frame as a manual capture.

use std::io::{self, Write};

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::bootstrap::CliContext;
use super::output::{print_outcome, run_event_loop};
use super::runner::join_printer;

const HELP: &str = "Available: /start, /stop, /status, /interval MS, /capture, /config KEY, /quit";

/// REPL command variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Quit,
    Start,
    Stop,
    Status,
    /// Override the capture interval (milliseconds)
    Interval(u64),
    /// Manual capture with the given message (may be empty)
    Capture(String),
    /// Show a setting
    Config(String),
    /// Unknown or malformed command (will show help)
    Unknown(String),
    /// Empty input (skip)
    Empty,
}

impl ReplCommand {
    /// Parse user input into a REPL command.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return ReplCommand::Empty;
        }

        if !trimmed.starts_with('/') {
            return ReplCommand::Capture(trimmed.to_string());
        }

        let (command, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (trimmed, ""),
        };

        match (command.to_lowercase().as_str(), rest) {
            ("/quit" | "/exit" | "/q", "") => ReplCommand::Quit,
            ("/start", "") => ReplCommand::Start,
            ("/stop", "") => ReplCommand::Stop,
            ("/status", "") => ReplCommand::Status,
            ("/capture", "") => ReplCommand::Capture(String::new()),
            ("/interval", ms) => match ms.parse() {
                Ok(ms) => ReplCommand::Interval(ms),
                Err(_) => ReplCommand::Unknown(trimmed.to_string()),
            },
            ("/config", key) if !key.is_empty() => ReplCommand::Config(key.to_string()),
            _ => ReplCommand::Unknown(trimmed.to_string()),
        }
    }
}

/// Run an interactive REPL session.
///
/// Scheduler events print in the background while the prompt waits for input.
/// Returns when the user exits or on EOF (Ctrl+D).
pub async fn run_repl(ctx: &mut CliContext) -> Result<()> {
    let mode = ctx.output_mode();
    let event_rx = ctx.attach_events();
    let printer = tokio::spawn(run_event_loop(event_rx, mode.without_manual_outcomes()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = io::stdout();
    // No banner or prompt when input is piped
    let interactive = atty::is(atty::Stream::Stdin);

    if interactive {
        eprintln!("emotionforge-cli interactive mode");
        eprintln!("Type a message to capture with it, or /quit to exit\n");
    }

    loop {
        if interactive {
            print!("> ");
            stdout.flush()?;
        }

        let Some(input) = lines.next_line().await? else {
            if interactive {
                eprintln!("\nGoodbye!");
            }
            break;
        };

        match ReplCommand::parse(&input) {
            ReplCommand::Empty => continue,
            ReplCommand::Quit => {
                eprintln!("Goodbye!");
                break;
            }
            ReplCommand::Start => match ctx.scheduler.start().await {
                Ok(()) => eprintln!(
                    "Started, capturing every {}ms",
                    ctx.scheduler.current_interval().as_millis()
                ),
                Err(e) => eprintln!("Error: {}", e),
            },
            ReplCommand::Stop => {
                ctx.scheduler.stop().await?;
                eprintln!("Stopped");
            }
            ReplCommand::Status => {
                eprintln!("State:    {:?}", ctx.scheduler.state());
                eprintln!("Session:  {}", ctx.scheduler.session().session_id());
                eprintln!(
                    "Interval: {}ms",
                    ctx.scheduler.current_interval().as_millis()
                );
                match ctx.scheduler.last_result() {
                    Some(last) => eprintln!("Last:     {}: {}", last.emotion, last.response_text),
                    None => eprintln!("Last:     -"),
                }
            }
            ReplCommand::Interval(ms) => {
                let applied = ctx.scheduler.set_interval(ms);
                eprintln!("Interval set to {}ms", applied);
            }
            ReplCommand::Capture(text) => match ctx.scheduler.capture_once(text).await {
                Ok(result) => print_outcome(&result, mode)?,
                Err(e) => eprintln!("Error: {}", e),
            },
            ReplCommand::Config(key) => match ctx.settings_manager.get_value(&key).await {
                Ok(value) => println!("{} = {}", key, value),
                Err(e) => eprintln!("Error: {}", e),
            },
            ReplCommand::Unknown(cmd) => {
                eprintln!("Unknown command: {}", cmd);
                eprintln!("{}", HELP);
            }
        }
    }

    ctx.scheduler.stop().await?;
    ctx.park_events();
    join_printer(printer).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse_tests {
        use super::*;

        #[test]
        fn parses_quit_aliases() {
            assert_eq!(ReplCommand::parse("/quit"), ReplCommand::Quit);
            assert_eq!(ReplCommand::parse("/exit"), ReplCommand::Quit);
            assert_eq!(ReplCommand::parse("/Q"), ReplCommand::Quit);
        }

        #[test]
        fn parses_scheduler_controls() {
            assert_eq!(ReplCommand::parse("/start"), ReplCommand::Start);
            assert_eq!(ReplCommand::parse("/STOP"), ReplCommand::Stop);
            assert_eq!(ReplCommand::parse("/status"), ReplCommand::Status);
        }

        #[test]
        fn parses_interval_with_value() {
            assert_eq!(
                ReplCommand::parse("/interval 2500"),
                ReplCommand::Interval(2500)
            );
            assert_eq!(
                ReplCommand::parse("/interval   800  "),
                ReplCommand::Interval(800)
            );
        }

        #[test]
        fn rejects_interval_without_number() {
            assert_eq!(
                ReplCommand::parse("/interval"),
                ReplCommand::Unknown("/interval".to_string())
            );
            assert_eq!(
                ReplCommand::parse("/interval fast"),
                ReplCommand::Unknown("/interval fast".to_string())
            );
        }

        #[test]
        fn parses_config_key() {
            assert_eq!(
                ReplCommand::parse("/config polling.delay_ms"),
                ReplCommand::Config("polling.delay_ms".to_string())
            );
            assert_eq!(
                ReplCommand::parse("/config"),
                ReplCommand::Unknown("/config".to_string())
            );
        }

        #[test]
        fn parses_bare_capture() {
            assert_eq!(
                ReplCommand::parse("/capture"),
                ReplCommand::Capture(String::new())
            );
        }

        #[test]
        fn plain_text_is_a_manual_capture() {
            assert_eq!(
                ReplCommand::parse("  I had a long day  "),
                ReplCommand::Capture("I had a long day".to_string())
            );
        }

        #[test]
        fn slash_in_middle_is_not_a_command() {
            assert_eq!(
                ReplCommand::parse("see /tmp/me.jpg"),
                ReplCommand::Capture("see /tmp/me.jpg".to_string())
            );
        }

        #[test]
        fn trailing_arguments_on_bare_commands_are_unknown() {
            assert_eq!(
                ReplCommand::parse("/start now"),
                ReplCommand::Unknown("/start now".to_string())
            );
        }

        #[test]
        fn parses_empty_input() {
            assert_eq!(ReplCommand::parse(""), ReplCommand::Empty);
            assert_eq!(ReplCommand::parse("\t\n"), ReplCommand::Empty);
        }
    }
}
