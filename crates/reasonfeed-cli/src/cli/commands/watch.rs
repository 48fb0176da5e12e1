//! Live view: prints the merged conversation whenever it changes and
//! submits stdin lines as messages.

use std::sync::Arc;

use anyhow::Result;
use reasonfeed_core::config::Config;
use reasonfeed_core::engine::Engine;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::cli::render;

pub struct WatchOptions {
    pub read_stdin: bool,
    pub once: bool,
}

pub async fn run(config: &Config, options: WatchOptions) -> Result<()> {
    let engine = Engine::from_config(config)?;
    let mut view = engine.view();
    let mut live = engine.live();

    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    let mut stdin_open = options.read_stdin;
    if options.read_stdin {
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        });
        eprintln!("Type a message and press Enter to send it. {RESET_COMMAND} clears reasoning.");
        eprintln!("Ctrl+C quits.");
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                eprintln!("Shutting down.");
                break;
            }
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let items = Arc::clone(&view.borrow_and_update());
                println!("---- {} item(s) ----", items.len());
                print!("{}", render::render_view(&items));
                if options.once && !items.is_empty() {
                    break;
                }
            }
            changed = live.changed() => {
                if changed.is_err() {
                    break;
                }
                if *live.borrow_and_update() {
                    eprintln!("[stream connected]");
                } else {
                    eprintln!("[stream disconnected, reconnecting]");
                }
            }
            line = line_rx.recv(), if stdin_open => {
                match line {
                    Some(line) => match parse_line(&line) {
                        Some(LineAction::Reset) => {
                            engine.reset();
                            eprintln!("[reasoning cleared]");
                        }
                        Some(LineAction::Submit(message)) => submit(&engine, message),
                        None => {}
                    },
                    None => stdin_open = false,
                }
            }
        }
    }

    engine.shutdown().await;
    Ok(())
}

/// Typed at the prompt to clear the reasoning tree.
const RESET_COMMAND: &str = "/reset";

#[derive(Debug, PartialEq, Eq)]
enum LineAction {
    Reset,
    Submit(String),
}

fn parse_line(line: &str) -> Option<LineAction> {
    let line = line.trim();
    if line.is_empty() {
        None
    } else if line == RESET_COMMAND {
        Some(LineAction::Reset)
    } else {
        Some(LineAction::Submit(line.to_string()))
    }
}

fn submit(engine: &Engine, message: String) {
    let submitter = engine.submitter();
    tokio::spawn(async move {
        match submitter.submit(&message).await {
            Ok(submission) => eprintln!(
                "[sent {} -> task {}]",
                submission.message_id,
                submission.task_id.as_deref().unwrap_or("-")
            ),
            Err(err) => eprintln!("[not sent: {err}]"),
        }
    });
}
