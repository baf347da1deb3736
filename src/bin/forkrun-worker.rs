// src/bin/forkrun-worker.rs

//! Worker process spawned by the forkrun manager.
//!
//! Reads one spawn message from stdin, runs the artifact and reports on
//! stdout. Diagnostics go to stderr.

use std::io::{BufReader, IsTerminal};

use forkrun::logging::init_logging;
use forkrun::worker::{resolve_color, run_worker};

#[tokio::main]
async fn main() {
    // A parent that already installed logging for us is not an error.
    let _ = init_logging(None);

    let stdin = BufReader::new(std::io::stdin());
    let stdout = std::io::stdout();
    let detect = |option| {
        resolve_color(
            option,
            |key| std::env::var(key).ok(),
            std::io::stderr().is_terminal(),
        )
    };

    let code = match run_worker(stdin, stdout, detect).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("forkrun-worker: {e:#}");
            1
        }
    };
    std::process::exit(code);
}
