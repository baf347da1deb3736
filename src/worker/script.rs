// src/worker/script.rs

//! Line-oriented test scripts executed by the bundled worker.
//!
//! ```text
//! # comment
//! pass adds numbers
//! fail rejects input: expected 1 to equal 2
//! skip not yet
//! sleep 50
//! defer 200
//! fake-clock 1000000
//! expect-color on
//! exit 3
//! ```

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::errors::ScriptError;

use super::clock::FakeClock;
use super::session::WorkerSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Pass(String),
    Fail { title: String, message: String },
    Skip(String),
    /// Block the script for a while.
    Sleep(Duration),
    /// Start background work that outlives the test that started it.
    Defer(Duration),
    /// Replace the test clock with one jumping this many ms per read.
    FakeClock(u64),
    /// Record a test asserting the resolved colour setting.
    ExpectColor(bool),
    /// Exit immediately with this code.
    Exit(i32),
}

pub fn parse_script(text: &str) -> Result<Vec<Step>, ScriptError> {
    let mut steps = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        steps.push(parse_line(idx + 1, line)?);
    }
    Ok(steps)
}

fn parse_line(line_no: usize, line: &str) -> Result<Step, ScriptError> {
    let (directive, rest) = match line.split_once(char::is_whitespace) {
        Some((d, rest)) => (d, rest.trim()),
        None => (line, ""),
    };

    let invalid = |directive: &'static str, reason: &str| ScriptError::InvalidArgument {
        line: line_no,
        directive,
        reason: reason.to_string(),
    };

    let step = match directive {
        "pass" => Step::Pass(title(rest).ok_or_else(|| invalid("pass", "needs a title"))?),
        "skip" => Step::Skip(title(rest).ok_or_else(|| invalid("skip", "needs a title"))?),
        "fail" => {
            let (t, message) = rest
                .split_once(':')
                .ok_or_else(|| invalid("fail", "expects '<title>: <message>'"))?;
            Step::Fail {
                title: title(t).ok_or_else(|| invalid("fail", "needs a title"))?,
                message: message.trim().to_string(),
            }
        }
        "sleep" => Step::Sleep(Duration::from_millis(
            rest.parse()
                .map_err(|_| invalid("sleep", "expects milliseconds"))?,
        )),
        "defer" => Step::Defer(Duration::from_millis(
            rest.parse()
                .map_err(|_| invalid("defer", "expects milliseconds"))?,
        )),
        "fake-clock" => Step::FakeClock(
            rest.parse()
                .map_err(|_| invalid("fake-clock", "expects milliseconds"))?,
        ),
        "expect-color" => match rest {
            "on" => Step::ExpectColor(true),
            "off" => Step::ExpectColor(false),
            _ => return Err(invalid("expect-color", "expects 'on' or 'off'")),
        },
        "exit" => Step::Exit(
            rest.parse()
                .map_err(|_| invalid("exit", "expects an exit code"))?,
        ),
        other => {
            return Err(ScriptError::UnknownDirective {
                line: line_no,
                directive: other.to_string(),
            });
        }
    };
    Ok(step)
}

fn title(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Execute `steps` against `session`.
///
/// Returns `Some(code)` when the script asked to exit; the caller must then
/// end the process without finishing the session.
pub async fn run_script<W: Write>(
    session: &mut WorkerSession<W>,
    steps: Vec<Step>,
) -> Result<Option<i32>> {
    for step in steps {
        match step {
            Step::Pass(title) => session.run_test(title, |_| Ok(()))?,
            Step::Fail { title, message } => session.run_test(title, |_| Err(message))?,
            Step::Skip(title) => session.skip(title)?,
            Step::Sleep(d) => tokio::time::sleep(d).await,
            Step::Defer(d) => session.defer(tokio::time::sleep(d)),
            Step::FakeClock(step_ms) => {
                let start = session.clock().now_ms();
                session.install_clock(Arc::new(FakeClock::new(start, step_ms)));
            }
            Step::ExpectColor(expected) => {
                let actual = session.color_enabled();
                let title = format!("color is {}", if expected { "on" } else { "off" });
                session.run_test(title, |_| {
                    if actual == expected {
                        Ok(())
                    } else {
                        Err(format!("expected color {expected}, got {actual}"))
                    }
                })?
            }
            Step::Exit(code) => return Ok(Some(code)),
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_directive() -> Result<()> {
        let steps = parse_script(
            "# setup\n\
             pass adds numbers\n\
             fail rejects: expected 1 to equal 2\n\
             skip later\n\
             \n\
             sleep 5\n\
             defer 200\n\
             fake-clock 1000000\n\
             expect-color off\n\
             exit 3\n",
        )?;
        assert_eq!(
            steps,
            vec![
                Step::Pass("adds numbers".into()),
                Step::Fail {
                    title: "rejects".into(),
                    message: "expected 1 to equal 2".into()
                },
                Step::Skip("later".into()),
                Step::Sleep(Duration::from_millis(5)),
                Step::Defer(Duration::from_millis(200)),
                Step::FakeClock(1_000_000),
                Step::ExpectColor(false),
                Step::Exit(3),
            ]
        );
        Ok(())
    }

    #[test]
    fn reports_the_offending_line() {
        let err = parse_script("pass a\nexplode now\n").expect_err("unknown directive");
        assert_eq!(
            err,
            ScriptError::UnknownDirective {
                line: 2,
                directive: "explode".into()
            }
        );

        let err = parse_script("sleep soon").expect_err("bad argument");
        assert_eq!(err.to_string(), "line 1: sleep expects milliseconds");
    }

    #[test]
    fn pass_without_title_is_rejected() {
        assert!(matches!(
            parse_script("pass"),
            Err(ScriptError::InvalidArgument { directive: "pass", .. })
        ));
    }
}
