// src/worker/mod.rs

//! The worker side: what runs inside a spawned process.
//!
//! [`run_worker`] reads the spawn message, loads the required modules and
//! the artifact, executes them as test scripts and reports over the
//! protocol. The `forkrun-worker` binary is a thin wrapper around it.

pub mod clock;
pub mod script;
pub mod session;

use std::io::{BufRead, Write};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::ipc::{SpawnMessage, decode_line};

pub use clock::{Clock, FakeClock, Stopwatch, SystemClock};
pub use script::{Step, parse_script, run_script};
pub use session::WorkerSession;

/// Read the single spawn message the parent writes to stdin.
pub fn read_spawn_message<R: BufRead>(input: &mut R) -> Result<SpawnMessage> {
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("reading spawn message")?;
    decode_line::<SpawnMessage>(&line)?
        .ok_or_else(|| anyhow!("expected a spawn message on stdin, got {:?}", line.trim()))
}

/// Decide whether coloured output is enabled.
///
/// An explicit option wins. Otherwise `FORCE_COLOR` decides ("0" or "false"
/// disables, anything else enables), then `NO_COLOR` disables, and finally
/// colour follows whether stderr is a terminal.
pub fn resolve_color(
    option: Option<bool>,
    env: impl Fn(&str) -> Option<String>,
    stderr_is_terminal: bool,
) -> bool {
    if let Some(color) = option {
        return color;
    }
    if let Some(force) = env("FORCE_COLOR") {
        return !matches!(force.trim(), "0" | "false");
    }
    if env("NO_COLOR").is_some() {
        return false;
    }
    stderr_is_terminal
}

/// Run one worker to completion.
///
/// Returns the exit code the process should end with. A script that asks
/// to exit is honoured without sending results.
pub async fn run_worker<R, W>(
    mut input: R,
    output: W,
    detect_color: impl FnOnce(Option<bool>) -> bool,
) -> Result<i32>
where
    R: BufRead,
    W: Write,
{
    let spawn = read_spawn_message(&mut input)?;
    let color = detect_color(spawn.color);
    debug!(file = ?spawn.file, color, require = spawn.require.len(), "worker starting");

    let mut steps = Vec::new();
    for module in &spawn.require {
        let text = std::fs::read_to_string(module)
            .with_context(|| format!("reading required module {module}"))?;
        steps.extend(parse_script(&text).with_context(|| format!("in required module {module}"))?);
    }

    let payload = spawn
        .artifact
        .load_in(spawn.cache_dir.as_deref())
        .with_context(|| format!("loading artifact {}", spawn.artifact.fingerprint))?;
    steps.extend(parse_script(&payload).with_context(|| format!("in {}", spawn.file.display()))?);

    let mut session = WorkerSession::new(spawn.file, output, color);
    session.announce()?;

    if let Some(code) = run_script(&mut session, steps).await? {
        debug!(code, "script requested exit");
        return Ok(code);
    }

    session.finish().await?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::*;
    use crate::cache::{ArtifactSource, PrecompiledArtifact};
    use crate::fingerprint::fingerprint;
    use crate::ipc::{WorkerMessage, encode_line};

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn explicit_color_wins_over_environment() {
        assert!(resolve_color(Some(true), env_of(&[("NO_COLOR", "1")]), false));
        assert!(!resolve_color(Some(false), env_of(&[("FORCE_COLOR", "1")]), true));
    }

    #[test]
    fn color_falls_back_to_environment_then_terminal() {
        assert!(!resolve_color(None, env_of(&[("FORCE_COLOR", "0")]), true));
        assert!(resolve_color(None, env_of(&[("FORCE_COLOR", "1")]), false));
        assert!(!resolve_color(None, env_of(&[("NO_COLOR", "")]), true));
        assert!(resolve_color(None, env_of(&[]), true));
        assert!(!resolve_color(None, env_of(&[]), false));
    }

    fn spawn_line(payload: &str, require: Vec<String>) -> Result<String> {
        let msg = SpawnMessage {
            file: PathBuf::from("inline.fk"),
            artifact: PrecompiledArtifact {
                fingerprint: fingerprint(payload.as_bytes(), b""),
                source: ArtifactSource::Inline {
                    payload: payload.to_string(),
                },
            },
            require,
            color: Some(true),
            cache_dir: None,
        };
        Ok(encode_line(&msg)?)
    }

    #[tokio::test]
    async fn runs_required_modules_before_the_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let setup = dir.path().join("setup.fk");
        std::fs::write(&setup, "pass setup ran\n")?;

        let line = spawn_line(
            "pass main\nexpect-color on\n",
            vec![setup.display().to_string()],
        )?;
        let mut out = Vec::new();
        let code = run_worker(line.as_bytes(), &mut out, |opt| opt.unwrap_or(false)).await?;
        assert_eq!(code, 0);

        let titles: Vec<String> = String::from_utf8(out)?
            .lines()
            .filter_map(|l| decode_line::<WorkerMessage>(l).ok().flatten())
            .filter_map(|m| match m {
                WorkerMessage::Test(t) => Some(t.title),
                _ => None,
            })
            .collect();
        assert_eq!(titles, vec!["setup ran", "main", "color is on"]);
        Ok(())
    }

    #[tokio::test]
    async fn exit_directive_skips_results() -> Result<()> {
        let line = spawn_line("pass first\nexit 0\npass never\n", Vec::new())?;
        let mut out = Vec::new();
        let code = run_worker(line.as_bytes(), &mut out, |_| false).await?;
        assert_eq!(code, 0);

        let kinds: Vec<&'static str> = String::from_utf8(out)?
            .lines()
            .filter_map(|l| decode_line::<WorkerMessage>(l).ok().flatten())
            .map(|m| m.kind())
            .collect();
        assert_eq!(kinds, vec!["stats", "test", "stats"]);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_script_fails_before_reporting() {
        let line = spawn_line("pass ok\nfrobnicate\n", Vec::new()).expect("encode");
        let mut out = Vec::new();
        let err = run_worker(line.as_bytes(), &mut out, |_| false)
            .await
            .expect_err("script is malformed");
        assert!(format!("{err:#}").contains("unknown directive"), "{err:#}");
        assert!(out.is_empty());
    }
}
