use std::path::{Path, PathBuf};

use anyhow::Result;

use forkrun::config::{
    DEFAULT_WORKER_PROGRAM, default_config_path, load_and_validate, load_from_path,
    load_run_configuration,
};
use forkrun::fingerprint::fingerprint;
use forkrun::logging::LogLevel;
use forkrun_test_utils::init_tracing;

fn write_config(dir: &Path, body: &str) -> Result<PathBuf> {
    let path = dir.join(default_config_path());
    std::fs::write(&path, body)?;
    Ok(path)
}

#[test]
fn empty_file_uses_defaults() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = write_config(dir.path(), "")?;

    let cfg = load_and_validate(&path)?;
    let run = cfg.run_configuration(dir.path())?;

    assert_eq!(run.worker.program, PathBuf::from(DEFAULT_WORKER_PROGRAM));
    assert!(run.worker.args.is_empty());
    assert!(run.require.is_empty());
    assert_eq!(run.color, None);
    assert_eq!(run.cache_dir, None);
    assert_eq!(cfg.transform.extension, "fk");
    assert!(cfg.transform.cmd.is_none());
    Ok(())
}

#[test]
fn full_file_is_converted() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let fp = fingerprint(b"pass a\n", b"identity|fk");
    let path = write_config(
        dir.path(),
        &format!(
            r#"
[run]
require = ["helpers/setup.fk"]
color = false
cache_dir = ".forkrun/cache"
worker = ["node", "worker.js", "--quiet"]

[run.env]
TZ = "UTC"

[run.precompiled]
"test/a.fk" = "{fp}"

[transform]
cmd = "tr a-z A-Z"
extension = "js"

[log]
level = "debug"
"#
        ),
    )?;

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.log.level, Some(LogLevel::Debug));
    assert_eq!(cfg.transform.build().extension(), "js");

    let run = cfg.run_configuration(dir.path())?;
    assert_eq!(run.require, vec!["helpers/setup.fk".to_string()]);
    assert_eq!(run.color, Some(false));
    assert_eq!(run.cache_dir, Some(dir.path().join(".forkrun/cache")));
    assert_eq!(run.worker.program, PathBuf::from("node"));
    assert_eq!(run.worker.args, vec!["worker.js", "--quiet"]);
    assert_eq!(run.env.get("TZ").map(String::as_str), Some("UTC"));
    assert_eq!(run.precompiled.get(Path::new("test/a.fk")), Some(&fp));

    let cache = run.precompile_cache(cfg.transform.build());
    assert_eq!(cache.cache_dir(), Some(dir.path().join(".forkrun/cache").as_path()));
    Ok(())
}

#[test]
fn bad_fingerprint_fails_validation() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = write_config(
        dir.path(),
        "[run.precompiled]\n\"a.fk\" = \"not-a-fingerprint\"\n",
    )?;

    // Parsing alone accepts it; validation does not.
    load_from_path(&path)?;
    let err = load_and_validate(&path).expect_err("fingerprint is malformed");
    assert!(format!("{err:#}").contains("a.fk"), "{err:#}");
    Ok(())
}

#[test]
fn empty_worker_command_is_rejected() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = write_config(dir.path(), "[run]\nworker = []\n")?;

    let err = load_and_validate(&path).expect_err("no worker program");
    assert!(format!("{err:#}").contains("[run].worker"), "{err:#}");
    Ok(())
}

#[test]
fn dotted_extension_is_rejected() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = write_config(dir.path(), "[transform]\nextension = \".js\"\n")?;

    assert!(load_and_validate(&path).is_err());
    Ok(())
}

#[test]
fn unknown_log_level_is_a_parse_error() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = write_config(dir.path(), "[log]\nlevel = \"loud\"\n")?;

    let err = load_from_path(&path).expect_err("level is unknown");
    assert!(format!("{err:#}").contains("parsing TOML"), "{err:#}");
    Ok(())
}

#[test]
fn relative_paths_resolve_against_the_config_directory() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let nested = dir.path().join("project");
    std::fs::create_dir_all(&nested)?;
    let path = write_config(&nested, "[run]\ncache_dir = \"cache\"\n[log]\nlevel = \"warn\"\n")?;

    let (cfg, run) = load_run_configuration(&path)?;
    assert_eq!(run.cache_dir, Some(nested.join("cache")));
    assert_eq!(cfg.log.level, Some(LogLevel::Warn));
    Ok(())
}
