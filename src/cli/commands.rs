//! CLI command implementations
//!
//! Each command loads the config, opens the store, runs recovery, does its
//! one thing and stops the store again. Commands return the JSON payload
//! they report; `run_command` prints it.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};

use crate::config::StoreConfig;
use crate::journal::{list_segments, FileJournal};
use crate::store::{RecoverableStore, RecoveryReport};
use crate::uid::Uid;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let data = match cmd {
        Command::Init { config } => init(&config)?,
        Command::Inspect { config } => inspect(&config)?,
        Command::Read { config, type_name, uid } => read(&config, &type_name, &uid)?,
        Command::Remove { config, type_name, uid } => remove(&config, &type_name, &uid)?,
    };
    write_response(data)
}

/// Create the store directory and its first journal segment
///
/// Fails if the directory already holds journal segments.
pub fn init(config_path: &Path) -> CliResult<Value> {
    let config = StoreConfig::load(config_path)?;
    if is_initialized(&config)? {
        return Err(CliError::AlreadyInitialized(config.store_dir.display().to_string()));
    }

    let mut store = RecoverableStore::open(&config)?;
    store.start()?;
    let name = store.store_name();
    store.stop()?;

    Ok(json!({ "initialized": true, "store": name }))
}

/// Recover the store and summarize what is in it
///
/// Types are listed in name order with the number of uids under each.
pub fn inspect(config_path: &Path) -> CliResult<Value> {
    let (mut store, report) = open_existing(config_path)?;

    let mut types = Vec::new();
    for type_name in &report.types {
        let uids = store.identities_for_type(type_name)?;
        types.push(json!({ "type_name": type_name, "uids": uids.len() }));
    }
    let name = store.store_name();
    store.stop()?;

    Ok(json!({
        "store": name,
        "types": types,
        "recovery": serde_json::to_value(&report)?,
    }))
}

/// Print the committed state of one object, base64 encoded
pub fn read(config_path: &Path, type_name: &str, uid: &str) -> CliResult<Value> {
    let uid = parse_uid(uid)?;
    let (mut store, _) = open_existing(config_path)?;
    let state = store.read_committed(&uid, type_name)?;
    store.stop()?;

    Ok(match state {
        Some(object) => json!({
            "found": true,
            "uid": object.uid,
            "type_name": object.type_name,
            "state": STANDARD.encode(&object.state),
        }),
        None => json!({
            "found": false,
            "uid": uid,
            "type_name": type_name,
        }),
    })
}

/// Remove the committed state of one object
///
/// `removed` is false when the journal had nothing live for the object.
pub fn remove(config_path: &Path, type_name: &str, uid: &str) -> CliResult<Value> {
    let uid = parse_uid(uid)?;
    let (mut store, _) = open_existing(config_path)?;
    let removed = store.remove_committed(&uid, type_name)?;
    store.stop()?;

    Ok(json!({
        "removed": removed,
        "uid": uid,
        "type_name": type_name,
    }))
}

fn parse_uid(s: &str) -> CliResult<Uid> {
    s.parse()
        .map_err(|e| CliError::InvalidArgument(format!("invalid uid '{}': {}", s, e)))
}

fn is_initialized(config: &StoreConfig) -> CliResult<bool> {
    let segments = list_segments(
        &config.store_dir,
        &config.journal.file_prefix,
        &config.journal.file_extension,
    )
    .map_err(|e| CliError::Store(e.into()))?;
    Ok(!segments.is_empty())
}

fn open_existing(config_path: &Path) -> CliResult<(RecoverableStore<FileJournal>, RecoveryReport)> {
    let config = StoreConfig::load(config_path)?;
    if !is_initialized(&config)? {
        return Err(CliError::NotInitialized(config.store_dir.display().to_string()));
    }

    let mut store = RecoverableStore::open(&config)?;
    let report = store.start()?;
    Ok((store, report))
}
