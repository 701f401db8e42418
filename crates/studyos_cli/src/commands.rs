//! Command definitions and dispatch.
//!
//! # Invariants
//! - Every command goes through one `LocalStore`; nothing touches SQL here.
//! - Failures come back as one-line messages; the binary maps them to a
//!   non-zero exit code.

use clap::{Args, Parser, Subcommand};
use log::info;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use studyos_core::{
    core_version, init_logging_from_config, new_record_id, Collection, ImportPolicy, ImportReport,
    LocalStore, StoreConfig, StoreError,
};

const BACKUP_FILE_PREFIX: &str = "productivity-backup";
const STDOUT_MARKER: &str = "-";

#[derive(Debug, Parser)]
#[command(name = "studyos", version, about = "Manage the local productivity store")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Database file (overrides STUDYOS_DB_PATH / STUDYOS_DATA_DIR).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
    /// Rolling log directory (overrides STUDYOS_LOG_DIR).
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,
    /// Log level (overrides STUDYOS_LOG_LEVEL).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the database and its collections if missing.
    Init,
    /// Print record counts per collection.
    Stats,
    /// Print every record of a collection as a JSON array.
    List { collection: Collection },
    /// Print one record.
    Get { collection: Collection, id: String },
    /// Insert a new record given as a JSON object.
    Add {
        collection: Collection,
        record: String,
        /// Assign a fresh id when the record has none.
        #[arg(long)]
        generate_id: bool,
    },
    /// Insert or fully replace a record given as a JSON object.
    Update { collection: Collection, record: String },
    /// Delete one record; missing ids are fine.
    Delete { collection: Collection, id: String },
    /// Delete every record of a collection.
    Clear {
        collection: Collection,
        /// Required confirmation for the destructive reset.
        #[arg(long)]
        yes: bool,
    },
    /// Write a backup of every collection.
    Export {
        /// Target file, `-` for stdout. Defaults to a dated file name.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Restore records from a backup file.
    Import {
        file: PathBuf,
        /// skip | overwrite | fail-fast
        #[arg(long, default_value_t = ImportPolicy::SkipExisting)]
        policy: ImportPolicy,
    },
    /// Read or write small local values.
    #[command(subcommand)]
    Local(LocalCommand),
    /// Print the core version.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum LocalCommand {
    Get { key: String },
    /// Store a JSON value; plain text is stored as a string.
    Set { key: String, value: String },
    Remove { key: String },
}

/// Runs one parsed command, writing user output to `out`.
pub fn run(cli: Cli, out: &mut dyn Write) -> Result<(), String> {
    let config = resolve_config(&cli.global);
    if let Err(err) = init_logging_from_config(&config) {
        eprintln!("warning: file logging disabled: {err}");
    }

    let store = LocalStore::from_config(&config);
    info!("event=cli_command module=cli status=start command={}", command_name(&cli.command));
    execute(&store, cli.command, out).map_err(|err| describe(&err))
}

fn resolve_config(global: &GlobalArgs) -> StoreConfig {
    let mut config = StoreConfig::from_env();
    if let Some(db) = &global.db {
        config = config.with_db_path(db);
    }
    if let Some(log_dir) = &global.log_dir {
        config.log_dir = Some(log_dir.clone());
    }
    if let Some(level) = &global.log_level {
        config.log_level = level.clone();
    }
    config
}

#[derive(Debug)]
enum CommandError {
    Store(StoreError),
    Usage(String),
    Io(String),
}

impl From<StoreError> for CommandError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

fn describe(err: &CommandError) -> String {
    match err {
        CommandError::Store(StoreError::StoreUnavailable(inner)) => {
            format!("data unavailable: {inner}")
        }
        CommandError::Store(StoreError::InvalidBackup(inner)) => {
            format!("restore failed, file invalid: {inner}")
        }
        CommandError::Store(other) => other.to_string(),
        CommandError::Usage(message) | CommandError::Io(message) => message.clone(),
    }
}

fn execute(store: &LocalStore, command: Command, out: &mut dyn Write) -> Result<(), CommandError> {
    match command {
        Command::Init => {
            store.init()?;
            let location = store
                .db_path()
                .map_or_else(|| "memory".to_string(), |path| path.display().to_string());
            emit(out, &format!("store ready at {location}"))
        }
        Command::Stats => {
            for collection in Collection::ALL {
                let count = store.count(collection)?;
                emit(out, &format!("{:<14} {count}", collection.name()))?;
            }
            Ok(())
        }
        Command::List { collection } => {
            let records: Vec<Value> = store.get_all(collection)?;
            emit_json(out, &Value::Array(records))
        }
        Command::Get { collection, id } => match store.get::<Value>(collection, &id)? {
            Some(record) => emit_json(out, &record),
            None => Err(CommandError::Usage(format!(
                "no record `{id}` in `{collection}`"
            ))),
        },
        Command::Add {
            collection,
            record,
            generate_id,
        } => {
            let mut record = parse_record(&record)?;
            if generate_id {
                ensure_id(&mut record)?;
            }
            store.add(collection, &record)?;
            emit(out, &format!("added `{}` to {collection}", display_id(&record)))
        }
        Command::Update { collection, record } => {
            let record = parse_record(&record)?;
            store.update(collection, &record)?;
            emit(out, &format!("saved `{}` in {collection}", display_id(&record)))
        }
        Command::Delete { collection, id } => {
            store.delete(collection, &id)?;
            emit(out, &format!("deleted `{id}` from {collection}"))
        }
        Command::Clear { collection, yes } => {
            if !yes {
                return Err(CommandError::Usage(format!(
                    "refusing to clear `{collection}` without --yes"
                )));
            }
            store.clear(collection)?;
            emit(out, &format!("cleared {collection}"))
        }
        Command::Export { output } => {
            let backup = store.export_all()?;
            let target = output.unwrap_or_else(default_backup_path);
            if target.as_os_str() == STDOUT_MARKER {
                return emit(out, &backup);
            }
            write_file(&target, &backup)?;
            emit(out, &format!("backup written to {}", target.display()))
        }
        Command::Import { file, policy } => {
            let backup = std::fs::read_to_string(&file).map_err(|err| {
                CommandError::Io(format!("cannot read `{}`: {err}", file.display()))
            })?;
            let report = store.import_with_policy(&backup, policy)?;
            emit(out, &summarize_import(&report))
        }
        Command::Local(LocalCommand::Get { key }) => match store.get_local::<Value>(&key)? {
            Some(value) => emit_json(out, &value),
            None => emit(out, "null"),
        },
        Command::Local(LocalCommand::Set { key, value }) => {
            let value = serde_json::from_str::<Value>(&value).unwrap_or(Value::String(value));
            store.set_local(&key, &value)?;
            emit(out, &format!("stored `{key}`"))
        }
        Command::Local(LocalCommand::Remove { key }) => {
            store.remove_local(&key)?;
            emit(out, &format!("removed `{key}`"))
        }
        Command::Version => emit(out, &format!("studyos_core {}", core_version())),
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Init => "init",
        Command::Stats => "stats",
        Command::List { .. } => "list",
        Command::Get { .. } => "get",
        Command::Add { .. } => "add",
        Command::Update { .. } => "update",
        Command::Delete { .. } => "delete",
        Command::Clear { .. } => "clear",
        Command::Export { .. } => "export",
        Command::Import { .. } => "import",
        Command::Local(_) => "local",
        Command::Version => "version",
    }
}

fn parse_record(raw: &str) -> Result<Value, CommandError> {
    serde_json::from_str(raw)
        .map_err(|err| CommandError::Usage(format!("record is not valid JSON: {err}")))
}

fn ensure_id(record: &mut Value) -> Result<(), CommandError> {
    let object = record
        .as_object_mut()
        .ok_or_else(|| CommandError::Usage("record must be a JSON object".to_string()))?;
    object
        .entry("id")
        .or_insert_with(|| Value::String(new_record_id()));
    Ok(())
}

fn display_id(record: &Value) -> &str {
    record.get("id").and_then(Value::as_str).unwrap_or_default()
}

fn default_backup_path() -> PathBuf {
    let date = chrono::Local::now().format("%Y-%m-%d");
    PathBuf::from(format!("{BACKUP_FILE_PREFIX}-{date}.json"))
}

fn write_file(path: &Path, contents: &str) -> Result<(), CommandError> {
    std::fs::write(path, contents)
        .map_err(|err| CommandError::Io(format!("cannot write `{}`: {err}", path.display())))
}

fn summarize_import(report: &ImportReport) -> String {
    let mut summary = format!(
        "imported {} new, {} replaced, {} skipped",
        report.total_inserted(),
        report.total_replaced(),
        report.skipped.len()
    );
    for skipped in &report.skipped {
        summary.push_str(&format!("\n  skipped {}/{}", skipped.collection, skipped.id));
    }
    summary
}

fn emit(out: &mut dyn Write, line: &str) -> Result<(), CommandError> {
    writeln!(out, "{line}").map_err(|err| CommandError::Io(format!("cannot write output: {err}")))
}

fn emit_json(out: &mut dyn Write, value: &Value) -> Result<(), CommandError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CommandError::Io(format!("cannot render JSON: {err}")))?;
    emit(out, &rendered)
}

#[cfg(test)]
mod tests {
    use super::{run, Cli};
    use clap::Parser;
    use serde_json::{json, Value};
    use std::path::Path;

    fn run_args(db: &Path, args: &[&str]) -> Result<String, String> {
        let db = db.to_str().expect("utf-8 temp path");
        let mut argv = vec!["studyos", "--db", db];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).map_err(|err| err.to_string())?;
        let mut out = Vec::new();
        run(cli, &mut out)?;
        Ok(String::from_utf8(out).expect("utf-8 output"))
    }

    #[test]
    fn add_then_list_shows_record() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("cli.sqlite3");

        run_args(&db, &["add", "tasks", r#"{"id":"t1","title":"Write report"}"#]).unwrap();
        let listed: Value =
            serde_json::from_str(&run_args(&db, &["list", "tasks"]).unwrap()).unwrap();

        assert_eq!(listed, json!([{"id": "t1", "title": "Write report"}]));
    }

    #[test]
    fn add_with_generate_id_assigns_one() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("cli.sqlite3");

        run_args(&db, &["add", "notes", r#"{"body":"idea"}"#, "--generate-id"]).unwrap();
        let listed: Value =
            serde_json::from_str(&run_args(&db, &["list", "notes"]).unwrap()).unwrap();

        let id = listed[0]["id"].as_str().expect("generated id");
        assert!(!id.is_empty());
    }

    #[test]
    fn duplicate_add_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("cli.sqlite3");

        run_args(&db, &["add", "habits", r#"{"id":"h1"}"#]).unwrap();
        let err = run_args(&db, &["add", "habits", r#"{"id":"h1"}"#]).unwrap_err();
        assert!(err.contains("already exists"));
    }

    #[test]
    fn unknown_collection_is_rejected_by_parser() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_args(&dir.path().join("cli.sqlite3"), &["list", "projects"]).unwrap_err();
        assert!(err.contains("projects"));
    }

    #[test]
    fn clear_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("cli.sqlite3");
        run_args(&db, &["add", "goals", r#"{"id":"g1"}"#]).unwrap();

        assert!(run_args(&db, &["clear", "goals"]).is_err());
        run_args(&db, &["clear", "goals", "--yes"]).unwrap();
        assert!(run_args(&db, &["stats"]).unwrap().contains("goals          0"));
    }

    #[test]
    fn export_and_import_between_databases() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.sqlite3");
        let target = dir.path().join("target.sqlite3");
        let backup = dir.path().join("backup.json");
        let backup_arg = backup.to_str().unwrap();

        run_args(&source, &["add", "journal", r#"{"id":"j1","text":"calm"}"#]).unwrap();
        run_args(&source, &["export", "--output", backup_arg]).unwrap();
        let summary = run_args(&target, &["import", backup_arg]).unwrap();
        assert!(summary.starts_with("imported 1 new"));

        let again = run_args(&target, &["import", backup_arg]).unwrap();
        assert!(again.contains("1 skipped"));
        assert!(again.contains("skipped journal/j1"));
    }

    #[test]
    fn invalid_backup_message_is_actionable() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("broken.json");
        std::fs::write(&backup, "{ nope").unwrap();

        let err = run_args(
            &dir.path().join("cli.sqlite3"),
            &["import", backup.to_str().unwrap()],
        )
        .unwrap_err();
        assert!(err.starts_with("restore failed, file invalid"));
    }

    #[test]
    fn local_values_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("cli.sqlite3");

        run_args(&db, &["local", "set", "quickNote", "call mom"]).unwrap();
        assert_eq!(run_args(&db, &["local", "get", "quickNote"]).unwrap().trim(), "\"call mom\"");

        run_args(&db, &["local", "remove", "quickNote"]).unwrap();
        assert_eq!(run_args(&db, &["local", "get", "quickNote"]).unwrap().trim(), "null");
    }
}
