//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, AppState};
use crate::config::{BackendKind, Settings, load_roster};
use crate::logging::TracingSink;
use chrono::NaiveDate;
use rollbook_core::{
    Actor, AttendanceRecord, AttendanceStatus, ClassId, Filter, FixedClock, MarkRequest,
    MemoryStore, RecordFilter, Register, RollbookError, Snapshot, StudentFilter, StudentId,
    SubmissionState, snapshot_from_bytes, snapshot_to_bytes,
};
use std::io::Write;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for import and for the file backend (256 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// Roster written by `init` when none exists yet.
const ROSTER_TEMPLATE: &str = r#"# Rollbook roster
#
# [[classes]]
# id = "7B"
# name = "Year 7 Blue"
# teacher_id = "t.okafor"
#
# [[students]]
# id = "S1"
# name = "Ada Byron"
# class_id = "7B"
"#;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), RollbookError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| RollbookError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(RollbookError::ValidationFailed(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path: symlinks and ".." are resolved and the target must
/// be a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, RollbookError> {
    let canonical = path.canonicalize().map_err(|e| {
        RollbookError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(RollbookError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path against its canonical parent directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, RollbookError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        RollbookError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(RollbookError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| RollbookError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// COMMAND CONTEXT
// =============================================================================

/// Everything a command needs besides its own arguments.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub settings: Settings,
    pub actor: Option<Actor>,
    pub json_mode: bool,
}

impl CommandContext {
    /// The acting user; commands that change records require one.
    pub fn actor(&self) -> Result<&Actor, RollbookError> {
        self.actor.as_ref().ok_or_else(|| {
            RollbookError::ValidationFailed(
                "This command needs --actor and --role".to_string(),
            )
        })
    }

    fn print_json(&self, value: &serde_json::Value) {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(ctx: &CommandContext) -> Result<(), RollbookError> {
    let settings = &ctx.settings;
    let register = open_register(settings)?;

    println!("Rollbook Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", settings.server.host);
    println!("  Port:     {}", settings.server.port);
    println!("  Backend:  {}", settings.backend);
    println!("  Database: {:?}", settings.database);
    println!("  Roster:   {:?}", settings.roster);
    println!();
    println!("Endpoints:");
    println!("  POST /attendance/mark       - Mark one student");
    println!("  POST /attendance/mark-many  - Mark several students");
    println!("  POST /attendance/submit     - Submit a class/date");
    println!("  POST /attendance/unlock     - Reopen a class/date");
    println!("  GET  /attendance/status     - Status of a student on a date");
    println!("  GET  /attendance/history    - History of a student");
    println!("  GET  /attendance/records    - Filtered records");
    println!("  GET  /attendance/summary    - Present/late/absent counts");
    println!("  GET  /students              - Filtered roster students");
    println!("  GET  /health                - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = match settings.backend {
        BackendKind::Redb => AppState::new(register),
        BackendKind::File => AppState::new(register).with_snapshot_file(&settings.database),
    };
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    api::run_server(&addr, state).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database, and a roster template if there is none.
pub fn cmd_init(ctx: &CommandContext, force: bool) -> Result<(), RollbookError> {
    let settings = &ctx.settings;
    let db_path = &settings.database;

    if db_path.exists() {
        if !force {
            return Err(RollbookError::ValidationFailed(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| RollbookError::IoError(format!("Remove db: {}", e)))?;
    }

    match settings.backend {
        BackendKind::Redb => {
            let _register = Register::with_redb(db_path, Default::default())?;
            println!("Initialized new redb database at {:?}", db_path);
        }
        BackendKind::File => {
            let data = snapshot_to_bytes(&Snapshot::default())?;
            std::fs::write(db_path, data)
                .map_err(|e| RollbookError::IoError(format!("Write db: {}", e)))?;
            println!("Initialized new file database at {:?}", db_path);
        }
    }

    if !settings.roster.exists() {
        std::fs::write(&settings.roster, ROSTER_TEMPLATE)
            .map_err(|e| RollbookError::IoError(format!("Write roster: {}", e)))?;
        println!("Wrote roster template to {:?}", settings.roster);
    }

    Ok(())
}

// =============================================================================
// MARK / SUBMIT / UNLOCK
// =============================================================================

/// Mark one student.
pub fn cmd_mark(
    ctx: &CommandContext,
    class: &str,
    student: &str,
    status: AttendanceStatus,
    date: Option<NaiveDate>,
    remark: Option<String>,
) -> Result<(), RollbookError> {
    let actor = ctx.actor()?;
    let mut register = open_register(&ctx.settings)?;
    let date = date.unwrap_or_else(|| register.today());

    let mut request = MarkRequest::new(student, class, date, status);
    if let Some(remark) = remark {
        request = request.with_remark(remark);
    }
    let outcome = register.mark_attendance(actor, request)?;
    save_register(&register, &ctx.settings)?;

    if ctx.json_mode {
        ctx.print_json(&serde_json::json!({
            "change": outcome.change,
            "record": outcome.record,
        }));
        return Ok(());
    }

    println!(
        "Marked {} for {} in {} on {} ({:?})",
        outcome.record.status, student, class, date, outcome.change
    );
    Ok(())
}

/// Submit a class/date; unmarked roster members become absent.
pub fn cmd_submit(
    ctx: &CommandContext,
    class: &str,
    date: Option<NaiveDate>,
) -> Result<(), RollbookError> {
    let actor = ctx.actor()?;
    let mut register = open_register(&ctx.settings)?;
    let date = date.unwrap_or_else(|| register.today());

    let report = register.submit_attendance(actor, &ClassId::new(class), date)?;
    save_register(&register, &ctx.settings)?;

    if ctx.json_mode {
        ctx.print_json(&serde_json::json!(report));
        return Ok(());
    }

    println!("Submitted {} for {}", report.class, report.date);
    println!("  Already marked:   {}", report.already_marked);
    println!("  Marked absent:    {}", report.completed.len());
    for student in &report.completed {
        println!("    {}", student);
    }
    Ok(())
}

/// Reopen a submitted class/date.
pub fn cmd_unlock(
    ctx: &CommandContext,
    class: &str,
    date: Option<NaiveDate>,
) -> Result<(), RollbookError> {
    let actor = ctx.actor()?;
    let mut register = open_register(&ctx.settings)?;
    let date = date.unwrap_or_else(|| register.today());

    let previous = register.unlock_submission(actor, &ClassId::new(class), date)?;
    save_register(&register, &ctx.settings)?;

    if ctx.json_mode {
        ctx.print_json(&serde_json::json!({
            "class": class,
            "date": date,
            "was_submitted": previous.is_submitted(),
        }));
        return Ok(());
    }

    match previous {
        SubmissionState::Submitted { by, at } => {
            println!("Unlocked {} for {} (submitted by {} at {})", class, date, by, at);
        }
        SubmissionState::Open => println!("{} for {} was not submitted", class, date),
    }
    Ok(())
}

// =============================================================================
// QUERY COMMANDS
// =============================================================================

/// Show a student's status on a date.
pub fn cmd_status(
    ctx: &CommandContext,
    student: &str,
    date: Option<NaiveDate>,
) -> Result<(), RollbookError> {
    let register = open_register(&ctx.settings)?;
    let date = date.unwrap_or_else(|| register.today());
    let status = register.attendance_status(&StudentId::new(student), date)?;

    if ctx.json_mode {
        ctx.print_json(&serde_json::json!({
            "student": student,
            "date": date,
            "status": status,
        }));
        return Ok(());
    }

    match status {
        Some(status) => println!("{} on {}: {}", student, date, status),
        None => println!("{} on {}: not marked", student, date),
    }
    Ok(())
}

/// Show a student's attendance history.
pub fn cmd_history(ctx: &CommandContext, student: &str) -> Result<(), RollbookError> {
    let register = open_register(&ctx.settings)?;
    let records = register.student_history(&StudentId::new(student))?;

    if ctx.json_mode {
        ctx.print_json(&serde_json::json!(records));
        return Ok(());
    }

    println!("Attendance history for {}", student);
    print_records(&records);
    Ok(())
}

/// List attendance records.
pub fn cmd_records(
    ctx: &CommandContext,
    class: &str,
    student: &str,
    date: Option<NaiveDate>,
) -> Result<(), RollbookError> {
    let register = open_register(&ctx.settings)?;
    let records = register.filtered_records(&record_filter(class, student, date))?;

    if ctx.json_mode {
        ctx.print_json(&serde_json::json!(records));
        return Ok(());
    }

    print_records(&records);
    Ok(())
}

/// List roster students visible to the actor.
pub fn cmd_students(
    ctx: &CommandContext,
    class: &str,
    student: &str,
    search: String,
) -> Result<(), RollbookError> {
    let actor = ctx.actor()?;
    let register = open_register(&ctx.settings)?;
    let filter = StudentFilter {
        class: Filter::parse(class),
        student: Filter::parse(student),
        search,
    };
    let students = register.filter_students(actor, &filter)?;

    if ctx.json_mode {
        ctx.print_json(&serde_json::json!(students));
        return Ok(());
    }

    if students.is_empty() {
        println!("No students");
    }
    for s in &students {
        println!("{:<12} {:<32} {}", s.id, s.name, s.class_id);
    }
    Ok(())
}

/// Count present, late and absent records.
pub fn cmd_summary(
    ctx: &CommandContext,
    class: &str,
    student: &str,
    date: Option<NaiveDate>,
) -> Result<(), RollbookError> {
    let register = open_register(&ctx.settings)?;
    let summary = register.summary(&record_filter(class, student, date))?;

    if ctx.json_mode {
        ctx.print_json(&serde_json::json!(summary));
        return Ok(());
    }

    println!("Rollbook Attendance Summary");
    println!("===========================");
    println!("Database: {:?}", ctx.settings.database);
    println!("Backend:  {}", ctx.settings.backend);
    println!();
    println!("Present: {}", summary.present);
    println!("Late:    {}", summary.late);
    println!("Absent:  {}", summary.absent);
    println!("Total:   {}", summary.total);
    println!("Rate:    {}%", summary.attendance_rate_percent);
    Ok(())
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

/// Export all records and submission states.
pub fn cmd_export(ctx: &CommandContext, output: &Path, format: &str) -> Result<(), RollbookError> {
    let validated_output = validate_output_path(output)?;
    let register = open_register(&ctx.settings)?;
    let snapshot = register.snapshot()?;

    let data = match format {
        "snapshot" => snapshot_to_bytes(&snapshot)?,
        "json" => serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| RollbookError::SerializationError(e.to_string()))?,
        _ => {
            return Err(RollbookError::ValidationFailed(format!(
                "Unknown format: {}. Use: snapshot, json",
                format
            )));
        }
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| RollbookError::IoError(format!("Write file: {}", e)))?;

    println!(
        "Exported {} records ({} bytes) to {:?}",
        snapshot.records.len(),
        data.len(),
        validated_output
    );
    Ok(())
}

/// Import a snapshot (binary or JSON) into an empty database.
pub fn cmd_import(ctx: &CommandContext, input: &Path) -> Result<(), RollbookError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_IMPORT_FILE_SIZE)?;

    let data = std::fs::read(&validated_path)
        .map_err(|e| RollbookError::IoError(format!("Read file: {}", e)))?;
    let snapshot = decode_snapshot(&data)?;

    let mut register = open_register(&ctx.settings)?;
    if register.record_count()? > 0 {
        return Err(RollbookError::ValidationFailed(
            "Database is not empty. Run init --force first.".to_string(),
        ));
    }
    let count = register.import(snapshot)?;
    save_register(&register, &ctx.settings)?;

    println!("Imported {} records into {:?}", count, ctx.settings.database);
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the configured backend, roster and clock as one `Register`.
pub fn open_register(settings: &Settings) -> Result<Register, RollbookError> {
    let roster = load_roster(&settings.roster)?;
    let register = match settings.backend {
        BackendKind::Redb => Register::with_redb(&settings.database, roster)?,
        BackendKind::File => {
            if settings.database.exists() {
                validate_file_size(&settings.database, MAX_IMPORT_FILE_SIZE)?;
                let data = std::fs::read(&settings.database)
                    .map_err(|e| RollbookError::IoError(format!("Read db: {}", e)))?;
                let store = MemoryStore::from_snapshot(snapshot_from_bytes(&data)?)?;
                Register::with_store(store, roster)
            } else {
                Register::new(roster)
            }
        }
    };

    let register = match settings.today {
        Some(day) => register.with_clock(FixedClock::new(day)),
        None => register,
    };
    Ok(register.with_sink(TracingSink))
}

/// Persist a register; redb commits on every call, so only the file backend
/// writes here.
pub fn save_register(register: &Register, settings: &Settings) -> Result<(), RollbookError> {
    if register.is_persistent() {
        return Ok(());
    }
    write_snapshot(register, &settings.database)
}

/// Write the whole register as a binary snapshot.
///
/// The bytes go to a sibling `.tmp` file that is renamed over `path`, so a
/// failed write leaves the previous snapshot intact.
pub fn write_snapshot(register: &Register, path: &Path) -> Result<(), RollbookError> {
    let data = snapshot_to_bytes(&register.snapshot()?)?;
    let write_err = |e: std::io::Error| RollbookError::IoError(format!("Write db: {}", e));

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    {
        let mut file = std::fs::File::create(&tmp).map_err(write_err)?;
        file.write_all(&data).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
    }

    std::fs::rename(&tmp, path).map_err(|e| {
        if let Err(cleanup) = std::fs::remove_file(&tmp) {
            tracing::warn!("Cannot remove {:?}: {}", tmp, cleanup);
        }
        write_err(e)
    })
}

/// Binary snapshot first, then JSON.
fn decode_snapshot(data: &[u8]) -> Result<Snapshot, RollbookError> {
    if let Ok(snapshot) = snapshot_from_bytes(data) {
        return Ok(snapshot);
    }
    serde_json::from_slice::<Snapshot>(data).map_err(|_| {
        RollbookError::DeserializationError("Could not parse snapshot file".to_string())
    })
}

fn record_filter(class: &str, student: &str, date: Option<NaiveDate>) -> RecordFilter {
    let filter = RecordFilter::new(Filter::parse(class), Filter::parse(student));
    match date {
        Some(date) => filter.on(date),
        None => filter,
    }
}

fn print_records(records: &[AttendanceRecord]) {
    if records.is_empty() {
        println!("No records");
        return;
    }
    for r in records {
        let edited = match &r.edited_by {
            Some(by) => format!(" (edited by {})", by),
            None => String::new(),
        };
        println!(
            "{}  {:<8} {:<12} {:<8} taken by {}{}{}",
            r.date,
            r.class,
            r.student,
            r.status,
            r.taken_by,
            edited,
            r.remark
                .as_deref()
                .map(|m| format!(" - {}", m))
                .unwrap_or_default()
        );
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    fn settings(dir: &Path, backend: BackendKind) -> Settings {
        let roster = dir.join("roster.toml");
        std::fs::write(
            &roster,
            "[[classes]]\nid = \"C1\"\nteacher_id = \"T\"\n\n\
             [[students]]\nid = \"S1\"\nname = \"Ada\"\nclass_id = \"C1\"\n\n\
             [[students]]\nid = \"S2\"\nname = \"Ben\"\nclass_id = \"C1\"\n",
        )
        .expect("roster");
        Settings {
            backend,
            database: dir.join("rollbook.db"),
            roster,
            today: NaiveDate::from_ymd_opt(2024, 9, 16),
            server: ServerConfig::default(),
        }
    }

    fn ctx(settings: Settings) -> CommandContext {
        CommandContext {
            settings,
            actor: Some(Actor::teacher("T")),
            json_mode: true,
        }
    }

    #[test]
    fn failed_snapshot_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = settings(dir.path(), BackendKind::File);
        let register = open_register(&settings).expect("open");

        let occupied = dir.path().join("occupied");
        std::fs::create_dir(&occupied).expect("dir");
        assert!(matches!(
            write_snapshot(&register, &occupied),
            Err(RollbookError::IoError(_))
        ));
        assert!(occupied.is_dir());
        assert!(!dir.path().join("occupied.tmp").exists());

        write_snapshot(&register, &settings.database).expect("write");
        assert!(!dir.path().join("rollbook.db.tmp").exists());
        assert!(open_register(&settings).is_ok());
    }

    #[test]
    fn file_backend_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = ctx(settings(dir.path(), BackendKind::File));

        cmd_mark(&ctx, "C1", "S1", AttendanceStatus::Present, None, None).expect("mark");
        cmd_submit(&ctx, "C1", None).expect("submit");

        let register = open_register(&ctx.settings).expect("open");
        assert_eq!(register.record_count().expect("count"), 2);
        let day = NaiveDate::from_ymd_opt(2024, 9, 16).expect("date");
        assert_eq!(
            register
                .attendance_status(&StudentId::new("S2"), day)
                .expect("status"),
            Some(AttendanceStatus::Absent)
        );
    }

    #[test]
    fn mark_without_actor_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ctx = ctx(settings(dir.path(), BackendKind::File));
        ctx.actor = None;
        assert!(cmd_mark(&ctx, "C1", "S1", AttendanceStatus::Present, None, None).is_err());
        assert!(!ctx.settings.database.exists());
    }

    #[test]
    fn init_refuses_existing_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = ctx(settings(dir.path(), BackendKind::Redb));
        cmd_init(&ctx, false).expect("init");
        assert!(cmd_init(&ctx, false).is_err());
        cmd_init(&ctx, true).expect("force");
    }

    #[test]
    fn export_then_import_into_fresh_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = ctx(settings(dir.path(), BackendKind::File));
        cmd_mark(&source, "C1", "S2", AttendanceStatus::Late, None, None).expect("mark");

        let exported = dir.path().join("export.json");
        cmd_export(&source, &exported, "json").expect("export");

        let mut target_settings = source.settings.clone();
        target_settings.backend = BackendKind::Redb;
        target_settings.database = dir.path().join("target.redb");
        let target = ctx(target_settings);
        cmd_import(&target, &exported).expect("import");

        let register = open_register(&target.settings).expect("open");
        assert_eq!(register.record_count().expect("count"), 1);
        assert!(cmd_import(&target, &exported).is_err());
    }

    #[test]
    fn unknown_export_format_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = ctx(settings(dir.path(), BackendKind::File));
        assert!(cmd_export(&ctx, &dir.path().join("out.bin"), "xml").is_err());
    }

    #[test]
    fn output_path_needs_existing_parent() {
        assert!(validate_output_path(Path::new("/definitely/missing/dir/out.bin")).is_err());
    }
}
