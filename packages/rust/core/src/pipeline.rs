//! Pipeline orchestration: derive → drop → normalize → classify, per batch and per file.

use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use berclean_dataset::{ChunkReader, SplitWriter, excluded_path_for, hash_file, summary_path_for, write_manifest};
use berclean_shared::{BerCleanError, CURRENT_SCHEMA_VERSION, PipelineOptions, Result, RunId, RunManifest, Table};

use crate::classify::{ClassifyContext, classify_batch};
use crate::derive::add_derived_columns;
use crate::normalize::normalize_batch;
use crate::record::Batch;
use crate::summary::RunSummary;
use crate::tables::ReferenceTables;

/// Free-text wall descriptions removed from every output.
pub const DROPPED_COLUMNS: [&str; 3] = [
    "FirstWallDescription",
    "SecondWallDescription",
    "ThirdWallDescription",
];

/// Descriptive columns and unnamed parsing artifacts (`""`, `"Unnamed: 0"`).
pub fn is_dropped_column(name: &str) -> bool {
    name.trim().is_empty() || name.starts_with("Unnamed:") || DROPPED_COLUMNS.contains(&name)
}

pub fn drop_unwanted_columns(mut batch: Batch) -> Batch {
    batch.drop_passthrough(is_dropped_column);
    batch
}

// ---------------------------------------------------------------------------
// Batch entry points
// ---------------------------------------------------------------------------

/// A processed batch and, when filtering ran, its implausible records.
#[derive(Debug, Clone)]
pub struct ProcessedBatch {
    pub kept: Batch,
    pub excluded: Option<Batch>,
    pub summary: RunSummary,
}

/// [`ProcessedBatch`] rendered back to raw tables.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub kept: Table,
    pub excluded: Option<Table>,
    pub summary: RunSummary,
}

/// Run every stage over one batch. `excluded` is `None` when `filter` is off.
#[instrument(skip_all, fields(rows = batch.len(), filter = filter))]
pub fn process_batch(batch: Batch, filter: bool, ctx: &ClassifyContext<'_>) -> Result<ProcessedBatch> {
    let rows = batch.len();
    let batch = add_derived_columns(batch);
    let batch = drop_unwanted_columns(batch);
    let (batch, corrections) = normalize_batch(batch, ctx.tables)?;

    let mut summary = RunSummary::default();
    if !filter {
        summary.record_batch(rows, &corrections, None);
        return Ok(ProcessedBatch {
            kept: batch,
            excluded: None,
            summary,
        });
    }

    let classification = classify_batch(batch, ctx);
    summary.record_batch(rows, &corrections, Some(&classification));
    Ok(ProcessedBatch {
        kept: classification.kept,
        excluded: Some(classification.excluded),
        summary,
    })
}

/// Parse a raw table and process it; the table-in, tables-out form of [`process_batch`].
pub fn process_table(table: Table, filter: bool, ctx: &ClassifyContext<'_>) -> Result<ProcessOutput> {
    let processed = process_batch(Batch::from_table(table)?, filter, ctx)?;
    Ok(ProcessOutput {
        kept: processed.kept.to_table(),
        excluded: processed.excluded.as_ref().map(Batch::to_table),
        summary: processed.summary,
    })
}

// ---------------------------------------------------------------------------
// File driver
// ---------------------------------------------------------------------------

/// Configuration for [`clean_file`].
#[derive(Debug, Clone)]
pub struct CleanConfig {
    pub input: PathBuf,
    /// Kept rows go here; excluded rows go to a sibling named with the excluded suffix.
    pub output: PathBuf,
    pub options: PipelineOptions,
    pub tool_version: String,
}

/// Result of [`clean_file`].
#[derive(Debug)]
pub struct CleanResult {
    pub run_id: RunId,
    pub kept_path: PathBuf,
    pub excluded_path: Option<PathBuf>,
    pub manifest_path: PathBuf,
    pub summary: RunSummary,
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each chunk is written.
    fn chunk_done(&self, chunk: usize, rows_read: usize);
    /// Called when the run completes.
    fn done(&self, result: &CleanResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn chunk_done(&self, _chunk: usize, _rows_read: usize) {}
    fn done(&self, _result: &CleanResult) {}
}

/// Clean a CSV file chunk by chunk and write the kept/excluded files plus a manifest.
///
/// The first failing chunk aborts the run; files already written are left
/// as they are.
#[instrument(skip_all, fields(input = %config.input.display()))]
pub fn clean_file(
    config: &CleanConfig,
    tables: &ReferenceTables,
    progress: &dyn ProgressReporter,
) -> Result<CleanResult> {
    let start = Instant::now();
    let started_at = Utc::now();
    let run_id = RunId::new();
    let options = &config.options;
    options.validate()?;

    let excluded_path = options
        .filter
        .then(|| excluded_path_for(&config.output, &options.excluded_suffix));
    let manifest_path = summary_path_for(&config.output);

    let mut outputs = vec![config.output.as_path(), manifest_path.as_path()];
    outputs.extend(excluded_path.as_deref());
    ensure_outputs_spare_input(&config.input, &outputs)?;

    info!(%run_id, filter = options.filter, chunk_size = options.chunk_size, "starting clean run");

    progress.phase("Hashing input");
    let input_sha256 = hash_file(&config.input)?;
    debug!(sha256 = %input_sha256, "input hashed");

    progress.phase("Cleaning");
    let ctx = ClassifyContext::new(tables, options.unknown_typology);

    let mut reader = ChunkReader::open(&config.input, options.chunk_size)?;
    let mut writer = SplitWriter::create(&config.output, excluded_path.as_deref())?;
    let mut summary = RunSummary::default();

    for chunk in &mut reader {
        let offset = summary.rows_read;
        let out = process_table(chunk?, options.filter, &ctx).map_err(|e| e.with_row_offset(offset))?;
        writer.write(&out.kept, out.excluded.as_ref())?;
        for dwelling_type in summary.new_unknown_typologies(&out.summary) {
            warn!(
                dwelling_type,
                policy = ?options.unknown_typology,
                "dwelling type has no typology ranges"
            );
        }
        summary.merge(&out.summary);
        progress.chunk_done(summary.batches, summary.rows_read);
    }

    let written = writer.finish()?;
    if reader.rows_read() != summary.rows_read
        || written.kept != summary.rows_kept
        || written.excluded != summary.rows_excluded
    {
        return Err(BerCleanError::validation(format!(
            "row counts disagree: read {}, processed {}, written {}",
            reader.rows_read(),
            summary.rows_read,
            written.kept + written.excluded
        )));
    }

    progress.phase("Writing manifest");
    let manifest = RunManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        id: run_id.clone(),
        tool_version: config.tool_version.clone(),
        input_path: config.input.display().to_string(),
        input_sha256,
        kept_path: config.output.display().to_string(),
        excluded_path: excluded_path.as_ref().map(|p| p.display().to_string()),
        filter: options.filter,
        started_at,
        finished_at: Utc::now(),
        summary: summary.to_json(),
    };
    write_manifest(&manifest_path, &manifest)?;

    let result = CleanResult {
        run_id,
        kept_path: config.output.clone(),
        excluded_path,
        manifest_path,
        summary,
        elapsed: start.elapsed(),
    };

    info!(
        rows_read = result.summary.rows_read,
        rows_kept = result.summary.rows_kept,
        rows_excluded = result.summary.rows_excluded,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "clean run complete"
    );
    progress.done(&result);

    Ok(result)
}

/// Reject the run when any output path names the input file.
///
/// Paths are compared after resolving `.`/`..` and symlinked parent
/// directories, so `sub/../ber.csv` and `./ber.csv` match `ber.csv`.
fn ensure_outputs_spare_input(input: &Path, outputs: &[&Path]) -> Result<()> {
    let input_resolved = input.canonicalize().map_err(|e| BerCleanError::io(input, e))?;
    for output in outputs {
        if resolve_path(output)? == input_resolved {
            return Err(BerCleanError::config(format!(
                "output path {} would overwrite the input {}",
                output.display(),
                input.display()
            )));
        }
    }
    Ok(())
}

/// Absolute form of a path that may not exist yet.
///
/// The parent directory is canonicalized when it exists; otherwise `.` and
/// `..` are folded lexically first.
fn resolve_path(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| BerCleanError::io(path, e))?
            .join(path)
    };

    let mut lexical = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other),
        }
    }

    // `dir/link/..` is not `dir` when `link` is a symlink, so try the raw form first.
    for candidate in [&absolute, &lexical] {
        if let (Some(parent), Some(name)) = (candidate.parent(), candidate.file_name()) {
            if let Ok(parent) = parent.canonicalize() {
                return Ok(parent.join(name));
            }
        }
    }
    Ok(lexical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use berclean_shared::{EraBand, UnknownTypologyPolicy};
    use uuid::Uuid;

    use crate::record::Field;
    use crate::record::tests::{sample_headers, sample_row, sample_table, set_cell};

    fn context(tables: &ReferenceTables) -> ClassifyContext<'_> {
        ClassifyContext::new(tables, UnknownTypologyPolicy::Exclude).with_current_year(2024)
    }

    fn mixed_rows() -> Vec<Vec<String>> {
        (0..5)
            .map(|i| {
                let mut row = sample_row(&i.to_string());
                if i == 1 {
                    set_cell(&mut row, Field::DwellingType, "Detached house");
                    set_cell(&mut row, Field::WallArea, "500");
                }
                if i == 3 {
                    set_cell(&mut row, Field::YearOfConstruction, "1970");
                    set_cell(&mut row, Field::UValueWall, "5.0");
                }
                row
            })
            .collect()
    }

    #[test]
    fn drop_list_matches_descriptions_and_artifacts() {
        assert!(is_dropped_column("FirstWallDescription"));
        assert!(is_dropped_column("ThirdWallDescription"));
        assert!(is_dropped_column("Unnamed: 0"));
        assert!(is_dropped_column(""));
        assert!(!is_dropped_column("FirstWallType_Description"));
        assert!(!is_dropped_column("CertificateId"));
    }

    #[test]
    fn process_table_drops_and_appends_columns() {
        let tables = ReferenceTables::default();
        let mut table = sample_table(vec![sample_row("1")]);
        table.headers.push("Unnamed: 40".into());
        table.rows[0].push(String::new());

        let out = process_table(table, true, &context(&tables)).unwrap();
        let headers = &out.kept.headers;
        assert!(!headers.iter().any(|h| h == "FirstWallDescription"));
        assert!(!headers.iter().any(|h| h.starts_with("Unnamed:")));
        assert_eq!(headers.len(), sample_headers().len() - 1 + 5);
        assert_eq!(headers.last().map(String::as_str), Some("Location"));
        assert_eq!(out.excluded.as_ref().unwrap().headers, out.kept.headers);
    }

    #[test]
    fn process_table_normalizes_kept_rows() {
        let tables = ReferenceTables::default();
        let out = process_table(sample_table(vec![sample_row("1")]), true, &context(&tables)).unwrap();
        let county = out.kept.column_index("CountyName").unwrap();
        let rating = out.kept.column_index("EnergyRating").unwrap();
        let location = out.kept.column_index("Location").unwrap();
        assert_eq!(out.kept.rows[0][county], "Galway");
        assert_eq!(out.kept.rows[0][rating], "C1");
        // Location reflects the county text before correction.
        assert_eq!(out.kept.rows[0][location], "rural");
    }

    #[test]
    fn partition_is_complete_and_disjoint() {
        let tables = ReferenceTables::default();
        let out = process_table(sample_table(mixed_rows()), true, &context(&tables)).unwrap();
        let ids = |t: &Table| t.rows.iter().map(|r| r[0].clone()).collect::<Vec<_>>();

        let kept = ids(&out.kept);
        let excluded = ids(out.excluded.as_ref().unwrap());
        assert_eq!(kept, vec!["0", "2", "4"]);
        assert_eq!(excluded, vec!["1", "3"]);
        assert_eq!(out.summary.rows_read, 5);
        assert_eq!(out.summary.rows_kept + out.summary.rows_excluded, 5);
        assert_eq!(out.summary.check_failures.get("typology.WallArea"), Some(&1));
        assert_eq!(out.summary.check_failures.get("thermal.wall"), Some(&1));
    }

    #[test]
    fn filter_off_keeps_everything_without_excluded_batch() {
        let tables = ReferenceTables::default();
        let out = process_table(sample_table(mixed_rows()), false, &context(&tables)).unwrap();
        assert!(out.excluded.is_none());
        assert_eq!(out.kept.len(), 5);
        assert_eq!(out.summary.rows_kept, 5);
        assert!(out.summary.check_failures.is_empty());
    }

    #[test]
    fn processing_is_deterministic() {
        let tables = ReferenceTables::default();
        let ctx = context(&tables);
        let first = process_table(sample_table(mixed_rows()), false, &ctx).unwrap();
        let second = process_table(sample_table(mixed_rows()), false, &ctx).unwrap();
        assert_eq!(first.kept, second.kept);
    }

    #[test]
    fn batch_split_does_not_change_results() {
        let tables = ReferenceTables::default();
        let ctx = context(&tables);
        let whole = process_table(sample_table(mixed_rows()), true, &ctx).unwrap();

        let mut kept_rows = Vec::new();
        for row in mixed_rows() {
            let out = process_table(sample_table(vec![row]), true, &ctx).unwrap();
            kept_rows.extend(out.kept.rows);
        }
        assert_eq!(kept_rows, whole.kept.rows);
    }

    #[test]
    fn missing_column_is_fatal() {
        let tables = ReferenceTables::default();
        let mut headers = sample_headers();
        headers.retain(|h| h != "UValueWall");
        let err = process_table(Table::empty(headers), true, &context(&tables)).unwrap_err();
        assert!(matches!(err, BerCleanError::Schema { .. }));
    }

    #[test]
    fn missing_correction_band_is_fatal() {
        let mut tables = ReferenceTables::default();
        tables.roof_corrections.remove(&EraBand::G);
        let err = process_table(sample_table(vec![sample_row("1")]), true, &context(&tables)).unwrap_err();
        assert!(matches!(err, BerCleanError::Lookup { .. }));
    }

    // -- file driver --

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("berclean-pipeline-test-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_csv(path: &std::path::Path, rows: &[Vec<String>]) {
        let quote = |cells: &[String]| {
            cells
                .iter()
                .map(|c| format!("\"{c}\""))
                .collect::<Vec<_>>()
                .join(",")
        };
        let mut content = quote(&sample_headers());
        content.push('\n');
        for row in rows {
            content.push_str(&quote(row));
            content.push('\n');
        }
        std::fs::write(path, content).unwrap();
    }

    fn clean_config(dir: &std::path::Path, chunk_size: usize, filter: bool) -> CleanConfig {
        CleanConfig {
            input: dir.join("ber.csv"),
            output: dir.join(format!("ber_{chunk_size}_cleaned.csv")),
            options: PipelineOptions {
                chunk_size,
                filter,
                ..PipelineOptions::default()
            },
            tool_version: "test".into(),
        }
    }

    #[test]
    fn clean_file_writes_outputs_and_manifest() {
        let dir = temp_dir();
        let config = clean_config(&dir, 2, true);
        write_csv(&config.input, &mixed_rows());

        let result = clean_file(&config, &ReferenceTables::default(), &SilentProgress).unwrap();
        assert_eq!(result.summary.rows_read, 5);
        assert_eq!(result.summary.batches, 3);
        assert_eq!(result.summary.rows_kept, 3);
        assert_eq!(result.summary.rows_excluded, 2);

        let kept = std::fs::read_to_string(&result.kept_path).unwrap();
        assert_eq!(kept.lines().count(), 4);
        assert_eq!(kept.lines().filter(|l| l.starts_with("CertificateId")).count(), 1);

        let excluded_path = result.excluded_path.clone().unwrap();
        assert_eq!(excluded_path, dir.join("ber_2_cleaned_excluded.csv"));
        assert_eq!(std::fs::read_to_string(&excluded_path).unwrap().lines().count(), 3);

        let manifest: RunManifest =
            serde_json::from_str(&std::fs::read_to_string(&result.manifest_path).unwrap()).unwrap();
        assert_eq!(manifest.id, result.run_id);
        assert_eq!(manifest.summary["rows_excluded"], 2);
        assert_eq!(manifest.input_sha256.len(), 64);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn chunk_size_does_not_change_output() {
        let dir = temp_dir();
        let small = clean_config(&dir, 1, true);
        let large = clean_config(&dir, 100, true);
        write_csv(&small.input, &mixed_rows());

        let a = clean_file(&small, &ReferenceTables::default(), &SilentProgress).unwrap();
        let b = clean_file(&large, &ReferenceTables::default(), &SilentProgress).unwrap();
        assert_eq!(
            std::fs::read_to_string(&a.kept_path).unwrap(),
            std::fs::read_to_string(&b.kept_path).unwrap()
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unfiltered_run_creates_no_excluded_file() {
        let dir = temp_dir();
        let config = clean_config(&dir, 10, false);
        write_csv(&config.input, &mixed_rows());

        let result = clean_file(&config, &ReferenceTables::default(), &SilentProgress).unwrap();
        assert!(result.excluded_path.is_none());
        assert!(!dir.join("ber_10_cleaned_excluded.csv").exists());
        assert_eq!(result.summary.rows_kept, 5);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn header_only_input_writes_header() {
        let dir = temp_dir();
        let config = clean_config(&dir, 10, true);
        write_csv(&config.input, &[]);

        let result = clean_file(&config, &ReferenceTables::default(), &SilentProgress).unwrap();
        assert_eq!(result.summary.rows_read, 0);
        let kept = std::fs::read_to_string(&result.kept_path).unwrap();
        assert_eq!(kept.lines().count(), 1);
        assert!(kept.trim_end().ends_with("Location"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn parse_errors_report_file_rows() {
        let dir = temp_dir();
        let config = clean_config(&dir, 2, true);
        let mut rows = mixed_rows();
        set_cell(&mut rows[4], Field::FloorArea, "n/a");
        write_csv(&config.input, &rows);

        let err = clean_file(&config, &ReferenceTables::default(), &SilentProgress).unwrap_err();
        assert!(matches!(err, BerCleanError::Parse { row: 4, .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn output_aliasing_input_is_rejected() {
        let dir = temp_dir();
        let mut config = clean_config(&dir, 10, true);
        write_csv(&config.input, &mixed_rows());
        let before = std::fs::read_to_string(&config.input).unwrap();

        // A missing and an existing intermediate directory.
        std::fs::create_dir_all(dir.join("real")).unwrap();
        for via in ["missing", "real"] {
            config.output = dir.join(via).join("..").join("ber.csv");
            let err = clean_file(&config, &ReferenceTables::default(), &SilentProgress).unwrap_err();
            assert!(matches!(err, BerCleanError::Config { .. }), "{via}: {err}");
            assert_eq!(std::fs::read_to_string(&config.input).unwrap(), before);
        }
        assert!(!dir.join("missing").exists());

        config.output = dir.join(".").join("ber.csv");
        assert!(clean_file(&config, &ReferenceTables::default(), &SilentProgress).is_err());
        assert_eq!(std::fs::read_to_string(&config.input).unwrap(), before);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn derived_output_paths_aliasing_input_are_rejected() {
        let dir = temp_dir();
        let mut config = clean_config(&dir, 10, true);
        config.input = dir.join("ber_excluded.csv");
        config.output = dir.join("ber.csv");
        write_csv(&config.input, &mixed_rows());
        let before = std::fs::read_to_string(&config.input).unwrap();

        let err = clean_file(&config, &ReferenceTables::default(), &SilentProgress).unwrap_err();
        assert!(matches!(err, BerCleanError::Config { .. }));
        assert_eq!(std::fs::read_to_string(&config.input).unwrap(), before);

        // Filtering off means no excluded file, so the same pair is allowed.
        config.options.filter = false;
        assert!(clean_file(&config, &ReferenceTables::default(), &SilentProgress).is_ok());
        assert_eq!(std::fs::read_to_string(&config.input).unwrap(), before);

        config.input = dir.join("ber_summary.json");
        std::fs::write(&config.input, "{}").unwrap();
        let err = clean_file(&config, &ReferenceTables::default(), &SilentProgress).unwrap_err();
        assert!(matches!(err, BerCleanError::Config { .. }));
        assert_eq!(std::fs::read_to_string(&config.input).unwrap(), "{}");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unknown_typologies_are_collected_across_chunks() {
        let dir = temp_dir();
        let config = clean_config(&dir, 1, true);
        let rows: Vec<Vec<String>> = (0..3)
            .map(|i| {
                let mut row = sample_row(&i.to_string());
                set_cell(&mut row, Field::DwellingType, "Houseboat");
                row
            })
            .collect();
        write_csv(&config.input, &rows);

        let result = clean_file(&config, &ReferenceTables::default(), &SilentProgress).unwrap();
        assert_eq!(result.summary.batches, 3);
        assert_eq!(result.summary.rows_excluded, 3);
        assert_eq!(
            result.summary.unknown_typologies.iter().collect::<Vec<_>>(),
            vec!["Houseboat"]
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn resolve_path_folds_dot_segments() {
        let dir = temp_dir();
        let canonical = dir.canonicalize().unwrap();
        assert_eq!(
            resolve_path(&dir.join("a").join("..").join(".").join("x.csv")).unwrap(),
            canonical.join("x.csv")
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn output_equal_to_input_is_rejected() {
        let dir = temp_dir();
        let mut config = clean_config(&dir, 10, true);
        config.output = config.input.clone();
        write_csv(&config.input, &mixed_rows());

        let err = clean_file(&config, &ReferenceTables::default(), &SilentProgress).unwrap_err();
        assert!(matches!(err, BerCleanError::Config { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
