//! Output file naming.

use std::path::{Path, PathBuf};

/// `<dir>/<stem><suffix>.<ext>`, keeping the extension of `path` if it has one.
pub fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    path.with_file_name(name)
}

/// Cleaned output placed beside the input: `<stem>_cleaned.csv`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}_cleaned.csv"))
}

pub fn excluded_path_for(output: &Path, suffix: &str) -> PathBuf {
    sibling_with_suffix(output, suffix)
}

/// Manifest location for an output file: `<stem>_summary.json`.
pub fn summary_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!("{stem}_summary.json"))
}
