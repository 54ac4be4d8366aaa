//! Input hashing and run manifest output.

use std::fs::File;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use berclean_shared::{BerCleanError, Result, RunManifest};

/// SHA-256 of a file's contents, hex encoded.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| BerCleanError::io(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| BerCleanError::io(path, e))?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Write the manifest as pretty-printed JSON, replacing any existing file.
pub fn write_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest).map_err(|e| {
        BerCleanError::validation(format!("JSON serialization failed: {e}"))
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));
    std::fs::write(&temp, json).map_err(|e| BerCleanError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| BerCleanError::io(path, e))?;

    debug!(path = %path.display(), "wrote run manifest");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use berclean_shared::{CURRENT_SCHEMA_VERSION, RunId};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn hash_matches_known_digest() {
        let path = std::env::temp_dir().join(format!("berclean-hash-{}.csv", Uuid::now_v7()));
        std::fs::write(&path, "abc").unwrap();
        assert_eq!(
            hash_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join(format!("berclean-missing-{}", Uuid::now_v7()));
        assert!(matches!(hash_file(&path), Err(BerCleanError::Io { .. })));
    }

    #[test]
    fn manifest_round_trips_through_json() {
        let path = std::env::temp_dir().join(format!("berclean-manifest-{}.json", Uuid::now_v7()));
        let now = Utc::now();
        let manifest = RunManifest {
            schema_version: CURRENT_SCHEMA_VERSION,
            id: RunId::new(),
            tool_version: "0.1.0".into(),
            input_path: "in.csv".into(),
            input_sha256: "00".into(),
            kept_path: "in_cleaned.csv".into(),
            excluded_path: None,
            filter: false,
            started_at: now,
            finished_at: now,
            summary: serde_json::json!({ "rows_read": 3 }),
        };
        write_manifest(&path, &manifest).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("excluded_path"));
        let parsed: RunManifest = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.id, manifest.id);
        assert_eq!(parsed.summary["rows_read"], 3);
        let _ = std::fs::remove_file(&path);
    }
}
