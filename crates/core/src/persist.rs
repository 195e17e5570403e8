//! Atomic-rename JSON persistence shared by the Learning, Usage, and Content
//! stores (spec §4.2/§5: "written through an atomic-rename path... fsync
//! dir"). Grounded on the example pack's `file_tier::write_queue_entry_atomic`
//! (temp file in the target directory, then `persist`).

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::warn;

/// Write `value` to `path` via temp-file-then-rename, then fsync the parent
/// directory so the rename itself is durable (spec §5 `flush()` contract).
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let temp = NamedTempFile::new_in(dir)?;
    std::fs::write(temp.path(), &json)?;
    temp.persist(path)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    fsync_dir(dir)?;
    Ok(())
}

fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    if let Ok(dir_file) = File::open(dir) {
        // Best-effort: not all platforms allow fsync on a directory handle.
        let _ = dir_file.sync_all();
    }
    Ok(())
}

/// Load a JSON file, returning `None` if it does not exist. A malformed file
/// is set aside with a `.corrupt.<ms>` suffix and treated as absent (spec
/// §4.2: "Corruption on load is non-fatal").
pub fn load_json_or_quarantine<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = std::fs::read(path).ok()?;
    match serde_json::from_slice::<T>(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt persistence file, quarantining");
            let now_ms = chrono::Utc::now().timestamp_millis();
            let quarantined = path.with_extension(format!("corrupt.{now_ms}"));
            let _ = std::fs::rename(path, &quarantined);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Sample {
        n: u32,
    }

    #[test]
    fn round_trips_through_atomic_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        atomic_write_json(&path, &Sample { n: 7 }).unwrap();
        let loaded: Sample = load_json_or_quarantine(&path).unwrap();
        assert_eq!(loaded, Sample { n: 7 });
    }

    #[test]
    fn quarantines_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"not json").unwrap();
        let loaded: Option<Sample> = load_json_or_quarantine(&path);
        assert!(loaded.is_none());
        assert!(!path.exists());
        let has_quarantine = std::fs::read_dir(dir.path())
            .unwrap()
            .any(|e| e.unwrap().file_name().to_string_lossy().contains("corrupt"));
        assert!(has_quarantine);
    }
}
