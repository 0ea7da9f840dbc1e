//! Discovery of per-time-point input files
//!
//! Raw exports follow a leading-integer naming convention: `0_baseline.csv`,
//! `1_after_dosing.csv`, ... The leading integer is the time-point index.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{MeaError, Result};

/// Discover CSV files with a numeric time-point prefix, ordered by
/// ascending time point.
///
/// Fails if the directory does not exist or no file matches the naming
/// convention.
pub fn discover_csv_files(dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
    if !dir.is_dir() {
        return Err(MeaError::DataDirNotFound {
            path: dir.to_path_buf(),
        });
    }

    let prefix = Regex::new(r"^(\d+)_").expect("static regex");
    let mut files: Vec<(u32, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_csv = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
        if !is_csv {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(caps) = prefix.captures(name) {
            let tp: u32 = caps[1].parse().map_err(|_| MeaError::InvalidValue {
                column: "time_point".to_string(),
                value: caps[1].to_string(),
            })?;
            files.push((tp, path));
        }
    }

    files.sort_by_key(|(tp, _)| *tp);

    if files.is_empty() {
        return Err(MeaError::NoInputFiles {
            dir: dir.to_path_buf(),
        });
    }

    for (tp, path) in &files {
        log::info!(
            "Discovered time point {}: {}",
            tp,
            path.file_name().and_then(|n| n.to_str()).unwrap_or("?")
        );
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_discover_orders_by_time_point() {
        let dir = TempDir::new().unwrap();
        for name in ["2_late.csv", "0_baseline.csv", "10_final.csv", "notes.txt", "raw.csv"] {
            File::create(dir.path().join(name)).unwrap();
        }

        let files = discover_csv_files(dir.path()).unwrap();
        let tps: Vec<u32> = files.iter().map(|(tp, _)| *tp).collect();
        assert_eq!(tps, vec![0, 2, 10]);
    }

    #[test]
    fn test_no_matching_files_is_error() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("readme.csv")).unwrap();
        let err = discover_csv_files(dir.path()).unwrap_err();
        assert!(matches!(err, MeaError::NoInputFiles { .. }));
    }

    #[test]
    fn test_missing_directory_is_error() {
        let err = discover_csv_files(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, MeaError::DataDirNotFound { .. }));
    }
}
