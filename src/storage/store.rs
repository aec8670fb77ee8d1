// ResultStore - sweep records as JSON files in one directory
//
// Save failures are reported to the caller and logged; the in-memory
// result and rating are never touched.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::config::StorageConfig;
use crate::error::{log_storage_error, StorageError};
use crate::rating::Grade;
use crate::storage::SweepRecord;

const RECORD_PREFIX: &str = "antenna_test_";

/// One line of the history listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub path: PathBuf,
    pub timestamp: NaiveDateTime,
    pub points: usize,
    pub score: u8,
    pub grade: Grade,
}

#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.results_dir.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `record`, returning the file it landed in.
    ///
    /// Two records from the same second get `_1`, `_2`, ... suffixes.
    pub fn save(&self, record: &SweepRecord) -> Result<PathBuf, StorageError> {
        self.save_inner(record)
            .inspect_err(|err| log_storage_error(err, "save"))
    }

    fn save_inner(&self, record: &SweepRecord) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.dir).map_err(|err| StorageError::from_io(&self.dir, err))?;

        let path = self.free_path(&record.file_name());
        let json = serde_json::to_string_pretty(record)
            .map_err(|err| StorageError::serialization(&path, err))?;
        fs::write(&path, json).map_err(|err| StorageError::from_io(&path, err))?;

        log::info!(
            "[ResultStore] Saved {} measurements to {:?}",
            record.measurements.len(),
            path
        );
        Ok(path)
    }

    fn free_path(&self, file_name: &str) -> PathBuf {
        let candidate = self.dir.join(file_name);
        if !candidate.exists() {
            return candidate;
        }
        let stem = file_name.trim_end_matches(".json");
        (1..)
            .map(|n| self.dir.join(format!("{}_{}.json", stem, n)))
            .find(|path| !path.exists())
            .unwrap_or(candidate)
    }

    pub fn load(&self, path: &Path) -> Result<SweepRecord, StorageError> {
        let contents = fs::read_to_string(path)
            .map_err(|err| StorageError::from_io(path, err))
            .inspect_err(|err| log_storage_error(err, "load"))?;
        serde_json::from_str(&contents)
            .map_err(|err| StorageError::serialization(path, err))
            .inspect_err(|err| log_storage_error(err, "load"))
    }

    /// Saved records, newest first.
    ///
    /// Files that fail to parse are skipped with a warning. A missing
    /// directory is an empty history.
    pub fn history(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::from_io(&self.dir, err)),
        };

        let mut history = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| StorageError::from_io(&self.dir, err))?.path();
            if !is_record_file(&path) {
                continue;
            }
            match self.load(&path) {
                Ok(record) => history.push(HistoryEntry {
                    timestamp: record.timestamp,
                    points: record.measurements.len(),
                    score: record.rating.score,
                    grade: record.rating.rating,
                    path,
                }),
                Err(err) => {
                    log::warn!("[ResultStore] Skipping unreadable record {:?}: {}", path, err);
                }
            }
        }

        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.path.cmp(&a.path)));
        Ok(history)
    }

    pub fn delete(&self, path: &Path) -> Result<(), StorageError> {
        fs::remove_file(path)
            .map_err(|err| StorageError::from_io(path, err))
            .inspect_err(|err| log_storage_error(err, "delete"))?;
        log::info!("[ResultStore] Deleted {:?}", path);
        Ok(())
    }
}

fn is_record_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(RECORD_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MeasurementRecord, RatingRecord, SweepParameters};
    use chrono::NaiveDate;

    fn record(hour: u32, score: u8) -> SweepRecord {
        SweepRecord {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 9)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            parameters: SweepParameters {
                start_freq: 10.0,
                stop_freq: 40.0,
                points: 2,
            },
            measurements: vec![
                MeasurementRecord {
                    frequency: 10.0,
                    mag_voltage: 1.0,
                    phase_voltage: 1.6,
                    swr: 1.0,
                },
                MeasurementRecord {
                    frequency: 40.0,
                    mag_voltage: 1.3,
                    phase_voltage: 1.6,
                    swr: 5.0,
                },
            ],
            rating: RatingRecord {
                score,
                rating: Grade::from_score(score),
                analysis: "test".to_string(),
            },
            status: None,
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("results"));
        let path = store.save(&record(14, 80)).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "antenna_test_20240309_140000.json"
        );
        assert_eq!(store.load(&path).unwrap(), record(14, 80));
    }

    #[test]
    fn test_same_second_gets_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let first = store.save(&record(9, 50)).unwrap();
        let second = store.save(&record(9, 60)).unwrap();

        assert_ne!(first, second);
        assert!(second.to_str().unwrap().ends_with("antenna_test_20240309_090000_1.json"));
        assert_eq!(store.load(&second).unwrap().rating.score, 60);
    }

    #[test]
    fn test_history_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        store.save(&record(8, 40)).unwrap();
        store.save(&record(12, 90)).unwrap();
        store.save(&record(10, 70)).unwrap();
        fs::write(dir.path().join("antenna_test_broken.json"), "not json").unwrap();
        fs::write(dir.path().join("notes.json"), "{}").unwrap();

        let history = store.history().unwrap();
        let scores: Vec<u8> = history.iter().map(|h| h.score).collect();
        assert_eq!(scores, vec![90, 70, 40]);
        assert_eq!(history[0].grade, Grade::APlus);
        assert_eq!(history[0].points, 2);
    }

    #[test]
    fn test_history_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("never-created"));
        assert!(store.history().unwrap().is_empty());
    }

    #[test]
    fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let path = store.save(&record(11, 75)).unwrap();

        store.delete(&path).unwrap();
        assert!(store.history().unwrap().is_empty());
        assert!(matches!(
            store.delete(&path),
            Err(StorageError::NotFound { .. })
        ));
        assert!(matches!(
            store.load(&path),
            Err(StorageError::NotFound { .. })
        ));
    }
}
