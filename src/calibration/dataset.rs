// CalibrationDataset - labeled reference measurements
//
// On disk a dataset is a JSON array of flat records:
// {"frequency": MHz, "mag_voltage": V, "phase_voltage": V, "label": "..."}.
// A single file may hold both labels; `split_records` separates them.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CalibrationError, StorageError};
use crate::hardware::{FrequencyPoint, Sample};

/// Which reference condition a dataset was captured under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntennaLabel {
    WithAntenna,
    WithoutAntenna,
}

impl AntennaLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AntennaLabel::WithAntenna => "with_antenna",
            AntennaLabel::WithoutAntenna => "without_antenna",
        }
    }
}

impl std::str::FromStr for AntennaLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "with_antenna" | "with" => Ok(AntennaLabel::WithAntenna),
            "without_antenna" | "without" => Ok(AntennaLabel::WithoutAntenna),
            other => Err(format!(
                "unknown label '{}', expected with_antenna or without_antenna",
                other
            )),
        }
    }
}

/// Flat on-disk form of one labeled point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// MHz
    pub frequency: f64,
    pub mag_voltage: f64,
    pub phase_voltage: f64,
    pub label: AntennaLabel,
}

/// Population statistics over a set of voltages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

impl VoltageStats {
    /// `None` for an empty slice.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            count: values.len(),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean,
            std: var.sqrt(),
        })
    }
}

/// Ordered (point, sample) pairs captured under one label.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationDataset {
    label: AntennaLabel,
    points: Vec<(FrequencyPoint, Sample)>,
}

impl CalibrationDataset {
    pub fn new(label: AntennaLabel) -> Self {
        Self {
            label,
            points: Vec::new(),
        }
    }

    pub fn label(&self) -> AntennaLabel {
        self.label
    }

    pub fn push(&mut self, point: FrequencyPoint, sample: Sample) {
        self.points.push((point, sample));
    }

    pub fn points(&self) -> &[(FrequencyPoint, Sample)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn magnitudes(&self) -> Vec<f64> {
        self.points.iter().map(|(_, s)| s.mag_voltage).collect()
    }

    pub fn phases(&self) -> Vec<f64> {
        self.points.iter().map(|(_, s)| s.phase_voltage).collect()
    }

    pub fn magnitude_stats(&self) -> Option<VoltageStats> {
        VoltageStats::from_values(&self.magnitudes())
    }

    pub fn phase_stats(&self) -> Option<VoltageStats> {
        VoltageStats::from_values(&self.phases())
    }

    pub fn to_records(&self) -> Vec<CalibrationRecord> {
        self.points
            .iter()
            .map(|(point, sample)| CalibrationRecord {
                frequency: point.frequency_mhz(),
                mag_voltage: sample.mag_voltage,
                phase_voltage: sample.phase_voltage,
                label: self.label,
            })
            .collect()
    }

    /// Build a dataset from the records carrying `label`.
    ///
    /// Records with the other label are ignored; tuning words are
    /// recomputed at `reference_clock_hz`.
    pub fn from_records(
        records: &[CalibrationRecord],
        label: AntennaLabel,
        reference_clock_hz: f64,
    ) -> Result<Self, CalibrationError> {
        let mut dataset = Self::new(label);
        for (i, record) in records.iter().filter(|r| r.label == label).enumerate() {
            if !record.frequency.is_finite()
                || !record.mag_voltage.is_finite()
                || !record.phase_voltage.is_finite()
            {
                return Err(CalibrationError::InvalidDataset {
                    reason: format!("{} record {} has a non-finite value", label.as_str(), i),
                });
            }
            dataset.push(
                FrequencyPoint::at(record.frequency * 1e6, reference_clock_hz),
                Sample::new(record.mag_voltage, record.phase_voltage),
            );
        }
        Ok(dataset)
    }

    /// Separate a mixed record list into (with_antenna, without_antenna).
    pub fn split_records(
        records: &[CalibrationRecord],
        reference_clock_hz: f64,
    ) -> Result<(Self, Self), CalibrationError> {
        Ok((
            Self::from_records(records, AntennaLabel::WithAntenna, reference_clock_hz)?,
            Self::from_records(records, AntennaLabel::WithoutAntenna, reference_clock_hz)?,
        ))
    }

    /// Write this dataset as a JSON record array.
    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(&self.to_records())
            .map_err(|err| StorageError::serialization(path, err))?;
        fs::write(path, json).map_err(|err| StorageError::from_io(path, err))?;
        log::info!(
            "[CalibrationDataset] Saved {} {} points to {:?}",
            self.len(),
            self.label.as_str(),
            path
        );
        Ok(())
    }
}

/// Read a JSON record array from `path`.
pub fn load_records(path: &Path) -> Result<Vec<CalibrationRecord>, StorageError> {
    let contents = fs::read_to_string(path).map_err(|err| StorageError::from_io(path, err))?;
    serde_json::from_str(&contents).map_err(|err| StorageError::serialization(path, err))
}

/// `antenna_data_<label>_<YYYYmmdd_HHMMSS>.json`
pub fn default_dataset_file_name(
    label: AntennaLabel,
    at: chrono::DateTime<chrono::Local>,
) -> String {
    format!(
        "antenna_data_{}_{}.json",
        label.as_str(),
        at.format("%Y%m%d_%H%M%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(mhz: f64, mag: f64, label: AntennaLabel) -> CalibrationRecord {
        CalibrationRecord {
            frequency: mhz,
            mag_voltage: mag,
            phase_voltage: 1.6,
            label,
        }
    }

    #[test]
    fn test_voltage_stats() {
        let stats = VoltageStats::from_values(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert!((stats.mean - 2.5).abs() < 1e-12);
        // population std
        assert!((stats.std - 1.25f64.sqrt()).abs() < 1e-12);
        assert!(VoltageStats::from_values(&[]).is_none());
    }

    #[test]
    fn test_record_label_json() {
        let json = serde_json::to_string(&record(14.2, 0.3, AntennaLabel::WithAntenna)).unwrap();
        assert!(json.contains("\"label\":\"with_antenna\""));
        assert!(json.contains("\"frequency\":14.2"));
    }

    #[test]
    fn test_split_mixed_records() {
        let records = vec![
            record(10.0, 0.3, AntennaLabel::WithAntenna),
            record(10.0, 1.8, AntennaLabel::WithoutAntenna),
            record(11.0, 0.32, AntennaLabel::WithAntenna),
        ];
        let (with, without) = CalibrationDataset::split_records(&records, 125e6).unwrap();
        assert_eq!(with.len(), 2);
        assert_eq!(without.len(), 1);
        assert_eq!(with.label(), AntennaLabel::WithAntenna);
        assert_eq!(with.magnitudes(), vec![0.3, 0.32]);
    }

    #[test]
    fn test_non_finite_record_rejected() {
        let records = vec![record(10.0, f64::NAN, AntennaLabel::WithAntenna)];
        let err = CalibrationDataset::from_records(&records, AntennaLabel::WithAntenna, 125e6)
            .unwrap_err();
        assert!(matches!(err, CalibrationError::InvalidDataset { .. }));
    }

    #[test]
    fn test_save_and_load_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("with.json");
        let records = vec![
            record(10.0, 0.3, AntennaLabel::WithAntenna),
            record(12.5, 0.31, AntennaLabel::WithAntenna),
        ];
        let dataset =
            CalibrationDataset::from_records(&records, AntennaLabel::WithAntenna, 125e6).unwrap();
        dataset.save(&path).unwrap();

        let loaded = load_records(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!((loaded[1].frequency - 12.5).abs() < 1e-9);
        assert_eq!(loaded[1].label, AntennaLabel::WithAntenna);
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_records(&dir.path().join("missing.json")),
            Err(StorageError::NotFound { .. })
        ));
        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(
            load_records(&bad),
            Err(StorageError::Serialization { .. })
        ));
    }

    #[test]
    fn test_label_parsing_and_file_name() {
        assert_eq!("with".parse::<AntennaLabel>(), Ok(AntennaLabel::WithAntenna));
        assert_eq!(
            "without_antenna".parse::<AntennaLabel>(),
            Ok(AntennaLabel::WithoutAntenna)
        );
        assert!("open".parse::<AntennaLabel>().is_err());

        use chrono::TimeZone;
        let at = chrono::Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            default_dataset_file_name(AntennaLabel::WithoutAntenna, at),
            "antenna_data_without_antenna_20240309_140507.json"
        );
    }
}
