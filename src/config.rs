//! Configuration management for instrument and measurement parameters
//!
//! This module provides runtime configuration loading from JSON files, so
//! hardware-dependent values (settling delay, retry bounds, reference clock)
//! can be tuned per build of the analyzer without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::hardware::RetryPolicy;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub instrument: InstrumentConfig,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Signal source and detector characteristics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// DDS reference clock in Hz
    pub reference_clock_hz: f64,
    /// Lowest programmable output frequency in Hz
    pub min_frequency_hz: f64,
    /// Highest programmable output frequency in Hz
    pub max_frequency_hz: f64,
    /// Control byte sent after the tuning word
    pub control_byte: u8,
    /// ADC full-scale range in volts (symmetric, +/-)
    pub adc_full_scale_v: f64,
    /// ADC resolution in bits
    pub adc_bits: u8,
    /// ADC I2C device address
    pub adc_address: u8,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            reference_clock_hz: 125_000_000.0,
            min_frequency_hz: 1.0,
            max_frequency_hz: 40_000_000.0,
            control_byte: 0x00,
            adc_full_scale_v: 4.096,
            adc_bits: 16,
            adc_address: 0x48,
        }
    }
}

impl InstrumentConfig {
    /// Volts per ADC code (full scale spans both polarities)
    pub fn lsb_volts(&self) -> f64 {
        2.0 * self.adc_full_scale_v / (1u64 << self.adc_bits) as f64
    }
}

/// Sampler retry and averaging parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Total read attempts per channel before escalating a transient fault
    pub max_attempts: u32,
    /// Delay before the first retry
    pub backoff_base_ms: u64,
    /// Growth factor applied to each subsequent retry delay
    pub backoff_multiplier: f64,
    /// Conversions averaged into a single sample
    pub samples_per_point: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 5,
            backoff_multiplier: 2.0,
            samples_per_point: 1,
        }
    }
}

impl SamplerConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.backoff_base_ms),
            self.backoff_multiplier,
        )
    }
}

/// Sweep defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub start_mhz: f64,
    pub stop_mhz: f64,
    pub points: usize,
    /// Wait between programming a frequency and sampling it
    pub settling_delay_ms: u64,
    /// Optional wall-clock bound for a whole sweep
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            start_mhz: 10.0,
            stop_mhz: 40.0,
            points: 100,
            settling_delay_ms: 20,
            deadline_ms: None,
        }
    }
}

impl SweepConfig {
    pub fn settling_delay(&self) -> Duration {
        Duration::from_millis(self.settling_delay_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

/// Calibration fitting parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Required mean separation in units of the larger class standard deviation
    pub separation_factor: f64,
    /// Minimum samples per class
    pub min_samples_per_class: usize,
    /// Where the active calibrated model is persisted
    pub model_path: PathBuf,
    /// Conversions averaged per point while collecting reference data
    pub collect_samples_per_point: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            separation_factor: 2.0,
            min_samples_per_class: 3,
            model_path: PathBuf::from("calibration.json"),
            collect_samples_per_point: 5,
        }
    }
}

/// Result persistence location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub results_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("."),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults if the file is missing or
    /// does not parse (a warning is logged in both cases).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        Self::load_from_file("assets/analyzer_config.json")
    }
}
