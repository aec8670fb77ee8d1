//! Instrument abstraction: signal source + magnitude/phase detector.
//!
//! The physical seams are two small bus traits:
//!
//! - [`DdsBus`]: the 3-line serial interface of the frequency synthesizer
//! - [`AdcBus`]: raw conversions from the two detector channels
//!
//! [`Analyzer`] combines a [`FrequencyProgrammer`] and a [`Sampler`] over
//! those buses and implements [`Instrument`], the only interface the sweep
//! code depends on. Production buses live in [`dds::Ad9850Bus`] and
//! [`adc::Ads1115`]; [`sim`] provides a simulated antenna and
//! [`crate::testing`] a scripted double.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::HardwareError;

pub mod adc;
pub mod dds;
pub mod retry;
pub mod sim;

pub use adc::{Ads1115, Sampler};
pub use dds::{Ad9850Bus, FrequencyProgrammer, FrequencyRange};
pub use retry::RetryPolicy;
pub use sim::{Resonance, SimulatedAntenna};

/// A programmed frequency together with the tuning word that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyPoint {
    pub frequency_hz: f64,
    pub tuning_word: u32,
}

impl FrequencyPoint {
    /// Build a point for `frequency_hz` without range checking.
    pub fn at(frequency_hz: f64, reference_clock_hz: f64) -> Self {
        Self {
            frequency_hz,
            tuning_word: dds::tuning_word(frequency_hz, reference_clock_hz),
        }
    }

    pub fn frequency_mhz(&self) -> f64 {
        self.frequency_hz / 1e6
    }
}

/// Detector reading at one frequency point, in volts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub mag_voltage: f64,
    pub phase_voltage: f64,
    /// Spread of the magnitude conversions averaged into this sample
    #[serde(default)]
    pub mag_std: f64,
    pub captured_at: DateTime<Utc>,
}

impl Sample {
    pub fn new(mag_voltage: f64, phase_voltage: f64) -> Self {
        Self {
            mag_voltage,
            phase_voltage,
            mag_std: 0.0,
            captured_at: Utc::now(),
        }
    }
}

/// Detector input channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcChannel {
    Magnitude,
    Phase,
}

impl AdcChannel {
    pub fn index(&self) -> u8 {
        match self {
            AdcChannel::Magnitude => 0,
            AdcChannel::Phase => 1,
        }
    }
}

/// Classification of a failed bus transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusFault {
    /// May clear on retry (arbitration loss, overrun, glitch)
    Transient(String),
    /// Device is not on the bus
    Absent(String),
}

/// Serial interface of the frequency synthesizer.
pub trait DdsBus: Send {
    /// Clock one data bit into the shift register.
    fn write_bit(&mut self, bit: bool) -> Result<(), HardwareError>;

    /// Pulse the frequency-update line, applying the shifted command.
    fn latch(&mut self) -> Result<(), HardwareError>;

    /// Pulse the reset line.
    fn reset(&mut self) -> Result<(), HardwareError>;
}

/// Raw conversion source for the detector channels.
pub trait AdcBus: Send {
    fn read_code(&mut self, channel: AdcChannel) -> Result<i16, BusFault>;
}

/// Logical instrument contract consumed by the sweep controller.
///
/// Implementations are driven through a single owned handle; calls are
/// synchronous and must complete before the next one is issued.
pub trait Instrument: Send {
    /// Program the source to `frequency_hz` and wait for the latch.
    fn program(&mut self, frequency_hz: f64) -> Result<FrequencyPoint, HardwareError>;

    /// Read a calibrated (magnitude, phase) voltage pair.
    fn sample(&mut self) -> Result<Sample, HardwareError>;

    /// Reset the signal source.
    fn reset(&mut self) -> Result<(), HardwareError>;

    /// Set how many conversions each sample averages; returns the old count.
    fn set_averaging(&mut self, samples_per_point: usize) -> usize;

    /// Supported tuning span.
    fn frequency_range(&self) -> FrequencyRange;
}

/// Instrument built from a DDS bus and a detector bus.
pub struct Analyzer<B: DdsBus, A: AdcBus> {
    programmer: FrequencyProgrammer,
    dds: B,
    sampler: Sampler<A>,
}

impl<B: DdsBus, A: AdcBus> Analyzer<B, A> {
    pub fn new(programmer: FrequencyProgrammer, dds: B, sampler: Sampler<A>) -> Self {
        Self {
            programmer,
            dds,
            sampler,
        }
    }

    /// Wire both buses using the instrument and sampler sections of `config`.
    pub fn from_config(config: &AppConfig, dds: B, adc: A) -> Self {
        let programmer = FrequencyProgrammer::from_config(&config.instrument);
        let sampler = Sampler::new(
            adc,
            config.instrument.lsb_volts(),
            config.sampler.retry_policy(),
        )
        .with_samples_per_point(config.sampler.samples_per_point);
        Self::new(programmer, dds, sampler)
    }

    pub fn programmer(&self) -> &FrequencyProgrammer {
        &self.programmer
    }

    pub fn sampler_mut(&mut self) -> &mut Sampler<A> {
        &mut self.sampler
    }
}

impl<B: DdsBus, A: AdcBus> Instrument for Analyzer<B, A> {
    fn program(&mut self, frequency_hz: f64) -> Result<FrequencyPoint, HardwareError> {
        self.programmer.program(&mut self.dds, frequency_hz)
    }

    fn sample(&mut self) -> Result<Sample, HardwareError> {
        self.sampler.sample()
    }

    fn reset(&mut self) -> Result<(), HardwareError> {
        self.dds.reset()
    }

    fn set_averaging(&mut self, samples_per_point: usize) -> usize {
        let previous = self.sampler.samples_per_point();
        self.sampler.set_samples_per_point(samples_per_point);
        previous
    }

    fn frequency_range(&self) -> FrequencyRange {
        self.programmer.range()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingDds, ScriptedDetector};

    #[test]
    fn test_frequency_point_at() {
        let point = FrequencyPoint::at(14_200_000.0, 125_000_000.0);
        assert_eq!(point.tuning_word, 487_908_285);
        assert!((point.frequency_mhz() - 14.2).abs() < 1e-12);
    }

    #[test]
    fn test_adc_channel_index() {
        assert_eq!(AdcChannel::Magnitude.index(), 0);
        assert_eq!(AdcChannel::Phase.index(), 1);
    }

    #[test]
    fn test_analyzer_programs_and_samples() {
        let config = AppConfig::default();
        let dds = RecordingDds::new();
        let words = dds.latched_words();
        let detector = ScriptedDetector::new(config.instrument.lsb_volts())
            .with_reading(0.5, 1.25);
        let mut analyzer = Analyzer::from_config(&config, dds, detector);

        let point = analyzer.program(7_000_000.0).unwrap();
        let sample = analyzer.sample().unwrap();

        assert_eq!(words.lock().unwrap().as_slice(), &[point.tuning_word]);
        assert!((sample.mag_voltage - 0.5).abs() < 0.000125);
        assert!((sample.phase_voltage - 1.25).abs() < 0.000125);
    }

    #[test]
    fn test_analyzer_range_from_config() {
        let config = AppConfig::default();
        let analyzer = Analyzer::from_config(
            &config,
            RecordingDds::new(),
            ScriptedDetector::new(config.instrument.lsb_volts()),
        );
        let range = analyzer.frequency_range();
        assert_eq!(range.min_hz, 1.0);
        assert_eq!(range.max_hz, 40_000_000.0);
    }
}
