use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::AppConfig;
use crate::error::HardwareError;
use crate::hardware::{
    AdcBus, AdcChannel, Analyzer, BusFault, DdsBus, FrequencyProgrammer, RetryPolicy, Sampler,
};
use crate::sweep::CancelToken;

/// DDS bus that records latched tuning words instead of toggling pins.
#[derive(Default)]
pub struct RecordingDds {
    shift: u64,
    pending_bits: usize,
    bits_written: usize,
    resets: usize,
    latched: Arc<Mutex<Vec<u32>>>,
}

impl RecordingDds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of every word latched so far, in order.
    pub fn latched_words(&self) -> Arc<Mutex<Vec<u32>>> {
        Arc::clone(&self.latched)
    }

    pub fn bits_written(&self) -> usize {
        self.bits_written
    }

    pub fn resets(&self) -> usize {
        self.resets
    }
}

impl DdsBus for RecordingDds {
    fn write_bit(&mut self, bit: bool) -> Result<(), HardwareError> {
        if self.pending_bits < 64 {
            self.shift |= (bit as u64) << self.pending_bits;
        }
        self.pending_bits += 1;
        self.bits_written += 1;
        Ok(())
    }

    fn latch(&mut self) -> Result<(), HardwareError> {
        let word = (self.shift & 0xFFFF_FFFF) as u32;
        self.latched
            .lock()
            .map_err(|_| HardwareError::LockPoisoned {
                component: "RecordingDds".to_string(),
            })?
            .push(word);
        self.shift = 0;
        self.pending_bits = 0;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), HardwareError> {
        self.shift = 0;
        self.pending_bits = 0;
        self.resets += 1;
        Ok(())
    }
}

/// One entry in a detector script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Magnitude and phase voltages for one sample
    Reading { mag: f64, phase: f64 },
    /// Magnitude read fails with a retryable fault
    Transient(String),
    /// Magnitude read reports the device missing
    Absent(String),
}

/// ADC bus replaying a fixed script.
///
/// Each magnitude read consumes one step; the phase read that follows
/// returns the phase of the last `Reading`. Once the script runs out every
/// read fails transiently, so a sampler escalates to `HardwareTimeout`.
pub struct ScriptedDetector {
    lsb_volts: f64,
    script: VecDeque<ScriptStep>,
    pending_phase: Option<f64>,
    reads: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    cancel_after: Option<(usize, CancelToken)>,
}

impl ScriptedDetector {
    pub fn new(lsb_volts: f64) -> Self {
        Self {
            lsb_volts,
            script: VecDeque::new(),
            pending_phase: None,
            reads: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicUsize::new(0)),
            cancel_after: None,
        }
    }

    pub fn with_reading(mut self, mag: f64, phase: f64) -> Self {
        self.script.push_back(ScriptStep::Reading { mag, phase });
        self
    }

    /// Append one reading per magnitude voltage, all with `phase`.
    pub fn with_readings<I>(mut self, mags: I, phase: f64) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        self.script
            .extend(mags.into_iter().map(|mag| ScriptStep::Reading { mag, phase }));
        self
    }

    pub fn with_transient(mut self, details: &str) -> Self {
        self.script
            .push_back(ScriptStep::Transient(details.to_string()));
        self
    }

    pub fn with_absent(mut self, details: &str) -> Self {
        self.script.push_back(ScriptStep::Absent(details.to_string()));
        self
    }

    /// Cancel `token` once `readings` full readings have been served.
    pub fn cancel_after(mut self, readings: usize, token: CancelToken) -> Self {
        self.cancel_after = Some((readings, token));
        self
    }

    /// Counter of every `read_code` call.
    pub fn read_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }

    /// Counter of completed (magnitude + phase) readings.
    pub fn completed_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.completed)
    }

    fn to_code(&self, volts: f64) -> i16 {
        (volts / self.lsb_volts)
            .round()
            .clamp(i16::MIN as f64, i16::MAX as f64) as i16
    }
}

impl AdcBus for ScriptedDetector {
    fn read_code(&mut self, channel: AdcChannel) -> Result<i16, BusFault> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        match channel {
            AdcChannel::Magnitude => match self.script.pop_front() {
                Some(ScriptStep::Reading { mag, phase }) => {
                    self.pending_phase = Some(phase);
                    Ok(self.to_code(mag))
                }
                Some(ScriptStep::Transient(details)) => Err(BusFault::Transient(details)),
                Some(ScriptStep::Absent(details)) => Err(BusFault::Absent(details)),
                None => Err(BusFault::Transient("script exhausted".to_string())),
            },
            AdcChannel::Phase => {
                let phase = self.pending_phase.take().ok_or_else(|| {
                    BusFault::Transient("phase read without magnitude".to_string())
                })?;
                let served = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some((limit, token)) = &self.cancel_after {
                    if served >= *limit {
                        token.cancel();
                    }
                }
                Ok(self.to_code(phase))
            }
        }
    }
}

/// Analyzer over a `RecordingDds` and `detector`, retrying without sleeps.
pub fn scripted_analyzer(
    config: &AppConfig,
    detector: ScriptedDetector,
) -> Analyzer<RecordingDds, ScriptedDetector> {
    let sampler = Sampler::new(
        detector,
        config.instrument.lsb_volts(),
        RetryPolicy::no_backoff(config.sampler.max_attempts),
    )
    .with_samples_per_point(config.sampler.samples_per_point);
    Analyzer::new(
        FrequencyProgrammer::from_config(&config.instrument),
        RecordingDds::new(),
        sampler,
    )
}
