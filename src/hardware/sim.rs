// Simulated antenna - DDS/ADC bus pair driven by a synthetic SWR curve
//
// The DDS half decodes the shifted command and publishes the latched tuning
// word; the ADC half turns that word back into a frequency, evaluates the
// antenna's SWR there and emits the detector voltage the default heuristic
// would map to that SWR.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::HardwareError;
use crate::hardware::dds::{self, COMMAND_BITS};
use crate::hardware::{AdcBus, AdcChannel, Analyzer, BusFault, DdsBus};
use crate::swr::SwrModel;

const BASELINE_SWR: f64 = 3.5;
const DIP_DEPTH: f64 = 2.8;
const DIP_FLOOR_SWR: f64 = 1.05;
const NOISE_SWR: f64 = 0.05;
const SIM_MAX_SWR: f64 = 10.0;
const PHASE_VOLTS: f64 = 1.6;
const PHASE_JITTER: f64 = 0.2;

/// Gaussian dip in the SWR curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resonance {
    pub center_mhz: f64,
    pub width_mhz: f64,
}

/// Synthetic antenna with zero or more resonances.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedAntenna {
    resonances: Vec<Resonance>,
    baseline_swr: f64,
    noise: f64,
    seed: u64,
}

impl SimulatedAntenna {
    pub fn new(resonances: Vec<Resonance>, seed: u64) -> Self {
        Self {
            resonances,
            baseline_swr: BASELINE_SWR,
            noise: NOISE_SWR,
            seed,
        }
    }

    /// One or two dips placed at random inside `[start + 2, stop - 2]` MHz.
    pub fn random(start_mhz: f64, stop_mhz: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let count = if rng.gen_bool(0.6) { 1 } else { 2 };
        let (lo, hi) = if stop_mhz - start_mhz > 4.0 {
            (start_mhz + 2.0, stop_mhz - 2.0)
        } else {
            (start_mhz, stop_mhz.max(start_mhz + f64::EPSILON))
        };
        let resonances = (0..count)
            .map(|_| Resonance {
                center_mhz: rng.gen_range(lo..hi),
                width_mhz: rng.gen_range(0.8..3.0),
            })
            .collect();
        Self::new(resonances, seed)
    }

    /// Disconnected feed: every frequency reads as a hard mismatch.
    pub fn open_circuit(seed: u64) -> Self {
        Self {
            resonances: Vec::new(),
            baseline_swr: SIM_MAX_SWR,
            noise: NOISE_SWR,
            seed,
        }
    }

    pub fn without_noise(mut self) -> Self {
        self.noise = 0.0;
        self
    }

    pub fn resonances(&self) -> &[Resonance] {
        &self.resonances
    }

    /// Noise-free SWR at `frequency_mhz`.
    pub fn swr_at(&self, frequency_mhz: f64) -> f64 {
        let mut swr = self.baseline_swr;
        for res in &self.resonances {
            let dx = (frequency_mhz - res.center_mhz) / res.width_mhz.max(0.001);
            let dip = DIP_DEPTH * (-(dx * dx)).exp();
            swr = (swr - dip).max(DIP_FLOOR_SWR);
        }
        swr.clamp(1.0, SIM_MAX_SWR)
    }

    /// Bus pair sharing the latched tuning word.
    pub fn split(&self, reference_clock_hz: f64, lsb_volts: f64) -> (SimDds, SimDetector) {
        let latched = Arc::new(AtomicU32::new(0));
        let dds = SimDds {
            shift: 0,
            bits: 0,
            latched: Arc::clone(&latched),
        };
        let detector = SimDetector {
            antenna: self.clone(),
            latched,
            reference_clock_hz,
            lsb_volts,
            model: SwrModel::heuristic(),
            rng: StdRng::seed_from_u64(self.seed),
        };
        (dds, detector)
    }

    /// Complete simulated instrument wired from `config`.
    pub fn into_analyzer(self, config: &AppConfig) -> Analyzer<SimDds, SimDetector> {
        let (dds, detector) = self.split(
            config.instrument.reference_clock_hz,
            config.instrument.lsb_volts(),
        );
        Analyzer::from_config(config, dds, detector)
    }
}

/// DDS side of the simulator.
pub struct SimDds {
    shift: u64,
    bits: usize,
    latched: Arc<AtomicU32>,
}

impl DdsBus for SimDds {
    fn write_bit(&mut self, bit: bool) -> Result<(), HardwareError> {
        if self.bits < COMMAND_BITS {
            self.shift |= (bit as u64) << self.bits;
            self.bits += 1;
        }
        Ok(())
    }

    fn latch(&mut self) -> Result<(), HardwareError> {
        let word = (self.shift & 0xFFFF_FFFF) as u32;
        self.latched.store(word, Ordering::SeqCst);
        self.shift = 0;
        self.bits = 0;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), HardwareError> {
        self.shift = 0;
        self.bits = 0;
        self.latched.store(0, Ordering::SeqCst);
        Ok(())
    }
}

/// Detector side of the simulator.
pub struct SimDetector {
    antenna: SimulatedAntenna,
    latched: Arc<AtomicU32>,
    reference_clock_hz: f64,
    lsb_volts: f64,
    model: SwrModel,
    rng: StdRng,
}

impl SimDetector {
    fn to_code(&self, volts: f64) -> i16 {
        let code = (volts / self.lsb_volts).round();
        code.clamp(i16::MIN as f64, i16::MAX as f64) as i16
    }
}

impl AdcBus for SimDetector {
    fn read_code(&mut self, channel: AdcChannel) -> Result<i16, BusFault> {
        let volts = match channel {
            AdcChannel::Magnitude => {
                let word = self.latched.load(Ordering::SeqCst);
                let mhz = dds::frequency_for_word(word, self.reference_clock_hz) / 1e6;
                let mut swr = self.antenna.swr_at(mhz);
                if self.antenna.noise > 0.0 {
                    swr += self.rng.gen_range(-self.antenna.noise..self.antenna.noise);
                }
                self.model.voltage_for_swr(swr.clamp(1.0, SIM_MAX_SWR))
            }
            AdcChannel::Phase => {
                PHASE_VOLTS + self.rng.gen_range(-PHASE_JITTER..PHASE_JITTER)
            }
        };
        Ok(self.to_code(volts))
    }
}
