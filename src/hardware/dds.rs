// FrequencyProgrammer - tuning word generation and serial programming
//
// The synthesizer takes a 40-bit command: the 32-bit tuning word followed by
// an 8-bit control byte, each shifted least-significant bit first on the
// DATA line with one W_CLK pulse per bit, then applied with an FQ_UD pulse.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use serde::{Deserialize, Serialize};

use crate::config::InstrumentConfig;
use crate::error::HardwareError;
use crate::hardware::{DdsBus, FrequencyPoint};

/// Bits in one programming command (tuning word + control byte)
pub const COMMAND_BITS: usize = 40;

const TWO_POW_32: f64 = 4_294_967_296.0;

/// Supported tuning span in Hz, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub min_hz: f64,
    pub max_hz: f64,
}

impl FrequencyRange {
    pub fn contains(&self, frequency_hz: f64) -> bool {
        frequency_hz.is_finite() && frequency_hz >= self.min_hz && frequency_hz <= self.max_hz
    }
}

/// `round(frequency_hz * 2^32 / reference_clock_hz)`, saturating at the
/// 32-bit limit.
pub fn tuning_word(frequency_hz: f64, reference_clock_hz: f64) -> u32 {
    let word = (frequency_hz * TWO_POW_32 / reference_clock_hz).round();
    if word <= 0.0 {
        0
    } else if word >= u32::MAX as f64 {
        u32::MAX
    } else {
        word as u32
    }
}

/// Output frequency produced by `word` at `reference_clock_hz`.
pub fn frequency_for_word(word: u32, reference_clock_hz: f64) -> f64 {
    word as f64 * reference_clock_hz / TWO_POW_32
}

/// Command bits in transmission order: tuning word LSB first, then the
/// control byte LSB first.
pub fn encode_command(word: u32, control: u8) -> [bool; COMMAND_BITS] {
    let mut bits = [false; COMMAND_BITS];
    for (i, bit) in bits.iter_mut().take(32).enumerate() {
        *bit = (word >> i) & 1 == 1;
    }
    for i in 0..8 {
        bits[32 + i] = (control >> i) & 1 == 1;
    }
    bits
}

/// Converts target frequencies into tuning words and shifts them out.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyProgrammer {
    reference_clock_hz: f64,
    range: FrequencyRange,
    control_byte: u8,
}

impl FrequencyProgrammer {
    pub fn new(reference_clock_hz: f64, range: FrequencyRange, control_byte: u8) -> Self {
        Self {
            reference_clock_hz,
            range,
            control_byte,
        }
    }

    pub fn from_config(config: &InstrumentConfig) -> Self {
        Self::new(
            config.reference_clock_hz,
            FrequencyRange {
                min_hz: config.min_frequency_hz,
                max_hz: config.max_frequency_hz,
            },
            config.control_byte,
        )
    }

    pub fn range(&self) -> FrequencyRange {
        self.range
    }

    pub fn reference_clock_hz(&self) -> f64 {
        self.reference_clock_hz
    }

    /// Compute the tuning word for `frequency_hz` after checking the span.
    pub fn tuning_word(&self, frequency_hz: f64) -> Result<u32, HardwareError> {
        if !self.range.contains(frequency_hz) {
            return Err(HardwareError::FrequencyOutOfRange {
                frequency_hz,
                min_hz: self.range.min_hz,
                max_hz: self.range.max_hz,
            });
        }
        Ok(tuning_word(frequency_hz, self.reference_clock_hz))
    }

    /// Shift the command for `frequency_hz` into `bus` and latch it.
    ///
    /// Returns only after the latch pulse has been issued.
    pub fn program<B: DdsBus + ?Sized>(
        &self,
        bus: &mut B,
        frequency_hz: f64,
    ) -> Result<FrequencyPoint, HardwareError> {
        let word = self.tuning_word(frequency_hz)?;
        for bit in encode_command(word, self.control_byte) {
            bus.write_bit(bit)?;
        }
        bus.latch()?;

        Ok(FrequencyPoint {
            frequency_hz,
            tuning_word: word,
        })
    }
}

/// GPIO-driven serial bus for an AD9850-class synthesizer.
pub struct Ad9850Bus<P: OutputPin, D: DelayNs> {
    w_clk: P,
    fq_ud: P,
    data: P,
    reset: P,
    delay: D,
}

impl<P, D> Ad9850Bus<P, D>
where
    P: OutputPin + Send,
    D: DelayNs + Send,
{
    /// Drive all lines low and pulse reset once.
    pub fn new(w_clk: P, fq_ud: P, data: P, reset: P, delay: D) -> Result<Self, HardwareError> {
        let mut bus = Self {
            w_clk,
            fq_ud,
            data,
            reset,
            delay,
        };
        set_line(&mut bus.w_clk, false, "W_CLK")?;
        set_line(&mut bus.fq_ud, false, "FQ_UD")?;
        set_line(&mut bus.data, false, "DATA")?;
        bus.reset()?;
        log::info!("[Ad9850Bus] Synthesizer reset and ready");
        Ok(bus)
    }
}

impl<P, D> DdsBus for Ad9850Bus<P, D>
where
    P: OutputPin + Send,
    D: DelayNs + Send,
{
    fn write_bit(&mut self, bit: bool) -> Result<(), HardwareError> {
        set_line(&mut self.data, bit, "DATA")?;
        set_line(&mut self.w_clk, true, "W_CLK")?;
        set_line(&mut self.w_clk, false, "W_CLK")
    }

    fn latch(&mut self) -> Result<(), HardwareError> {
        set_line(&mut self.fq_ud, true, "FQ_UD")?;
        set_line(&mut self.fq_ud, false, "FQ_UD")
    }

    fn reset(&mut self) -> Result<(), HardwareError> {
        set_line(&mut self.reset, true, "RESET")?;
        self.delay.delay_ms(1);
        set_line(&mut self.reset, false, "RESET")?;
        self.delay.delay_ms(1);
        Ok(())
    }
}

fn set_line<P: OutputPin>(pin: &mut P, high: bool, name: &str) -> Result<(), HardwareError> {
    let result = if high { pin.set_high() } else { pin.set_low() };
    result.map_err(|err| HardwareError::BusFault {
        details: format!("{} line: {:?}", name, err),
    })
}
