// Sampler - detector voltage acquisition
//
// Raw codes come from an `AdcBus`; each channel read is wrapped in the
// injected `RetryPolicy`, so transient bus faults are retried with backoff
// and device absence escalates immediately.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c};

use crate::error::HardwareError;
use crate::hardware::{AdcBus, AdcChannel, BusFault, RetryPolicy, Sample};

/// ADS1115 register addresses
const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

/// Single-shot start bit
const CONFIG_OS_SINGLE: u16 = 0x8000;
/// PGA +/-4.096 V
const CONFIG_PGA_4_096: u16 = 0b001 << 9;
/// Single-shot mode
const CONFIG_MODE_SINGLE: u16 = 1 << 8;
/// 860 samples per second
const CONFIG_DR_860: u16 = 0b111 << 5;
/// Comparator disabled
const CONFIG_COMP_DISABLE: u16 = 0b11;

/// Conversion time at 860 SPS is ~1.2 ms
const CONVERSION_WAIT_US: u32 = 2_000;

/// Config register word for a single-ended single-shot read of `channel`.
pub fn single_shot_config(channel: AdcChannel) -> u16 {
    // MUX 0b100 + n selects AINn against GND
    let mux = (0b100 | channel.index() as u16) << 12;
    CONFIG_OS_SINGLE
        | mux
        | CONFIG_PGA_4_096
        | CONFIG_MODE_SINGLE
        | CONFIG_DR_860
        | CONFIG_COMP_DISABLE
}

/// ADS1115 16-bit ADC over I2C.
pub struct Ads1115<I: I2c, D: DelayNs> {
    i2c: I,
    delay: D,
    address: u8,
}

impl<I: I2c, D: DelayNs> Ads1115<I, D> {
    pub fn new(i2c: I, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }
}

impl<I, D> AdcBus for Ads1115<I, D>
where
    I: I2c + Send,
    D: DelayNs + Send,
{
    fn read_code(&mut self, channel: AdcChannel) -> Result<i16, BusFault> {
        let config = single_shot_config(channel).to_be_bytes();
        self.i2c
            .write(self.address, &[REG_CONFIG, config[0], config[1]])
            .map_err(|err| classify(err.kind(), self.address))?;

        self.delay.delay_us(CONVERSION_WAIT_US);

        let mut raw = [0u8; 2];
        self.i2c
            .write_read(self.address, &[REG_CONVERSION], &mut raw)
            .map_err(|err| classify(err.kind(), self.address))?;

        Ok(i16::from_be_bytes(raw))
    }
}

fn classify(kind: ErrorKind, address: u8) -> BusFault {
    match kind {
        ErrorKind::NoAcknowledge(_) => {
            BusFault::Absent(format!("no ACK from ADC at 0x{:02X}", address))
        }
        other => BusFault::Transient(format!("I2C {:?} at 0x{:02X}", other, address)),
    }
}

/// Reads calibrated (magnitude, phase) voltage pairs.
pub struct Sampler<A: AdcBus> {
    bus: A,
    lsb_volts: f64,
    retry: RetryPolicy,
    samples_per_point: usize,
}

impl<A: AdcBus> Sampler<A> {
    pub fn new(bus: A, lsb_volts: f64, retry: RetryPolicy) -> Self {
        Self {
            bus,
            lsb_volts,
            retry,
            samples_per_point: 1,
        }
    }

    /// Average `n` conversions per sample (minimum 1).
    pub fn with_samples_per_point(mut self, n: usize) -> Self {
        self.samples_per_point = n.max(1);
        self
    }

    pub fn set_samples_per_point(&mut self, n: usize) {
        self.samples_per_point = n.max(1);
    }

    pub fn samples_per_point(&self) -> usize {
        self.samples_per_point
    }

    pub fn lsb_volts(&self) -> f64 {
        self.lsb_volts
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Read both channels, averaging over the configured count.
    pub fn sample(&mut self) -> Result<Sample, HardwareError> {
        let n = self.samples_per_point;
        let mut mags = Vec::with_capacity(n);
        let mut phase_sum = 0.0;

        for _ in 0..n {
            mags.push(self.read_volts(AdcChannel::Magnitude)?);
            phase_sum += self.read_volts(AdcChannel::Phase)?;
        }

        let mag_mean = mags.iter().sum::<f64>() / n as f64;
        let mag_var = mags.iter().map(|v| (v - mag_mean).powi(2)).sum::<f64>() / n as f64;

        let mut sample = Sample::new(mag_mean, phase_sum / n as f64);
        sample.mag_std = mag_var.sqrt();
        Ok(sample)
    }

    fn read_volts(&mut self, channel: AdcChannel) -> Result<f64, HardwareError> {
        let bus = &mut self.bus;
        let code = self.retry.run(|attempt| {
            if attempt > 1 {
                tracing::debug!(?channel, attempt, "retrying ADC read");
            }
            bus.read_code(channel)
        })?;
        Ok(code as f64 * self.lsb_volts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDetector;

    const LSB: f64 = 0.000125;

    fn sampler(detector: ScriptedDetector) -> Sampler<ScriptedDetector> {
        Sampler::new(detector, LSB, RetryPolicy::no_backoff(3))
    }

    #[test]
    fn test_single_shot_config_words() {
        assert_eq!(single_shot_config(AdcChannel::Magnitude), 0xC3E3);
        assert_eq!(single_shot_config(AdcChannel::Phase), 0xD3E3);
    }

    #[test]
    fn test_classify_no_ack_is_absent() {
        use embedded_hal::i2c::NoAcknowledgeSource;
        let fault = classify(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address), 0x48);
        assert!(matches!(fault, BusFault::Absent(ref s) if s.contains("0x48")));
        let fault = classify(ErrorKind::ArbitrationLoss, 0x48);
        assert!(matches!(fault, BusFault::Transient(_)));
    }

    #[test]
    fn test_codes_converted_to_volts() {
        let detector = ScriptedDetector::new(LSB).with_reading(1.0, 2.0);
        let mut s = sampler(detector);
        let sample = s.sample().unwrap();
        assert!((sample.mag_voltage - 1.0).abs() < LSB);
        assert!((sample.phase_voltage - 2.0).abs() < LSB);
        assert_eq!(sample.mag_std, 0.0);
    }

    #[test]
    fn test_transient_fault_retried() {
        let detector = ScriptedDetector::new(LSB)
            .with_transient("arbitration lost")
            .with_reading(0.4, 1.6);
        let reads = detector.read_count();
        let mut s = sampler(detector);

        let sample = s.sample().unwrap();
        assert!((sample.mag_voltage - 0.4).abs() < LSB);
        // failed magnitude read, retried magnitude read, phase read
        assert_eq!(reads.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[test]
    fn test_persistent_transient_fault_times_out() {
        let detector = ScriptedDetector::new(LSB)
            .with_transient("glitch")
            .with_transient("glitch")
            .with_transient("glitch")
            .with_reading(0.4, 1.6);
        let mut s = sampler(detector);

        match s.sample() {
            Err(HardwareError::HardwareTimeout { attempts, last_fault }) => {
                assert_eq!(attempts, 3);
                assert!(last_fault.contains("glitch"));
            }
            other => panic!("expected HardwareTimeout, got {:?}", other),
        }
    }

    #[test]
    fn test_absent_device_not_retried() {
        let detector = ScriptedDetector::new(LSB)
            .with_absent("no ACK")
            .with_reading(0.4, 1.6);
        let reads = detector.read_count();
        let mut s = sampler(detector);

        assert!(matches!(
            s.sample(),
            Err(HardwareError::HardwareUnavailable { .. })
        ));
        assert_eq!(reads.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_averaging_records_spread() {
        let detector = ScriptedDetector::new(LSB)
            .with_reading(1.0, 1.0)
            .with_reading(1.2, 1.0)
            .with_reading(1.0, 1.0)
            .with_reading(1.2, 1.0);
        let mut s = sampler(detector).with_samples_per_point(4);

        let sample = s.sample().unwrap();
        assert!((sample.mag_voltage - 1.1).abs() < 1e-3);
        assert!((sample.mag_std - 0.1).abs() < 1e-3);
        assert!((sample.phase_voltage - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_samples_per_point_floor() {
        let s = sampler(ScriptedDetector::new(LSB)).with_samples_per_point(0);
        assert_eq!(s.samples_per_point(), 1);
    }
}
