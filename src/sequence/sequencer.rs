//! The acquisition sequencer.
//!
//! One call of [`AcquisitionSequencer::acquire`] walks the whole chain:
//! program the parameter registers, retune and reset the system PLL, wait
//! for lock, empty the capture FIFO, strobe the hardware state machine,
//! wait for it to finish, drain and unpack the FIFO, validate the sample
//! count and (for multi-echo scans) average matching echo positions.
//!
//! Phase cycling is deliberately *not* part of the call: the caller flips
//! the receiver reference once per iteration through
//! [`AcquisitionSequencer::toggle_phase_cycle`], so the alternation pattern
//! stays under the orchestration loop's control.
//!
//! A sample-count mismatch poisons only the current scan: nothing is
//! unpacked, nothing is written downstream, and the next scan proceeds.
//! Reading a starved FIFO corrupts the fabric on this hardware, so the
//! gate sits in front of everything that could feed data back in.

use crate::hardware::delay::{settle, HardwareTimeout};
use crate::hardware::design_parameters::{
    FIFO_POST_RUN_SETTLE, FSM_RUN_TIMEOUT_SLACK,
};
use crate::hardware::pll::{PllError, PllInstance};
use crate::hardware::regmap::ADC_FIFO_DEPTH_WORDS;
use crate::hardware::NmrSystem;

use super::Scan;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AcquireError {
    #[error(
        "captured {captured} samples but {requested} were ordered; \
         data flushed"
    )]
    SampleCount { requested: u32, captured: u32 },
    #[error("system PLL: {0}")]
    Pll(#[from] PllError),
    #[error(transparent)]
    Timeout(#[from] HardwareTimeout),
}

/// One valid scan's data, borrowed from the sequencer's pool.
#[derive(Debug, PartialEq)]
pub struct Acquisition<'a> {
    /// Unpacked samples, echo after echo.
    pub samples: &'a [u16],
    /// Elementwise mean across echoes, present for multi-echo scans.
    pub echo_average: Option<Vec<u32>>,
}

/// Mask of the significant sample bits in each 16-bit FIFO lane. The top
/// two bits are bus padding, not sign.
const SAMPLE_MASK: u16 = 0x3fff;

/// Split packed FIFO words into samples, low lane first.
fn unpack_words(words: &[u32], samples: &mut Vec<u16>) {
    samples.clear();
    for &word in words {
        samples.push(word as u16 & SAMPLE_MASK);
        samples.push((word >> 16) as u16 & SAMPLE_MASK);
    }
}

/// A drain is complete exactly when the words cover the ordered samples.
fn sample_count_matches(words_drained: usize, requested: u32) -> bool {
    words_drained as u64 * 2 == u64::from(requested)
}

/// Mean of each echo position across all echoes of a scan.
fn average_echoes(
    samples: &[u16],
    samples_per_echo: usize,
    echoes_per_scan: usize,
) -> Vec<u32> {
    let mut averaged = vec![0u32; samples_per_echo];
    for (position, out) in averaged.iter_mut().enumerate() {
        let sum: u64 = samples[position..]
            .iter()
            .step_by(samples_per_echo)
            .map(|&s| u64::from(s))
            .sum();
        *out = (sum / echoes_per_scan as u64) as u32;
    }
    averaged
}

pub struct AcquisitionSequencer {
    words: Vec<u32>,
    samples: Vec<u16>,
}

impl Default for AcquisitionSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl AcquisitionSequencer {
    /// Pools are sized once, to the FIFO depth: the hardware cannot buffer
    /// more than that in one scan, and reusing the allocations keeps the
    /// iteration loop free of churn.
    pub fn new() -> Self {
        Self {
            words: Vec::with_capacity(ADC_FIFO_DEPTH_WORDS),
            samples: Vec::with_capacity(2 * ADC_FIFO_DEPTH_WORDS),
        }
    }

    /// Flip the receiver reference phase for the next scan. Call once per
    /// iteration when phase cycling is requested.
    pub fn toggle_phase_cycle(&mut self, system: &mut NmrSystem<'_>) {
        let state = system.ctrl.toggle_phase_cycle();
        log::debug!("receiver reference phase {}", state as u8);
    }

    /// Run one scan. On success the returned samples borrow this
    /// sequencer's pool and are valid until the next call.
    pub fn acquire<'s>(
        &'s mut self,
        system: &mut NmrSystem<'_>,
        scan: &Scan,
    ) -> Result<Acquisition<'s>, AcquireError> {
        settle(scan.recycle_delay);

        system.parameters.program(
            &scan.timing,
            scan.echoes_per_scan,
            scan.samples_per_echo,
        );
        self.log_programmed(scan);

        // The sequencer and ADC clocks derive from the system PLL at 16x
        // the carrier; retune, apply with a reset, then hold for lock.
        let fsm_hz = scan.timing.fsm_clock_mhz * 1e6;
        system.sys_pll.set_frequency(0, fsm_hz, 0.5)?;
        system.ctrl.pulse_pll_reset(PllInstance::System);
        if scan.fixed_receiver_phase {
            system.sys_pll.set_phase(0, 0.0)?;
            system.ctrl.set_phase_cycle(false);
        }
        system.status.wait_pll_lock(PllInstance::System)?;

        system.ctrl.pulse_fifo_reset();
        system.ctrl.pulse_fsm_start();

        let budget = scan.expected_duration() * 2 + FSM_RUN_TIMEOUT_SLACK;
        system.status.wait_sequence_done(budget)?;
        settle(FIFO_POST_RUN_SETTLE);

        let drained = system.fifo.drain_into(&mut self.words);
        let requested = scan.requested_samples();
        if !sample_count_matches(drained, requested) {
            return Err(AcquireError::SampleCount {
                requested,
                captured: drained as u32 * 2,
            });
        }

        unpack_words(&self.words, &mut self.samples);
        let echo_average = (scan.average && scan.echoes_per_scan > 1).then(
            || {
                average_echoes(
                    &self.samples,
                    scan.samples_per_echo as usize,
                    scan.echoes_per_scan as usize,
                )
            },
        );

        Ok(Acquisition {
            samples: &self.samples,
            echo_average,
        })
    }

    fn log_programmed(&self, scan: &Scan) {
        let t = &scan.timing;
        log::debug!(
            "programmed: pulse1 {:.3} us ({}), delay1 {:.3} us ({}), \
             pulse2 {:.3} us ({}), delay2 {:.3} us ({}), \
             ADC start {:.3} us ({}), window {:.3} us ({} samples x {} echoes)",
            t.pulse1_us(),
            t.pulse1,
            t.delay1_us(),
            t.delay1,
            t.pulse2_us(),
            t.pulse2,
            t.delay2_us(),
            t.delay2,
            t.init_adc_delay_us(),
            t.init_adc_delay,
            scan.samples_per_echo as f64 / t.adc_clock_mhz,
            scan.samples_per_echo,
            scan.echoes_per_scan,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpack_masks_the_top_bits() {
        // Lane payloads with garbage in bits 15:14 of each lane.
        let words = [
            (0x8001u32 << 16) | 0x4002,
            (0x3fffu32 << 16) | 0x0000,
        ];
        let mut samples = Vec::new();
        unpack_words(&words, &mut samples);
        assert_eq!(samples, vec![0x0002, 0x0001, 0x0000, 0x3fff]);
    }

    #[test]
    fn unpack_round_trip() {
        let original: Vec<u16> =
            (0u16..64).map(|i| (i * 321) & SAMPLE_MASK).collect();
        let words: Vec<u32> = original
            .chunks(2)
            .map(|pair| (u32::from(pair[1]) << 16) | u32::from(pair[0]))
            .collect();
        let mut samples = Vec::new();
        unpack_words(&words, &mut samples);
        assert_eq!(samples, original);
    }

    #[test]
    fn validation_gate() {
        assert!(sample_count_matches(256, 512));
        // The canonical starved-FIFO case: 255 words for 512 samples.
        assert!(!sample_count_matches(255, 512));
        assert!(!sample_count_matches(257, 512));
        assert!(!sample_count_matches(0, 512));
        assert!(sample_count_matches(0, 0));
    }

    #[test]
    fn echo_average_reference() {
        let samples: Vec<u16> = (1u16..=12).collect();
        assert_eq!(average_echoes(&samples, 4, 3), vec![5, 6, 7, 8]);
    }

    #[test]
    fn echo_average_single_position() {
        let samples = [10u16, 20, 33];
        assert_eq!(average_echoes(&samples, 1, 3), vec![21]);
    }
}
