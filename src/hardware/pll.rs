//! PLL reconfiguration core.
//!
//! The fabric carries two frequency synthesizers driven through the same
//! reconfiguration protocol: the system PLL clocking the acquisition
//! sequencer and ADC, and the transmit PLL for the RF chain. Reconfiguration
//! is a polling-mode handshake against the core's own registers; applying
//! the new settings and observing lock go through the shared control/status
//! pair instead (see [`super::control`]).

use bitbybit::bitfield;

use super::delay::{poll_until, HardwareTimeout};
use super::design_parameters::{PLL_RECONFIG_TIMEOUT, REF_CLOCK_HZ};
use super::mmio::Mmio;

const MODE: usize = 0x00;
const STATUS: usize = 0x04;
const START: usize = 0x08;
const N_COUNTER: usize = 0x0c;
const M_COUNTER: usize = 0x10;
const C_COUNTER: usize = 0x14;
const DPS: usize = 0x18;
const M_FRAC: usize = 0x1c;

/// VCO operating range of the synthesizer, Hz.
const VCO_MIN_HZ: f64 = 600e6;
const VCO_MAX_HZ: f64 = 1_300e6;

/// The two synthesizer instances. Only the system PLL has a register window
/// in this hardware build; the transmit PLL's reconfig port is not wired to
/// the bridge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PllInstance {
    System,
    Transmit,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PllError {
    #[error("target frequency {target_hz} Hz outside synthesizable range")]
    OutOfRange { target_hz: f64 },
    #[error(transparent)]
    Timeout(#[from] HardwareTimeout),
}

/// Split counter word: low/high phase counts plus the odd-division and
/// bypass flags, as the reconfiguration core encodes them.
#[bitfield(u32, default = 0)]
#[derive(Debug, PartialEq)]
pub struct CounterWord {
    #[bits(0..=7, rw)]
    low: u8,
    #[bits(8..=15, rw)]
    high: u8,
    #[bit(16, rw)]
    bypass: bool,
    #[bit(17, rw)]
    odd: bool,
}

/// Encode a division by `count` with the given duty cycle.
pub fn counter_word(count: u32, duty: f64) -> u32 {
    if count <= 1 {
        return CounterWord::default().with_bypass(true).raw_value();
    }
    // Each phase count is 8 bits; keep both within range whatever the duty.
    let high = ((count as f64 * duty).round() as u32)
        .clamp(count.saturating_sub(255).max(1), (count - 1).min(255));
    let low = count - high;
    CounterWord::default()
        .with_low(low as u8)
        .with_high(high as u8)
        .with_odd(count % 2 == 1)
        .raw_value()
}

/// Dynamic phase-shift command: step count, counter select, direction.
#[bitfield(u32, default = 0)]
#[derive(Debug, PartialEq)]
pub struct PhaseWord {
    #[bits(0..=15, rw)]
    steps: u16,
    #[bits(16..=20, rw)]
    counter: arbitrary_int::u5,
    #[bit(21, rw)]
    up: bool,
}

/// Multiply/divide factors approximating a target frequency from the
/// reference: `f = ref * (m + k/2^32) / c`, N fixed at 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ratio {
    pub m: u32,
    pub k: u32,
    pub c: u32,
}

impl Ratio {
    pub fn compute(reference_hz: f64, target_hz: f64) -> Result<Self, PllError> {
        // The post-divider counter splits into two 8-bit phase counts, so
        // divisions beyond 510 are not encodable; that floors the output at
        // a bit under 1.2 MHz, far below any carrier this instrument runs.
        if !(1.2e6..=400e6).contains(&target_hz) {
            return Err(PllError::OutOfRange { target_hz });
        }
        // Smallest post-divider that parks the VCO in range.
        let c = (VCO_MIN_HZ / target_hz).ceil() as u32;
        let vco = target_hz * c as f64;
        debug_assert!(vco <= VCO_MAX_HZ);
        let m_real = vco / reference_hz;
        let mut m = m_real.floor() as u32;
        let mut k = ((m_real - m as f64) * 4294967296.0).round() as u64;
        if k == 1 << 32 {
            m += 1;
            k = 0;
        }
        Ok(Self { m, k: k as u32, c })
    }

    pub fn achieved_hz(&self, reference_hz: f64) -> f64 {
        reference_hz * (self.m as f64 + self.k as f64 / 4294967296.0)
            / self.c as f64
    }
}

pub struct PllReconfig<'a> {
    regs: Mmio<'a>,
    name: &'static str,
    /// Post-divider last programmed per output, for phase-step scaling.
    c_dividers: [u32; 8],
}

impl<'a> PllReconfig<'a> {
    pub fn new(regs: Mmio<'a>, name: &'static str) -> Self {
        Self {
            regs,
            name,
            c_dividers: [1; 8],
        }
    }

    /// Select the polling handshake: software starts a reconfiguration and
    /// polls the done flag instead of stalling the bus.
    pub fn set_polling_mode(&self) {
        self.regs.write(MODE, 1);
    }

    fn start_and_wait(&self) -> Result<(), HardwareTimeout> {
        self.regs.write(START, 1);
        poll_until("PLL reconfiguration done", PLL_RECONFIG_TIMEOUT, || {
            self.regs.read(STATUS) & 1 != 0
        })
    }

    /// Program output `output` to approximate `target_hz`. Returns the
    /// frequency actually synthesized. Takes effect at the next reset.
    pub fn set_frequency(
        &mut self,
        output: u8,
        target_hz: f64,
        duty: f64,
    ) -> Result<f64, PllError> {
        let ratio = Ratio::compute(REF_CLOCK_HZ, target_hz)?;
        self.regs.write(N_COUNTER, counter_word(1, 0.5));
        self.regs.write(M_COUNTER, counter_word(ratio.m, 0.5));
        self.regs.write(M_FRAC, ratio.k);
        self.regs.write(
            C_COUNTER,
            counter_word(ratio.c, duty) | u32::from(output) << 18,
        );
        self.start_and_wait()?;
        self.c_dividers[usize::from(output) % 8] = ratio.c;
        let achieved = ratio.achieved_hz(REF_CLOCK_HZ);
        log::debug!(
            "{}: output {output} programmed to {achieved:.1} Hz \
             (m={} k={} c={}, target {target_hz:.1} Hz)",
            self.name,
            ratio.m,
            ratio.k,
            ratio.c,
        );
        Ok(achieved)
    }

    /// Shift output `output` by `degrees` of its own period. Steps are an
    /// eighth of a VCO period each, so resolution scales with the
    /// post-divider programmed for that output.
    pub fn set_phase(&mut self, output: u8, degrees: f64) -> Result<(), PllError> {
        let c = self.c_dividers[usize::from(output) % 8];
        let steps = (degrees / 360.0 * 8.0 * c as f64).round() as i64;
        self.regs.write(
            DPS,
            PhaseWord::default()
                .with_steps(steps.unsigned_abs() as u16)
                .with_counter(arbitrary_int::u5::new(output & 0x1f))
                .with_up(steps >= 0)
                .raw_value(),
        );
        self.start_and_wait()?;
        log::debug!(
            "{}: output {output} phase shifted {degrees} deg ({steps} steps)",
            self.name
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_even_split() {
        let w = CounterWord::new_with_raw_value(counter_word(10, 0.5));
        assert_eq!(w.low(), 5);
        assert_eq!(w.high(), 5);
        assert!(!w.odd());
        assert!(!w.bypass());
    }

    #[test]
    fn counter_odd_and_bypass() {
        let w = CounterWord::new_with_raw_value(counter_word(9, 0.5));
        assert_eq!(w.high() + w.low(), 9);
        assert!(w.odd());
        assert!(CounterWord::new_with_raw_value(counter_word(1, 0.5)).bypass());
    }

    #[test]
    fn ratio_for_80mhz_sequencer_clock() {
        // 16x a 5 MHz carrier.
        let ratio = Ratio::compute(50e6, 80e6).unwrap();
        assert_eq!(ratio.c, 8);
        assert_eq!(ratio.m, 12);
        let achieved = ratio.achieved_hz(50e6);
        assert!((achieved - 80e6).abs() < 1.0, "{achieved}");
    }

    #[test]
    fn ratio_rejects_nonsense() {
        assert!(Ratio::compute(50e6, 0.0).is_err());
        assert!(Ratio::compute(50e6, 500e6).is_err());
    }

    #[test]
    fn vco_stays_in_range() {
        for target in [1.2e6, 5e6, 4.3e6 * 16.0, 100e6, 400e6] {
            let ratio = Ratio::compute(50e6, target).unwrap();
            let vco = target * ratio.c as f64;
            assert!((VCO_MIN_HZ..=VCO_MAX_HZ).contains(&vco), "{target}");
        }
    }
}
