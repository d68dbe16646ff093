//! Quantization of pulse-sequence timing into register tick counts.
//!
//! Two clock domains matter: the sequencing clock at 16x the RF carrier
//! (pulses and delays count in it) and the ADC clock at 4x the carrier
//! (the acquisition-window start delay counts in it). An RF period is
//! therefore exactly 16 sequencing ticks, and pulse lengths quantize to
//! whole RF periods so successive refocusing pulses stay phase coherent.

use crate::hardware::design_parameters::{
    ADC_CLOCK_MULTIPLIER, FSM_CLOCK_MULTIPLIER,
};

/// Sequencing ticks per RF carrier period.
const TICKS_PER_RF_PERIOD: u32 = FSM_CLOCK_MULTIPLIER as u32;

/// Hardware floor of the ADC start delay. Values below are clamped, with a
/// warning, before they reach the register.
pub const MIN_INIT_ADC_DELAY: u32 = 2;

/// Pipeline latency of the acquisition window generator, in ADC clocks.
/// Applies on top of the programmed delay; reported in diagnostics so the
/// metadata reflects when sampling really starts.
pub const INHERENT_PIPELINE_DELAY: f64 = 2.25;

/// Register-ready tick counts for one scan, plus the clocks to read them
/// back into engineering units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpmgTiming {
    /// Excitation (90 deg) pulse, sequencing ticks.
    pub pulse1: u32,
    /// Excitation-to-refocusing delay, sequencing ticks.
    pub delay1: u32,
    /// Refocusing (180 deg) pulse, sequencing ticks.
    pub pulse2: u32,
    /// Post-refocusing delay carrying the acquisition window, sequencing
    /// ticks.
    pub delay2: u32,
    /// Acquisition-window start delay, ADC clocks from the start of
    /// `delay2`.
    pub init_adc_delay: u32,
    /// Sequencing clock, MHz.
    pub fsm_clock_mhz: f64,
    /// ADC clock, MHz.
    pub adc_clock_mhz: f64,
}

impl CpmgTiming {
    pub fn pulse1_us(&self) -> f64 {
        self.pulse1 as f64 / self.fsm_clock_mhz
    }

    pub fn delay1_us(&self) -> f64 {
        self.delay1 as f64 / self.fsm_clock_mhz
    }

    pub fn pulse2_us(&self) -> f64 {
        self.pulse2 as f64 / self.fsm_clock_mhz
    }

    pub fn delay2_us(&self) -> f64 {
        self.delay2 as f64 / self.fsm_clock_mhz
    }

    /// Echo period actually programmed: refocusing pulse plus its delay.
    pub fn echo_time_us(&self) -> f64 {
        (self.pulse2 + self.delay2) as f64 / self.fsm_clock_mhz
    }

    /// When sampling really starts, including the pipeline latency.
    pub fn init_adc_delay_us(&self) -> f64 {
        (self.init_adc_delay as f64 + INHERENT_PIPELINE_DELAY)
            / self.adc_clock_mhz
    }

    /// Duration of one full scan in microseconds, for poll budgets.
    pub fn scan_duration_us(&self, echoes_per_scan: u32) -> f64 {
        (self.pulse1 + self.delay1) as f64 / self.fsm_clock_mhz
            + self.echo_time_us() * echoes_per_scan as f64
    }
}

fn clocks(carrier_mhz: f64) -> (f64, f64) {
    (
        carrier_mhz * FSM_CLOCK_MULTIPLIER,
        carrier_mhz * ADC_CLOCK_MULTIPLIER,
    )
}

/// Quantize a pulse to whole RF periods, at least one.
fn rf_periods(us: f64, carrier_mhz: f64) -> u32 {
    ((us * carrier_mhz).round() as u32).max(1) * TICKS_PER_RF_PERIOD
}

/// Clamp a computed ADC start delay to the hardware floor.
fn clamp_init_adc_delay(ticks: f64) -> u32 {
    if ticks < MIN_INIT_ADC_DELAY as f64 {
        log::warn!(
            "computed ADC start delay {ticks:.2} is below the hardware \
             floor; forcing {MIN_INIT_ADC_DELAY}"
        );
        MIN_INIT_ADC_DELAY
    } else {
        ticks.round() as u32
    }
}

/// CPMG timing from an echo-spacing target. The acquisition window is
/// centered in the post-refocusing delay; `echo_shift_us` moves it off
/// center to compensate signal-path latency (either sign).
pub fn quantize_cpmg_timing(
    carrier_mhz: f64,
    pulse1_us: f64,
    pulse2_us: f64,
    echo_spacing_us: f64,
    samples_per_echo: u32,
    echo_shift_us: f64,
) -> CpmgTiming {
    let (fsm_clock_mhz, adc_clock_mhz) = clocks(carrier_mhz);
    let pulse1 = rf_periods(pulse1_us, carrier_mhz);
    let pulse2 = rf_periods(pulse2_us, carrier_mhz);
    let spacing = rf_periods(echo_spacing_us, carrier_mhz);
    // First half-spacing centers the refocusing pulse between excitation
    // and echo top.
    let delay1 = (spacing / 2).saturating_sub(pulse1 / 2 + pulse2 / 2);
    if delay1 == 0 {
        log::warn!(
            "echo spacing {echo_spacing_us} us leaves no room between \
             pulses; delay1 clamped to zero"
        );
    }
    let delay2 = spacing.saturating_sub(pulse2);
    let window_us = samples_per_echo as f64 / adc_clock_mhz;
    let delay2_us = delay2 as f64 / fsm_clock_mhz;
    let init_adc_delay = clamp_init_adc_delay(
        ((delay2_us - window_us) / 2.0 - echo_shift_us) * adc_clock_mhz
            - INHERENT_PIPELINE_DELAY,
    );
    CpmgTiming {
        pulse1,
        delay1,
        pulse2,
        delay2,
        init_adc_delay,
        fsm_clock_mhz,
        adc_clock_mhz,
    }
}

/// CPMG timing from caller-specified exact delays instead of an
/// echo-spacing target.
pub fn quantize_manual_timing(
    carrier_mhz: f64,
    pulse1_us: f64,
    pulse2_us: f64,
    delay1_us: f64,
    delay2_us: f64,
    samples_per_echo: u32,
    echo_shift_us: f64,
) -> CpmgTiming {
    let (fsm_clock_mhz, adc_clock_mhz) = clocks(carrier_mhz);
    let pulse1 = rf_periods(pulse1_us, carrier_mhz);
    let pulse2 = rf_periods(pulse2_us, carrier_mhz);
    let delay1 = (delay1_us * fsm_clock_mhz).round() as u32;
    let delay2 = (delay2_us * fsm_clock_mhz).round() as u32;
    let window_us = samples_per_echo as f64 / adc_clock_mhz;
    let init_adc_delay = clamp_init_adc_delay(
        ((delay2 as f64 / fsm_clock_mhz - window_us) / 2.0 - echo_shift_us)
            * adc_clock_mhz
            - INHERENT_PIPELINE_DELAY,
    );
    CpmgTiming {
        pulse1,
        delay1,
        pulse2,
        delay2,
        init_adc_delay,
        fsm_clock_mhz,
        adc_clock_mhz,
    }
}

/// FID timing: no excitation/refocusing pair, a single pulse followed by a
/// delay window sized with a 10x margin so the acquisition always falls
/// inside the sequencer's on interval.
pub fn fid_timing(
    carrier_mhz: f64,
    pulse2_us: f64,
    samples_per_echo: u32,
) -> CpmgTiming {
    let (fsm_clock_mhz, adc_clock_mhz) = clocks(carrier_mhz);
    let pulse2 = (pulse2_us * fsm_clock_mhz).round() as u32;
    let delay2 = (samples_per_echo as f64
        * (fsm_clock_mhz / adc_clock_mhz)
        * 10.0)
        .round() as u32;
    CpmgTiming {
        pulse1: 0,
        delay1: 0,
        pulse2,
        delay2,
        init_adc_delay: MIN_INIT_ADC_DELAY,
        fsm_clock_mhz,
        adc_clock_mhz,
    }
}

/// Pure receiver-noise capture: FID timing with no RF at all.
pub fn noise_timing(carrier_mhz: f64, samples_per_echo: u32) -> CpmgTiming {
    CpmgTiming {
        pulse2: 0,
        ..fid_timing(carrier_mhz, 0.0, samples_per_echo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpmg_reference_numbers() {
        // 4 MHz carrier: fsm 64 MHz, adc 16 MHz, RF period 16 ticks.
        let t = quantize_cpmg_timing(4.0, 5.0, 10.0, 60.0, 64, 0.0);
        assert_eq!(t.pulse1, 320);
        assert_eq!(t.pulse2, 640);
        assert_eq!(t.delay1, 1440);
        assert_eq!(t.delay2, 3200);
        // delay2 is 50 us, window 4 us: centered start 23 us in, i.e. 368
        // ADC clocks minus the 2.25 pipeline.
        assert_eq!(t.init_adc_delay, 366);
        assert!((t.echo_time_us() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn pulses_are_whole_rf_periods() {
        let t = quantize_cpmg_timing(4.3, 5.1, 10.2, 200.0, 32, 0.0);
        assert_eq!(t.pulse1 % TICKS_PER_RF_PERIOD, 0);
        assert_eq!(t.pulse2 % TICKS_PER_RF_PERIOD, 0);
    }

    #[test]
    fn init_delay_clamps_to_floor() {
        // A huge forward shift pushes the computed start delay negative.
        let t = quantize_cpmg_timing(4.0, 5.0, 10.0, 60.0, 64, 500.0);
        assert_eq!(t.init_adc_delay, MIN_INIT_ADC_DELAY);
        // Manual path clamps the same way.
        let t = quantize_manual_timing(4.0, 5.0, 10.0, 20.0, 30.0, 64, 500.0);
        assert_eq!(t.init_adc_delay, MIN_INIT_ADC_DELAY);
    }

    #[test]
    fn fid_safety_margin() {
        let t = fid_timing(4.0, 10.0, 128);
        // fsm/adc ratio is 4, times the 10x margin.
        assert_eq!(t.delay2, 128 * 40);
        assert_eq!(t.pulse1, 0);
        assert_eq!(t.delay1, 0);
        assert_eq!(t.init_adc_delay, MIN_INIT_ADC_DELAY);
    }

    #[test]
    fn noise_has_no_rf() {
        let t = noise_timing(4.0, 256);
        assert_eq!(t.pulse2, 0);
        assert_eq!(t.delay2, 256 * 40);
    }

    #[test]
    fn manual_delays_are_verbatim() {
        let t = quantize_manual_timing(4.0, 5.0, 10.0, 25.0, 80.0, 64, 0.0);
        assert_eq!(t.delay1, 1600);
        assert_eq!(t.delay2, 5120);
    }
}
