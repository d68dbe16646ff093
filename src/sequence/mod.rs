//! Acquisition sequences: scan descriptions and the sequencer running them.

pub mod sequencer;
pub mod timing;

use std::time::Duration;

use timing::CpmgTiming;

/// Which sequence family a scan belongs to. Also names the measurement
/// folder and the offline analysis entry point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScanKind {
    Cpmg,
    Fid,
    Noise,
}

impl ScanKind {
    pub fn label(&self) -> &'static str {
        match self {
            ScanKind::Cpmg => "cpmg",
            ScanKind::Fid => "fid",
            ScanKind::Noise => "noise",
        }
    }

    pub fn analysis_entry(&self) -> &'static str {
        match self {
            ScanKind::Cpmg => "compute_iterate",
            ScanKind::Fid | ScanKind::Noise => "fid_iterate",
        }
    }
}

/// Everything one acquisition call needs: register-ready timing plus the
/// counts and policy flags of the variant.
#[derive(Debug, Clone)]
pub struct Scan {
    pub kind: ScanKind,
    pub carrier_mhz: f64,
    pub timing: CpmgTiming,
    pub samples_per_echo: u32,
    pub echoes_per_scan: u32,
    /// Recycle delay before the scan starts (magnetization recovery).
    pub recycle_delay: Duration,
    /// Average matching echo positions across the scan (CPMG family).
    pub average: bool,
    /// Pin the receiver reference phase low instead of leaving the
    /// phase-cycling bit wherever the previous scan put it (FID/noise).
    pub fixed_receiver_phase: bool,
    /// Pulse duty cycles, accepted for interface compatibility. Currently
    /// inert: no register consumes them, pending hardware confirmation.
    pub pulse_duty: (f64, f64),
}

impl Scan {
    #[allow(clippy::too_many_arguments)]
    pub fn cpmg(
        carrier_mhz: f64,
        pulse1_us: f64,
        pulse2_us: f64,
        pulse_duty: (f64, f64),
        echo_spacing_us: f64,
        scan_spacing_us: u64,
        samples_per_echo: u32,
        echoes_per_scan: u32,
        echo_shift_us: f64,
    ) -> Self {
        Self {
            kind: ScanKind::Cpmg,
            carrier_mhz,
            timing: timing::quantize_cpmg_timing(
                carrier_mhz,
                pulse1_us,
                pulse2_us,
                echo_spacing_us,
                samples_per_echo,
                echo_shift_us,
            ),
            samples_per_echo,
            echoes_per_scan,
            recycle_delay: Duration::from_micros(scan_spacing_us),
            average: true,
            fixed_receiver_phase: false,
            pulse_duty,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn cpmg_manual(
        carrier_mhz: f64,
        pulse1_us: f64,
        pulse2_us: f64,
        pulse_duty: (f64, f64),
        delay1_us: f64,
        delay2_us: f64,
        scan_spacing_us: u64,
        samples_per_echo: u32,
        echoes_per_scan: u32,
        echo_shift_us: f64,
    ) -> Self {
        Self {
            kind: ScanKind::Cpmg,
            carrier_mhz,
            timing: timing::quantize_manual_timing(
                carrier_mhz,
                pulse1_us,
                pulse2_us,
                delay1_us,
                delay2_us,
                samples_per_echo,
                echo_shift_us,
            ),
            samples_per_echo,
            echoes_per_scan,
            recycle_delay: Duration::from_micros(scan_spacing_us),
            average: true,
            fixed_receiver_phase: false,
            pulse_duty,
        }
    }

    pub fn fid(
        carrier_mhz: f64,
        pulse2_us: f64,
        pulse2_duty: f64,
        scan_spacing_us: u64,
        samples_per_echo: u32,
    ) -> Self {
        Self {
            kind: ScanKind::Fid,
            carrier_mhz,
            timing: timing::fid_timing(carrier_mhz, pulse2_us, samples_per_echo),
            samples_per_echo,
            echoes_per_scan: 1,
            recycle_delay: Duration::from_micros(scan_spacing_us),
            average: false,
            fixed_receiver_phase: true,
            pulse_duty: (0.0, pulse2_duty),
        }
    }

    pub fn noise(
        carrier_mhz: f64,
        scan_spacing_us: u64,
        samples_per_echo: u32,
    ) -> Self {
        Self {
            kind: ScanKind::Noise,
            carrier_mhz,
            timing: timing::noise_timing(carrier_mhz, samples_per_echo),
            samples_per_echo,
            echoes_per_scan: 1,
            recycle_delay: Duration::from_micros(scan_spacing_us),
            average: false,
            fixed_receiver_phase: true,
            pulse_duty: (0.0, 0.0),
        }
    }

    /// Total samples the hardware is ordered to capture.
    pub fn requested_samples(&self) -> u32 {
        self.samples_per_echo * self.echoes_per_scan
    }

    /// Upper estimate of the programmed sequence duration, for the
    /// run-flag poll budget.
    pub fn expected_duration(&self) -> Duration {
        Duration::from_secs_f64(
            self.timing.scan_duration_us(self.echoes_per_scan) * 1e-6,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_policies() {
        let cpmg =
            Scan::cpmg(4.0, 5.0, 10.0, (0.5, 0.5), 200.0, 0, 32, 16, 0.0);
        assert!(cpmg.average);
        assert!(!cpmg.fixed_receiver_phase);
        assert_eq!(cpmg.requested_samples(), 512);

        let fid = Scan::fid(4.0, 10.0, 0.5, 0, 128);
        assert_eq!(fid.echoes_per_scan, 1);
        assert!(!fid.average);
        assert!(fid.fixed_receiver_phase);

        let noise = Scan::noise(4.0, 0, 128);
        assert_eq!(noise.timing.pulse2, 0);
        assert_eq!(noise.requested_samples(), 128);
    }

    #[test]
    fn duration_covers_all_echoes() {
        let scan =
            Scan::cpmg(4.0, 5.0, 10.0, (0.5, 0.5), 100.0, 0, 32, 50, 0.0);
        // 50 echoes at 100 us spacing, plus the excitation segment.
        let d = scan.expected_duration();
        assert!(d >= Duration::from_micros(5000), "{d:?}");
        assert!(d < Duration::from_micros(5200), "{d:?}");
    }
}
