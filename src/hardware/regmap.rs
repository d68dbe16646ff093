//! Register address map of the acquisition fabric.
//!
//! Generated from the hardware build and fixed for the lifetime of the
//! programmable-logic image. A mismatch between this table and the bitstream
//! is undefined behavior, not a recoverable error — the offsets below are
//! the software half of that contract.

use bitbybit::bitfield;

/// Physical base of the lightweight HPS-to-FPGA bridge.
pub const LW_BRIDGE_BASE: usize = 0xff20_0000;
/// Mapped span covering every peripheral in the table below.
pub const LW_BRIDGE_SPAN: usize = 0x0000_1000;

/// (byte offset, byte span) of each peripheral in the bridge window.
pub const ADC_FIFO_DATA: (usize, usize) = (0x000, 8);
pub const SAMPLES_PER_ECHO: (usize, usize) = (0x010, 16);
pub const DAC_PREAMP_SPI: (usize, usize) = (0x020, 32);
pub const I2C_EXT: (usize, usize) = (0x040, 64);
pub const SYS_PLL_RECONFIG: (usize, usize) = (0x200, 256);
pub const I2C_INT: (usize, usize) = (0x300, 64);
pub const ADC_FIFO_CSR: (usize, usize) = (0x340, 32);
pub const RX_DELAY: (usize, usize) = (0x380, 16);
pub const CTRL_IN: (usize, usize) = (0x3a0, 16);
pub const CTRL_OUT: (usize, usize) = (0x3b0, 16);
pub const PULSE_T1: (usize, usize) = (0x3c0, 16);
pub const PULSE_90DEG: (usize, usize) = (0x3d0, 16);
pub const PULSE_180DEG: (usize, usize) = (0x3e0, 16);
pub const INIT_ADC_DELAY: (usize, usize) = (0x3f0, 16);
pub const ECHOES_PER_SCAN: (usize, usize) = (0x400, 16);
pub const DELAY_T1: (usize, usize) = (0x410, 16);
pub const DELAY_SIG: (usize, usize) = (0x420, 16);
pub const DELAY_NOSIG: (usize, usize) = (0x430, 16);

/// Depth of the capture FIFO in 32-bit words (two samples per word).
pub const ADC_FIFO_DEPTH_WORDS: usize = 1024;

/// The output control word. Latch and clear lines of the DAC are active
/// low; the RF clock gate selects the gated transmit path when set.
#[bitfield(u32, default = 0x1a0)]
#[derive(Debug, PartialEq)]
pub struct CtrlOut {
    #[bit(0, rw)]
    fsm_start: bool,
    #[bit(1, rw)]
    phase_cycle: bool,
    #[bit(2, rw)]
    fifo_reset: bool,
    #[bit(3, rw)]
    sys_pll_reset: bool,
    #[bit(4, rw)]
    tx_pll_reset: bool,
    #[bit(5, rw)]
    rf_clock_gate: bool,
    #[bit(6, rw)]
    pulser_reset: bool,
    #[bit(7, rw)]
    dac_ldac_n: bool,
    #[bit(8, rw)]
    dac_clr_n: bool,
}

/// The status input word.
#[bitfield(u32)]
#[derive(Debug, PartialEq)]
pub struct CtrlIn {
    #[bit(0, r)]
    sequence_running: bool,
    #[bit(1, r)]
    sys_pll_locked: bool,
    #[bit(2, r)]
    tx_pll_locked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_control_word() {
        // Resets deasserted, DAC latch/clear lines idle high, RF gate on.
        let ctrl = CtrlOut::default();
        assert!(ctrl.dac_ldac_n());
        assert!(ctrl.dac_clr_n());
        assert!(ctrl.rf_clock_gate());
        assert!(!ctrl.fsm_start());
        assert!(!ctrl.fifo_reset());
        assert_eq!(ctrl.raw_value(), 0x1a0);
    }

    #[test]
    fn views_fit_the_window() {
        for (offset, span) in [
            ADC_FIFO_DATA,
            SAMPLES_PER_ECHO,
            DAC_PREAMP_SPI,
            I2C_EXT,
            SYS_PLL_RECONFIG,
            I2C_INT,
            ADC_FIFO_CSR,
            RX_DELAY,
            CTRL_IN,
            CTRL_OUT,
            PULSE_T1,
            PULSE_90DEG,
            PULSE_180DEG,
            INIT_ADC_DELAY,
            ECHOES_PER_SCAN,
            DELAY_T1,
            DELAY_SIG,
            DELAY_NOSIG,
        ] {
            assert!(offset + span <= LW_BRIDGE_SPAN);
        }
    }
}
