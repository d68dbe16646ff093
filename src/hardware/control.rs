//! The shared control/status register pair.
//!
//! `ctrl_out` is a write-only PIO: the hardware has no readable copy of the
//! individual bits, so the last-written image lives here as a shadow owned
//! by [`ControlPort`]. Every bit flip and pulse in the program goes through
//! this one object — there is no other writer.

use std::time::Duration;

use super::delay::{poll_until, settle, HardwareTimeout};
use super::design_parameters::{CTRL_PULSE_SETTLE, DAC_LINE_SETTLE, PLL_LOCK_TIMEOUT};
use super::mmio::Mmio;
use super::pll::PllInstance;
use super::regmap::{CtrlIn, CtrlOut};

pub struct ControlPort<'a> {
    reg: Mmio<'a>,
    shadow: CtrlOut,
}

impl<'a> ControlPort<'a> {
    /// Wrap the control PIO. The hardware register is left untouched until
    /// [`Self::write_defaults`] or the first update.
    pub fn new(reg: Mmio<'a>) -> Self {
        Self {
            reg,
            shadow: CtrlOut::default(),
        }
    }

    pub fn shadow(&self) -> CtrlOut {
        self.shadow
    }

    /// Program the power-on control word.
    pub fn write_defaults(&mut self) {
        self.shadow = CtrlOut::default();
        self.flush();
    }

    fn flush(&self) {
        self.reg.write(0, self.shadow.raw_value());
    }

    fn update(&mut self, f: impl FnOnce(CtrlOut) -> CtrlOut) {
        self.shadow = f(self.shadow);
        self.flush();
    }

    /// Raise then drop a bit, settling after each edge. Safe to repeat: the
    /// shadow ends where it started.
    fn pulse(
        &mut self,
        set: impl Fn(CtrlOut, bool) -> CtrlOut,
        settle_for: Duration,
    ) {
        self.update(|c| set(c, true));
        settle(settle_for);
        self.update(|c| set(c, false));
        settle(settle_for);
    }

    /// Empty the capture FIFO. Idempotent.
    pub fn pulse_fifo_reset(&mut self) {
        self.pulse(|c, v| c.with_fifo_reset(v), CTRL_PULSE_SETTLE);
    }

    /// Reset the acquisition-window token in the pulser. Works around the
    /// token lockup when the ADC clock appears after the window rises.
    pub fn pulse_pulser_reset(&mut self) {
        self.pulse(|c, v| c.with_pulser_reset(v), CTRL_PULSE_SETTLE);
    }

    /// Kick the hardware sequencer. The start strobe is edge sensitive; no
    /// settle between the two writes.
    pub fn pulse_fsm_start(&mut self) {
        self.update(|c| c.with_fsm_start(true));
        self.update(|c| c.with_fsm_start(false));
    }

    /// Apply pending reconfiguration to a PLL by pulsing its reset.
    pub fn pulse_pll_reset(&mut self, pll: PllInstance) {
        match pll {
            PllInstance::System => {
                self.pulse(|c, v| c.with_sys_pll_reset(v), CTRL_PULSE_SETTLE)
            }
            PllInstance::Transmit => {
                self.pulse(|c, v| c.with_tx_pll_reset(v), CTRL_PULSE_SETTLE)
            }
        }
    }

    /// Flip the receiver reference phase. Returns the new state.
    pub fn toggle_phase_cycle(&mut self) -> bool {
        let next = !self.shadow.phase_cycle();
        self.update(|c| c.with_phase_cycle(next));
        settle(CTRL_PULSE_SETTLE);
        next
    }

    pub fn set_phase_cycle(&mut self, enabled: bool) {
        self.update(|c| c.with_phase_cycle(enabled));
        settle(CTRL_PULSE_SETTLE);
    }

    /// Select the gated RF transmit path for the sequencer clock.
    pub fn set_rf_clock_gate(&mut self, enabled: bool) {
        self.update(|c| c.with_rf_clock_gate(enabled));
    }

    /// Drive the DAC LDAC line (active low).
    pub fn set_dac_ldac(&mut self, level: bool) {
        self.update(|c| c.with_dac_ldac_n(level));
        settle(DAC_LINE_SETTLE);
    }

    /// Drive the DAC CLR line (active low).
    pub fn set_dac_clr(&mut self, level: bool) {
        self.update(|c| c.with_dac_clr_n(level));
        settle(DAC_LINE_SETTLE);
    }
}

pub struct StatusPort<'a> {
    reg: Mmio<'a>,
}

impl<'a> StatusPort<'a> {
    pub fn new(reg: Mmio<'a>) -> Self {
        Self { reg }
    }

    pub fn read(&self) -> CtrlIn {
        CtrlIn::new_with_raw_value(self.reg.read(0))
    }

    pub fn pll_locked(&self, pll: PllInstance) -> bool {
        let status = self.read();
        match pll {
            PllInstance::System => status.sys_pll_locked(),
            PllInstance::Transmit => status.tx_pll_locked(),
        }
    }

    /// Block until the PLL reports lock. The transition is hardware driven;
    /// the poll is bounded so a dead oscillator cannot hang the process.
    pub fn wait_pll_lock(&self, pll: PllInstance) -> Result<(), HardwareTimeout> {
        poll_until("PLL lock", PLL_LOCK_TIMEOUT, || self.pll_locked(pll))
    }

    pub fn sequence_running(&self) -> bool {
        self.read().sequence_running()
    }

    /// Block until the hardware sequencer finishes the programmed pulse
    /// train. `budget` scales with the sequence length; see the sequencer.
    pub fn wait_sequence_done(
        &self,
        budget: Duration,
    ) -> Result<(), HardwareTimeout> {
        poll_until("sequence completion", budget, || !self.sequence_running())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulses_restore_the_shadow() {
        let mut mem = [0u32; 4];
        let mut ctrl = ControlPort::new(Mmio::over(&mut mem));
        ctrl.write_defaults();
        let before = ctrl.shadow().raw_value();
        ctrl.pulse_fifo_reset();
        ctrl.pulse_fifo_reset();
        assert_eq!(ctrl.shadow().raw_value(), before);
        assert!(!ctrl.shadow().fifo_reset());
    }

    #[test]
    fn phase_cycle_toggles() {
        let mut mem = [0u32; 4];
        let mut ctrl = ControlPort::new(Mmio::over(&mut mem));
        ctrl.write_defaults();
        assert!(ctrl.toggle_phase_cycle());
        assert!(!ctrl.toggle_phase_cycle());
        ctrl.set_phase_cycle(false);
        assert!(!ctrl.shadow().phase_cycle());
    }

    #[test]
    fn register_image_follows_shadow() {
        let mut mem = [0u32; 4];
        let mut ctrl = ControlPort::new(Mmio::over(&mut mem));
        ctrl.write_defaults();
        ctrl.set_dac_ldac(false);
        assert_eq!(mem[0] & (1 << 7), 0);
    }
}
