//! Avalon I2C master core.
//!
//! The fabric exposes two of these cores: one for the external front-panel
//! expanders (relay banks, receiver gain) and one for the internal
//! power/signal-path expander. The core is software paced: each byte of a
//! transaction is queued into the TFR_CMD register with optional START/STOP
//! framing, and error conditions land in sticky interrupt-status bits that
//! stay set until written back.
//!
//! Failures here are warnings, not errors: the devices on these buses are
//! calibration and gain controls, never in the sample path, so a NACK is
//! logged and the transaction is not retried.

use std::fmt;

use bitbybit::bitfield;

use super::delay::{poll_until, HardwareTimeout};
use super::design_parameters::{
    I2C_SCL_HIGH_TICKS, I2C_SCL_LOW_TICKS, I2C_SDA_HOLD_TICKS,
    I2C_TRANSFER_TIMEOUT,
};
use super::mmio::Mmio;

const TFR_CMD: usize = 0x00;
const CTRL: usize = 0x08;
const ISR: usize = 0x10;
const TFR_CMD_FIFO_LVL: usize = 0x18;
const SCL_LOW: usize = 0x20;
const SCL_HIGH: usize = 0x24;
const SDA_HOLD: usize = 0x28;

/// One entry of the command queue: a data byte plus bus framing.
#[bitfield(u32, default = 0)]
#[derive(Debug, PartialEq)]
pub struct TfrCmd {
    #[bits(0..=7, rw)]
    data: u8,
    #[bit(8, rw)]
    stop: bool,
    #[bit(9, rw)]
    start: bool,
}

/// Sticky status bits. The error bits clear on write-back.
#[bitfield(u32, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Isr {
    #[bit(0, r)]
    tx_ready: bool,
    #[bit(1, r)]
    rx_ready: bool,
    #[bit(2, rw)]
    nack_det: bool,
    #[bit(3, rw)]
    arblost_det: bool,
    #[bit(4, rw)]
    rx_over: bool,
}

/// Drop the R/W bit of a nominal 8-bit device address: the core owns bus
/// direction, software addresses are 7 bits.
pub const fn seven_bit_address(nominal: u8) -> u8 {
    nominal >> 1
}

/// Error conditions found set (and cleared) after a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErrorFlags {
    pub rx_over: bool,
    pub arb_lost: bool,
    pub nack: bool,
}

impl ErrorFlags {
    pub fn any(&self) -> bool {
        self.rx_over || self.arb_lost || self.nack
    }
}

impl fmt::Display for ErrorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for (set, name) in [
            (self.rx_over, "receive-overrun"),
            (self.arb_lost, "arbitration-lost"),
            (self.nack, "NACK"),
        ] {
            if set {
                write!(f, "{sep}{name}")?;
                sep = "+";
            }
        }
        Ok(())
    }
}

pub struct AvalonI2c<'a> {
    regs: Mmio<'a>,
    name: &'static str,
}

impl<'a> AvalonI2c<'a> {
    pub fn new(regs: Mmio<'a>, name: &'static str) -> Self {
        Self { regs, name }
    }

    /// Program ~100 kHz SCL timing off the 50 MHz reference and enable the
    /// core. Must run before any transaction.
    pub fn configure(&self) {
        self.regs.write(CTRL, 0);
        self.regs.write(SCL_LOW, I2C_SCL_LOW_TICKS);
        self.regs.write(SCL_HIGH, I2C_SCL_HIGH_TICKS);
        self.regs.write(SDA_HOLD, I2C_SDA_HOLD_TICKS);
        self.regs.write(CTRL, 1);
        log::debug!("{}: core enabled at ~100 kHz", self.name);
    }

    /// Read the sticky error bits, clear the ones that were set and return
    /// them for logging. Never fatal.
    pub fn check_and_clear_errors(&self) -> ErrorFlags {
        let isr = Isr::new_with_raw_value(self.regs.read(ISR));
        let flags = ErrorFlags {
            rx_over: isr.rx_over(),
            arb_lost: isr.arblost_det(),
            nack: isr.nack_det(),
        };
        if flags.any() {
            // Write-one-to-clear, only the bits found set.
            self.regs.write(
                ISR,
                Isr::default()
                    .with_nack_det(flags.nack)
                    .with_arblost_det(flags.arb_lost)
                    .with_rx_over(flags.rx_over)
                    .raw_value(),
            );
        }
        flags
    }

    /// One START/STOP-framed write transaction: address byte, then `bytes`.
    /// Returns the error flags observed afterwards; a NACK from an absent
    /// device is the caller's to log, not an `Err`.
    pub fn write_framed(
        &self,
        address7: u8,
        bytes: &[u8],
    ) -> Result<ErrorFlags, HardwareTimeout> {
        // Stale flags would be indistinguishable from this transaction's.
        let stale = self.check_and_clear_errors();
        if stale.any() {
            log::warn!("{}: stale error flags cleared: {stale}", self.name);
        }

        self.regs.write(
            TFR_CMD,
            TfrCmd::default()
                .with_start(true)
                .with_data(address7 << 1)
                .raw_value(),
        );
        let (last, body) = bytes.split_last().expect("empty transaction");
        for &byte in body {
            self.regs
                .write(TFR_CMD, TfrCmd::default().with_data(byte).raw_value());
        }
        self.regs.write(
            TFR_CMD,
            TfrCmd::default()
                .with_stop(true)
                .with_data(*last)
                .raw_value(),
        );

        poll_until("I2C command queue drain", I2C_TRANSFER_TIMEOUT, || {
            self.regs.read(TFR_CMD_FIFO_LVL) == 0
        })?;

        let flags = self.check_and_clear_errors();
        if flags.any() {
            log::warn!(
                "{}: transaction to {address7:#04x} flagged {flags}",
                self.name
            );
        }
        Ok(flags)
    }
}

impl tca9555::Bus for AvalonI2c<'_> {
    type Error = HardwareTimeout;

    fn write_register(
        &mut self,
        address: u8,
        register: u8,
        value: u8,
    ) -> Result<(), HardwareTimeout> {
        self.write_framed(address, &[register, value]).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_drops_direction_bit() {
        assert_eq!(seven_bit_address(0x40), 0x20);
        assert_eq!(seven_bit_address(0x41), 0x20);
        assert_eq!(seven_bit_address(0xfe), 0x7f);
    }

    #[test]
    fn command_framing() {
        let start = TfrCmd::default().with_start(true).with_data(0x20 << 1);
        assert_eq!(start.raw_value(), 0x240);
        let stop = TfrCmd::default().with_stop(true).with_data(0xa5);
        assert_eq!(stop.raw_value(), 0x1a5);
    }

    #[test]
    fn flags_from_isr() {
        let isr = Isr::new_with_raw_value(0b10100);
        assert!(isr.rx_over());
        assert!(!isr.arblost_det());
        assert!(isr.nack_det());
    }

    #[test]
    fn flags_display() {
        let flags = ErrorFlags {
            rx_over: false,
            arb_lost: true,
            nack: true,
        };
        assert_eq!(flags.to_string(), "arbitration-lost+NACK");
        assert!(!ErrorFlags::default().any());
    }
}
