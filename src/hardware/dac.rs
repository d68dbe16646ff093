//! Preamp tuning DAC: an AD5722R behind the Avalon SPI core.
//!
//! Channel A biases the transmit coil (`vbias`), channel B tunes the
//! varactor of the receive preamp (`vvarac`). The converter's LDAC and CLR
//! lines are not SPI signals on this board — they are bits in the shared
//! control register, so the interface borrows the control port alongside
//! the SPI core.

use ad5722r::{Ad5722r, Channel, Error, Interface};
use arbitrary_int::u24;

use super::control::ControlPort;
use super::delay::HardwareTimeout;
use super::spi::AvalonSpi;

/// Board-default transmit coil bias, volts.
pub const VBIAS_DEFAULT: f32 = -3.35;
/// Board-default varactor tuning voltage, volts.
pub const VVARAC_DEFAULT: f32 = -1.2;

pub struct DacBus<'p, 'a> {
    spi: &'p AvalonSpi<'a>,
    ctrl: &'p mut ControlPort<'a>,
}

impl<'p, 'a> DacBus<'p, 'a> {
    pub fn new(spi: &'p AvalonSpi<'a>, ctrl: &'p mut ControlPort<'a>) -> Self {
        Self { spi, ctrl }
    }
}

impl Interface for DacBus<'_, '_> {
    type Error = HardwareTimeout;

    fn write(&mut self, frame: u24) -> Result<(), HardwareTimeout> {
        self.spi.write_word(frame.value())?;
        self.spi.discard_response();
        Ok(())
    }

    fn read(&mut self, frame: u24) -> Result<u24, HardwareTimeout> {
        self.spi.write_word(frame.value())?;
        let word = self.spi.read_word()?;
        Ok(u24::new(word & 0x00ff_ffff))
    }

    fn ldac(&mut self, level: bool) -> Result<(), HardwareTimeout> {
        self.ctrl.set_dac_ldac(level);
        Ok(())
    }

    fn clr(&mut self, level: bool) -> Result<(), HardwareTimeout> {
        self.ctrl.set_dac_clr(level);
        Ok(())
    }
}

pub type PreampDac<'p, 'a> = Ad5722r<DacBus<'p, 'a>>;

pub fn write_vbias(
    dac: &mut PreampDac<'_, '_>,
    volts: f32,
) -> Result<(), Error<HardwareTimeout>> {
    dac.set_voltage(Channel::A, volts)
}

pub fn write_vvarac(
    dac: &mut PreampDac<'_, '_>,
    volts: f32,
) -> Result<(), Error<HardwareTimeout>> {
    dac.set_voltage(Channel::B, volts)
}
