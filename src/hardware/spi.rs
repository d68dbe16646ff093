//! Avalon SPI core driving the preamp-tuning DAC.
//!
//! Strictly half-duplex request/response: a frame is shifted out, the
//! transmitter-empty bit confirms completion, and whatever the slave clocked
//! back sits in RXDATA behind the receive-ready bit.

use bitbybit::bitfield;

use super::delay::{poll_until, HardwareTimeout};
use super::design_parameters::SPI_TRANSFER_TIMEOUT;
use super::mmio::Mmio;

const RXDATA: usize = 0x00;
const TXDATA: usize = 0x04;
const STATUS: usize = 0x08;
const SLAVE_SEL: usize = 0x14;

#[bitfield(u32, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Status {
    #[bit(3, r)]
    roe: bool,
    #[bit(4, r)]
    toe: bool,
    #[bit(5, r)]
    tmt: bool,
    #[bit(6, r)]
    trdy: bool,
    #[bit(7, r)]
    rrdy: bool,
}

pub struct AvalonSpi<'a> {
    regs: Mmio<'a>,
}

impl<'a> AvalonSpi<'a> {
    pub fn new(regs: Mmio<'a>) -> Self {
        let spi = Self { regs };
        spi.regs.write(SLAVE_SEL, 1);
        spi
    }

    fn status(&self) -> Status {
        Status::new_with_raw_value(self.regs.read(STATUS))
    }

    /// Shift one frame out and wait for the transfer to complete.
    pub fn write_word(&self, word: u32) -> Result<(), HardwareTimeout> {
        self.regs.write(TXDATA, word);
        poll_until("SPI transfer complete", SPI_TRANSFER_TIMEOUT, || {
            self.status().tmt()
        })
    }

    /// Wait for the response of the previous frame and return it.
    pub fn read_word(&self) -> Result<u32, HardwareTimeout> {
        poll_until("SPI receive ready", SPI_TRANSFER_TIMEOUT, || {
            self.status().rrdy()
        })?;
        Ok(self.regs.read(RXDATA))
    }

    /// Drop a response nobody wants, keeping the receive register clear.
    pub fn discard_response(&self) {
        if self.status().rrdy() {
            let _ = self.regs.read(RXDATA);
        }
    }
}
