#![no_std]

use arbitrary_int::{u24, u3};
use bitbybit::{bitenum, bitfield};
use num_traits::float::FloatCore;

/// Target register group of a shift-register word.
#[bitenum(u3)]
#[derive(PartialEq, Debug)]
pub enum Reg {
    Dac = 0b000,
    Range = 0b001,
    Power = 0b010,
    Control = 0b011,
}

/// DAC/range address field. `Both` addresses the two converters at once.
#[bitenum(u3)]
#[derive(PartialEq, Debug)]
pub enum Channel {
    A = 0b000,
    B = 0b010,
    Both = 0b100,
}

/// Control-register function select (shares the address field).
#[bitenum(u3)]
#[derive(PartialEq, Debug)]
pub enum Function {
    Nop = 0b000,
    Settings = 0b001,
    Clear = 0b100,
    Load = 0b101,
}

/// One 24-bit frame of the DAC shift register.
#[bitfield(u24, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Frame {
    #[bits(0..=15, rw)]
    data: u16,
    #[bits(16..=18, rw)]
    addr: u3,
    #[bits(19..=21, rw)]
    reg: Option<Reg>,
    #[bit(23, rw)]
    read: bool,
}

#[bitfield(u16, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Power {
    #[bit(0, rw)]
    pu_a: bool,
    #[bit(2, rw)]
    pu_b: bool,
    #[bit(4, rw)]
    pu_ref: bool,
    #[bit(5, r)]
    tsd_alert: bool,
    #[bit(7, r)]
    oc_a: bool,
    #[bit(9, r)]
    oc_b: bool,
}

#[bitenum(u3)]
#[derive(PartialEq, Debug)]
pub enum Range {
    Unipolar5V = 0b000,
    Unipolar10V = 0b001,
    Unipolar10V8 = 0b010,
    Bipolar5V = 0b011,
    Bipolar10V = 0b100,
    Bipolar10V8 = 0b101,
}

#[bitfield(u16, default = 0)]
#[derive(Debug, PartialEq)]
pub struct Settings {
    #[bit(0, rw)]
    sdo_disable: bool,
    #[bit(1, rw)]
    clr_select: bool,
    #[bit(2, rw)]
    clamp_enable: bool,
    #[bit(3, rw)]
    tsd_enable: bool,
}

/// Transport to the converter: a half-duplex SPI-style link plus the two
/// dedicated control lines. `ldac` and `clr` are both active low; the
/// implementation owns whatever settle time the lines need between edges.
pub trait Interface {
    type Error;

    /// Ship one 24-bit frame and wait for the transfer to complete.
    fn write(&mut self, frame: u24) -> Result<(), Self::Error>;

    /// Ship a readback frame, wait for the response word and return it.
    fn read(&mut self, frame: u24) -> Result<u24, Self::Error>;

    /// Drive the LDAC line.
    fn ldac(&mut self, level: bool) -> Result<(), Self::Error>;

    /// Drive the CLR line.
    fn clr(&mut self, level: bool) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum Error<E> {
    #[error("interface")]
    Interface(E),
    #[error("readback mismatch: wrote {wrote:#06x}, read {read:#06x}")]
    Readback { wrote: u16, read: u16 },
}

/// Full-scale span of the ±5 V range, volts.
const BIPOLAR_5V_SPAN: f32 = 5.0;

/// Convert a voltage on the ±5 V range to the 12-bit twos-complement code.
/// Out-of-range requests clamp to the nearest representable code.
pub fn voltage_to_code(volts: f32) -> i16 {
    let code = (volts / BIPOLAR_5V_SPAN * 2048.0).round() as i32;
    code.clamp(-2048, 2047) as i16
}

#[derive(Clone, Debug)]
pub struct Ad5722r<I> {
    interface: I,
}

impl<I: Interface> Ad5722r<I> {
    pub fn new(interface: I) -> Self {
        Self { interface }
    }

    pub fn interface_mut(&mut self) -> &mut I {
        &mut self.interface
    }

    fn write_frame(
        &mut self,
        reg: Reg,
        addr: u3,
        data: u16,
    ) -> Result<(), Error<I::Error>> {
        self.interface
            .write(
                Frame::builder()
                    .with_data(data)
                    .with_addr(addr)
                    .with_reg(reg)
                    .with_read(false)
                    .build()
                    .raw_value(),
            )
            .map_err(Error::Interface)
    }

    fn read_frame(
        &mut self,
        reg: Reg,
        addr: u3,
    ) -> Result<u16, Error<I::Error>> {
        // A readback is two frames: the addressed request, then a NOP to
        // clock the response out of the shift register.
        self.interface
            .write(
                Frame::builder()
                    .with_data(0)
                    .with_addr(addr)
                    .with_reg(reg)
                    .with_read(true)
                    .build()
                    .raw_value(),
            )
            .map_err(Error::Interface)?;
        let response = self
            .interface
            .read(
                Frame::builder()
                    .with_data(0)
                    .with_addr(u3::new(Function::Nop as u8))
                    .with_reg(Reg::Control)
                    .with_read(false)
                    .build()
                    .raw_value(),
            )
            .map_err(Error::Interface)?;
        Ok(Frame::new_with_raw_value(response).data())
    }

    /// Bring the converter up: both channels and the internal reference
    /// powered, ±5 V range on both outputs, thermal shutdown and the output
    /// current clamp enabled. Finishes by pulsing CLR to zero the outputs.
    pub fn power_up(&mut self) -> Result<(), Error<I::Error>> {
        self.write_frame(
            Reg::Power,
            u3::new(0),
            Power::default()
                .with_pu_a(true)
                .with_pu_b(true)
                .with_pu_ref(true)
                .raw_value(),
        )?;
        self.write_frame(
            Reg::Range,
            u3::new(Channel::Both as u8),
            Range::Bipolar5V as u16,
        )?;
        self.write_frame(
            Reg::Control,
            u3::new(Function::Settings as u8),
            Settings::default()
                .with_clamp_enable(true)
                .with_tsd_enable(true)
                .raw_value(),
        )?;
        self.interface.clr(false).map_err(Error::Interface)?;
        self.interface.clr(true).map_err(Error::Interface)?;
        log::info!("AD5722R powered up, outputs cleared");
        Ok(())
    }

    /// Write a 12-bit twos-complement code to one channel and commit it to
    /// the analog output with an LDAC pulse.
    ///
    /// With `verify` the DAC register is read back and compared; leave it
    /// off when SDO is not wired up.
    pub fn write_channel(
        &mut self,
        channel: Channel,
        code: i16,
        verify: bool,
    ) -> Result<(), Error<I::Error>> {
        let addr = u3::new(channel as u8);
        let data = ((code as u16) & 0x0fff) << 4;
        self.write_frame(Reg::Dac, addr, data)?;
        if verify {
            let read = self.read_frame(Reg::Dac, addr)?;
            if read != data {
                return Err(Error::Readback { wrote: data, read });
            }
        } else {
            // Clock the response frame out anyway to keep the half-duplex
            // link in lockstep, then discard it.
            let _ = self.read_frame(Reg::Dac, addr)?;
        }
        self.interface.ldac(false).map_err(Error::Interface)?;
        self.interface.ldac(true).map_err(Error::Interface)?;
        Ok(())
    }

    /// Program a voltage on the ±5 V range. Clamps, never rejects.
    pub fn set_voltage(
        &mut self,
        channel: Channel,
        volts: f32,
    ) -> Result<(), Error<I::Error>> {
        let code = voltage_to_code(volts);
        log::debug!("DAC {channel:?}: {volts:.3} V -> code {code}");
        self.write_channel(channel, code, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_endpoints() {
        assert_eq!(voltage_to_code(0.0), 0);
        assert_eq!(voltage_to_code(5.0), 2047);
        assert_eq!(voltage_to_code(-5.0), -2048);
        assert_eq!(voltage_to_code(100.0), 2047);
        assert_eq!(voltage_to_code(-100.0), -2048);
    }

    #[test]
    fn code_midscale() {
        assert_eq!(voltage_to_code(2.5), 1024);
        assert_eq!(voltage_to_code(-2.5), -1024);
    }

    #[test]
    fn frame_layout() {
        let f = Frame::builder()
            .with_data(0x0800 << 4)
            .with_addr(u3::new(Channel::B as u8))
            .with_reg(Reg::Dac)
            .with_read(false)
            .build();
        assert_eq!(f.raw_value().value(), 0x02_8000);
        let f = Frame::builder()
            .with_data(0)
            .with_addr(u3::new(0))
            .with_reg(Reg::Power)
            .with_read(true)
            .build();
        assert_eq!(f.raw_value().value(), 0x90_0000);
    }

    #[test]
    fn negative_code_is_left_justified() {
        // -1 in 12-bit twos complement, shifted into bits 15..4.
        let data = ((-1i16 as u16) & 0x0fff) << 4;
        assert_eq!(data, 0xfff0);
    }
}
