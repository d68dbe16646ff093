//! Hardware abstraction for the acquisition fabric.
//!
//! [`NmrSystem`] owns one driver per peripheral, all viewing a single
//! mapped [`mmio::RegisterWindow`]. The window outlives the system struct
//! by construction; there is exactly one of each for the process lifetime,
//! and exactly one acquisition in flight at any time.

pub mod afe;
pub mod control;
pub mod dac;
pub mod delay;
pub mod design_parameters;
pub mod fifo;
pub mod i2c;
pub mod mmio;
pub mod pll;
pub mod regmap;
pub mod spi;

use std::io;

use afe::{EnableLines, MatchingNetwork, RxGain};
use control::{ControlPort, StatusPort};
use dac::{DacBus, PreampDac};
use delay::HardwareTimeout;
use fifo::CaptureFifo;
use i2c::AvalonI2c;
use mmio::{DevMem, Mmio, RegisterWindow};
use pll::PllReconfig;
use spi::AvalonSpi;

use ad5722r::Ad5722r;

/// Map the bridge window carrying every peripheral in [`regmap`].
pub fn map_window(mem: &DevMem) -> io::Result<RegisterWindow> {
    RegisterWindow::map(mem, regmap::LW_BRIDGE_BASE, regmap::LW_BRIDGE_SPAN)
}

/// The pulse-train parameter registers, one PIO each. Values are tick
/// counts in the clock domains described in [`crate::sequence::timing`].
pub struct ParameterBank<'a> {
    pulse1: Mmio<'a>,
    delay1: Mmio<'a>,
    pulse2: Mmio<'a>,
    delay2: Mmio<'a>,
    init_adc_delay: Mmio<'a>,
    echoes_per_scan: Mmio<'a>,
    samples_per_echo: Mmio<'a>,
    t1_pulse: Mmio<'a>,
    t1_delay: Mmio<'a>,
}

impl ParameterBank<'_> {
    /// Program one scan's pulse/delay/count registers.
    pub fn program(
        &self,
        timing: &crate::sequence::timing::CpmgTiming,
        echoes_per_scan: u32,
        samples_per_echo: u32,
    ) {
        self.pulse1.write(0, timing.pulse1);
        self.delay1.write(0, timing.delay1);
        self.pulse2.write(0, timing.pulse2);
        self.delay2.write(0, timing.delay2);
        self.init_adc_delay.write(0, timing.init_adc_delay);
        self.echoes_per_scan.write(0, echoes_per_scan);
        self.samples_per_echo.write(0, samples_per_echo);
    }

    /// Program the inversion-recovery preparation pulse/delay. Zeros
    /// disable the preparation segment.
    pub fn set_t1(&self, pulse_ticks: u32, delay_ticks: u32) {
        self.t1_pulse.write(0, pulse_ticks);
        self.t1_delay.write(0, delay_ticks);
    }
}

pub struct NmrSystem<'a> {
    pub ctrl: ControlPort<'a>,
    pub status: StatusPort<'a>,
    pub parameters: ParameterBank<'a>,
    pub sys_pll: PllReconfig<'a>,
    pub fifo: CaptureFifo<'a>,
    pub i2c_ext: AvalonI2c<'a>,
    pub i2c_int: AvalonI2c<'a>,
    pub spi: AvalonSpi<'a>,
    pub matching: MatchingNetwork,
    pub rx_gain: RxGain,
    pub enables: EnableLines,
}

impl<'a> NmrSystem<'a> {
    /// Carve the peripheral views out of the mapped window and wrap each in
    /// its driver. Nothing is written to the hardware yet.
    pub fn new(window: &'a RegisterWindow) -> Self {
        let view =
            |(offset, span): (usize, usize)| -> Mmio<'a> { window.view(offset, span) };
        Self {
            ctrl: ControlPort::new(view(regmap::CTRL_OUT)),
            status: StatusPort::new(view(regmap::CTRL_IN)),
            parameters: ParameterBank {
                pulse1: view(regmap::PULSE_90DEG),
                delay1: view(regmap::DELAY_NOSIG),
                pulse2: view(regmap::PULSE_180DEG),
                delay2: view(regmap::DELAY_SIG),
                init_adc_delay: view(regmap::INIT_ADC_DELAY),
                echoes_per_scan: view(regmap::ECHOES_PER_SCAN),
                samples_per_echo: view(regmap::SAMPLES_PER_ECHO),
                t1_pulse: view(regmap::PULSE_T1),
                t1_delay: view(regmap::DELAY_T1),
            },
            sys_pll: PllReconfig::new(view(regmap::SYS_PLL_RECONFIG), "sys-pll"),
            fifo: CaptureFifo::new(
                view(regmap::ADC_FIFO_DATA),
                view(regmap::ADC_FIFO_CSR),
            ),
            i2c_ext: AvalonI2c::new(view(regmap::I2C_EXT), "i2c-ext"),
            i2c_int: AvalonI2c::new(view(regmap::I2C_INT), "i2c-int"),
            spi: AvalonSpi::new(view(regmap::DAC_PREAMP_SPI)),
            matching: MatchingNetwork::default(),
            rx_gain: RxGain::default(),
            enables: EnableLines::default(),
        }
    }

    /// Program the power-on system state: default control word, polling
    /// mode on the reconfiguration core, both I2C cores timed and enabled,
    /// and a pulser token reset so the first acquisition window cannot
    /// start with a stale token.
    pub fn init_defaults(&mut self) -> Result<(), HardwareTimeout> {
        self.ctrl.write_defaults();
        self.sys_pll.set_polling_mode();
        self.i2c_ext.configure();
        self.i2c_int.configure();
        self.ctrl.set_rf_clock_gate(true);
        self.ctrl.pulse_pulser_reset();
        log::info!("system defaults programmed");
        Ok(())
    }

    /// The preamp-tuning DAC, borrowing the SPI core and the control lines
    /// for the duration of the calibration call.
    pub fn preamp_dac(&mut self) -> PreampDac<'_, 'a> {
        Ad5722r::new(DacBus::new(&self.spi, &mut self.ctrl))
    }
}
