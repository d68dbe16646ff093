//! One-shot system bring-up: program the power-on defaults and,
//! optionally, the front-end calibration state (power rails, matching
//! network, receiver gain, preamp tuning voltages).

use anyhow::Context;
use clap::Parser;

use relaxometer::hardware::afe::{
    AMP_HP_LT1210_EN, PAMP_IN_SEL_RX, PSU_15V_TX_N_EN, PSU_15V_TX_P_EN,
    PSU_5V_ADC_EN, PSU_5V_ANA_N_EN, PSU_5V_ANA_P_EN, PSU_5V_TX_N_EN,
    RX_IN_SEL_1,
};
use relaxometer::hardware::dac::{
    write_vbias, write_vvarac, VBIAS_DEFAULT, VVARAC_DEFAULT,
};
use relaxometer::hardware::{map_window, mmio::DevMem, NmrSystem};

#[derive(Parser)]
#[command(about = "Program system defaults and front-end state")]
struct Args {
    /// Enable the power rails, transmitter and receive signal path
    #[arg(long)]
    power_up: bool,
    /// Close matching-network relays: shunt and series bank codes
    #[arg(long, num_args = 2, value_names = ["SHUNT", "SERIES"])]
    relays: Option<Vec<u8>>,
    /// Receiver gain code, 0-15
    #[arg(long)]
    rx_gain: Option<u8>,
    /// Power the preamp DAC and program the board-default tuning voltages
    #[arg(long)]
    tune_defaults: bool,
    /// Transmit coil bias, volts (implies powering the DAC)
    #[arg(long)]
    vbias: Option<f32>,
    /// Varactor tuning voltage, volts (implies powering the DAC)
    #[arg(long)]
    vvarac: Option<f32>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mem = DevMem::open().context("open /dev/mem (are you root?)")?;
    let window = map_window(&mem).context("map FPGA register window")?;
    let mut system = NmrSystem::new(&window);
    system.init_defaults()?;

    if args.power_up {
        system.enables.set(
            &mut system.i2c_int,
            true,
            PSU_5V_ADC_EN
                | PSU_5V_ANA_P_EN
                | PSU_5V_ANA_N_EN
                | PSU_5V_TX_N_EN
                | PSU_15V_TX_P_EN
                | PSU_15V_TX_N_EN,
        )?;
        system
            .enables
            .set(&mut system.i2c_int, true, AMP_HP_LT1210_EN)?;
        system
            .enables
            .set(&mut system.i2c_int, true, PAMP_IN_SEL_RX | RX_IN_SEL_1)?;
        log::info!("power rails and receive path enabled");
    }

    if let Some(relays) = &args.relays {
        system
            .matching
            .set_capacitors(&mut system.i2c_ext, relays[0], relays[1])?;
    }

    if let Some(code) = args.rx_gain {
        system.rx_gain.set(&mut system.i2c_ext, code & 0x0f)?;
    }

    if args.tune_defaults || args.vbias.is_some() || args.vvarac.is_some() {
        let mut dac = system.preamp_dac();
        dac.power_up()?;
        let vbias = args.vbias.unwrap_or(VBIAS_DEFAULT);
        let vvarac = args.vvarac.unwrap_or(VVARAC_DEFAULT);
        if args.tune_defaults || args.vbias.is_some() {
            write_vbias(&mut dac, vbias)?;
        }
        if args.tune_defaults || args.vvarac.is_some() {
            write_vvarac(&mut dac, vvarac)?;
        }
        log::info!("preamp tuning: vbias {vbias} V, vvarac {vvarac} V");
    }

    Ok(())
}
