//! CPMG with caller-specified exact delays instead of an echo-spacing
//! target. Same state machine as `cpmg`; the delays go to the registers
//! verbatim after quantization to the sequencing clock.

use anyhow::Context;
use clap::Parser;

use relaxometer::hardware::{map_window, mmio::DevMem, NmrSystem};
use relaxometer::output::{par_float, MeasurementFolder, ParFile};
use relaxometer::sequence::sequencer::{AcquireError, AcquisitionSequencer};
use relaxometer::sequence::Scan;

#[derive(Parser)]
#[command(about = "CPMG acquisition with explicit inter-pulse delays")]
struct Args {
    /// RF carrier frequency, MHz
    carrier_mhz: f64,
    /// 90-degree pulse length, us
    pulse1_us: f64,
    /// 180-degree pulse length, us
    pulse2_us: f64,
    /// 90-degree pulse duty cycle (accepted, currently inert)
    pulse1_duty: f64,
    /// 180-degree pulse duty cycle (accepted, currently inert)
    pulse2_duty: f64,
    /// Delay after the 90-degree pulse, us
    delay1_us: f64,
    /// Delay after each 180-degree pulse, us
    delay2_us: f64,
    /// Recycle delay between scans, us
    scan_spacing_us: u64,
    /// ADC samples per echo
    samples_per_echo: u32,
    /// Echoes per scan
    echoes_per_scan: u32,
    /// Acquisition-window shift off the delay-2 center, us
    echo_shift_us: f64,
    /// Number of scans
    iterations: u32,
    /// Nonzero alternates the receiver reference phase between scans
    phase_cycle: u8,
    /// Inversion-recovery 180-degree pulse, sequencing ticks (0 disables)
    #[arg(default_value_t = 0)]
    t1_pulse_ticks: u32,
    /// Inversion-recovery delay, sequencing ticks (0 disables)
    #[arg(default_value_t = 0)]
    t1_delay_ticks: u32,
}

fn write_par(
    folder: &MeasurementFolder,
    args: &Args,
    scan: &Scan,
) -> std::io::Result<()> {
    let t = &scan.timing;
    let fsm = par_float(t.fsm_clock_mhz);
    let mut par = ParFile::new();
    par.push("b1Freq", par_float(args.carrier_mhz))
        .push("p90LengthGiven", par_float(args.pulse1_us))
        .push("p90LengthRun", par_float(t.pulse1_us()))
        .push("p90LengthCnt", format!("{} @ {fsm} MHz", t.pulse1))
        .push("d90LengthGiven", par_float(args.delay1_us))
        .push("d90LengthRun", par_float(t.delay1_us()))
        .push("d90LengthCnt", format!("{} @ {fsm} MHz", t.delay1))
        .push("p180LengthGiven", par_float(args.pulse2_us))
        .push("p180LengthRun", par_float(t.pulse2_us()))
        .push("p180LengthCnt", format!("{} @ {fsm} MHz", t.pulse2))
        .push("d180LengthGiven", par_float(args.delay2_us))
        .push("d180LengthRun", par_float(t.delay2_us()))
        .push("d180LengthCnt", format!("{} @ {fsm} MHz", t.delay2))
        .push("echoTimeRun", par_float(t.echo_time_us()))
        .push("ieTime", args.scan_spacing_us / 1000)
        .push("nrPnts", args.samples_per_echo)
        .push("nrEchoes", args.echoes_per_scan)
        .push("echoShift", par_float(args.echo_shift_us))
        .push("nrIterations", args.iterations)
        .push("dummyEchoes", 0)
        .push("adcFreq", par_float(t.adc_clock_mhz))
        .push("dwellTime", par_float(1.0 / t.adc_clock_mhz))
        .push("usePhaseCycle", args.phase_cycle);
    par.write_to(folder)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let scan = Scan::cpmg_manual(
        args.carrier_mhz,
        args.pulse1_us,
        args.pulse2_us,
        (args.pulse1_duty, args.pulse2_duty),
        args.delay1_us,
        args.delay2_us,
        args.scan_spacing_us,
        args.samples_per_echo,
        args.echoes_per_scan,
        args.echo_shift_us,
    );

    let mem = DevMem::open().context("open /dev/mem (are you root?)")?;
    let window = map_window(&mem).context("map FPGA register window")?;
    let mut system = NmrSystem::new(&window);
    system.init_defaults()?;
    system
        .parameters
        .set_t1(args.t1_pulse_ticks, args.t1_delay_ticks);

    let folder = MeasurementFolder::create(scan.kind.label())?;
    write_par(&folder, &args, &scan)?;
    folder.register_for_analysis(scan.kind.analysis_entry())?;

    let mut sequencer = AcquisitionSequencer::new();
    for iteration in 1..=args.iterations {
        if args.phase_cycle != 0 {
            sequencer.toggle_phase_cycle(&mut system);
        }
        match sequencer.acquire(&mut system, &scan) {
            Ok(acquisition) => {
                folder.write_samples(
                    &format!("dat_{iteration:03}"),
                    acquisition.samples,
                )?;
                if let Some(averaged) = &acquisition.echo_average {
                    folder.write_average(
                        &format!("avg_{iteration:03}"),
                        averaged,
                    )?;
                }
            }
            Err(error @ AcquireError::SampleCount { .. }) => {
                log::error!("scan {iteration}: {error}");
            }
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("scan {iteration} failed"));
            }
        }
    }
    Ok(())
}
