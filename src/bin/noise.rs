//! Receiver-noise capture: the acquisition chain with no RF excitation at
//! all. The argument is the ADC sampling frequency; the carrier the clocks
//! derive from is a quarter of it.

use anyhow::Context;
use clap::Parser;

use relaxometer::hardware::{map_window, mmio::DevMem, NmrSystem};
use relaxometer::output::{par_float, MeasurementFolder, ParFile};
use relaxometer::sequence::sequencer::{AcquireError, AcquisitionSequencer};
use relaxometer::sequence::Scan;

#[derive(Parser)]
#[command(about = "Receiver noise capture")]
struct Args {
    /// ADC sampling frequency, MHz
    sampling_mhz: f64,
    /// Recycle delay between scans, us
    scan_spacing_us: u64,
    /// ADC samples per scan
    samples: u32,
    /// Number of scans
    iterations: u32,
}

fn write_par(
    folder: &MeasurementFolder,
    args: &Args,
    scan: &Scan,
) -> std::io::Result<()> {
    let t = &scan.timing;
    let mut par = ParFile::new();
    par.push("b1Freq", par_float(scan.carrier_mhz))
        .push("d180LengthRun", par_float(t.delay2_us()))
        .push(
            "d180LengthCnt",
            format!("{} @ {} MHz", t.delay2, par_float(t.fsm_clock_mhz)),
        )
        .push("ieTime", args.scan_spacing_us / 1000)
        .push("nrPnts", args.samples)
        .push("nrIterations", args.iterations)
        .push("dummyEchoes", 0)
        .push("adcFreq", par_float(t.adc_clock_mhz))
        .push("dwellTime", par_float(1.0 / t.adc_clock_mhz));
    par.write_to(folder)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    // The sequence building blocks still clock off a carrier; the capture
    // rate is fixed at four times it.
    let carrier_mhz = args.sampling_mhz / 4.0;
    let scan = Scan::noise(carrier_mhz, args.scan_spacing_us, args.samples);

    let mem = DevMem::open().context("open /dev/mem (are you root?)")?;
    let window = map_window(&mem).context("map FPGA register window")?;
    let mut system = NmrSystem::new(&window);
    system.init_defaults()?;

    let folder = MeasurementFolder::create(scan.kind.label())?;
    write_par(&folder, &args, &scan)?;
    folder.register_for_analysis(scan.kind.analysis_entry())?;

    let mut sequencer = AcquisitionSequencer::new();
    for iteration in 1..=args.iterations {
        match sequencer.acquire(&mut system, &scan) {
            Ok(acquisition) => {
                folder.write_samples(
                    &format!("dat_{iteration:03}"),
                    acquisition.samples,
                )?;
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
