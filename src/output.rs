//! Measurement output files.
//!
//! Each invocation creates one dated folder and fills it with plain-text
//! artifacts the offline tooling consumes: one decimal sample per line in
//! the data files, an `acqu.par` recording the parameters *actually
//! programmed* (given and run values both, for reproducibility), and the
//! bookkeeping files the analysis scripts read to find the newest run.

use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

/// Cumulative log of analysis calls, one line per measurement, kept next
/// to the measurement folders.
const HISTORY_SCRIPT: &str = "measurement_history_matlab_script.txt";
/// Name of the folder of the latest run, for the analysis tooling.
const CURRENT_FOLDER: &str = "current_folder.txt";

pub struct MeasurementFolder {
    path: PathBuf,
    name: String,
}

impl MeasurementFolder {
    /// Create `YYYY_MM_DD_HH_MM_SS_<kind>` under the working directory.
    pub fn create(kind: &str) -> io::Result<Self> {
        let name =
            Local::now().format(&format!("%Y_%m_%d_%H_%M_%S_{kind}")).to_string();
        let path = PathBuf::from(&name);
        std::fs::create_dir_all(&path)?;
        log::info!("measurement folder: {name}");
        Ok(Self { path, name })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn writer(&self, file: &str) -> io::Result<BufWriter<File>> {
        Ok(BufWriter::new(File::create(self.path.join(file))?))
    }

    /// Raw samples, one decimal value per line.
    pub fn write_samples(&self, file: &str, samples: &[u16]) -> io::Result<()> {
        let mut out = self.writer(file)?;
        for sample in samples {
            writeln!(out, "{sample}")?;
        }
        out.flush()
    }

    /// Per-echo-position averages, same format.
    pub fn write_average(&self, file: &str, averaged: &[u32]) -> io::Result<()> {
        let mut out = self.writer(file)?;
        for value in averaged {
            writeln!(out, "{value}")?;
        }
        out.flush()
    }

    /// Register this folder as the current one and append the analysis
    /// call (`<entry>([data_folder,'<name>']);`) to the history script.
    pub fn register_for_analysis(&self, entry: &str) -> io::Result<()> {
        std::fs::write(CURRENT_FOLDER, format!("{}\n", self.name))?;
        let mut history =
            OpenOptions::new().create(true).append(true).open(HISTORY_SCRIPT)?;
        writeln!(history, "{entry}([data_folder,'{}']);", self.name)
    }
}

/// The `acqu.par` key/value metadata file.
#[derive(Default)]
pub struct ParFile {
    lines: String,
}

impl ParFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &str, value: impl Display) -> &mut Self {
        self.lines.push_str(&format!("{key} = {value}\n"));
        self
    }

    pub fn write_to(&self, folder: &MeasurementFolder) -> io::Result<()> {
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(folder.path().join("acqu.par"))?;
        out.write_all(self.lines.as_bytes())
    }
}

/// Fixed-precision float rendering used throughout the par file.
pub fn par_float(value: f64) -> String {
    format!("{value:.3}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn par_rendering() {
        let mut par = ParFile::new();
        par.push("b1Freq", par_float(4.3))
            .push("nrPnts", 512)
            .push("p90LengthCnt", format!("{} @ {} MHz", 344, par_float(68.8)));
        assert_eq!(
            par.lines,
            "b1Freq = 4.300\nnrPnts = 512\np90LengthCnt = 344 @ 68.800 MHz\n"
        );
    }

    #[test]
    fn sample_file_format() {
        let dir = std::env::temp_dir()
            .join(format!("relaxometer-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let folder = MeasurementFolder {
            path: dir.clone(),
            name: "test".into(),
        };
        folder.write_samples("dat_001", &[1, 2, 16383]).unwrap();
        let written = std::fs::read_to_string(dir.join("dat_001")).unwrap();
        assert_eq!(written, "1\n2\n16383\n");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
