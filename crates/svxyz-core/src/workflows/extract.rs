use super::WorkflowError;
use crate::core::io::format::{TrajectoryFormat, open_frames};
use crate::core::models::frame::Frame;
use crate::engine::progress::{Progress, ProgressReporter};
use csv::{QuoteStyle, WriterBuilder};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument};

pub const ENERGY_TABLE: &str = "E.dat";
pub const FORCE_TABLE: &str = "F.dat";
pub const VIRIAL_TABLE: &str = "virial.dat";
pub const STRESS_TABLE: &str = "stress.dat";

const ENERGY_HEADER: [&str; 2] = ["Energy(eV)", "System_ID"];
const FORCE_HEADER: [&str; 3] = [
    "Max_atomic_force_norm",
    "Mean_atomic_force_norm",
    "System_ID",
];
const VIRIAL_HEADER: [&str; 7] = [
    r"$\tau_{xx}$",
    r"$\tau_{yy}$",
    r"$\tau_{zz}$",
    r"$\tau_{yz}$",
    r"$\tau_{xz}$",
    r"$\tau_{xy}$",
    "System_ID",
];
const STRESS_HEADER: [&str; 7] = [
    r"$\sigma_{xx}$",
    r"$\sigma_{yy}$",
    r"$\sigma_{zz}$",
    r"$\sigma_{yz}$",
    r"$\sigma_{xz}$",
    r"$\sigma_{xy}$",
    "System_ID",
];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Frame {index} has no {quantity}")]
    MissingQuantity {
        index: usize,
        quantity: &'static str,
    },

    #[error("Failed to create output directory '{path}': {source}", path = path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write table '{path}': {source}", path = path.display())]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ExtractJob {
    pub input: PathBuf,
    pub format: Option<TrajectoryFormat>,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub frames: usize,
    pub tables: Vec<PathBuf>,
}

/// A whitespace-delimited `.dat` file: one header row, then six-decimal values
/// followed by the frame id.
struct Table {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl Table {
    fn create(dir: &Path, name: &str, header: &[&str]) -> Result<Self, ExtractError> {
        let path = dir.join(name);
        let mut writer = WriterBuilder::new()
            .delimiter(b' ')
            .quote_style(QuoteStyle::Never)
            .has_headers(false)
            .from_path(&path)
            .map_err(|source| ExtractError::Table {
                path: path.clone(),
                source,
            })?;
        writer
            .write_record(header)
            .map_err(|source| ExtractError::Table {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path, writer })
    }

    fn write_row(&mut self, values: &[f64], id: usize) -> Result<(), ExtractError> {
        let record = values
            .iter()
            .map(|v| format!("{:.6}", v))
            .chain(std::iter::once(id.to_string()));
        self.writer
            .write_record(record)
            .map_err(|source| ExtractError::Table {
                path: self.path.clone(),
                source,
            })
    }

    fn finish(mut self) -> Result<PathBuf, ExtractError> {
        self.writer.flush().map_err(|e| ExtractError::Table {
            path: self.path.clone(),
            source: e.into(),
        })?;
        Ok(self.path)
    }
}

/// The four rows written for one frame.
struct FrameRow {
    energy: f64,
    forces: [f64; 2],
    virial: [f64; 6],
    stress_gpa: [f64; 6],
}

impl FrameRow {
    fn from_frame(frame: &Frame) -> Result<Self, ExtractError> {
        let missing = |quantity| ExtractError::MissingQuantity {
            index: frame.index,
            quantity,
        };
        let energy = frame.energy.ok_or_else(|| missing("energy"))?;
        let max_force = frame.max_force().ok_or_else(|| missing("forces"))?;
        let mean_force = frame.mean_force().ok_or_else(|| missing("forces"))?;
        let stress_gpa = frame.stress_gpa().ok_or_else(|| missing("stress"))?;
        let virial = frame.virial().ok_or_else(|| missing("cell"))?;
        Ok(Self {
            energy,
            forces: [max_force, mean_force],
            virial: *virial.components(),
            stress_gpa: *stress_gpa.components(),
        })
    }
}

#[instrument(skip_all, name = "extract_workflow")]
pub fn run(job: &ExtractJob, reporter: &ProgressReporter) -> Result<ExtractSummary, WorkflowError> {
    fs::create_dir_all(&job.output_dir).map_err(|source| ExtractError::OutputDir {
        path: job.output_dir.clone(),
        source,
    })?;

    reporter.report(Progress::SourceStart {
        path: job.input.clone(),
    });
    let parse_error = |source| WorkflowError::Parse {
        path: job.input.clone(),
        source,
    };
    let (format, frames) = open_frames(&job.input, job.format).map_err(parse_error)?;
    info!("Extracting tables from {:?} ({}).", job.input, format);

    let dir = job.output_dir.as_path();
    let mut energy = Table::create(dir, ENERGY_TABLE, &ENERGY_HEADER)?;
    let mut force = Table::create(dir, FORCE_TABLE, &FORCE_HEADER)?;
    let mut virial = Table::create(dir, VIRIAL_TABLE, &VIRIAL_HEADER)?;
    let mut stress = Table::create(dir, STRESS_TABLE, &STRESS_HEADER)?;

    let mut count = 0;
    for frame in frames {
        let frame = frame.map_err(parse_error)?;
        let row = FrameRow::from_frame(&frame)?;
        energy.write_row(&[row.energy], frame.index)?;
        force.write_row(&row.forces, frame.index)?;
        virial.write_row(&row.virial, frame.index)?;
        stress.write_row(&row.stress_gpa, frame.index)?;
        count += 1;
        reporter.report(Progress::FrameProcessed { kept: true });
    }

    let tables = vec![
        energy.finish()?,
        force.finish()?,
        virial.finish()?,
        stress.finish()?,
    ];
    reporter.report(Progress::SourceFinish);
    info!("Wrote {} frame(s) to {} tables.", count, tables.len());

    Ok(ExtractSummary {
        frames: count,
        tables,
    })
}
