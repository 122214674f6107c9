use super::WorkflowError;
use crate::core::io::error::ParseError;
use crate::core::io::extxyz::FrameWriter;
use crate::core::io::format::{TrajectoryFormat, open_frames};
use crate::core::io::sidecar::Sidecar;
use crate::engine::config::FilterConfig;
use crate::engine::pipeline::FilterPipeline;
use crate::engine::progress::{Progress, ProgressReporter};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct FilterJob {
    pub inputs: Vec<PathBuf>,
    /// Input format; inferred per file when `None`.
    pub format: Option<TrajectoryFormat>,
    pub output: PathBuf,
    pub config: FilterConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSummary {
    pub total: usize,
    pub skipped: usize,
    pub kept: usize,
    /// Rejections keyed by the first filter each frame failed.
    pub rejected: BTreeMap<&'static str, usize>,
}

impl FilterSummary {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }
}

#[instrument(skip_all, name = "filter_workflow")]
pub fn run(job: &FilterJob, reporter: &ProgressReporter) -> Result<FilterSummary, WorkflowError> {
    job.config.validate()?;
    let pipeline = FilterPipeline::new(&job.config);
    if pipeline.is_identity() {
        info!("No filters are enabled; every frame will be kept.");
    } else {
        for (quantity, spec) in pipeline.active() {
            debug!(
                filter = quantity.name(),
                min = ?spec.min,
                max = ?spec.max,
                unit = quantity.unit(),
                "Active filter."
            );
        }
    }

    if let Some(input) = job.inputs.iter().find(|input| same_file(input, &job.output)) {
        return Err(WorkflowError::OutputIsInput {
            path: input.clone(),
        });
    }

    let mut writer = FrameWriter::create(&job.output, job.config.options.append)?;
    let mut summary = FilterSummary::default();

    let outcome = job.inputs.iter().try_for_each(|input| {
        filter_source(input, job, &pipeline, &mut writer, &mut summary, reporter)
    });
    let written = writer.frames_written();
    // Frames written before a failure stay on disk.
    let flushed = writer.finish();
    outcome?;
    flushed?;

    info!(
        total = summary.total,
        written,
        skipped = summary.skipped,
        "Filtering complete; wrote {:?}.",
        job.output
    );
    Ok(summary)
}

/// Both paths exist and resolve to the same file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn filter_source<W: Write>(
    input: &Path,
    job: &FilterJob,
    pipeline: &FilterPipeline,
    writer: &mut FrameWriter<W>,
    summary: &mut FilterSummary,
    reporter: &ProgressReporter,
) -> Result<(), WorkflowError> {
    let parse_error = |source: ParseError| WorkflowError::Parse {
        path: input.to_path_buf(),
        source,
    };

    reporter.report(Progress::SourceStart {
        path: input.to_path_buf(),
    });
    let (format, frames) = open_frames(input, job.format).map_err(parse_error)?;
    info!("Reading {:?} as {}.", input, format);

    let sidecar = if job.config.options.sidecar_files {
        Sidecar::discover(input).map_err(parse_error)?
    } else {
        Sidecar::default()
    };
    if !sidecar.is_empty() {
        info!(
            "Merging {} temperature and {} stress record(s) found next to {:?}.",
            sidecar.temperatures.len(),
            sidecar.stresses_gpa.len(),
            input
        );
    }

    let skip = job.config.options.skip;
    let mut seen = 0;
    for frame in frames {
        let frame = frame.map_err(parse_error)?;
        seen += 1;
        summary.total += 1;
        if frame.index < skip {
            summary.skipped += 1;
            continue;
        }

        let frame = sidecar.apply(frame);
        let kept = match pipeline.first_rejection(&frame) {
            None => {
                writer.write_frame(&frame)?;
                summary.kept += 1;
                true
            }
            Some(quantity) => {
                *summary.rejected.entry(quantity.name()).or_default() += 1;
                false
            }
        };
        reporter.report(Progress::FrameProcessed { kept });
    }

    if seen == 0 {
        warn!("No frames found in {:?}.", input);
        reporter.report(Progress::Message(format!(
            "{} contains no frames",
            input.display()
        )));
    } else if seen <= skip {
        warn!(
            "All {} frame(s) of {:?} were skipped (skip = {}).",
            seen, input, skip
        );
    }
    reporter.report(Progress::SourceFinish);
    Ok(())
}
