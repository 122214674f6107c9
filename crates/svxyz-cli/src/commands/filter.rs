use crate::cli::FilterArgs;
use crate::config;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use std::fmt::Write;
use std::path::Path;
use svxyz::engine::progress::ProgressReporter;
use svxyz::workflows::filter::{self, FilterJob, FilterSummary};
use tracing::info;

pub fn run(args: FilterArgs) -> Result<()> {
    let config = config::build_filter_config(&args)?;
    let job = FilterJob {
        inputs: args.inputs,
        format: args.format,
        output: args.output,
        config,
    };
    info!(
        "Filtering {} input file(s) into {:?}.",
        job.inputs.len(),
        job.output
    );

    let handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(handler.get_callback());
    let result = filter::run(&job, &reporter);
    handler.finish();
    let summary = result?;

    if job.config.options.show_summary {
        print!("{}", format_summary(&summary, &job.output));
    }
    Ok(())
}

fn format_summary(summary: &FilterSummary, output: &Path) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "Frames read:     {}", summary.total);
    if summary.skipped > 0 {
        let _ = writeln!(text, "Frames skipped:  {}", summary.skipped);
    }
    let _ = writeln!(text, "Frames kept:     {}", summary.kept);
    for (filter, count) in &summary.rejected {
        let _ = writeln!(text, "  rejected by {:<12} {}", filter, count);
    }
    let _ = writeln!(text, "Output written to {}", output.display());
    text
}
