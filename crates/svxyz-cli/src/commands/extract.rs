use crate::cli::ExtractArgs;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use svxyz::engine::progress::ProgressReporter;
use svxyz::workflows::extract::{self, ExtractJob};
use tracing::{debug, info};

/// Remembers the last extracted input so `svxyz extract` can be re-run without arguments.
pub const LAST_INPUT_FILE: &str = "dxyz.json";

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct LastInput {
    xyz_file: PathBuf,
}

pub fn run(args: ExtractArgs) -> Result<()> {
    run_with_memory(args, Path::new(LAST_INPUT_FILE))
}

fn run_with_memory(args: ExtractArgs, memory: &Path) -> Result<()> {
    let input = resolve_input(args.input, memory)?;
    let job = ExtractJob {
        input,
        format: args.format,
        output_dir: args.output_dir,
    };

    let handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(handler.get_callback());
    let result = extract::run(&job, &reporter);
    handler.finish();
    let summary = result?;

    println!(
        "Extracted {} frame(s) from {} into:",
        summary.frames,
        job.input.display()
    );
    for table in &summary.tables {
        println!("  {}", table.display());
    }
    Ok(())
}

fn resolve_input(explicit: Option<PathBuf>, memory: &Path) -> Result<PathBuf> {
    if let Some(input) = explicit {
        remember(memory, &input)?;
        return Ok(input);
    }

    let recalled = recall(memory)?.ok_or_else(|| {
        CliError::Argument(format!(
            "No input given and {} does not exist. Pass --input <PATH> once to remember it.",
            memory.display()
        ))
    })?;
    info!("Using input {:?} remembered in {:?}.", recalled, memory);
    Ok(recalled)
}

fn remember(memory: &Path, input: &Path) -> Result<()> {
    let record = LastInput {
        xyz_file: input.to_path_buf(),
    };
    let text = serde_json::to_string_pretty(&record).map_err(|e| CliError::Other(e.into()))?;
    fs::write(memory, text)?;
    debug!("Saved input path to {:?}.", memory);
    Ok(())
}

fn recall(memory: &Path) -> Result<Option<PathBuf>> {
    if !memory.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(memory)?;
    let record: LastInput =
        serde_json::from_str(&content).map_err(|e| CliError::FileParsing {
            path: memory.to_path_buf(),
            source: e.into(),
        })?;
    Ok(Some(record.xyz_file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use svxyz::workflows::extract::ENERGY_TABLE;
    use tempfile::tempdir;

    const FRAME: &str = "\
1
Lattice=\"3.0 0.0 0.0 0.0 3.0 0.0 0.0 0.0 3.0\" Properties=species:S:1:pos:R:3:forces:R:3 energy=-2.5 stress=\"0.0 0.0 0.0 0.0 0.0 0.0 0.0 0.0 0.0\"
Ar 0.0 0.0 0.0 0.0 0.0 0.0
";

    #[test]
    fn explicit_input_is_remembered_and_recalled() {
        let dir = tempdir().unwrap();
        let memory = dir.path().join(LAST_INPUT_FILE);
        let input = dir.path().join("train.xyz");

        assert_eq!(resolve_input(Some(input.clone()), &memory).unwrap(), input);
        assert_eq!(resolve_input(None, &memory).unwrap(), input);
    }

    #[test]
    fn missing_input_and_memory_is_an_argument_error() {
        let dir = tempdir().unwrap();
        let result = resolve_input(None, &dir.path().join(LAST_INPUT_FILE));
        assert!(matches!(result, Err(CliError::Argument(_))));
    }

    #[test]
    fn corrupt_memory_file_is_reported() {
        let dir = tempdir().unwrap();
        let memory = dir.path().join(LAST_INPUT_FILE);
        fs::write(&memory, "{\"path\": 1}").unwrap();
        assert!(matches!(
            resolve_input(None, &memory),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn run_writes_tables_using_the_remembered_input() {
        let dir = tempdir().unwrap();
        let memory = dir.path().join(LAST_INPUT_FILE);
        let input = dir.path().join("argon.xyz");
        fs::write(&input, FRAME).unwrap();
        fs::write(
            &memory,
            serde_json::to_string(&LastInput { xyz_file: input }).unwrap(),
        )
        .unwrap();

        let args = ExtractArgs {
            input: None,
            output_dir: dir.path().join("tables"),
            format: None,
        };
        run_with_memory(args, &memory).unwrap();

        let energy = fs::read_to_string(dir.path().join("tables").join(ENERGY_TABLE)).unwrap();
        assert_eq!(energy, "Energy(eV) System_ID\n-2.500000 0\n");
    }
}
