use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use svxyz::core::io::format::TrajectoryFormat;
use svxyz::engine::resolver::DEFAULT_CONFIG_FILE;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Shichuan Sun",
    version,
    about = "svxyz - Filter and tabulate atomistic simulation trajectories (extended XYZ, VASP OUTCAR and vasprun.xml).",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Keep only the frames whose properties fall inside the configured ranges.
    Filter(FilterArgs),
    /// Write per-frame energy, force, virial and stress tables (E.dat, F.dat, virial.dat, stress.dat).
    Extract(ExtractArgs),
}

/// Arguments for the `filter` subcommand.
#[derive(Args, Debug)]
pub struct FilterArgs {
    /// Input trajectory files, processed in the order given.
    #[arg(short, long = "input", required = true, num_args = 1.., value_name = "PATH")]
    pub inputs: Vec<PathBuf>,

    /// Path for the filtered extended XYZ output.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Filter configuration in JSON format. Created with all filters disabled if missing.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, value_name = "PATH")]
    pub config: PathBuf,

    /// Input format ('extxyz', 'vasp-out' or 'vasp-xml'). Inferred from each file name by default.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<TrajectoryFormat>,

    /// Override `options.skip`: drop this many leading frames of every input.
    #[arg(long, value_name = "INT")]
    pub skip: Option<usize>,

    /// Append to the output file instead of overwriting it.
    #[arg(long)]
    pub append: bool,

    /// Ignore TB.dat, ST.dat and OUTCAR files next to the inputs.
    #[arg(long)]
    pub no_sidecar: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S energy.max=-3.5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `extract` subcommand.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Input trajectory. Defaults to the input of the previous run, remembered in dxyz.json.
    #[arg(short, long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Directory that receives the .dat tables.
    #[arg(short = 'd', long, default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Input format ('extxyz', 'vasp-out' or 'vasp-xml'). Inferred from the file name by default.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<TrajectoryFormat>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn filter_accepts_multiple_inputs_and_overrides() {
        let cli = Cli::try_parse_from([
            "svxyz", "-vv", "filter", "-i", "a.xyz", "b.xyz", "-o", "out.xyz", "-f", "vasp-out",
            "-S", "energy.max=-3", "-S", "options.skip=2",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Filter(args) = cli.command else {
            panic!("expected filter command");
        };
        assert_eq!(args.inputs, [PathBuf::from("a.xyz"), PathBuf::from("b.xyz")]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert_eq!(args.format, Some(TrajectoryFormat::VaspOut));
        assert_eq!(args.set_values, ["energy.max=-3", "options.skip=2"]);
    }

    #[test]
    fn filter_requires_an_output() {
        assert!(Cli::try_parse_from(["svxyz", "filter", "-i", "a.xyz"]).is_err());
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(
            Cli::try_parse_from(["svxyz", "filter", "-i", "a", "-o", "b", "-f", "pdb"]).is_err()
        );
    }

    #[test]
    fn extract_input_is_optional() {
        let cli = Cli::try_parse_from(["svxyz", "extract"]).unwrap();
        let Commands::Extract(args) = cli.command else {
            panic!("expected extract command");
        };
        assert!(args.input.is_none());
        assert_eq!(args.output_dir, PathBuf::from("."));
    }
}
