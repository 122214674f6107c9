use crate::cli::FilterArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use svxyz::engine::config::FilterConfig;
use svxyz::engine::resolver::{self, ConfigSource};
use tracing::{debug, info, warn};

/// Resolves the configuration file and layers the command-line overrides on top.
///
/// Precedence, lowest first: file (or defaults), dedicated flags, `--set` values.
pub fn build_filter_config(args: &FilterArgs) -> Result<FilterConfig> {
    let resolved = resolver::resolve(&args.config)?;
    match resolved.source {
        ConfigSource::Loaded => debug!("Loaded filter configuration from {:?}", args.config),
        ConfigSource::CreatedDefault => warn!(
            "No configuration found; wrote defaults to {:?}. Edit it to enable filters.",
            args.config
        ),
    }

    let mut config = resolved.config;
    merge_flags(&mut config, args);
    apply_set_values(&mut config, &args.set_values)?;
    config.validate()?;

    info!(
        "{} filter(s) enabled.",
        config.specs().filter(|(_, spec)| spec.enabled).count()
    );
    Ok(config)
}

fn merge_flags(config: &mut FilterConfig, args: &FilterArgs) {
    if let Some(skip) = args.skip {
        config.options.skip = skip;
    }
    if args.append {
        config.options.append = true;
    }
    if args.no_sidecar {
        config.options.sidecar_files = false;
    }
}

fn apply_set_values(config: &mut FilterConfig, set_values: &[String]) -> Result<()> {
    for kv_pair in set_values {
        let (key, value) =
            parser::parse_set_value(kv_pair).map_err(|e| CliError::Argument(e.to_string()))?;
        debug!("Applying override {} = {}", key, value);
        config.apply_override(key, value)?;
    }
    Ok(())
}
