use super::quantity::Quantity;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}", path = path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in configuration file '{path}': {source}", path = path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write default configuration to '{path}': {source}", path = path.display())]
    WriteDefault {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Filter '{filter}' has min ({min}) greater than max ({max})")]
    InvertedBounds {
        filter: &'static str,
        min: f64,
        max: f64,
    },

    #[error("Unknown filter name: '{0}'")]
    UnknownFilter(String),

    #[error("Invalid override '{key}': {reason}")]
    InvalidOverride { key: String, reason: String },
}

/// An inclusive `[min, max]` window on one quantity. Unset bounds are open.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    pub enabled: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl FilterSpec {
    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            enabled: true,
            min,
            max,
        }
    }

    /// Whether the filter constrains anything at all.
    pub fn is_active(&self) -> bool {
        self.enabled && (self.min.is_some() || self.max.is_some())
    }

    pub fn contains(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Leading frames of each input file dropped before filtering.
    pub skip: usize,
    pub append: bool,
    pub show_summary: bool,
    /// Merge TB.dat / ST.dat / OUTCAR records found next to each input.
    pub sidecar_files: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip: 0,
            append: false,
            show_summary: true,
            sidecar_files: true,
        }
    }
}

/// The full set of filters plus run options, as stored in `txyz.json`.
///
/// Missing keys take their defaults (disabled, unbounded) and unknown keys are
/// ignored, so configuration files written by older or newer versions still load.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub frame: FilterSpec,
    pub energy: FilterSpec,
    pub max_force: FilterSpec,
    pub volume: FilterSpec,
    pub pressure: FilterSpec,
    pub temperature: FilterSpec,
    pub stress_xx: FilterSpec,
    pub stress_yy: FilterSpec,
    pub stress_zz: FilterSpec,
    pub stress_yz: FilterSpec,
    pub stress_xz: FilterSpec,
    pub stress_xy: FilterSpec,
    pub virial_xx: FilterSpec,
    pub virial_yy: FilterSpec,
    pub virial_zz: FilterSpec,
    pub virial_yz: FilterSpec,
    pub virial_xz: FilterSpec,
    pub virial_xy: FilterSpec,
    pub options: RunOptions,
}

macro_rules! select_spec {
    ($config:ident, $quantity:expr, $($borrow:tt)+) => {{
        use crate::core::models::voigt::Component::*;
        match $quantity {
            Quantity::Frame => $($borrow)+ $config.frame,
            Quantity::Energy => $($borrow)+ $config.energy,
            Quantity::MaxForce => $($borrow)+ $config.max_force,
            Quantity::Volume => $($borrow)+ $config.volume,
            Quantity::Pressure => $($borrow)+ $config.pressure,
            Quantity::Temperature => $($borrow)+ $config.temperature,
            Quantity::Stress(Xx) => $($borrow)+ $config.stress_xx,
            Quantity::Stress(Yy) => $($borrow)+ $config.stress_yy,
            Quantity::Stress(Zz) => $($borrow)+ $config.stress_zz,
            Quantity::Stress(Yz) => $($borrow)+ $config.stress_yz,
            Quantity::Stress(Xz) => $($borrow)+ $config.stress_xz,
            Quantity::Stress(Xy) => $($borrow)+ $config.stress_xy,
            Quantity::Virial(Xx) => $($borrow)+ $config.virial_xx,
            Quantity::Virial(Yy) => $($borrow)+ $config.virial_yy,
            Quantity::Virial(Zz) => $($borrow)+ $config.virial_zz,
            Quantity::Virial(Yz) => $($borrow)+ $config.virial_yz,
            Quantity::Virial(Xz) => $($borrow)+ $config.virial_xz,
            Quantity::Virial(Xy) => $($borrow)+ $config.virial_xy,
        }
    }};
}

impl FilterConfig {
    pub fn spec(&self, quantity: Quantity) -> &FilterSpec {
        select_spec!(self, quantity, &)
    }

    pub fn spec_mut(&mut self, quantity: Quantity) -> &mut FilterSpec {
        select_spec!(self, quantity, &mut)
    }

    pub fn specs(&self) -> impl Iterator<Item = (Quantity, &FilterSpec)> + '_ {
        Quantity::ALL.into_iter().map(move |q| (q, self.spec(q)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (quantity, spec) in self.specs() {
            if let (Some(min), Some(max)) = (spec.min, spec.max) {
                if min > max {
                    return Err(ConfigError::InvertedBounds {
                        filter: quantity.name(),
                        min,
                        max,
                    });
                }
            }
        }
        Ok(())
    }

    /// Applies a single `NAME.FIELD=VALUE` style override.
    ///
    /// `FIELD` is `enabled`, `min` or `max` for filters; `null` or `none` clears a
    /// bound. The `options` section accepts `skip`, `append`, `show_summary` and
    /// `sidecar_files`.
    pub fn apply_override(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let (section, field) = key.split_once('.').ok_or_else(|| ConfigError::InvalidOverride {
            key: key.to_string(),
            reason: "expected NAME.FIELD".to_string(),
        })?;
        let value = value.trim();

        let invalid = |reason: String| ConfigError::InvalidOverride {
            key: key.to_string(),
            reason,
        };
        let parse_bool = |v: &str| match v.to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "1" => Ok(true),
            "false" | "f" | "no" | "0" => Ok(false),
            _ => Err(invalid(format!("'{}' is not a boolean", v))),
        };

        if section == "options" {
            match field {
                "skip" => {
                    self.options.skip = value
                        .parse()
                        .map_err(|_| invalid(format!("'{}' is not a frame count", value)))?
                }
                "append" => self.options.append = parse_bool(value)?,
                "show_summary" => self.options.show_summary = parse_bool(value)?,
                "sidecar_files" => self.options.sidecar_files = parse_bool(value)?,
                _ => return Err(invalid(format!("unknown option '{}'", field))),
            }
            return Ok(());
        }

        let quantity =
            Quantity::from_name(section).ok_or_else(|| ConfigError::UnknownFilter(section.into()))?;
        let parse_bound = |v: &str| -> Result<Option<f64>, ConfigError> {
            if v.eq_ignore_ascii_case("null") || v.eq_ignore_ascii_case("none") {
                return Ok(None);
            }
            v.parse()
                .map(Some)
                .map_err(|_| invalid(format!("'{}' is not a number", v)))
        };

        let spec = self.spec_mut(quantity);
        match field {
            "enabled" => spec.enabled = parse_bool(value)?,
            "min" => spec.min = parse_bound(value)?,
            "max" => spec.max = parse_bound(value)?,
            _ => return Err(invalid(format!("unknown field '{}'", field))),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::voigt::Component;

    #[test]
    fn filter_spec_bounds_are_inclusive() {
        let spec = FilterSpec::range(Some(-5.0), Some(-3.0));
        assert!(spec.contains(-5.0));
        assert!(spec.contains(-3.0));
        assert!(spec.contains(-4.0));
        assert!(!spec.contains(-5.000001));
        assert!(!spec.contains(-2.0));
        assert!(!spec.contains(f64::NAN));
    }

    #[test]
    fn filter_spec_open_bounds_are_unbounded() {
        let spec = FilterSpec::range(None, Some(0.0));
        assert!(spec.contains(-1e300));
        assert!(!spec.contains(0.1));

        assert!(!FilterSpec::range(None, None).is_active());
        assert!(!FilterSpec::default().is_active());
        assert!(FilterSpec::range(Some(1.0), None).is_active());
    }

    #[test]
    fn default_config_is_all_disabled() {
        let config = FilterConfig::default();
        assert!(config.specs().all(|(_, spec)| !spec.enabled));
        assert_eq!(config.specs().count(), 18);
        assert_eq!(config.options.skip, 0);
        assert!(config.options.show_summary);
        assert!(config.options.sidecar_files);
        assert!(!config.options.append);
    }

    #[test]
    fn json_with_missing_and_unknown_keys_loads() {
        let json = r#"{
            "energy": {"enabled": true, "min": -5.0, "max": -3.0},
            "stress_xy": {"enabled": true, "max": 1.5},
            "fancy_new_filter": {"enabled": true},
            "options": {"skip": 2}
        }"#;
        let config: FilterConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.energy, FilterSpec::range(Some(-5.0), Some(-3.0)));
        assert_eq!(
            *config.spec(Quantity::Stress(Component::Xy)),
            FilterSpec::range(None, Some(1.5))
        );
        assert_eq!(config.volume, FilterSpec::default());
        assert_eq!(config.options.skip, 2);
        assert!(config.options.show_summary);
    }

    #[test]
    fn serialized_default_has_every_filter_key() {
        let json = serde_json::to_value(FilterConfig::default()).unwrap();
        for q in Quantity::ALL {
            let entry = &json[q.name()];
            assert_eq!(entry["enabled"], serde_json::Value::Bool(false), "{q}");
            assert!(entry["min"].is_null());
        }
        assert_eq!(json["options"]["skip"], 0);
    }

    #[test]
    fn validate_rejects_inverted_bounds_even_when_disabled() {
        let mut config = FilterConfig::default();
        config.pressure = FilterSpec {
            enabled: false,
            min: Some(10.0),
            max: Some(1.0),
        };
        match config.validate() {
            Err(ConfigError::InvertedBounds { filter, min, max }) => {
                assert_eq!(filter, "pressure");
                assert_eq!((min, max), (10.0, 1.0));
            }
            other => panic!("expected InvertedBounds, got {:?}", other),
        }

        config.pressure.max = Some(10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn apply_override_sets_filter_fields() {
        let mut config = FilterConfig::default();
        config.apply_override("energy.enabled", "true").unwrap();
        config.apply_override("energy.min", "-5").unwrap();
        config.apply_override("energy.max", "-3.5").unwrap();
        assert_eq!(config.energy, FilterSpec::range(Some(-5.0), Some(-3.5)));

        config.apply_override("energy.max", "null").unwrap();
        assert_eq!(config.energy.max, None);

        config.apply_override("virial_zz.enabled", "T").unwrap();
        assert!(config.virial_zz.enabled);
    }

    #[test]
    fn apply_override_sets_options() {
        let mut config = FilterConfig::default();
        config.apply_override("options.skip", "10").unwrap();
        config.apply_override("options.append", "yes").unwrap();
        config.apply_override("options.sidecar_files", "false").unwrap();
        assert_eq!(config.options.skip, 10);
        assert!(config.options.append);
        assert!(!config.options.sidecar_files);
    }

    #[test]
    fn apply_override_rejects_bad_input() {
        let mut config = FilterConfig::default();
        assert!(matches!(
            config.apply_override("energy", "1"),
            Err(ConfigError::InvalidOverride { .. })
        ));
        assert!(matches!(
            config.apply_override("entropy.min", "1"),
            Err(ConfigError::UnknownFilter(name)) if name == "entropy"
        ));
        assert!(matches!(
            config.apply_override("energy.min", "low"),
            Err(ConfigError::InvalidOverride { .. })
        ));
        assert!(matches!(
            config.apply_override("energy.step", "1"),
            Err(ConfigError::InvalidOverride { .. })
        ));
        assert!(matches!(
            config.apply_override("options.skip", "-1"),
            Err(ConfigError::InvalidOverride { .. })
        ));
        assert_eq!(config, FilterConfig::default());
    }
}
