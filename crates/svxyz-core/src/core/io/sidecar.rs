//! Per-frame temperature and stress records stored next to a trajectory.
//!
//! Molecular-dynamics runs often leave thermodynamic data in small text files beside
//! the main output. When present they override the values carried by the frames.

use super::error::ParseError;
use crate::core::models::frame::Frame;
use crate::core::models::voigt::{EV_A3_TO_GPA, KBAR_TO_GPA, Voigt};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const TEMPERATURE_FILE: &str = "TB.dat";
pub const STRESS_FILE: &str = "ST.dat";
pub const OUTCAR_FILE: &str = "OUTCAR";

/// Temperatures (K) and stresses (GPa, compressive positive) indexed by frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sidecar {
    pub temperatures: Vec<f64>,
    pub stresses_gpa: Vec<Voigt>,
}

fn open_if_exists(path: &Path) -> Result<Option<BufReader<File>>, ParseError> {
    if !path.is_file() {
        return Ok(None);
    }
    Ok(Some(BufReader::new(File::open(path)?)))
}

/// First run of digits and dots on the line, e.g. `300.5` in `step 12: 300.5 K`.
fn first_unsigned_number(line: &str) -> Option<f64> {
    let start = line.find(|c: char| c.is_ascii_digit() || c == '.')?;
    let rest = &line[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

fn six_after_label(line: &str) -> Option<[f64; 6]> {
    let values: Vec<f64> = line
        .split_whitespace()
        .skip(1)
        .take(6)
        .map(|t| t.parse().ok())
        .collect::<Option<_>>()?;
    values.try_into().ok()
}

impl Sidecar {
    /// Loads whatever sidecar files exist in the directory of `input`.
    ///
    /// Temperatures come from `TB.dat`, falling back to OUTCAR MD lines; stresses come
    /// from `ST.dat` when it exists, otherwise from OUTCAR `Total+kin.` lines.
    pub fn discover(input: &Path) -> Result<Self, ParseError> {
        let dir = input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let mut temperatures = match open_if_exists(&dir.join(TEMPERATURE_FILE))? {
            Some(reader) => Self::temperatures_from_table(reader)?,
            None => Vec::new(),
        };
        if temperatures.is_empty() {
            if let Some(reader) = open_if_exists(&dir.join(OUTCAR_FILE))? {
                temperatures = Self::temperatures_from_outcar(reader)?;
            }
        }

        let stresses_gpa = if let Some(reader) = open_if_exists(&dir.join(STRESS_FILE))? {
            Self::stresses_from_table(reader)?
        } else if let Some(reader) = open_if_exists(&dir.join(OUTCAR_FILE))? {
            Self::stresses_from_outcar(reader)?
        } else {
            Vec::new()
        };

        debug!(
            "Sidecar data in {:?}: {} temperatures, {} stresses.",
            dir,
            temperatures.len(),
            stresses_gpa.len()
        );
        Ok(Self {
            temperatures,
            stresses_gpa,
        })
    }

    /// One temperature per line; lines without a number are skipped.
    pub fn temperatures_from_table(reader: impl BufRead) -> Result<Vec<f64>, ParseError> {
        let mut temperatures = Vec::new();
        for line in reader.lines() {
            if let Some(t) = first_unsigned_number(&line?) {
                temperatures.push(t);
            }
        }
        Ok(temperatures)
    }

    /// Temperatures from `kin. lattice  EKIN_LAT= ... (temperature  X K)` lines.
    pub fn temperatures_from_outcar(reader: impl BufRead) -> Result<Vec<f64>, ParseError> {
        let mut temperatures = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !(line.contains("kin. lattice") && line.contains("EKIN_LAT=")) {
                continue;
            }
            if let Some((_, rest)) = line.split_once("(temperature") {
                if let Some(t) = first_unsigned_number(rest) {
                    temperatures.push(t);
                }
            }
        }
        Ok(temperatures)
    }

    /// `ST.dat` rows: a leading label then `XX YY ZZ XY YZ ZX` in GPa.
    pub fn stresses_from_table(reader: impl BufRead) -> Result<Vec<Voigt>, ParseError> {
        let mut stresses = Vec::new();
        for line in reader.lines() {
            if let Some(values) = six_after_label(&line?) {
                stresses.push(Voigt::from_vasp_order(values));
            }
        }
        Ok(stresses)
    }

    /// OUTCAR `Total+kin.` rows in kBar, converted to GPa.
    pub fn stresses_from_outcar(reader: impl BufRead) -> Result<Vec<Voigt>, ParseError> {
        let mut stresses = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.contains("Total+kin.") {
                continue;
            }
            if let Some(values) = six_after_label(&line) {
                stresses.push(Voigt::from_vasp_order(values) * KBAR_TO_GPA);
            }
        }
        Ok(stresses)
    }

    pub fn is_empty(&self) -> bool {
        self.temperatures.is_empty() && self.stresses_gpa.is_empty()
    }

    /// Overrides the frame's temperature and stress with the records at its index.
    ///
    /// Frames that were enriched before being written (and are now read back) are
    /// returned unchanged.
    pub fn apply(&self, mut frame: Frame) -> Frame {
        if frame.enriched {
            return frame;
        }
        if let Some(&t) = self.temperatures.get(frame.index) {
            frame.temperature = Some(t);
            frame.enriched = true;
        }
        if let Some(&s) = self.stresses_gpa.get(frame.index) {
            frame.stress = Some(-s * (1.0 / EV_A3_TO_GPA));
            frame.enriched = true;
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;

    const TOLERANCE: f64 = 1e-9;

    const OUTCAR_MD: &str = "\
  Total+kin.    10.00000    20.00000    30.00000     1.00000     2.00000     3.00000
  kin. lattice  EKIN_LAT=           0.000000  (temperature  512.34 K)
  Total+kin.    11.00000    21.00000    31.00000     1.00000     2.00000     3.00000
  kin. lattice  EKIN_LAT=           0.000000  (temperature  498.70 K)
";

    #[test]
    fn table_temperatures_take_first_number_per_line() {
        let temps =
            Sidecar::temperatures_from_table(Cursor::new("300.0\n# header\n  305.5 K\n")).unwrap();
        assert_eq!(temps, vec![300.0, 305.5]);
    }

    #[test]
    fn outcar_temperatures_come_from_md_lines() {
        let temps = Sidecar::temperatures_from_outcar(Cursor::new(OUTCAR_MD)).unwrap();
        assert_eq!(temps, vec![512.34, 498.70]);
    }

    #[test]
    fn table_stresses_are_reordered_to_voigt() {
        let stresses = Sidecar::stresses_from_table(Cursor::new(
            "1 1.0 2.0 3.0 4.0 5.0 6.0\nbad line\n2 1.0 2.0 x 4.0 5.0 6.0\n",
        ))
        .unwrap();
        assert_eq!(stresses, vec![Voigt::new([1.0, 2.0, 3.0, 5.0, 6.0, 4.0])]);
    }

    #[test]
    fn outcar_stresses_are_converted_from_kbar() {
        let stresses = Sidecar::stresses_from_outcar(Cursor::new(OUTCAR_MD)).unwrap();
        assert_eq!(stresses.len(), 2);
        assert!((stresses[0].0[0] - 1.0).abs() < TOLERANCE);
        assert!((stresses[1].0[2] - 3.1).abs() < TOLERANCE);
        assert!((stresses[0].0[5] - 0.1).abs() < TOLERANCE);
    }

    #[test]
    fn apply_overrides_frame_values_by_index() {
        let sidecar = Sidecar {
            temperatures: vec![300.0, 310.0],
            stresses_gpa: vec![Voigt::new([1.0, 1.0, 1.0, 0.0, 0.0, 0.0])],
        };

        let first = sidecar.apply(Frame {
            index: 0,
            ..Default::default()
        });
        assert_eq!(first.temperature, Some(300.0));
        assert!((first.pressure().unwrap() - 1.0).abs() < TOLERANCE);

        let second = sidecar.apply(Frame {
            index: 1,
            stress: Some(Voigt::default()),
            ..Default::default()
        });
        assert_eq!(second.temperature, Some(310.0));
        assert_eq!(second.stress, Some(Voigt::default()));

        let third = sidecar.apply(Frame {
            index: 2,
            temperature: Some(1.0),
            ..Default::default()
        });
        assert_eq!(third.temperature, Some(1.0));
        assert!(first.enriched && second.enriched);
        assert!(!third.enriched);
    }

    #[test]
    fn enriched_frames_are_left_alone() {
        let sidecar = Sidecar {
            temperatures: vec![900.0],
            stresses_gpa: vec![Voigt::new([1.0, 1.0, 1.0, 0.0, 0.0, 0.0])],
        };
        let frame = Frame {
            index: 0,
            temperature: Some(300.0),
            enriched: true,
            ..Default::default()
        };
        assert_eq!(sidecar.apply(frame.clone()), frame);
    }

    #[test]
    fn discover_prefers_tb_and_st_files_over_outcar() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(TEMPERATURE_FILE), "250\n").unwrap();
        fs::write(dir.path().join(STRESS_FILE), "1 5 5 5 0 0 0\n").unwrap();
        fs::write(dir.path().join(OUTCAR_FILE), OUTCAR_MD).unwrap();

        let sidecar = Sidecar::discover(&dir.path().join("train.xyz")).unwrap();
        assert_eq!(sidecar.temperatures, vec![250.0]);
        assert_eq!(
            sidecar.stresses_gpa,
            vec![Voigt::new([5.0, 5.0, 5.0, 0.0, 0.0, 0.0])]
        );
    }

    #[test]
    fn discover_falls_back_to_outcar() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(OUTCAR_FILE), OUTCAR_MD).unwrap();

        let sidecar = Sidecar::discover(&dir.path().join("OUTCAR")).unwrap();
        assert_eq!(sidecar.temperatures.len(), 2);
        assert_eq!(sidecar.stresses_gpa.len(), 2);
    }

    #[test]
    fn discover_in_empty_directory_is_empty() {
        let dir = tempdir().unwrap();
        let sidecar = Sidecar::discover(&dir.path().join("train.xyz")).unwrap();
        assert!(sidecar.is_empty());
    }
}
