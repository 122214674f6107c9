use super::error::{ParseError, ParseErrorKind};
use super::traits::{LineReader, PREALLOCATION_LIMIT, TrajectoryFile};
use crate::core::models::frame::Frame;
use crate::core::models::voigt::{EV_A3_TO_GPA, KBAR_TO_GPA, Voigt};
use nalgebra::{Matrix3, Point3, Vector3};
use std::io::BufRead;
use std::iter::FusedIterator;
use tracing::warn;

/// VASP OUTCAR, read-only.
pub struct OutcarFile;

impl TrajectoryFile for OutcarFile {
    type Reader<R: BufRead> = OutcarReader<R>;

    fn reader<R: BufRead>(reader: R) -> Self::Reader<R> {
        OutcarReader::new(reader)
    }
}

/// Lazy reader yielding one frame per completed ionic step of an OUTCAR.
///
/// Each step contributes the most recent lattice, the `in kB` stress, the
/// `POSITION/TOTAL-FORCE` block and the final energies; the frame is emitted
/// when the `energy  without entropy` line closes the step.
pub struct OutcarReader<R> {
    lines: LineReader<R>,
    titles: Vec<String>,
    /// `(symbol, count)` runs from `ions per type`, expanded once a step is complete.
    species: Vec<(String, usize)>,
    num_atoms: usize,
    cell: Option<Matrix3<f64>>,
    stress: Option<Voigt>,
    atoms: Option<(Vec<Point3<f64>>, Vec<Vector3<f64>>)>,
    free_energy: Option<f64>,
    next_index: usize,
    done: bool,
}

fn parse_numbers(
    field: &str,
    text: &str,
    count: usize,
    line_no: usize,
) -> Result<Vec<f64>, ParseError> {
    let values = text
        .split_whitespace()
        .take(count)
        .map(|t| {
            t.parse::<f64>().map_err(|_| {
                ParseError::at(
                    line_no,
                    ParseErrorKind::InvalidFloat {
                        field: field.to_string(),
                        value: t.to_string(),
                    },
                )
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() != count {
        return Err(ParseError::at(
            line_no,
            ParseErrorKind::WrongValueCount {
                field: field.to_string(),
                expected: count.to_string(),
                found: values.len(),
            },
        ));
    }
    Ok(values)
}

/// Element symbol from a `TITEL  = PAW_PBE Fe_pv 02Aug2007` line.
fn parse_titel(line: &str) -> String {
    let rhs = line.split_once('=').map_or(line, |(_, rhs)| rhs);
    let tokens: Vec<&str> = rhs.split_whitespace().collect();
    let label = tokens.get(1).or(tokens.first()).copied().unwrap_or("X");
    label.split(['_', '.']).next().unwrap_or(label).to_string()
}

impl<R: BufRead> OutcarReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: LineReader::new(reader),
            titles: Vec::new(),
            species: Vec::new(),
            num_atoms: 0,
            cell: None,
            stress: None,
            atoms: None,
            free_energy: None,
            next_index: 0,
            done: false,
        }
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, ParseError> {
        loop {
            let Some((line_no, line)) = self.lines.next_line()? else {
                if self.atoms.is_some() {
                    warn!(
                        "OUTCAR ends inside ionic step {} before its final energy; the incomplete step was dropped.",
                        self.next_index
                    );
                }
                return Ok(None);
            };

            if line.contains("TITEL") {
                self.titles.push(parse_titel(line));
            } else if line.contains("ions per type") {
                let counts = line
                    .split_once('=')
                    .map_or("", |(_, rhs)| rhs)
                    .split_whitespace()
                    .map(|t| {
                        t.parse::<usize>().map_err(|_| {
                            ParseError::at(line_no, ParseErrorKind::InvalidAtomCount(t.into()))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if counts.len() != self.titles.len() {
                    return Err(ParseError::at(
                        line_no,
                        ParseErrorKind::InconsistentSpecies {
                            titles: self.titles.len(),
                            counts: counts.len(),
                        },
                    ));
                }
                self.num_atoms = counts
                    .iter()
                    .try_fold(0usize, |sum, &n| sum.checked_add(n))
                    .ok_or_else(|| {
                        ParseError::at(line_no, ParseErrorKind::InvalidAtomCount(line.trim().into()))
                    })?;
                self.species = self.titles.iter().cloned().zip(counts).collect();
            } else if line.contains("direct lattice vectors") {
                self.cell = Some(self.read_cell()?);
            } else if let Some(rest) = line.trim_start().strip_prefix("in kB") {
                let values = parse_numbers("in kB", rest, 6, line_no)?;
                let kbar = Voigt::from_vasp_order([
                    values[0], values[1], values[2], values[3], values[4], values[5],
                ]);
                self.stress = Some(kbar * (-KBAR_TO_GPA / EV_A3_TO_GPA));
            } else if line.contains("POSITION") && line.contains("TOTAL-FORCE") {
                if self.species.is_empty() {
                    return Err(ParseError::at(
                        line_no,
                        ParseErrorKind::MissingHeader("ions per type"),
                    ));
                }
                self.atoms = Some(self.read_positions_and_forces()?);
            } else if line.contains("free  energy   TOTEN") {
                let tokens: Vec<&str> = line.split_whitespace().collect();
                let value = tokens.len().checked_sub(2).map_or("", |i| tokens[i]);
                self.free_energy = Some(parse_numbers("TOTEN", value, 1, line_no)?[0]);
            } else if line.contains("energy  without entropy") {
                let value = line.split_whitespace().last().unwrap_or("");
                let energy = parse_numbers("energy(sigma->0)", value, 1, line_no)?[0];
                if let Some((positions, forces)) = self.atoms.take() {
                    return Ok(Some(self.finish_step(energy, positions, forces)));
                }
            }
        }
    }

    fn read_cell(&mut self) -> Result<Matrix3<f64>, ParseError> {
        let mut rows = [0.0; 9];
        for r in 0..3 {
            let (line_no, line) = self.lines.expect_line("direct lattice vectors")?;
            let values = parse_numbers("lattice vector", line, 3, line_no)?;
            rows[r * 3..r * 3 + 3].copy_from_slice(&values);
        }
        Ok(Matrix3::from_row_slice(&rows))
    }

    fn read_positions_and_forces(
        &mut self,
    ) -> Result<(Vec<Point3<f64>>, Vec<Vector3<f64>>), ParseError> {
        self.lines.expect_line("POSITION block separator")?;
        let n = self.num_atoms;
        let mut positions = Vec::with_capacity(n.min(PREALLOCATION_LIMIT));
        let mut forces = Vec::with_capacity(n.min(PREALLOCATION_LIMIT));
        for _ in 0..n {
            let (line_no, line) = self.lines.expect_line("POSITION block")?;
            let v = parse_numbers("POSITION/TOTAL-FORCE", line, 6, line_no)?;
            positions.push(Point3::new(v[0], v[1], v[2]));
            forces.push(Vector3::new(v[3], v[4], v[5]));
        }
        Ok((positions, forces))
    }

    fn finish_step(
        &mut self,
        energy: f64,
        positions: Vec<Point3<f64>>,
        forces: Vec<Vector3<f64>>,
    ) -> Frame {
        let index = self.next_index;
        self.next_index += 1;
        Frame {
            index,
            species: self
                .species
                .iter()
                .flat_map(|(symbol, n)| std::iter::repeat_n(symbol.clone(), *n))
                .collect(),
            positions,
            cell: self.cell,
            pbc: [true; 3],
            energy: Some(energy),
            forces: Some(forces),
            stress: self.stress.take(),
            temperature: None,
            enriched: false,
            extra_columns: Vec::new(),
            extra_info: self
                .free_energy
                .take()
                .map(|f| vec![("free_energy".to_string(), f.to_string())])
                .unwrap_or_default(),
        }
    }
}

impl<R: BufRead> Iterator for OutcarReader<R> {
    type Item = Result<Frame, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> FusedIterator for OutcarReader<R> {}
