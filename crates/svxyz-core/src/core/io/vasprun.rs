use super::error::{ParseError, ParseErrorKind};
use super::traits::TrajectoryFile;
use crate::core::models::frame::Frame;
use crate::core::models::voigt::{EV_A3_TO_GPA, KBAR_TO_GPA, Voigt};
use nalgebra::{Matrix3, Point3, Vector3};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::io::BufRead;
use std::iter::FusedIterator;
use tracing::warn;

/// VASP `vasprun.xml`, read-only.
pub struct VasprunFile;

impl TrajectoryFile for VasprunFile {
    type Reader<R: BufRead> = VasprunReader<R>;

    fn reader<R: BufRead>(reader: R) -> Self::Reader<R> {
        VasprunReader::new(reader)
    }
}

/// One XML event reduced to what the reader needs, detached from the read buffer.
enum Tag {
    Open { name: String, label: Option<String> },
    Close(String),
    Text(String),
    Eof,
    Other,
}

/// Data gathered inside one `<calculation>` element.
#[derive(Debug, Default)]
struct Step {
    basis: Vec<[f64; 3]>,
    /// Fractional coordinates.
    positions: Vec<[f64; 3]>,
    forces: Vec<[f64; 3]>,
    /// Rows of the stress tensor in kBar.
    stress: Vec<[f64; 3]>,
    e_0_energy: Option<f64>,
    e_wo_entrp: Option<f64>,
    e_fr_energy: Option<f64>,
}

/// Lazy reader yielding one frame per `<calculation>` of a `vasprun.xml`.
///
/// Species come from the `atominfo` block. Each calculation contributes its
/// crystal basis, fractional positions, forces, stress (kBar) and the
/// `e_0_energy`, `e_wo_entrp` and `e_fr_energy` totals; self-consistency
/// steps are ignored.
pub struct VasprunReader<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    /// Names of the currently open elements, outermost first.
    path: Vec<String>,
    /// `name` attribute of the innermost open `array`, `varray` and `i`.
    array: Option<String>,
    varray: Option<String>,
    item: Option<String>,
    /// Column of the current `<c>` within its `<rc>` row.
    column: usize,
    species: Vec<String>,
    step: Step,
    next_index: usize,
    done: bool,
}

fn markup_error(position: u64, message: impl ToString) -> ParseError {
    ParseError::Markup {
        position,
        kind: ParseErrorKind::MalformedXml(message.to_string()),
    }
}

fn element_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

fn name_attribute(element: &BytesStart<'_>, position: u64) -> Result<Option<String>, ParseError> {
    let Some(attribute) = element
        .try_get_attribute("name")
        .map_err(|e| markup_error(position, e))?
    else {
        return Ok(None);
    };
    let value = attribute
        .unescape_value()
        .map_err(|e| markup_error(position, e))?;
    Ok(Some(value.trim().to_string()))
}

fn parse_triplet(field: &str, text: &str) -> Result<[f64; 3], ParseErrorKind> {
    let values = text
        .split_whitespace()
        .map(|t| {
            t.parse::<f64>().map_err(|_| ParseErrorKind::InvalidFloat {
                field: field.to_string(),
                value: t.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    values
        .as_slice()
        .try_into()
        .map_err(|_| ParseErrorKind::WrongValueCount {
            field: field.to_string(),
            expected: "3".to_string(),
            found: values.len(),
        })
}

fn rows_to_matrix(rows: &[[f64; 3]]) -> Option<Matrix3<f64>> {
    let rows: &[[f64; 3]; 3] = rows.try_into().ok()?;
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Some(Matrix3::from_row_slice(&flat))
}

impl<R: BufRead> VasprunReader<R> {
    pub fn new(reader: R) -> Self {
        let mut reader = Reader::from_reader(reader);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            path: Vec::new(),
            array: None,
            varray: None,
            item: None,
            column: 0,
            species: Vec::new(),
            step: Step::default(),
            next_index: 0,
            done: false,
        }
    }

    fn position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    fn next_tag(&mut self) -> Result<Tag, ParseError> {
        self.buf.clear();
        let position = Self::position(self);
        let event = self
            .reader
            .read_event_into(&mut self.buf)
            .map_err(|e| markup_error(position, e))?;
        Ok(match event {
            Event::Start(e) => Tag::Open {
                name: element_name(e.local_name().as_ref()),
                label: name_attribute(&e, position)?,
            },
            Event::End(e) => Tag::Close(element_name(e.local_name().as_ref())),
            Event::Text(e) => Tag::Text(
                e.unescape()
                    .map_err(|e| markup_error(position, e))?
                    .into_owned(),
            ),
            Event::Eof => Tag::Eof,
            _ => Tag::Other,
        })
    }

    /// Whether the innermost open elements are exactly `tail`.
    fn in_context(&self, tail: &[&str]) -> bool {
        self.path.len() >= tail.len()
            && self.path[self.path.len() - tail.len()..]
                .iter()
                .zip(tail)
                .all(|(open, name)| open == name)
    }

    fn inside(&self, name: &str) -> bool {
        self.path.iter().any(|open| open == name)
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, ParseError> {
        loop {
            match self.next_tag()? {
                Tag::Open { name, label } => {
                    match name.as_str() {
                        "calculation" => self.step = Step::default(),
                        "array" => self.array = label,
                        "varray" => self.varray = label,
                        "i" => self.item = label,
                        "rc" => self.column = 0,
                        _ => {}
                    }
                    self.path.push(name);
                }
                Tag::Close(name) => {
                    self.path.pop();
                    match name.as_str() {
                        "calculation" => return self.finish_step().map(Some),
                        "array" => self.array = None,
                        "varray" => self.varray = None,
                        "i" => self.item = None,
                        "c" => self.column += 1,
                        _ => {}
                    }
                }
                Tag::Text(text) => {
                    let position = Self::position(self);
                    self.on_text(&text)
                        .map_err(|kind| ParseError::Markup { position, kind })?;
                }
                Tag::Eof => {
                    if self.inside("calculation") {
                        warn!(
                            "vasprun.xml ends inside calculation {}; the incomplete step was dropped.",
                            self.next_index
                        );
                    }
                    return Ok(None);
                }
                Tag::Other => {}
            }
        }
    }

    fn on_text(&mut self, text: &str) -> Result<(), ParseErrorKind> {
        if self.in_context(&["rc", "c"])
            && self.column == 0
            && self.array.as_deref() == Some("atoms")
            && self.inside("atominfo")
        {
            self.species.push(text.trim().to_string());
        } else if self.in_context(&["varray", "v"]) && self.inside("calculation") {
            let Some(name) = self.varray.as_deref() else {
                return Ok(());
            };
            let rows = match name {
                "basis" => &mut self.step.basis,
                "positions" => &mut self.step.positions,
                "forces" => &mut self.step.forces,
                "stress" => &mut self.step.stress,
                _ => return Ok(()),
            };
            rows.push(parse_triplet(name, text)?);
        } else if self.in_context(&["calculation", "energy", "i"]) {
            let slot = match self.item.as_deref() {
                Some("e_0_energy") => &mut self.step.e_0_energy,
                Some("e_wo_entrp") => &mut self.step.e_wo_entrp,
                Some("e_fr_energy") => &mut self.step.e_fr_energy,
                _ => return Ok(()),
            };
            let value = text.trim();
            *slot = Some(value.parse().map_err(|_| ParseErrorKind::InvalidFloat {
                field: "energy".to_string(),
                value: value.to_string(),
            })?);
        }
        Ok(())
    }

    fn finish_step(&mut self) -> Result<Frame, ParseError> {
        let position = Self::position(self);
        let fail = |kind| ParseError::Markup { position, kind };
        let step = std::mem::take(&mut self.step);

        if self.species.is_empty() {
            return Err(fail(ParseErrorKind::MissingHeader("atominfo")));
        }
        let cell = rows_to_matrix(&step.basis)
            .ok_or_else(|| fail(ParseErrorKind::MissingHeader("crystal basis")))?;
        let expected = self.species.len();
        for (field, found) in [
            ("positions", step.positions.len()),
            ("forces", step.forces.len()),
        ] {
            if found != expected && !(field == "forces" && found == 0) {
                return Err(fail(ParseErrorKind::AtomCountMismatch {
                    field,
                    expected,
                    found,
                }));
            }
        }

        let to_cartesian = cell.transpose();
        let positions = step
            .positions
            .iter()
            .map(|f| Point3::from(to_cartesian * Vector3::from(*f)))
            .collect();
        let forces = (!step.forces.is_empty())
            .then(|| step.forces.iter().map(|f| Vector3::from(*f)).collect());
        let stress = rows_to_matrix(&step.stress)
            .map(|kbar| Voigt::from_matrix(&kbar) * (-KBAR_TO_GPA / EV_A3_TO_GPA));

        let index = self.next_index;
        self.next_index += 1;
        Ok(Frame {
            index,
            species: self.species.clone(),
            positions,
            cell: Some(cell),
            pbc: [true; 3],
            energy: step.e_0_energy.or(step.e_wo_entrp).or(step.e_fr_energy),
            forces,
            stress,
            temperature: None,
            enriched: false,
            extra_columns: Vec::new(),
            extra_info: step
                .e_fr_energy
                .map(|f| vec![("free_energy".to_string(), f.to_string())])
                .unwrap_or_default(),
        })
    }
}

impl<R: BufRead> Iterator for VasprunReader<R> {
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

impl<R: BufRead> FusedIterator for VasprunReader<R> {}
