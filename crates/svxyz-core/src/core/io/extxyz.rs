use super::error::{ParseError, ParseErrorKind, WriteError};
use super::traits::{LineReader, PREALLOCATION_LIMIT, TrajectoryFile};
use crate::core::models::frame::{AtomColumn, ColumnKind, Frame};
use crate::core::models::voigt::Voigt;
use nalgebra::{Matrix3, Point3, Vector3};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufWriter, Write};
use std::iter::{FusedIterator, Peekable};
use std::path::Path;
use std::str::Chars;

/// Info keys recomputed from the frame on every write and dropped on read.
const DERIVED_KEYS: [&str; 2] = ["volume", "pressure"];

const DEFAULT_PROPERTIES: &str = "species:S:1:pos:R:3";

/// Source index of a frame, kept so that re-reading a filtered file sees the
/// same `frame` values.
const INDEX_KEY: &str = "frame_index";

/// Marks frames whose temperature and stress already include sidecar records.
const ENRICHED_KEY: &str = "sidecar";

pub struct ExtXyzFile;

impl TrajectoryFile for ExtXyzFile {
    type Reader<R: BufRead> = ExtXyzReader<R>;

    fn reader<R: BufRead>(reader: R) -> Self::Reader<R> {
        ExtXyzReader::new(reader)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ColumnSpec {
    name: String,
    kind: ColumnKind,
    width: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnRole {
    Species,
    Position,
    Force,
    Extra(usize),
}

#[derive(Debug, Default)]
struct Header {
    lattice: Option<Matrix3<f64>>,
    pbc: Option<[bool; 3]>,
    columns: Vec<ColumnSpec>,
    energy: Option<f64>,
    free_energy: Option<f64>,
    stress: Option<Voigt>,
    virial: Option<(Voigt, String)>,
    temperature: Option<f64>,
    index: Option<usize>,
    enriched: bool,
    extra: Vec<(String, String)>,
}

impl Header {
    fn parse(line: &str) -> Result<Self, ParseErrorKind> {
        let mut header = Header::default();
        let mut properties = None;

        for (key, value) in split_key_values(line)? {
            if key.is_empty() {
                continue;
            }
            let Some(value) = value else {
                header.extra.push((key, "T".to_string()));
                continue;
            };
            match key.to_ascii_lowercase().as_str() {
                "lattice" => {
                    let values = parse_floats("Lattice", &value, &[9])?;
                    header.lattice = Some(Matrix3::from_row_slice(&values));
                }
                "properties" => properties = Some(value),
                "pbc" => header.pbc = Some(parse_pbc(&value)?),
                "energy" => header.energy = Some(parse_float("energy", &value)?),
                "free_energy" => {
                    header.free_energy = Some(parse_float("free_energy", &value)?);
                    header.extra.push((key, value));
                }
                "stress" => header.stress = Some(parse_tensor("stress", &value)?),
                "virial" => {
                    let virial = parse_tensor("virial", &value)?;
                    header.virial = Some((virial, value));
                }
                "temperature" => {
                    header.temperature = Some(parse_float("temperature", &value)?)
                }
                INDEX_KEY => {
                    header.index = Some(value.parse().map_err(|_| ParseErrorKind::InvalidInteger {
                        field: INDEX_KEY.to_string(),
                        value: value.clone(),
                    })?)
                }
                ENRICHED_KEY => {
                    header.enriched =
                        parse_bool(&value).ok_or_else(|| ParseErrorKind::InvalidFlag {
                            field: ENRICHED_KEY.to_string(),
                            value: value.clone(),
                        })?
                }
                k if DERIVED_KEYS.contains(&k) => {}
                _ => header.extra.push((key, value)),
            }
        }

        header.columns = parse_properties(properties.as_deref().unwrap_or(DEFAULT_PROPERTIES))?;
        Ok(header)
    }
}

/// Splits an extended XYZ comment line into `key=value` pairs.
///
/// Values may be double-quoted (with `\"` escapes) or brace-delimited. A key with no
/// `=` is returned with `None`.
fn split_key_values(line: &str) -> Result<Vec<(String, Option<String>)>, ParseErrorKind> {
    let mut pairs = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        skip_whitespace(&mut chars);
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| !c.is_whitespace() && *c != '=') {
            key.push(c);
        }
        skip_whitespace(&mut chars);
        if chars.next_if_eq(&'=').is_none() {
            pairs.push((key, None));
            continue;
        }
        skip_whitespace(&mut chars);

        let value = match chars.peek() {
            Some('"') => {
                chars.next();
                read_delimited(&mut chars, '"', &key)?
            }
            Some('{') => {
                chars.next();
                read_delimited(&mut chars, '}', &key)?
            }
            _ => {
                let mut value = String::new();
                while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                    value.push(c);
                }
                value
            }
        };
        pairs.push((key, Some(value)));
    }

    Ok(pairs)
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.next_if(|c| c.is_whitespace()).is_some() {}
}

fn read_delimited(
    chars: &mut Peekable<Chars<'_>>,
    close: char,
    key: &str,
) -> Result<String, ParseErrorKind> {
    let mut value = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' if close == '"' => {
                if let Some(escaped) = chars.next() {
                    value.push(escaped);
                }
            }
            c if c == close => return Ok(value),
            c => value.push(c),
        }
    }
    Err(ParseErrorKind::UnterminatedValue(key.to_string()))
}

fn parse_float(field: &str, token: &str) -> Result<f64, ParseErrorKind> {
    token.parse().map_err(|_| ParseErrorKind::InvalidFloat {
        field: field.to_string(),
        value: token.to_string(),
    })
}

fn parse_floats(field: &str, value: &str, accepted: &[usize]) -> Result<Vec<f64>, ParseErrorKind> {
    let values = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(|t| parse_float(field, t))
        .collect::<Result<Vec<_>, _>>()?;
    if !accepted.contains(&values.len()) {
        return Err(ParseErrorKind::WrongValueCount {
            field: field.to_string(),
            expected: accepted
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(" or "),
            found: values.len(),
        });
    }
    Ok(values)
}

fn parse_tensor(field: &str, value: &str) -> Result<Voigt, ParseErrorKind> {
    let values = parse_floats(field, value, &[9, 6])?;
    Ok(if values.len() == 9 {
        Voigt::from_matrix(&Matrix3::from_row_slice(&values))
    } else {
        Voigt::new([
            values[0], values[1], values[2], values[3], values[4], values[5],
        ])
    })
}

fn parse_bool(token: &str) -> Option<bool> {
    match token.to_ascii_lowercase().as_str() {
        "t" | "true" | "1" => Some(true),
        "f" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_pbc(value: &str) -> Result<[bool; 3], ParseErrorKind> {
    let flags = value
        .split_whitespace()
        .map(|t| {
            parse_bool(t).ok_or_else(|| ParseErrorKind::InvalidFlag {
                field: "pbc".to_string(),
                value: t.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    match flags.as_slice() {
        [all] => Ok([*all; 3]),
        [a, b, c] => Ok([*a, *b, *c]),
        _ => Err(ParseErrorKind::WrongValueCount {
            field: "pbc".to_string(),
            expected: "1 or 3".to_string(),
            found: flags.len(),
        }),
    }
}

fn parse_properties(spec: &str) -> Result<Vec<ColumnSpec>, ParseErrorKind> {
    let malformed = || ParseErrorKind::MalformedProperties(spec.to_string());
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.is_empty() || parts.len() % 3 != 0 {
        return Err(malformed());
    }
    parts
        .chunks(3)
        .map(|chunk| {
            let kind = ColumnKind::from_code(chunk[1]).ok_or_else(malformed)?;
            let width: usize = chunk[2].parse().map_err(|_| malformed())?;
            if chunk[0].is_empty() || width == 0 {
                return Err(malformed());
            }
            Ok(ColumnSpec {
                name: chunk[0].to_string(),
                kind,
                width,
            })
        })
        .collect()
}

fn assign_roles(columns: &[ColumnSpec]) -> Result<Vec<ColumnRole>, ParseErrorKind> {
    let mut roles = Vec::with_capacity(columns.len());
    let mut extra = 0;
    for column in columns {
        let role = match (column.name.as_str(), column.kind, column.width) {
            ("species", ColumnKind::Str, 1) => ColumnRole::Species,
            ("pos", ColumnKind::Real, 3) => ColumnRole::Position,
            ("forces" | "force", ColumnKind::Real, 3) => ColumnRole::Force,
            ("species" | "pos", _, _) => {
                return Err(ParseErrorKind::MalformedProperties(format!(
                    "{}:{}:{}",
                    column.name,
                    column.kind.code(),
                    column.width
                )));
            }
            _ => {
                extra += 1;
                ColumnRole::Extra(extra - 1)
            }
        };
        roles.push(role);
    }
    if !roles.contains(&ColumnRole::Species) {
        return Err(ParseErrorKind::MissingColumn("species"));
    }
    if !roles.contains(&ColumnRole::Position) {
        return Err(ParseErrorKind::MissingColumn("pos"));
    }
    Ok(roles)
}

/// Lazy reader for (extended) XYZ trajectories.
pub struct ExtXyzReader<R> {
    lines: LineReader<R>,
    next_index: usize,
    done: bool,
}

impl<R: BufRead> ExtXyzReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: LineReader::new(reader),
            next_index: 0,
            done: false,
        }
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, ParseError> {
        let num_atoms = loop {
            match self.lines.next_line()? {
                None => return Ok(None),
                Some((_, line)) if line.trim().is_empty() => continue,
                Some((line_no, line)) => {
                    let count = line.trim();
                    break count.parse::<usize>().map_err(|_| {
                        ParseError::at(line_no, ParseErrorKind::InvalidAtomCount(count.into()))
                    })?;
                }
            }
        };

        let (comment_no, comment) = self.lines.expect_line("comment line")?;
        let header = Header::parse(comment).map_err(|kind| ParseError::at(comment_no, kind))?;
        let roles = assign_roles(&header.columns).map_err(|kind| ParseError::at(comment_no, kind))?;
        let total_width = header
            .columns
            .iter()
            .try_fold(0usize, |sum, c| sum.checked_add(c.width))
            .ok_or_else(|| {
                ParseError::at(
                    comment_no,
                    ParseErrorKind::MalformedProperties("column widths overflow".to_string()),
                )
            })?;

        let capacity = num_atoms.min(PREALLOCATION_LIMIT);
        let mut species = Vec::with_capacity(capacity);
        let mut positions = Vec::with_capacity(capacity);
        let mut forces = roles
            .contains(&ColumnRole::Force)
            .then(|| Vec::with_capacity(capacity));
        let mut extra_columns: Vec<AtomColumn> = header
            .columns
            .iter()
            .zip(&roles)
            .filter(|(_, role)| matches!(role, ColumnRole::Extra(_)))
            .map(|(spec, _)| AtomColumn {
                name: spec.name.clone(),
                kind: spec.kind,
                width: spec.width,
                values: Vec::with_capacity(
                    capacity.saturating_mul(spec.width).min(PREALLOCATION_LIMIT),
                ),
            })
            .collect();

        for _ in 0..num_atoms {
            let (line_no, line) = self.lines.expect_line("atom records")?;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != total_width {
                return Err(ParseError::at(
                    line_no,
                    ParseErrorKind::ColumnCountMismatch {
                        expected: total_width,
                        found: tokens.len(),
                    },
                ));
            }

            let mut offset = 0;
            for (spec, role) in header.columns.iter().zip(&roles) {
                let cells = &tokens[offset..offset + spec.width];
                offset += spec.width;
                match role {
                    ColumnRole::Species => species.push(cells[0].to_string()),
                    ColumnRole::Position => {
                        positions.push(Point3::from(parse_vector(&spec.name, cells, line_no)?))
                    }
                    ColumnRole::Force => {
                        if let Some(forces) = forces.as_mut() {
                            forces.push(parse_vector(&spec.name, cells, line_no)?);
                        }
                    }
                    ColumnRole::Extra(i) => extra_columns[*i]
                        .values
                        .extend(cells.iter().map(|c| c.to_string())),
                }
            }
        }

        let mut stress = header.stress;
        let mut extra_info = header.extra;
        if let Some((virial, raw)) = header.virial {
            match (stress, header.lattice) {
                (None, Some(cell)) => {
                    let volume = cell.determinant().abs();
                    stress = Some(-virial * (1.0 / volume));
                }
                _ => extra_info.push(("virial".to_string(), raw)),
            }
        }

        let index = header.index.unwrap_or(self.next_index);
        self.next_index += 1;

        Ok(Some(Frame {
            index,
            species,
            positions,
            cell: header.lattice,
            pbc: header
                .pbc
                .unwrap_or([header.lattice.is_some(); 3]),
            energy: header.energy.or(header.free_energy),
            forces,
            stress,
            temperature: header.temperature,
            enriched: header.enriched,
            extra_columns,
            extra_info,
        }))
    }
}

fn parse_vector(field: &str, cells: &[&str], line_no: usize) -> Result<Vector3<f64>, ParseError> {
    let mut v = Vector3::zeros();
    for (i, cell) in cells.iter().enumerate() {
        v[i] = parse_float(field, cell).map_err(|kind| ParseError::at(line_no, kind))?;
    }
    Ok(v)
}

impl<R: BufRead> Iterator for ExtXyzReader<R> {
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

impl<R: BufRead> FusedIterator for ExtXyzReader<R> {}

/// Streams frames to an extended XYZ destination.
pub struct FrameWriter<W: Write> {
    writer: W,
    frames_written: usize,
}

impl FrameWriter<BufWriter<File>> {
    /// Creates the output file, or appends to it when `append` is set.
    pub fn create<P: AsRef<Path>>(path: P, append: bool) -> Result<Self, WriteError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .map_err(|source| WriteError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), WriteError> {
        write_extxyz(frame, &mut self.writer).map_err(|source| WriteError::Frame {
            index: frame.index,
            source,
        })?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), WriteError> {
        self.writer.flush().map_err(WriteError::Flush)
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W, WriteError> {
        self.flush()?;
        Ok(self.writer)
    }
}

fn join_numbers(values: impl IntoIterator<Item = f64>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_info_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.starts_with('{')
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '=' || c == '"');
    if needs_quotes {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

fn write_extxyz(frame: &Frame, w: &mut impl Write) -> io::Result<()> {
    writeln!(w, "{}", frame.num_atoms())?;

    let mut fields = Vec::new();
    if let Some(cell) = &frame.cell {
        let rows = (0..3).flat_map(|r| (0..3).map(move |c| cell[(r, c)]));
        fields.push(format!("Lattice=\"{}\"", join_numbers(rows)));
    }

    let mut properties = String::from(DEFAULT_PROPERTIES);
    if frame.forces.is_some() {
        properties.push_str(":forces:R:3");
    }
    for column in &frame.extra_columns {
        properties.push_str(&format!(
            ":{}:{}:{}",
            column.name,
            column.kind.code(),
            column.width
        ));
    }
    fields.push(format!("Properties={}", properties));
    fields.push(format!("{}={}", INDEX_KEY, frame.index));

    if let Some(energy) = frame.energy {
        fields.push(format!("energy={}", energy));
    }
    if let Some(stress) = &frame.stress {
        let m = stress.to_matrix();
        let rows = (0..3).flat_map(|r| (0..3).map(move |c| m[(r, c)]));
        fields.push(format!("stress=\"{}\"", join_numbers(rows)));
    }
    if let Some(temperature) = frame.temperature {
        fields.push(format!("temperature={}", temperature));
    }
    if frame.enriched {
        fields.push(format!("{}=T", ENRICHED_KEY));
    }
    if let Some(volume) = frame.volume() {
        fields.push(format!("volume={}", volume));
    }
    if let Some(pressure) = frame.pressure() {
        fields.push(format!("pressure={}", pressure));
    }
    for (key, value) in &frame.extra_info {
        fields.push(format!("{}={}", key, format_info_value(value)));
    }
    if frame.cell.is_some() || frame.pbc.iter().any(|&p| p) {
        let flags: Vec<&str> = frame
            .pbc
            .iter()
            .map(|&p| if p { "T" } else { "F" })
            .collect();
        fields.push(format!("pbc=\"{}\"", flags.join(" ")));
    }
    writeln!(w, "{}", fields.join(" "))?;

    for atom in 0..frame.num_atoms() {
        let p = frame.positions[atom];
        let symbol = frame.species.get(atom).map_or("X", |s| s.as_str());
        write!(w, "{:<3}{:>22} {:>22} {:>22}", symbol, p.x, p.y, p.z)?;
        if let Some(f) = frame.forces.as_ref().and_then(|f| f.get(atom)) {
            write!(w, " {:>22} {:>22} {:>22}", f.x, f.y, f.z)?;
        }
        for column in &frame.extra_columns {
            for value in column.atom_values(atom) {
                write!(w, " {}", value)?;
            }
        }
        writeln!(w)?;
    }
    Ok(())
}
