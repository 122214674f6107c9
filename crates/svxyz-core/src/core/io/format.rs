use super::error::ParseError;
use super::extxyz::ExtXyzFile;
use super::outcar::OutcarFile;
use super::traits::TrajectoryFile;
use super::vasprun::VasprunFile;
use crate::core::models::frame::Frame;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// A boxed lazy frame source, independent of the on-disk format.
pub type FrameReader = Box<dyn Iterator<Item = Result<Frame, ParseError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrajectoryFormat {
    /// Extended (or plain) XYZ.
    ExtXyz,
    /// VASP OUTCAR.
    VaspOut,
    /// VASP `vasprun.xml`.
    VaspXml,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown trajectory format '{0}'. Expected 'extxyz', 'vasp-out' or 'vasp-xml'.")]
pub struct UnknownFormat(pub String);

impl TrajectoryFormat {
    pub fn name(self) -> &'static str {
        match self {
            Self::ExtXyz => "extxyz",
            Self::VaspOut => "vasp-out",
            Self::VaspXml => "vasp-xml",
        }
    }

    /// Guesses the format from the file name: `OUTCAR*` is VASP output, `*.xml` and
    /// `vasprun*` are VASP XML, anything else XYZ.
    pub fn infer(path: &Path) -> Self {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if name.starts_with("outcar") {
            Self::VaspOut
        } else if name.starts_with("vasprun") || name.ends_with(".xml") {
            Self::VaspXml
        } else {
            Self::ExtXyz
        }
    }

    pub fn open(self, path: &Path) -> Result<FrameReader, ParseError> {
        Ok(match self {
            Self::ExtXyz => Box::new(ExtXyzFile::open(path)?),
            Self::VaspOut => Box::new(OutcarFile::open(path)?),
            Self::VaspXml => Box::new(VasprunFile::open(path)?),
        })
    }
}

impl FromStr for TrajectoryFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "extxyz" | "xyz" => Ok(Self::ExtXyz),
            "vasp-out" | "outcar" => Ok(Self::VaspOut),
            "vasp-xml" | "vasprun" | "xml" => Ok(Self::VaspXml),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for TrajectoryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opens `path` with the given format, or the one inferred from its name.
pub fn open_frames(
    path: &Path,
    format: Option<TrajectoryFormat>,
) -> Result<(TrajectoryFormat, FrameReader), ParseError> {
    let format = format.unwrap_or_else(|| TrajectoryFormat::infer(path));
    Ok((format, format.open(path)?))
}
