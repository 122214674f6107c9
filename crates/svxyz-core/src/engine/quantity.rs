use crate::core::models::frame::Frame;
use crate::core::models::voigt::Component;
use phf::phf_map;
use std::fmt;

/// A per-frame observable that a filter can bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Quantity {
    /// 0-based frame index within the file the frame was first read from.
    Frame,
    /// Potential energy (eV).
    Energy,
    /// Largest per-atom force magnitude (eV/Å).
    MaxForce,
    /// Cell volume (Å³).
    Volume,
    /// Hydrostatic pressure (GPa).
    Pressure,
    /// Temperature (K).
    Temperature,
    /// One stress component (GPa, compressive positive).
    Stress(Component),
    /// One virial component (eV).
    Virial(Component),
}

static SCALAR_NAMES: phf::Map<&'static str, Quantity> = phf_map! {
    "frame" => Quantity::Frame,
    "energy" => Quantity::Energy,
    "max_force" => Quantity::MaxForce,
    "volume" => Quantity::Volume,
    "pressure" => Quantity::Pressure,
    "temperature" => Quantity::Temperature,
};

impl Quantity {
    /// Every filterable quantity, in configuration-file order.
    pub const ALL: [Quantity; 18] = [
        Quantity::Frame,
        Quantity::Energy,
        Quantity::MaxForce,
        Quantity::Volume,
        Quantity::Pressure,
        Quantity::Temperature,
        Quantity::Stress(Component::Xx),
        Quantity::Stress(Component::Yy),
        Quantity::Stress(Component::Zz),
        Quantity::Stress(Component::Yz),
        Quantity::Stress(Component::Xz),
        Quantity::Stress(Component::Xy),
        Quantity::Virial(Component::Xx),
        Quantity::Virial(Component::Yy),
        Quantity::Virial(Component::Zz),
        Quantity::Virial(Component::Yz),
        Quantity::Virial(Component::Xz),
        Quantity::Virial(Component::Xy),
    ];

    /// The key used for this quantity in the configuration file.
    pub fn name(self) -> &'static str {
        match self {
            Quantity::Frame => "frame",
            Quantity::Energy => "energy",
            Quantity::MaxForce => "max_force",
            Quantity::Volume => "volume",
            Quantity::Pressure => "pressure",
            Quantity::Temperature => "temperature",
            Quantity::Stress(Component::Xx) => "stress_xx",
            Quantity::Stress(Component::Yy) => "stress_yy",
            Quantity::Stress(Component::Zz) => "stress_zz",
            Quantity::Stress(Component::Yz) => "stress_yz",
            Quantity::Stress(Component::Xz) => "stress_xz",
            Quantity::Stress(Component::Xy) => "stress_xy",
            Quantity::Virial(Component::Xx) => "virial_xx",
            Quantity::Virial(Component::Yy) => "virial_yy",
            Quantity::Virial(Component::Zz) => "virial_zz",
            Quantity::Virial(Component::Yz) => "virial_yz",
            Quantity::Virial(Component::Xz) => "virial_xz",
            Quantity::Virial(Component::Xy) => "virial_xy",
        }
    }

    /// Case-insensitive lookup; tensor entries are `stress_<c>` or `virial_<c>`
    /// with `<c>` any axis pair accepted by [`Component::from_name`].
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if let Some(&quantity) = SCALAR_NAMES.get(name.as_str()) {
            return Some(quantity);
        }
        let (tensor, axes) = name.split_once('_')?;
        let component = Component::from_name(axes)?;
        match tensor {
            "stress" => Some(Quantity::Stress(component)),
            "virial" => Some(Quantity::Virial(component)),
            _ => None,
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Quantity::Frame => "",
            Quantity::Energy | Quantity::Virial(_) => "eV",
            Quantity::MaxForce => "eV/Å",
            Quantity::Volume => "Å³",
            Quantity::Pressure | Quantity::Stress(_) => "GPa",
            Quantity::Temperature => "K",
        }
    }

    /// Evaluates the quantity on a frame; `None` when the frame lacks the data.
    pub fn measure(self, frame: &Frame) -> Option<f64> {
        match self {
            Quantity::Frame => Some(frame.index as f64),
            Quantity::Energy => frame.energy,
            Quantity::MaxForce => frame.max_force(),
            Quantity::Volume => frame.volume(),
            Quantity::Pressure => frame.pressure(),
            Quantity::Temperature => frame.temperature,
            Quantity::Stress(c) => frame.stress_gpa().map(|s| s[c]),
            Quantity::Virial(c) => frame.virial().map(|v| v[c]),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
