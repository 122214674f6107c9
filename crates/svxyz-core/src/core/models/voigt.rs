use nalgebra::Matrix3;
use phf::phf_map;
use std::fmt;
use std::ops::{Index, Mul, Neg};

/// Conversion factor from eV/Å³ to GPa.
pub const EV_A3_TO_GPA: f64 = 160.21766208;

/// Conversion factor from kBar to GPa.
pub const KBAR_TO_GPA: f64 = 0.1;

/// One of the six independent components of a symmetric 3x3 tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    Xx,
    Yy,
    Zz,
    Yz,
    Xz,
    Xy,
}

static COMPONENT_NAMES: phf::Map<&'static str, Component> = phf_map! {
    "xx" => Component::Xx,
    "yy" => Component::Yy,
    "zz" => Component::Zz,
    "yz" => Component::Yz,
    "zy" => Component::Yz,
    "xz" => Component::Xz,
    "zx" => Component::Xz,
    "xy" => Component::Xy,
    "yx" => Component::Xy,
};

impl Component {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Component::Xx => "xx",
            Component::Yy => "yy",
            Component::Zz => "zz",
            Component::Yz => "yz",
            Component::Xz => "xz",
            Component::Xy => "xy",
        }
    }

    /// Looks up a component by its (case-insensitive) axis pair, e.g. `"xy"` or `"ZX"`.
    pub fn from_name(name: &str) -> Option<Self> {
        COMPONENT_NAMES.get(name.to_ascii_lowercase().as_str()).copied()
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A symmetric tensor in Voigt notation, ordered `xx, yy, zz, yz, xz, xy`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Voigt(pub [f64; 6]);

impl Voigt {
    pub fn new(components: [f64; 6]) -> Self {
        Self(components)
    }

    /// Builds a tensor from the `xx yy zz xy yz zx` ordering used by VASP.
    pub fn from_vasp_order(values: [f64; 6]) -> Self {
        Self([values[0], values[1], values[2], values[4], values[5], values[3]])
    }

    /// Takes the upper triangle of a 3x3 matrix.
    pub fn from_matrix(m: &Matrix3<f64>) -> Self {
        Self([
            m[(0, 0)],
            m[(1, 1)],
            m[(2, 2)],
            m[(1, 2)],
            m[(0, 2)],
            m[(0, 1)],
        ])
    }

    pub fn to_matrix(&self) -> Matrix3<f64> {
        let [xx, yy, zz, yz, xz, xy] = self.0;
        Matrix3::new(xx, xy, xz, xy, yy, yz, xz, yz, zz)
    }

    pub fn components(&self) -> &[f64; 6] {
        &self.0
    }

    /// Mean of the three diagonal components.
    pub fn diagonal_mean(&self) -> f64 {
        (self.0[0] + self.0[1] + self.0[2]) / 3.0
    }
}

impl Index<Component> for Voigt {
    type Output = f64;

    fn index(&self, component: Component) -> &f64 {
        &self.0[component.index()]
    }
}

impl Mul<f64> for Voigt {
    type Output = Voigt;

    fn mul(self, rhs: f64) -> Voigt {
        Voigt(self.0.map(|c| c * rhs))
    }
}

impl Neg for Voigt {
    type Output = Voigt;

    fn neg(self) -> Voigt {
        Voigt(self.0.map(|c| -c))
    }
}
