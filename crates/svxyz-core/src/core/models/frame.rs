use super::voigt::{EV_A3_TO_GPA, Voigt};
use nalgebra::{Matrix3, Point3, Vector3};

/// Value type of a per-atom column in an extended XYZ `Properties` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Str,
    Real,
    Int,
    Logical,
}

impl ColumnKind {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "S" | "s" => Some(Self::Str),
            "R" | "r" => Some(Self::Real),
            "I" | "i" => Some(Self::Int),
            "L" | "l" => Some(Self::Logical),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            Self::Str => 'S',
            Self::Real => 'R',
            Self::Int => 'I',
            Self::Logical => 'L',
        }
    }
}

/// A per-atom column that carries no meaning for filtering and is kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomColumn {
    pub name: String,
    pub kind: ColumnKind,
    pub width: usize,
    /// Raw tokens, `width` consecutive entries per atom.
    pub values: Vec<String>,
}

impl AtomColumn {
    pub fn atom_values(&self, atom: usize) -> &[String] {
        &self.values[atom * self.width..(atom + 1) * self.width]
    }
}

/// One atomic configuration snapshot of a trajectory.
///
/// Stress follows the tensile-positive convention in eV/Å³. The derived
/// accessors convert to the compressive-positive GPa convention used by the
/// `.dat` tables and the pressure/stress filters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    /// 0-based position of the frame within the file it was first read from.
    pub index: usize,
    pub species: Vec<String>,
    pub positions: Vec<Point3<f64>>,
    /// Lattice vectors as rows.
    pub cell: Option<Matrix3<f64>>,
    pub pbc: [bool; 3],
    pub energy: Option<f64>,
    pub forces: Option<Vec<Vector3<f64>>>,
    pub stress: Option<Voigt>,
    pub temperature: Option<f64>,
    /// Temperature and stress already carry the sidecar records for `index`.
    pub enriched: bool,
    pub extra_columns: Vec<AtomColumn>,
    pub extra_info: Vec<(String, String)>,
}

impl Frame {
    pub fn num_atoms(&self) -> usize {
        self.positions.len()
    }

    pub fn volume(&self) -> Option<f64> {
        self.cell.map(|cell| cell.determinant().abs())
    }

    fn force_norms(&self) -> Option<impl Iterator<Item = f64> + '_> {
        self.forces
            .as_ref()
            .filter(|f| !f.is_empty())
            .map(|f| f.iter().map(|v| v.norm()))
    }

    /// Largest per-atom force magnitude (eV/Å).
    pub fn max_force(&self) -> Option<f64> {
        self.force_norms().map(|norms| norms.fold(f64::NEG_INFINITY, f64::max))
    }

    /// Mean per-atom force magnitude (eV/Å).
    pub fn mean_force(&self) -> Option<f64> {
        let n = self.forces.as_ref()?.len() as f64;
        self.force_norms().map(|norms| norms.sum::<f64>() / n)
    }

    /// Stress in GPa, compressive positive.
    pub fn stress_gpa(&self) -> Option<Voigt> {
        self.stress.map(|s| -s * EV_A3_TO_GPA)
    }

    /// Hydrostatic pressure in GPa.
    pub fn pressure(&self) -> Option<f64> {
        self.stress_gpa().map(|s| s.diagonal_mean())
    }

    /// Virial in eV, `-stress * volume`.
    pub fn virial(&self) -> Option<Voigt> {
        let volume = self.volume()?;
        self.stress.map(|s| -s * volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn cubic_frame(edge: f64) -> Frame {
        Frame {
            species: vec!["Si".into(), "Si".into()],
            positions: vec![Point3::origin(), Point3::new(1.0, 1.0, 1.0)],
            cell: Some(Matrix3::from_diagonal_element(edge)),
            pbc: [true; 3],
            ..Default::default()
        }
    }

    #[test]
    fn volume_is_absolute_cell_determinant() {
        let mut frame = cubic_frame(2.0);
        assert!(f64_approx_equal(frame.volume().unwrap(), 8.0));

        frame.cell = Some(Matrix3::new(0.0, 2.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 2.0));
        assert!(f64_approx_equal(frame.volume().unwrap(), 8.0));
    }

    #[test]
    fn volume_is_none_without_cell() {
        let frame = Frame::default();
        assert!(frame.volume().is_none());
        assert!(frame.virial().is_none());
    }

    #[test]
    fn force_statistics_use_per_atom_norms() {
        let mut frame = cubic_frame(2.0);
        frame.forces = Some(vec![Vector3::new(3.0, 4.0, 0.0), Vector3::new(0.0, 0.0, 1.0)]);

        assert!(f64_approx_equal(frame.max_force().unwrap(), 5.0));
        assert!(f64_approx_equal(frame.mean_force().unwrap(), 3.0));
    }

    #[test]
    fn force_statistics_are_none_without_forces() {
        let mut frame = cubic_frame(2.0);
        assert!(frame.max_force().is_none());
        frame.forces = Some(Vec::new());
        assert!(frame.max_force().is_none());
        assert!(frame.mean_force().is_none());
    }

    #[test]
    fn stress_gpa_flips_sign_and_converts_units() {
        let mut frame = cubic_frame(2.0);
        frame.stress = Some(Voigt::new([-0.01, -0.02, -0.03, 0.0, 0.0, 0.001]));

        let gpa = frame.stress_gpa().unwrap();
        assert!(f64_approx_equal(gpa.0[0], 0.01 * EV_A3_TO_GPA));
        assert!(f64_approx_equal(gpa.0[5], -0.001 * EV_A3_TO_GPA));
        assert!(f64_approx_equal(
            frame.pressure().unwrap(),
            0.02 * EV_A3_TO_GPA
        ));
    }

    #[test]
    fn virial_is_negative_stress_times_volume() {
        let mut frame = cubic_frame(2.0);
        frame.stress = Some(Voigt::new([0.5, 0.0, 0.0, 0.0, 0.0, -0.25]));

        let virial = frame.virial().unwrap();
        assert!(f64_approx_equal(virial.0[0], -4.0));
        assert!(f64_approx_equal(virial.0[5], 2.0));
    }

    #[test]
    fn atom_column_slices_values_per_atom() {
        let column = AtomColumn {
            name: "velo".into(),
            kind: ColumnKind::Real,
            width: 3,
            values: ["1", "2", "3", "4", "5", "6"].map(String::from).to_vec(),
        };
        assert_eq!(column.atom_values(1), ["4", "5", "6"]);
    }

    #[test]
    fn column_kind_codes_round_trip() {
        for kind in [
            ColumnKind::Str,
            ColumnKind::Real,
            ColumnKind::Int,
            ColumnKind::Logical,
        ] {
            assert_eq!(ColumnKind::from_code(&kind.code().to_string()), Some(kind));
        }
        assert_eq!(ColumnKind::from_code("X"), None);
    }
}
