use crate::error::ModelError;
use serde::{Deserialize, Serialize};

/// Settings of the multi-patch model generators.
///
/// All fields have defaults, so a settings document only needs to mention what differs from a
/// single unit patch at the origin:
///
/// ```
/// # use fenris_iga::generator::GeneratorSettings;
/// let settings: GeneratorSettings = serde_json::from_str(r#"{ "nx": 2, "lx": 2.0 }"#).unwrap();
/// assert_eq!(settings.nx, 2);
/// assert_eq!(settings.ly, 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Domain length in x, before scaling.
    pub lx: f64,
    pub ly: f64,
    pub lz: f64,
    /// Lower corner of the domain.
    pub x0: [f64; 3],
    /// Scale applied to the lengths (not to the corner).
    pub scale: f64,
    /// Emit rational geometries with unit weights.
    pub rational: bool,
    /// Number of sub-patches in x.
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub periodic_x: bool,
    pub periodic_y: bool,
    pub periodic_z: bool,
    /// Refine a single patch first and split it afterwards, instead of generating separate
    /// patches.
    pub subdivision: Option<Subdivision>,
    /// Whether named topology sets are created.
    pub topology_sets: bool,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            lx: 1.0,
            ly: 1.0,
            lz: 1.0,
            x0: [0.0; 3],
            scale: 1.0,
            rational: false,
            nx: 1,
            ny: 1,
            nz: 1,
            periodic_x: false,
            periodic_y: false,
            periodic_z: false,
            subdivision: None,
            topology_sets: true,
        }
    }
}

/// Refinement applied to the full patch before it is split, in the given order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subdivision {
    pub steps: Vec<SubdivisionStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubdivisionStep {
    /// Insert `u`, `v` and `w` knots uniformly inside every knot span of each direction.
    Refine {
        #[serde(default)]
        u: usize,
        #[serde(default)]
        v: usize,
        #[serde(default)]
        w: usize,
    },
    /// Raise the order by `u`, `v` and `w` in each direction.
    RaiseOrder {
        #[serde(default)]
        u: usize,
        #[serde(default)]
        v: usize,
        #[serde(default)]
        w: usize,
    },
}

impl SubdivisionStep {
    pub fn amounts(&self) -> [usize; 3] {
        match *self {
            Self::Refine { u, v, w } | Self::RaiseOrder { u, v, w } => [u, v, w],
        }
    }
}

impl GeneratorSettings {
    /// Sub-patch counts per direction.
    pub fn counts(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    /// Scaled domain lengths per direction.
    pub fn lengths(&self) -> [f64; 3] {
        [self.lx * self.scale, self.ly * self.scale, self.lz * self.scale]
    }

    pub fn periodic(&self) -> [bool; 3] {
        [self.periodic_x, self.periodic_y, self.periodic_z]
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let invalid = |message: String| Err(ModelError::InvalidConfiguration(message));
        if !(self.scale > 0.0) || !self.scale.is_finite() {
            return invalid(format!("scale must be positive, got {}", self.scale));
        }
        for (name, length) in ["lx", "ly", "lz"].iter().zip([self.lx, self.ly, self.lz]) {
            if !(length > 0.0) || !length.is_finite() {
                return invalid(format!("{name} must be positive, got {length}"));
            }
        }
        if self.x0.iter().any(|x| !x.is_finite()) {
            return invalid(format!("corner {:?} is not finite", self.x0));
        }
        for (name, count) in ["nx", "ny", "nz"].iter().zip(self.counts()) {
            if count == 0 {
                return invalid(format!("{name} must be at least 1"));
            }
        }
        Ok(())
    }
}
