//! Error types for model construction and integration.
use fenris_spline::SplineError;
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Errors raised while generating, connecting or numbering a multi-patch model.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ModelError {
    /// The generator settings are inconsistent (zero counts, non-positive lengths, ...).
    InvalidConfiguration(String),
    /// A uniform subdivision requests more blocks than there are knot spans.
    TooManySubdivisions {
        direction: usize,
        requested: usize,
        available: usize,
    },
    /// A patch index does not refer to a patch of the model.
    PatchOutOfRange { patch: usize, num_patches: usize },
    /// A local vertex, edge or face index is not valid for the patch.
    InvalidEntity { patch: usize, index: usize, dim: usize },
    /// An orientation code is outside the valid range for the entity dimension.
    InvalidOrientation { code: u8, dim: usize },
    /// The interface thickness is zero, or exceeds the node count normal to the interface.
    InvalidThickness { thickness: usize, available: usize },
    /// The two entities of a connection do not have matching node layouts.
    IncompatibleEntities { master: usize, slave: usize },
    /// Aliased control points of a connection are not coincident.
    NonMatchingNodes { master: usize, slave: usize, distance: f64 },
    /// The operation requires a patch with geometry.
    MissingGeometry { patch: usize },
    /// No topology set with the given name exists in the model.
    UnknownTopologySet(String),
    /// A displacement vector with the wrong number of entries.
    DimensionMismatch { expected: usize, actual: usize },
    /// An error from the spline kernel.
    Spline(SplineError),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfiguration(message) => write!(f, "invalid configuration: {message}"),
            Self::TooManySubdivisions {
                direction,
                requested,
                available,
            } => write!(
                f,
                "cannot split direction {direction} into {requested} blocks: only {available} knot spans"
            ),
            Self::PatchOutOfRange { patch, num_patches } => {
                write!(f, "patch {patch} is out of range (model has {num_patches} patches)")
            }
            Self::InvalidEntity { patch, index, dim } => {
                write!(f, "patch {patch} has no entity {index} of dimension {dim}")
            }
            Self::InvalidOrientation { code, dim } => {
                write!(f, "orientation code {code} is invalid for entities of dimension {dim}")
            }
            Self::InvalidThickness { thickness, available } => write!(
                f,
                "interface thickness {thickness} is invalid ({available} node layers available)"
            ),
            Self::IncompatibleEntities { master, slave } => write!(
                f,
                "the connected entities of patches {master} and {slave} have different node layouts"
            ),
            Self::NonMatchingNodes {
                master,
                slave,
                distance,
            } => write!(
                f,
                "non-matching nodes between patches {master} and {slave} (distance {distance:e})"
            ),
            Self::MissingGeometry { patch } => write!(f, "patch {patch} has no geometry"),
            Self::UnknownTopologySet(name) => write!(f, "unknown topology set \"{name}\""),
            Self::DimensionMismatch { expected, actual } => {
                write!(f, "expected {expected} entries, got {actual}")
            }
            Self::Spline(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SplineError> for ModelError {
    fn from(err: SplineError) -> Self {
        Self::Spline(err)
    }
}

/// Errors raised by the integration driver.
#[derive(Debug)]
#[non_exhaustive]
pub enum IntegrationError {
    /// Element groups are missing or were invalidated by refinement since they were computed.
    StaleThreadGroups { patch: usize },
    /// The patch has no geometry to integrate over.
    MissingGeometry { patch: usize },
    /// The requested boundary does not exist on the patch.
    InvalidBoundary { index: usize },
    /// No topology set with the given name exists in the model.
    UnknownTopologySet(String),
    /// A topology set refers to a patch that is not part of the model.
    PatchOutOfRange { patch: usize },
    /// An element index beyond the number of elements of the patch.
    ElementOutOfRange { element: usize },
    /// The geometry mapping is singular at a quadrature point.
    SingularJacobian { element: usize },
    /// The integrand failed on an element, which aborts the whole integration call.
    Integrand { element: usize, source: eyre::Report },
    /// An error from the spline kernel.
    Spline(SplineError),
}

impl Display for IntegrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleThreadGroups { patch } => write!(
                f,
                "patch {patch} has no up-to-date element groups, they must be regenerated after refinement"
            ),
            Self::MissingGeometry { patch } => write!(f, "patch {patch} has no geometry"),
            Self::InvalidBoundary { index } => write!(f, "invalid boundary index {index}"),
            Self::UnknownTopologySet(name) => write!(f, "unknown topology set \"{name}\""),
            Self::PatchOutOfRange { patch } => write!(f, "patch {patch} is out of range"),
            Self::ElementOutOfRange { element } => write!(f, "element {element} is out of range"),
            Self::SingularJacobian { element } => {
                write!(f, "singular geometry mapping in element {element}")
            }
            Self::Integrand { element, source } => {
                write!(f, "integrand failed in element {element}: {source}")
            }
            Self::Spline(err) => write!(f, "{err}"),
        }
    }
}

impl Error for IntegrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Integrand { source, .. } => Some(&**source),
            Self::Spline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SplineError> for IntegrationError {
    fn from(err: SplineError) -> Self {
        Self::Spline(err)
    }
}

/// Errors raised while exporting or loading time levels.
#[derive(Debug)]
#[non_exhaustive]
pub enum ExportError {
    /// No field with the given name has been registered.
    UnknownField(String),
    /// A registered field has not been given a value.
    MissingValue(String),
    /// A field of the wrong kind was given a value (for instance geometry for a plain vector).
    WrongFieldKind(String),
    /// No writer has been registered.
    NoWriters,
    /// The requested time level is not available.
    MissingTimeLevel { level: usize },
    /// A writer failed.
    Writer(eyre::Report),
    Model(ModelError),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField(name) => write!(f, "no field named \"{name}\" has been registered"),
            Self::MissingValue(name) => write!(f, "field \"{name}\" has no value"),
            Self::WrongFieldKind(name) => write!(f, "field \"{name}\" does not accept this kind of value"),
            Self::NoWriters => write!(f, "no data writers registered"),
            Self::MissingTimeLevel { level } => write!(f, "time level {level} is not available"),
            Self::Writer(err) => write!(f, "data writer failed: {err}"),
            Self::Model(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Writer(err) => Some(&**err),
            Self::Model(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelError> for ExportError {
    fn from(err: ModelError) -> Self {
        Self::Model(err)
    }
}
