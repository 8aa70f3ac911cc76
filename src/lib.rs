//! Structured multi-patch isogeometric models.
//!
//! The crate builds models made of tensor-product spline patches that are glued together along
//! shared faces, edges and vertices:
//!
//! - [`generator`] synthesizes line, rectangle and box domains split into a grid of patches,
//!   together with the connections between them and named boundary sets,
//! - [`model`] and [`numbering`] give every physical node of the connected patches a single
//!   global number,
//! - [`partition`] splits the elements of each patch into groups without shared nodes, and
//! - [`integrate`] evaluates user-supplied integrands over these groups, sequentially or in
//!   parallel.
//!
//! The spline kernel itself lives in the `fenris-spline` crate.
pub mod element;
pub mod error;
pub mod generator;
pub mod integrate;
pub mod io;
pub mod model;
pub mod numbering;
pub mod partition;
pub mod patch;
pub mod topology;

pub use error::{ExportError, IntegrationError, ModelError};
pub use model::Model;
pub use patch::Patch;

pub extern crate fenris_nested_vec;
pub extern crate fenris_spline;
pub extern crate nalgebra;
