//! The `g2` text format for spline curves, surfaces and volumes.
//!
//! A geometry is written as a header line with the class type and format version
//! (`100 1 0 0` for curves, `200 1 0 0` for surfaces and `700 1 0 0` for volumes), a line with
//! the spatial dimension and the rational flag, then for every parametric direction a line
//! `num_coefs order` followed by the knot vector, and finally one line per control point with
//! its (homogeneous) coefficients. Several geometries may follow each other in one stream.
use crate::basis::BsplineBasis;
use crate::geometry::SplineGeometry;
use crate::SplineError;
use itertools::Itertools;
use std::fmt::Write;
use std::str::FromStr;

const CURVE_CLASS: usize = 100;
const SURFACE_CLASS: usize = 200;
const VOLUME_CLASS: usize = 700;

/// The header line of a geometry with the given number of parametric directions.
pub fn header(param_dim: usize) -> Result<&'static str, SplineError> {
    match param_dim {
        1 => Ok("100 1 0 0"),
        2 => Ok("200 1 0 0"),
        3 => Ok("700 1 0 0"),
        _ => Err(SplineError::InvalidParametricDimension { param_dim }),
    }
}

struct Tokens<'a> {
    inner: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn next<T: FromStr>(&mut self, what: &str) -> Result<T, SplineError> {
        let token = self.inner.next().ok_or_else(|| SplineError::Parse {
            message: format!("unexpected end of input, expected {what}"),
        })?;
        token.parse().map_err(|_| SplineError::Parse {
            message: format!("invalid {what} '{token}'"),
        })
    }
}

/// Reads every geometry contained in the text.
pub fn read_g2(text: &str) -> Result<Vec<SplineGeometry>, SplineError> {
    let mut tokens = Tokens {
        inner: text.split_whitespace(),
    };
    let mut geometries = Vec::new();
    while let Some(class) = tokens.inner.next() {
        let class: usize = class.parse().map_err(|_| SplineError::Parse {
            message: format!("invalid class type '{class}'"),
        })?;
        geometries.push(read_body(class, &mut tokens)?);
    }
    Ok(geometries)
}

fn read_body(class: usize, tokens: &mut Tokens) -> Result<SplineGeometry, SplineError> {
    let param_dim = match class {
        CURVE_CLASS => 1,
        SURFACE_CLASS => 2,
        VOLUME_CLASS => 3,
        other => {
            return Err(SplineError::Parse {
                message: format!("unsupported class type {other}"),
            })
        }
    };
    let major: usize = tokens.next("major version")?;
    let _minor: usize = tokens.next("minor version")?;
    let _auxiliary: usize = tokens.next("auxiliary version")?;
    if major != 1 {
        return Err(SplineError::Parse {
            message: format!("unsupported format version {major}"),
        });
    }

    let dimension: usize = tokens.next("dimension")?;
    let rational = match tokens.next::<usize>("rational flag")? {
        0 => false,
        1 => true,
        other => {
            return Err(SplineError::Parse {
                message: format!("invalid rational flag {other}"),
            })
        }
    };

    let mut bases = Vec::with_capacity(param_dim);
    for _ in 0..param_dim {
        let num_coefs: usize = tokens.next("coefficient count")?;
        let order: usize = tokens.next("order")?;
        let knots = (0..num_coefs + order)
            .map(|_| tokens.next::<f64>("knot"))
            .collect::<Result<Vec<_>, _>>()?;
        bases.push(BsplineBasis::new(knots, order)?);
    }

    let stride = dimension + usize::from(rational);
    let count = stride * bases.iter().map(BsplineBasis::num_coefs).product::<usize>();
    let coefs = (0..count)
        .map(|_| tokens.next::<f64>("coefficient"))
        .collect::<Result<Vec<_>, _>>()?;
    SplineGeometry::new(bases, dimension, rational, coefs)
}

/// Writes a geometry in `g2` format.
///
/// Floating-point values use the shortest representation that parses back to the same value,
/// so reading the output reproduces the geometry exactly.
pub fn write_g2<W: Write>(output: &mut W, geometry: &SplineGeometry) -> std::fmt::Result {
    let header = header(geometry.param_dim()).map_err(|_| std::fmt::Error)?;
    writeln!(output, "{header}")?;
    writeln!(output, "{} {}", geometry.dimension(), u8::from(geometry.is_rational()))?;
    for basis in geometry.bases() {
        writeln!(output, "{} {}", basis.num_coefs(), basis.order())?;
        writeln!(output, "{}", basis.knots().iter().join(" "))?;
    }
    for point in geometry.coefs().chunks(geometry.stride()) {
        writeln!(output, "{}", point.iter().join(" "))?;
    }
    Ok(())
}

/// Convenience wrapper around [`write_g2`].
pub fn to_g2_string(geometry: &SplineGeometry) -> Result<String, SplineError> {
    let mut text = String::new();
    write_g2(&mut text, geometry)?;
    Ok(text)
}
