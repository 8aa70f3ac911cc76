//! Geometry of axis-aligned lines, rectangles and boxes in g2 format, and uniform splitting of
//! a refined patch into blocks.
use super::settings::GeneratorSettings;
use crate::error::ModelError;
use fenris_spline::g2::{header, to_g2_string};
use fenris_spline::geometry::lattice;
use fenris_spline::{SplineError, SplineGeometry};
use itertools::Itertools;
use log::info;
use std::fmt;
use std::fmt::Write;

/// Linear patches tiling the domain, one per cell of a `cells` grid, in g2 format.
///
/// The spatial dimension of the patches is `nsd`, raised to the parametric dimension if
/// necessary. Control points are listed with the first direction varying fastest.
pub fn linear_patches_g2(
    param_dim: usize,
    settings: &GeneratorSettings,
    nsd: usize,
    cells: [usize; 3],
) -> Result<String, ModelError> {
    let header = header(param_dim)?;
    if !(1..=3).contains(&nsd) {
        return Err(ModelError::InvalidConfiguration(format!(
            "invalid number of spatial dimensions {nsd}"
        )));
    }
    let mut g2 = String::new();
    write_linear_patches(&mut g2, header, param_dim, settings, nsd.max(param_dim), cells)
        .map_err(SplineError::from)?;
    Ok(g2)
}

/// Writes the patches of [`linear_patches_g2`] with `dimension` coordinates to `output`.
fn write_linear_patches<W: Write>(
    output: &mut W,
    header: &str,
    param_dim: usize,
    settings: &GeneratorSettings,
    dimension: usize,
    cells: [usize; 3],
) -> fmt::Result {
    let lengths = settings.lengths();
    let x0 = settings.x0;
    let mut corner_counts = [1; 3];
    corner_counts[..param_dim].fill(2);
    for cell in lattice(cells) {
        writeln!(output, "{header}")?;
        writeln!(output, "{dimension} {}", u8::from(settings.rational))?;
        for _ in 0..param_dim {
            writeln!(output, "2 2\n0 0 1 1")?;
        }
        for corner in lattice(corner_counts) {
            let mut point = vec![0.0; dimension];
            for d in 0..param_dim {
                let h = lengths[d] / cells[d] as f64;
                point[d] = x0[d] + (cell[d] + corner[d]) as f64 * h;
            }
            if settings.rational {
                point.push(1.0);
            }
            writeln!(output, "{}", point.iter().join(" "))?;
        }
    }
    Ok(())
}

/// Coefficient blocks `(start, count)` of a direction with `num_coefs` coefficients of the
/// given degree, split into `n` blocks.
///
/// The direction has `num_coefs - degree` elements. Every block gets the same number of them,
/// except that the first `remainder` blocks get one extra element. Consecutive blocks overlap
/// in `degree` coefficients.
pub fn split_blocks(
    direction: usize,
    num_coefs: usize,
    degree: usize,
    n: usize,
) -> Result<Vec<(usize, usize)>, ModelError> {
    let elements = num_coefs.saturating_sub(degree);
    if n == 0 || n > elements {
        return Err(ModelError::TooManySubdivisions {
            direction,
            requested: n,
            available: elements,
        });
    }
    let (per_block, remainder) = (elements / n, elements % n);
    let blocks = (0..n)
        .map(|i| {
            let ni = per_block + usize::from(i < remainder);
            let start = ni * i + if i < remainder { 0 } else { remainder };
            (start, ni + degree)
        })
        .collect();
    Ok(blocks)
}

/// Splits a geometry into `counts[d]` blocks per direction and writes the blocks in g2 format,
/// first direction varying fastest.
pub fn split_g2(geometry: &SplineGeometry, counts: [usize; 3]) -> Result<String, ModelError> {
    let param_dim = geometry.param_dim();
    let mut blocks = vec![vec![(0, 1)]; 3];
    for (d, basis) in geometry.bases().iter().enumerate() {
        blocks[d] = split_blocks(d, basis.num_coefs(), basis.degree(), counts[d])?;
    }

    let mut block_counts = [1; 3];
    block_counts[..param_dim].copy_from_slice(&counts[..param_dim]);
    let mut g2 = String::new();
    for ijk in lattice(block_counts) {
        let (start, count): (Vec<usize>, Vec<usize>) = (0..param_dim).map(|d| blocks[d][ijk[d]]).unzip();
        let block = geometry.extract(&start, &count)?;
        let spans = block
            .bases()
            .iter()
            .map(|basis| basis.num_coefs() + 1 - basis.order())
            .join("x");
        info!(
            "Number of knot spans in patch ({}): {spans}",
            ijk[..param_dim].iter().join(", ")
        );
        g2.push_str(&to_g2_string(&block)?);
    }
    Ok(g2)
}
