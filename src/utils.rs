//! Conversions between nested rows and the contiguous layout used by the engine.

use aligned_vec::{AVec, CACHELINE_ALIGN};

/// Flatten rows into one contiguous, cache-line aligned buffer.
pub fn as_continuous_vec(mat: &[Vec<f64>]) -> AVec<f64> {
    AVec::from_iter(CACHELINE_ALIGN, mat.iter().flat_map(|row| row.iter().copied()))
}

/// Split a contiguous buffer back into rows of `dim` elements.
pub fn as_matrix(vecs: &[f64], dim: usize) -> Vec<Vec<f64>> {
    if dim == 0 {
        return Vec::new();
    }
    vecs.chunks(dim).map(|row| row.to_vec()).collect()
}
