//! Similarity math over sparse vectors.

use crate::vector::DocumentVector;

/// Sum of weight products over tokens present in both vectors.
///
/// Walks the smaller vector in token order, so the summation order is the
/// same whichever argument comes first.
pub fn dot_product(v1: &DocumentVector, v2: &DocumentVector) -> f64 {
    let (small, large) = if v1.dimension_lengths.len() <= v2.dimension_lengths.len() {
        (&v1.dimension_lengths, &v2.dimension_lengths)
    } else {
        (&v2.dimension_lengths, &v1.dimension_lengths)
    };
    small
        .iter()
        .filter_map(|(token, a)| large.get(token).map(|b| a * b))
        .sum()
}

/// Cosine of the angle between two vectors; 0 when either norm is 0.
pub fn cosine_similarity(v1: &DocumentVector, v2: &DocumentVector) -> f64 {
    let norm = v1.norm() * v2.norm();
    if norm == 0.0 {
        return 0.0;
    }
    dot_product(v1, v2) / norm
}
