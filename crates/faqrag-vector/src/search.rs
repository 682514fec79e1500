//! Flat cosine scan over unit vectors.

use std::cmp::Ordering;

/// Scale `v` to unit L2 norm in place. Returns `false` (leaving `v` untouched)
/// for zero or non-finite vectors, which have no direction to compare.
pub fn normalize(v: &mut [f32]) -> bool {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm <= f32::EPSILON {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Score `query` against every `dim`-wide row of `vectors` and keep the best
/// `k` as `(position, score)`, highest score first, earlier position first on
/// ties.
pub fn top_k(query: &[f32], vectors: &[f32], dim: usize, k: usize) -> Vec<(usize, f32)> {
    if dim == 0 || k == 0 {
        return Vec::new();
    }
    let mut scored: Vec<(usize, f32)> = vectors
        .chunks_exact(dim)
        .map(|row| dot(query, row))
        .enumerate()
        .collect();
    scored.sort_by(|left, right| rank(*left, *right));
    scored.truncate(k);
    scored
}

fn rank(left: (usize, f32), right: (usize, f32)) -> Ordering {
    right.1.total_cmp(&left.1).then(left.0.cmp(&right.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        assert!(normalize(&mut v));
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_rejects_zero_vector() {
        let mut v = vec![0.0, 0.0, 0.0];
        assert!(!normalize(&mut v));
    }

    #[test]
    fn top_k_orders_by_score_then_position() {
        // rows: 0 -> 0.5, 1 -> 1.0, 2 -> 0.5, 3 -> -1.0
        let vectors = [0.5, 0.0, 1.0, 0.0, 0.5, 0.0, -1.0, 0.0];
        let hits = top_k(&[1.0, 0.0], &vectors, 2, 3);
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![1, 0, 2]);
    }

    #[test]
    fn top_k_caps_at_size() {
        let vectors = [1.0, 0.0];
        assert_eq!(top_k(&[1.0, 0.0], &vectors, 2, 10).len(), 1);
        assert!(top_k(&[1.0, 0.0], &[], 2, 3).is_empty());
    }
}
