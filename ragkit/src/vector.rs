//! Embedding vector math.
//!
//! Free functions over `&[f32]` slices. Callers are responsible for checking
//! that both operands have the same length; the document store and the
//! similarity index enforce this before any of these run.

use serde::{Deserialize, Serialize};

/// A dense embedding vector.
pub type Embedding = Vec<f32>;

/// How the similarity index scores a document against a query.
///
/// Every metric is oriented so that a higher score means more similar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// `dot(a, b) / (‖a‖·‖b‖)`, in `[-1, 1]`.
    #[default]
    Cosine,
    /// Raw dot product. Equivalent to cosine for L2-normalized vectors.
    DotProduct,
    /// `1 / (1 + ‖a - b‖)`, in `(0, 1]`.
    Euclidean,
}

impl SimilarityMetric {
    /// Score `a` against `b` under this metric.
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(a, b),
            Self::DotProduct => dot(a, b),
            Self::Euclidean => 1.0 / (1.0 + euclidean_distance(a, b)),
        }
    }
}

/// Dot product of two vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    dot_f64(a, b) as f32
}

/// Euclidean (L2) norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    norm_f64(v) as f32
}

// Accumulated in f64 so finite f32 inputs cannot overflow or underflow the
// intermediate sums.
fn dot_f64(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b.iter()).map(|(&x, &y)| f64::from(x) * f64::from(y)).sum()
}

fn norm_f64(v: &[f32]) -> f64 {
    v.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt()
}

/// Euclidean distance between two vectors.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (f64::from(x) - f64::from(y)).powi(2))
        .sum::<f64>()
        .sqrt() as f32
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = norm_f64(a);
    let norm_b = norm_f64(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    // Divide by each norm separately; their product can still overflow f64.
    let sim = dot_f64(a, b) / norm_a / norm_b;
    sim.clamp(-1.0, 1.0) as f32
}

/// L2-normalize a vector in place. Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm = norm_f64(v);
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x = (f64::from(*x) / norm) as f32);
    }
}

/// Whether every component is finite (no NaN or infinity).
pub fn is_finite(v: &[f32]) -> bool {
    v.iter().all(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_vectors() {
        let a = vec![0.3, -1.2, 4.0];
        let sim = cosine_similarity(&a, &a);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_is_scale_invariant() {
        let a = [0.9, 0.1];
        let b = [9.0, 1.0];
        assert!((cosine_similarity(&a, &[1.0, 0.0]) - cosine_similarity(&b, &[1.0, 0.0])).abs()
            < 1e-6);
    }

    #[test]
    fn test_cosine_large_magnitude_stays_in_range() {
        let big = [3e19f32, 3e19];
        let sim = cosine_similarity(&big, &big);
        assert!((sim - 1.0).abs() < 1e-6, "got {sim}");

        let query = [1e20f32, 1e-3];
        let aligned = cosine_similarity(&query, &[1.0, 0.0]);
        let orthogonal = cosine_similarity(&query, &[0.0, 3e19]);
        assert!((aligned - 1.0).abs() < 1e-6, "got {aligned}");
        assert!(orthogonal.abs() < 1e-6, "got {orthogonal}");

        let max = [f32::MAX, f32::MAX];
        assert!((cosine_similarity(&max, &max) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_tiny_and_subnormal_vectors() {
        let tiny = cosine_similarity(&[1e-30, 0.0], &[1.0, 0.0]);
        assert!((tiny - 1.0).abs() < 1e-6, "got {tiny}");

        let subnormal = [f32::from_bits(1), 0.0];
        assert!((cosine_similarity(&subnormal, &subnormal) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&subnormal, &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_large_vector() {
        let mut v = vec![3e19f32, 4e19];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_euclidean_metric_prefers_closer() {
        let q = [1.0, 0.0];
        let near = SimilarityMetric::Euclidean.score(&q, &[0.9, 0.1]);
        let far = SimilarityMetric::Euclidean.score(&q, &[-1.0, 0.0]);
        assert!(near > far);
        assert!((SimilarityMetric::Euclidean.score(&q, &q) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_is_finite() {
        assert!(is_finite(&[1.0, -2.0]));
        assert!(!is_finite(&[1.0, f32::NAN]));
        assert!(!is_finite(&[f32::INFINITY]));
    }
}
