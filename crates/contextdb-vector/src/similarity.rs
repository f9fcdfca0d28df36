use serde::{Deserialize, Serialize};

/// How query/entry closeness is scored. Higher is always better.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Dot product of L2-normalized vectors, in `[-1, 1]`.
    #[default]
    Cosine,
    /// `1 / (1 + ||a - b||)`, in `(0, 1]`.
    Euclidean,
}

/// Accumulated in f64 so large finite components cannot overflow.
pub fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt()
}

pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(&x, &y)| f64::from(x) * f64::from(y)).sum()
}

/// Cosine similarity given precomputed norms; zero-norm vectors score 0.
pub fn cosine(a: &[f32], a_norm: f64, b: &[f32], b_norm: f64) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    ((dot(a, b) / a_norm / b_norm) as f32).clamp(-1.0, 1.0)
}

pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    let dist = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum::<f64>()
        .sqrt();
    (1.0 / (1.0 + dist)) as f32
}
