//! Embedding vector math shared by the analyzers
//!
//! Boundary, stability, graph, and response scoring all work over the same
//! chunk embedding vectors, so the distance helpers live here.

use crate::error::{Error, Result};

/// Normalize a vector to unit length; zero vectors are returned unchanged
pub fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / norm).collect()
}

/// Cosine similarity between two vectors of equal dimension
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    check_dimensions(a, b)?;

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Euclidean distance between two vectors of equal dimension
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f64> {
    check_dimensions(a, b)?;

    let sum = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum::<f64>();
    Ok(sum.sqrt())
}

/// Element-wise mean of a set of vectors
pub fn centroid(vectors: &[&[f32]]) -> Result<Vec<f32>> {
    let first = vectors
        .first()
        .ok_or_else(|| Error::validation("embeddings", "cannot take centroid of empty set"))?;
    let dim = first.len();

    let mut acc = vec![0.0f64; dim];
    for vector in vectors {
        if vector.len() != dim {
            return Err(Error::validation(
                "embedding",
                format!("dimension mismatch: expected {}, got {}", dim, vector.len()),
            ));
        }
        for (slot, v) in acc.iter_mut().zip(vector.iter()) {
            *slot += f64::from(*v);
        }
    }

    let n = vectors.len() as f64;
    Ok(acc.into_iter().map(|v| (v / n) as f32).collect())
}

fn check_dimensions(a: &[f32], b: &[f32]) -> Result<()> {
    if a.len() != b.len() {
        return Err(Error::validation(
            "embedding",
            format!("dimension mismatch: {} vs {}", a.len(), b.len()),
        ));
    }
    if a.is_empty() {
        return Err(Error::validation("embedding", "empty vector"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let v = normalize(&[3.0, 4.0]);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_unchanged() {
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let sim = cosine_similarity(&[0.5, 0.5, 0.1], &[0.5, 0.5, 0.1]).unwrap();
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(sim.abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_dimension_mismatch() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0]).is_err());
    }

    #[test]
    fn test_euclidean_distance() {
        let d = euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]).unwrap();
        assert!((d - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_centroid() {
        let a = vec![0.0f32, 2.0];
        let b = vec![2.0f32, 0.0];
        let c = centroid(&[a.as_slice(), b.as_slice()]).unwrap();
        assert_eq!(c, vec![1.0, 1.0]);
    }

    #[test]
    fn test_centroid_empty_set_rejected() {
        assert!(centroid(&[]).is_err());
    }
}
