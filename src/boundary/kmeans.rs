//! Two-cluster k-means over a sliding window of chunk embeddings
//!
//! Initialization is deterministic (first vector, then the vector farthest
//! from it) so repeated analysis of the same document yields the same
//! assignments.

use crate::embedding::{centroid, euclidean_distance};
use crate::error::Result;

/// Assign each window vector to one of two clusters; returns assignments
/// aligned with the input order.
pub fn cluster_two(window: &[&[f32]], iterations: usize) -> Result<Vec<usize>> {
    if window.len() < 2 {
        return Ok(vec![0; window.len()]);
    }

    let mut center_a: Vec<f32> = window[0].to_vec();
    let mut center_b: Vec<f32> = farthest_from(window, &center_a)?.to_vec();

    let mut assignments = vec![0usize; window.len()];
    for _ in 0..iterations.max(1) {
        let mut changed = false;
        for (i, vector) in window.iter().enumerate() {
            let da = euclidean_distance(vector, &center_a)?;
            let db = euclidean_distance(vector, &center_b)?;
            let cluster = if db < da { 1 } else { 0 };
            if assignments[i] != cluster {
                assignments[i] = cluster;
                changed = true;
            }
        }

        if !changed {
            break;
        }

        let members_a: Vec<&[f32]> = window
            .iter()
            .zip(&assignments)
            .filter(|(_, c)| **c == 0)
            .map(|(v, _)| *v)
            .collect();
        let members_b: Vec<&[f32]> = window
            .iter()
            .zip(&assignments)
            .filter(|(_, c)| **c == 1)
            .map(|(v, _)| *v)
            .collect();

        if !members_a.is_empty() {
            center_a = centroid(&members_a)?;
        }
        if !members_b.is_empty() {
            center_b = centroid(&members_b)?;
        }
    }

    Ok(assignments)
}

fn farthest_from<'a>(window: &[&'a [f32]], reference: &[f32]) -> Result<&'a [f32]> {
    let mut best = window[0];
    let mut best_distance = -1.0f64;
    for vector in window {
        let d = euclidean_distance(vector, reference)?;
        if d > best_distance {
            best_distance = d;
            best = *vector;
        }
    }
    Ok(best)
}
