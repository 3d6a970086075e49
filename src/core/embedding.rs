pub type Embedding = Vec<f32>;

const NORM_EPSILON: f32 = 1e-9;

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale to unit length. A zero vector stays zero.
pub fn l2_normalize(v: &[f32]) -> Embedding {
    let norm = l2_norm(v) + NORM_EPSILON;
    v.iter().map(|x| x / norm).collect()
}

/// Cosine similarity clamped to `[-1, 1]`; 0 when either side is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Euclidean distance between the normalized forms of `a` and `b`.
pub fn face_distance(a: &[f32], b: &[f32]) -> f32 {
    let a = l2_normalize(a);
    let b = l2_normalize(b);
    a.iter()
        .zip(&b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Element-wise mean. Empty input gives an empty embedding.
pub fn mean_embedding(embeddings: &[Embedding]) -> Embedding {
    if embeddings.is_empty() {
        return vec![];
    }

    let embedding_size = embeddings[0].len();
    let mut averaged = vec![0.0f32; embedding_size];

    for embedding in embeddings {
        for (i, &value) in embedding.iter().enumerate().take(embedding_size) {
            averaged[i] += value;
        }
    }

    let count = embeddings.len() as f32;
    for value in &mut averaged {
        *value /= count;
    }

    averaged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_vector_has_unit_length() {
        let v = l2_normalize(&[3.0, 4.0]);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_similarity_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn opposite_vectors() {
        assert!((cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn distance_ignores_scale() {
        assert!(face_distance(&[1.0, 1.0], &[5.0, 5.0]) < 1e-5);
        assert!((face_distance(&[1.0, 0.0], &[0.0, 1.0]) - 2f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn mean_of_two() {
        let mean = mean_embedding(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(mean, vec![0.5, 0.5]);
        assert!(mean_embedding(&[]).is_empty());
    }
}
