use std::hash::Hasher;

use anyhow::Result;
use twox_hash::XxHash64;

use ragchat_core::traits::Embedder;

/// Model-free bag-of-words embedder: each normalized token is hashed into one
/// signed bucket, then the vector is L2-normalized. Deterministic across runs,
/// so texts sharing words land close together.
pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("hash:d{dim}") }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if token.is_empty() {
                continue;
            }
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(token.as_bytes());
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            v[idx] += if h >> 63 == 0 { 1.0 } else { -1.0 };
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn case_and_punctuation_are_ignored() {
        let e = HashEmbedder::new(64);
        assert_eq!(e.embed("Hello, world!"), e.embed("hello world"));
    }

    #[test]
    fn shared_words_score_higher() {
        let e = HashEmbedder::new(256);
        let q = e.embed("return policy for shoes");
        let near = e.embed("our return policy covers shoes and boots");
        let far = e.embed("opening hours on public holidays");
        assert!(cosine(&q, &near) > cosine(&q, &far));
    }

    #[test]
    fn empty_text_is_the_zero_vector() {
        let e = HashEmbedder::new(8);
        assert!(e.embed("  ... ").iter().all(|x| *x == 0.0));
    }
}
