//! Flat (exact) inner-product index.
//!
//! Vectors are held in a dense row-major matrix and scored against the query
//! with a single matrix-vector product. Exact search is plenty for a corpus
//! of a few thousand papers; the on-disk format is a small header followed by
//! little-endian f32 rows.

use std::path::Path;

use ndarray::{Array2, ArrayView1};

use crate::core::errors::ApiError;

const MAGIC: &[u8; 4] = b"PQFI";
const HEADER_LEN: usize = 12;

pub struct FlatIndex {
    vectors: Array2<f32>,
}

impl FlatIndex {
    /// Build from a flat row-major buffer of `count * dim` floats.
    pub fn from_vectors(dim: usize, data: Vec<f32>) -> Result<Self, ApiError> {
        if dim == 0 && !data.is_empty() {
            return Err(ApiError::BadRequest(
                "index dimension must be positive".to_string(),
            ));
        }
        let count = if dim == 0 { 0 } else { data.len() / dim };
        if dim != 0 && count * dim != data.len() {
            return Err(ApiError::BadRequest(format!(
                "vector data length {} is not a multiple of dimension {}",
                data.len(),
                dim
            )));
        }

        let vectors = Array2::from_shape_vec((count, dim), data)
            .map_err(|e| ApiError::Internal(format!("index shape error: {}", e)))?;
        Ok(Self { vectors })
    }

    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nearest neighbors by inner product, best first.
    ///
    /// Returns `(score, position)` pairs; the score is forwarded opaquely to
    /// callers and never re-sorted downstream. A query whose dimensionality
    /// does not match the index is a configuration error.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(f32, usize)>, ApiError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dim() {
            return Err(ApiError::BadRequest(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dim()
            )));
        }

        let scores = self.vectors.dot(&ArrayView1::from(query));
        let mut ranked: Vec<(f32, usize)> = scores
            .iter()
            .enumerate()
            .map(|(position, score)| (*score, position))
            .collect();

        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);
        Ok(ranked)
    }

    /// Load an index serialized by [`FlatIndex::save`].
    pub fn load(path: &Path) -> Result<Self, ApiError> {
        let bytes = std::fs::read(path).map_err(ApiError::internal)?;
        if bytes.len() < HEADER_LEN || &bytes[0..4] != MAGIC {
            return Err(ApiError::Internal(format!(
                "not a vector index file: {}",
                path.display()
            )));
        }

        let dim = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let count = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;

        let body = &bytes[HEADER_LEN..];
        if body.len() != count * dim * 4 {
            return Err(ApiError::Internal(format!(
                "vector index {} is truncated: expected {} vectors of dimension {}",
                path.display(),
                count,
                dim
            )));
        }

        let data: Vec<f32> = body
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Self::from_vectors(dim, data)
    }

    /// Serialize to the on-disk format (used by ingestion tooling and tests).
    pub fn save(&self, path: &Path) -> Result<(), ApiError> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.len() * self.dim() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&(self.dim() as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u32).to_le_bytes());
        for value in self.vectors.iter() {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        std::fs::write(path, bytes).map_err(ApiError::internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_vector_index() -> FlatIndex {
        // Rows: e1, e2, and a diagonal between them.
        FlatIndex::from_vectors(
            2,
            vec![1.0, 0.0, 0.0, 1.0, 0.7, 0.7],
        )
        .expect("index")
    }

    #[test]
    fn search_ranks_by_inner_product() {
        let index = three_vector_index();
        let hits = index.search(&[1.0, 0.0], 3).expect("search");

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].1, 0);
        assert_eq!(hits[1].1, 2);
        assert_eq!(hits[2].1, 1);
        assert!(hits[0].0 > hits[1].0);
    }

    #[test]
    fn search_truncates_to_k() {
        let index = three_vector_index();
        let hits = index.search(&[0.0, 1.0], 1).expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, 1);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let index = three_vector_index();
        assert!(index.search(&[1.0, 0.0, 0.0], 2).is_err());
    }

    #[test]
    fn empty_index_returns_no_hits() {
        let index = FlatIndex::from_vectors(0, Vec::new()).expect("index");
        assert!(index.search(&[1.0, 0.0], 5).expect("search").is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("vector_store.index");

        let index = three_vector_index();
        index.save(&path).expect("save");

        let loaded = FlatIndex::load(&path).expect("load");
        assert_eq!(loaded.dim(), 2);
        assert_eq!(loaded.len(), 3);

        let hits = loaded.search(&[1.0, 0.0], 1).expect("search");
        assert_eq!(hits[0].1, 0);
    }

    #[test]
    fn load_rejects_garbage() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("garbage.index");
        std::fs::write(&path, b"not an index").expect("write");
        assert!(FlatIndex::load(&path).is_err());
    }
}
