//! Vector index plus the parallel document-identifier array.
//!
//! Both are produced by an offline ingestion run and loaded read-only at
//! startup; a count mismatch between them is a startup integrity failure,
//! never a per-query condition.

mod flat;

use serde_json::Value;

use crate::core::config::AppPaths;
use crate::core::errors::ApiError;
use crate::store::DocKey;

pub use flat::FlatIndex;

pub struct VectorIndex {
    index: FlatIndex,
    doc_keys: Vec<DocKey>,
    doc_info: Option<serde_json::Map<String, Value>>,
}

impl VectorIndex {
    /// Load the serialized index, identifier array, and (optionally) the
    /// per-document metadata map from the data directory.
    pub fn load(paths: &AppPaths) -> Result<Self, ApiError> {
        let index = FlatIndex::load(&paths.index_path)?;

        let raw = std::fs::read_to_string(&paths.doc_ids_path).map_err(ApiError::internal)?;
        let doc_keys: Vec<DocKey> = serde_json::from_str(&raw)
            .map_err(|e| ApiError::Internal(format!("invalid document id array: {}", e)))?;

        let doc_info = match std::fs::read_to_string(&paths.doc_info_path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| ApiError::Internal(format!("invalid document info map: {}", e)))?,
            Err(_) => None,
        };

        let loaded = Self::from_parts(index, doc_keys)?;
        tracing::info!(
            "Loaded vector index: {} vectors, dimension {}",
            loaded.len(),
            loaded.index.dim()
        );
        Ok(Self { doc_info, ..loaded })
    }

    /// Pair an index with its identifier array, enforcing the 1:1 mapping.
    pub fn from_parts(index: FlatIndex, doc_keys: Vec<DocKey>) -> Result<Self, ApiError> {
        if index.len() != doc_keys.len() {
            return Err(ApiError::Internal(format!(
                "index holds {} vectors but the identifier array has {} entries",
                index.len(),
                doc_keys.len()
            )));
        }

        Ok(Self {
            index,
            doc_keys,
            doc_info: None,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Forward to the underlying index; `(score, position)` pairs, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(f32, usize)>, ApiError> {
        self.index.search(query, k)
    }

    /// Map an index position to its document key; `None` when out of range.
    pub fn doc_key(&self, position: usize) -> Option<&DocKey> {
        self.doc_keys.get(position)
    }

    /// Supplementary metadata for a document, when the info map was shipped.
    pub fn doc_info(&self, key: &DocKey) -> Option<&Value> {
        self.doc_info.as_ref()?.get(&key.canonical())
    }
}

/// Scale a vector to unit L2 norm in place.
///
/// An all-zero embedding cannot be normalized and is reported as a typed
/// error rather than silently producing NaNs.
pub fn l2_normalize(vector: &mut [f32]) -> Result<(), ApiError> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return Err(ApiError::Embedding(
            "embedding produced a zero vector".to_string(),
        ));
    }

    for value in vector.iter_mut() {
        *value /= norm;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_rejects_count_mismatch() {
        let index = FlatIndex::from_vectors(2, vec![1.0, 0.0, 0.0, 1.0]).expect("index");
        let err = VectorIndex::from_parts(index, vec![DocKey::Int(1)]);
        assert!(err.is_err());
    }

    #[test]
    fn positions_map_to_keys_in_order() {
        let index = FlatIndex::from_vectors(2, vec![1.0, 0.0, 0.0, 1.0]).expect("index");
        let vindex =
            VectorIndex::from_parts(index, vec![DocKey::Int(10), DocKey::from("p-11")])
                .expect("vector index");

        assert_eq!(vindex.doc_key(0), Some(&DocKey::Int(10)));
        assert_eq!(vindex.doc_key(1), Some(&DocKey::from("p-11")));
        assert_eq!(vindex.doc_key(2), None);
    }

    #[test]
    fn load_pairs_index_with_identifier_array() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::with_data_dir(tmp.path().to_path_buf());

        let index = FlatIndex::from_vectors(2, vec![1.0, 0.0, 0.0, 1.0]).expect("index");
        index.save(&paths.index_path).expect("save");
        std::fs::write(&paths.doc_ids_path, r#"[3, "paper-4"]"#).expect("write");

        let vindex = VectorIndex::load(&paths).expect("load");
        assert_eq!(vindex.len(), 2);
        assert_eq!(vindex.doc_key(1), Some(&DocKey::from("paper-4")));

        // A shorter identifier array must abort the load.
        std::fs::write(&paths.doc_ids_path, "[3]").expect("write");
        assert!(VectorIndex::load(&paths).is_err());
    }

    #[test]
    fn normalize_produces_unit_vector() {
        let mut vector = vec![3.0, 4.0];
        l2_normalize(&mut vector).expect("normalize");
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_rejects_zero_vector() {
        let mut vector = vec![0.0, 0.0, 0.0];
        assert!(matches!(
            l2_normalize(&mut vector),
            Err(ApiError::Embedding(_))
        ));
    }
}
