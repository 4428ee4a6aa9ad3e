//! Paths and settings.
//!
//! `AppPaths` decides where persisted state lives (index files, document
//! database, logs). `Settings` is the user-editable `config.toml`, with
//! environment variables taking precedence for secrets and test overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub index_path: PathBuf,
    pub doc_ids_path: PathBuf,
    pub doc_info_path: PathBuf,
    pub db_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let data_dir = discover_data_dir();
        Self::with_data_dir(data_dir)
    }

    /// Root all paths under an explicit directory (used by tests).
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        let log_dir = data_dir.join("logs");
        let index_path = data_dir.join("vector_store.index");
        let doc_ids_path = data_dir.join("doc_ids.json");
        let doc_info_path = data_dir.join("doc_info.json");
        let db_path = data_dir.join("documents.db");

        for dir in [&data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            log_dir,
            index_path,
            doc_ids_path,
            doc_info_path,
            db_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_data_dir() -> PathBuf {
    if let Ok(dir) = env::var("PAPERQA_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(debug_assertions) {
        return PathBuf::from("./data");
    }

    if cfg!(target_os = "windows") {
        let base = env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string()));
        return PathBuf::from(base).join("PaperQA");
    }

    if cfg!(target_os = "macos") {
        return home_dir()
            .join("Library")
            .join("Application Support")
            .join("PaperQA");
    }

    let xdg = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        home_dir()
            .join(".local")
            .join("share")
            .to_string_lossy()
            .to_string()
    });
    PathBuf::from(xdg).join("paperqa")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// User-facing settings, loaded from `config.toml` in the data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of an OpenAI-compatible API.
    pub llm_base_url: String,
    /// Chat model used for answer generation.
    pub chat_model: String,
    /// Embedding model used for query encoding.
    pub embedding_model: String,
    /// Number of context items to aim for per query.
    pub top_k: usize,
    /// Sampling temperature for generation.
    pub temperature: f64,
    /// Token budget for generated answers.
    pub max_tokens: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm_base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            top_k: 5,
            temperature: 0.2,
            max_tokens: 1500,
        }
    }
}

impl Settings {
    /// Load settings from `config.toml`, falling back to defaults when the
    /// file is absent. A malformed file is an error, not a silent default.
    pub fn load(paths: &AppPaths) -> Result<Self, ApiError> {
        let path = config_path(paths);
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path).map_err(ApiError::internal)?;
        toml::from_str(&raw)
            .map_err(|e| ApiError::BadRequest(format!("invalid config.toml: {}", e)))
    }

    /// API key comes from the environment only; it is never written to disk.
    pub fn api_key() -> Option<String> {
        env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty())
    }
}

fn config_path(paths: &AppPaths) -> PathBuf {
    if let Ok(path) = env::var("PAPERQA_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    paths.data_dir.join("config.toml")
}

/// Startup check: the serialized index and identifier array must both be
/// present before the service can answer anything.
pub fn validate_index_files(paths: &AppPaths) -> Result<(), ApiError> {
    for (label, path) in [
        ("vector index", &paths.index_path),
        ("document id array", &paths.doc_ids_path),
    ] {
        if !path.exists() {
            return Err(ApiError::NotFound(format!(
                "{} missing at {}",
                label,
                display_path(path)
            )));
        }
    }
    Ok(())
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_generation_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.top_k, 5);
        assert!((settings.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(settings.max_tokens, 1500);
    }

    #[test]
    fn paths_derive_from_data_dir() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::with_data_dir(tmp.path().to_path_buf());
        assert_eq!(paths.index_path, tmp.path().join("vector_store.index"));
        assert_eq!(paths.doc_ids_path, tmp.path().join("doc_ids.json"));
        assert!(paths.log_dir.exists());
    }

    #[test]
    fn missing_index_files_fail_validation() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::with_data_dir(tmp.path().to_path_buf());
        assert!(validate_index_files(&paths).is_err());

        std::fs::write(&paths.index_path, b"").expect("write");
        std::fs::write(&paths.doc_ids_path, b"[]").expect("write");
        assert!(validate_index_files(&paths).is_ok());
    }
}
