use anyhow::{Context as AnyhowContext, Result};
use context_index_store::ProviderConfig;
use context_indexer::{ScanOptions, DEFAULT_BATCH_SIZE};
use context_search::RetrievalConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const SETTINGS_FILE_NAME: &str = "context-index.toml";

/// Contents of `context-index.toml`. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: ProviderConfig,
    pub retrieval: RetrievalConfig,
    pub indexing: IndexingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingSettings {
    pub batch_size: usize,
    pub respect_gitignore: bool,
    pub max_file_size: u64,
}

impl Default for IndexingSettings {
    fn default() -> Self {
        let scan = ScanOptions::default();
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            respect_gitignore: scan.respect_gitignore,
            max_file_size: scan.max_file_size,
        }
    }
}

impl IndexingSettings {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            respect_gitignore: self.respect_gitignore,
            max_file_size: self.max_file_size,
        }
    }
}

impl Settings {
    /// An explicit path must exist; otherwise `<root>/context-index.toml`
    /// is used when present and defaults apply when it is not.
    pub fn load(explicit: Option<&Path>, root: &Path) -> Result<Self> {
        let settings = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = root.join(SETTINGS_FILE_NAME);
                if path.is_file() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Self = toml::from_str(&text)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.provider.validate()?;
        self.retrieval.validate()?;
        if self.indexing.batch_size == 0 {
            anyhow::bail!("indexing.batch_size must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_index_store::OllamaSettings;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_file_uses_defaults() {
        let temp = tempdir().unwrap();
        let settings = Settings::load(None, temp.path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.indexing.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn parses_all_sections() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join(SETTINGS_FILE_NAME),
            r#"
[provider]
kind = "ollama"
model = "nomic-embed-text"
dimension = 768

[retrieval]
enabled = false
max_chunks = 3

[indexing]
batch_size = 8
"#,
        )
        .unwrap();

        let settings = Settings::load(None, temp.path()).unwrap();
        assert_eq!(
            settings.provider,
            ProviderConfig::Ollama(OllamaSettings {
                base_url: "http://localhost:11434".to_string(),
                model: "nomic-embed-text".to_string(),
                dimension: 768,
            })
        );
        assert!(!settings.retrieval.enabled);
        assert_eq!(settings.retrieval.max_chunks, 3);
        assert_eq!(settings.retrieval.max_chunk_size, 2000);
        assert_eq!(settings.indexing.batch_size, 8);
        assert!(settings.indexing.respect_gitignore);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("custom.toml");
        fs::write(&path, "[retrieval]\nmin_similarity = 2.0\n").unwrap();
        assert!(Settings::load(Some(&path), temp.path()).is_err());

        fs::write(&path, "[indexing]\nbatch_size = 0\n").unwrap();
        assert!(Settings::load(Some(&path), temp.path()).is_err());

        assert!(Settings::load(Some(&temp.path().join("absent.toml")), temp.path()).is_err());
    }
}
