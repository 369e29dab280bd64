use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parsing(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parsing(e) => write!(f, "TOML parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Parsing(value)
    }
}

/// Source tree layout. The defaults match the conventional layout: posts
/// under `_posts`, templates under `_templates`, asset directories
/// mirrored verbatim into the output.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct SiteConfig {
    pub posts_dir: String,
    pub templates_dir: String,
    pub assets: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            posts_dir: "_posts".to_string(),
            templates_dir: "_templates".to_string(),
            assets: ["css", "img", "js", "fonts"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SiteConfig {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config: SiteConfig = toml::from_str(&data)?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SiteConfig::default();
        assert_eq!(config.posts_dir, "_posts");
        assert_eq!(config.templates_dir, "_templates");
        assert_eq!(config.assets, vec!["css", "img", "js", "fonts"]);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: SiteConfig = toml::from_str("posts_dir = \"articles\"").unwrap();
        assert_eq!(config.posts_dir, "articles");
        assert_eq!(config.templates_dir, "_templates");
    }
}
