mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// the resulting values are unusable.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every generation or ingestion fail.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.generation.max_attempts == 0 {
            bail!("generation.max_attempts must be at least 1");
        }
        if self.generation.quiz_questions == 0 {
            bail!("generation.quiz_questions must be at least 1");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be at least 1");
        }
        if self.ingest.max_files == 0 {
            bail!("ingest.max_files must be at least 1");
        }
        for (name, window) in [
            ("chunking.generic", self.chunking.generic),
            ("chunking.prose", self.chunking.prose),
            ("chunking.code", self.chunking.code),
        ] {
            if window.size == 0 {
                bail!("{name}.size must be at least 1");
            }
        }
        Ok(())
    }
}
