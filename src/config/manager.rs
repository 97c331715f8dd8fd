use super::{genetics::GeneticsConfig, render::RenderConfig, traits::ConfigSection};
use crate::error::AestheticError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Prefix of environment overrides, e.g. `AESTHETIC__RENDER__WIDTH=800`
pub const ENV_PREFIX: &str = "AESTHETIC";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Fixed seed for reproducible breeding; entropy when absent
    pub seed: Option<u64>,
    pub genetics: GeneticsConfig,
    pub render: RenderConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), AestheticError> {
        validate_section(&self.genetics)?;
        validate_section(&self.render)?;
        Ok(())
    }
}

/// Prefixes validation messages with the TOML table they came from
fn validate_section<S: ConfigSection>(section: &S) -> Result<(), AestheticError> {
    section.validate().map_err(|e| match e {
        AestheticError::Configuration(message) => {
            AestheticError::Configuration(format!("[{}] {}", S::section_name(), message))
        }
        other => other,
    })
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Loads a TOML file, then applies environment overrides on top
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), AestheticError> {
        let path = path.as_ref();
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        log::info!("Loaded configuration from {}", path.display());

        *self.write_lock() = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), AestheticError> {
        let toml_str = toml::to_string_pretty(&self.get())?;

        std::fs::write(path, toml_str)
            .map_err(|e| AestheticError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        match self.config.read() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update<F>(&self, f: F) -> Result<(), AestheticError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut candidate = self.get();
        f(&mut candidate);
        candidate.validate()?;
        *self.write_lock() = candidate;
        Ok(())
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, AppConfig> {
        match self.config.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
