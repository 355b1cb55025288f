use serde::{Deserialize, Serialize};
use ts_rs::TS;
use tokio::fs;
use std::path::{Path, PathBuf};
use directories::ProjectDirs;
use tracing::{debug, info};

use crate::core::units::registry::MeasurementSystem;
use crate::shared::error::{AppError, AppResult};

/// Farm-wide preferences read by task forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export, export_to = "bindings.ts")]
pub struct FarmSettings {
    /// Measurement system offered in unit selectors
    pub measurement: MeasurementSystem,
    pub language: String,
    /// Decimals shown in the location-area preview label
    pub preview_decimals: u32,
}

impl Default for FarmSettings {
    fn default() -> Self {
        Self {
            measurement: MeasurementSystem::Metric,
            language: "en".to_string(),
            preview_decimals: 2,
        }
    }
}

impl FarmSettings {
    pub fn get_settings_path() -> AppResult<PathBuf> {
        ProjectDirs::from("org", "litefarm", "farm-units")
            .map(|dirs| dirs.config_dir().join("settings.json"))
            .ok_or_else(|| AppError::Settings("Failed to determine config directory".to_string()))
    }

    /// Load from the platform config dir, writing defaults when absent
    pub async fn load() -> AppResult<Self> {
        let path = Self::get_settings_path()?;
        Self::load_from(&path).await
    }

    pub async fn save(&self) -> AppResult<()> {
        let path = Self::get_settings_path()?;
        self.save_to(&path).await
    }

    pub async fn load_from(path: &Path) -> AppResult<Self> {
        if !fs::try_exists(path).await? {
            info!(path = %path.display(), "no settings file, writing defaults");
            let settings = Self::default();
            settings.save_to(path).await?;
            return Ok(settings);
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| AppError::Settings(format!("Failed to read settings file: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| AppError::Settings(format!("Failed to parse settings: {}", e)))
    }

    pub async fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Settings(format!("Failed to create config directory: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .await
            .map_err(|e| AppError::Settings(format!("Failed to write settings file: {}", e)))?;

        debug!(path = %path.display(), "settings saved");
        Ok(())
    }
}
