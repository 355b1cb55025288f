//! Settings command module
//!
//! Handles farm settings persistence.

use crate::shared::error::AppResult;
use crate::shared::settings::FarmSettings;

/// Get current farm settings
pub async fn get_settings() -> AppResult<FarmSettings> {
    FarmSettings::load().await
}

/// Save farm settings
pub async fn save_settings(settings: FarmSettings) -> AppResult<()> {
    settings.save().await
}
