use anyhow::{anyhow, ensure, Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::import::{FilenamePattern, LookupPolicy};

pub const SETTINGS_FILE: &str = "settings.yaml";
pub const DEFAULT_FILENAME_PATTERN: &str = r"(\d+)月(\d+)日财报\.xlsx";
pub const DEFAULT_ROW: u32 = 2;
pub const DEFAULT_COLUMN: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Regex with two capture groups: month, then day
    pub filename_pattern: String,
    pub lookup: LookupPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            filename_pattern: DEFAULT_FILENAME_PATTERN.to_string(),
            lookup: LookupPolicy::Fixed {
                row: DEFAULT_ROW,
                column: DEFAULT_COLUMN,
            },
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.filename_pattern()?;
        match &self.lookup {
            LookupPolicy::Fixed { row, column } => {
                ensure!(*row >= 1, "Row index must be at least 1");
                ensure!(*column >= 1, "Column index must be at least 1");
            }
            LookupPolicy::Keyword {
                row_keyword,
                row_search_column,
                column_keyword,
                column_search_row,
            } => {
                ensure!(!row_keyword.trim().is_empty(), "Row keyword must not be empty");
                ensure!(
                    !column_keyword.trim().is_empty(),
                    "Column keyword must not be empty"
                );
                ensure!(
                    *row_search_column >= 1,
                    "Row search column must be at least 1"
                );
                ensure!(*column_search_row >= 1, "Column search row must be at least 1");
            }
        }
        Ok(())
    }

    pub fn filename_pattern(&self) -> Result<FilenamePattern> {
        FilenamePattern::new(&self.filename_pattern)
    }
}

/// Returns the default settings if the settings file doesn't exist yet
pub async fn load(path: &Path) -> Result<Settings> {
    if !tokio::fs::try_exists(path).await? {
        log::info!("No settings at {}, using defaults", path.display());
        return Ok(Settings::default());
    }
    let content = tokio::fs::read_to_string(path).await?;
    let settings: Settings = serde_yaml::from_str(&content)
        .with_context(|| anyhow!("Failed to parse settings in {}", path.display()))?;
    settings.validate()?;
    Ok(settings)
}

pub async fn save(settings: &Settings, path: &Path) -> Result<()> {
    settings.validate()?;
    tokio::fs::write(path, serde_yaml::to_string(settings)?).await?;
    Ok(())
}

pub fn prompt_edit(current: &Settings) -> Result<Settings> {
    let serialized = serde_yaml::to_string(current)?;
    let Some(edited) = dialoguer::Editor::new().extension(".yaml").edit(&serialized)? else {
        return Err(anyhow!("You did not save the edits, please try again"));
    };
    let new_settings: Settings = serde_yaml::from_str(&edited)?;
    new_settings.validate()?;
    Ok(new_settings)
}
