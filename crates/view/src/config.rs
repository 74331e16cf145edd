//! View configuration, read from `bizflow.toml`.
//!
//! ```toml
//! [view]
//! page_size = 25
//! utc_offset = "+02:00"
//!
//! [board]
//! lead_placement = "prepend"
//! ```

use serde::{Deserialize, Serialize};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::UtcOffset;

use crate::board::Placement;
use crate::error::ViewError;

const OFFSET_FORMAT: &[FormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub board: BoardConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Offset used to interpret calendar-day date ranges.
    #[serde(default = "default_offset")]
    pub utc_offset: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            utc_offset: default_offset(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default = "default_lead_placement")]
    pub lead_placement: Placement,
    #[serde(default = "default_task_placement")]
    pub task_placement: Placement,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            lead_placement: default_lead_placement(),
            task_placement: default_task_placement(),
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_offset() -> String {
    "+00:00".to_string()
}

fn default_lead_placement() -> Placement {
    Placement::Prepend
}

fn default_task_placement() -> Placement {
    Placement::Append
}

impl Config {
    /// Parse TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self, ViewError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ViewError> {
        if self.view.page_size == 0 {
            return Err(ViewError::InvalidPageSize);
        }
        parse_offset(&self.view.utc_offset).map_err(ViewError::InvalidOffset)?;
        Ok(())
    }

    /// The configured offset, UTC if it does not parse.
    pub fn utc_offset(&self) -> UtcOffset {
        parse_offset(&self.view.utc_offset).unwrap_or(UtcOffset::UTC)
    }
}

/// Parse `+HH:MM` / `-HH:MM`; `Z` and `UTC` mean zero offset.
pub fn parse_offset(raw: &str) -> Result<UtcOffset, String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(raw, OFFSET_FORMAT).map_err(|e| format!("invalid UTC offset '{}': {}", raw, e))
}

pub fn format_offset(offset: UtcOffset) -> String {
    offset
        .format(OFFSET_FORMAT)
        .unwrap_or_else(|_| "+00:00".to_string())
}
