//! Conversion limits and defaults.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ICON_SIZES, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_WIDTH_LIMIT, DEFAULT_QUALITY,
};

fn default_max_file_size() -> usize {
    DEFAULT_MAX_FILE_SIZE
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

fn default_max_width_limit() -> u32 {
    DEFAULT_MAX_WIDTH_LIMIT
}

fn default_icon_sizes() -> Vec<u32> {
    DEFAULT_ICON_SIZES.to_vec()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Maximum uploaded file size in bytes (default: 50 MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,

    /// Quality substituted for missing or out-of-range values
    #[serde(default = "default_quality")]
    pub default_quality: u8,

    /// Upper bound for `maxWidth`; larger values are ignored
    #[serde(default = "default_max_width_limit")]
    pub max_width_limit: u32,

    /// Square sizes embedded in generated icons
    #[serde(default = "default_icon_sizes")]
    pub icon_sizes: Vec<u32>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            default_quality: default_quality(),
            max_width_limit: default_max_width_limit(),
            icon_sizes: default_icon_sizes(),
        }
    }
}

impl ConverterConfig {
    /// Maximum file size rounded down to whole megabytes, for messages
    pub fn max_file_size_mb(&self) -> usize {
        self.max_file_size / (1024 * 1024)
    }
}
