//! Blacklist and mixer label collaborator
//!
//! Label file format (`RUSTER_LABELS_PATH`):
//! ```json
//! { "blacklist": ["0x..."], "mixer_labels": ["tornado cash", "0x..."] }
//! ```
//! A missing `mixer_labels` key keeps the built-in mixer list.

use serde::Deserialize;
use std::path::Path;
use tracing::info;

use super::resolver::normalize_address;
use crate::core::laundering::LabelSnapshot;
use crate::models::errors::{AppError, AppResult};
use crate::utils::constants::DEFAULT_MIXER_LABELS;

#[derive(Debug, Default, Deserialize)]
struct LabelFile {
    #[serde(default)]
    blacklist: Vec<String>,
    #[serde(default)]
    mixer_labels: Option<Vec<String>>,
}

/// Built-in mixer labels, empty blacklist
pub fn default_labels() -> LabelSnapshot {
    LabelSnapshot::new(
        std::iter::empty(),
        DEFAULT_MIXER_LABELS.iter().map(|l| l.to_string()),
    )
}

pub fn parse_labels(raw: &str) -> AppResult<LabelSnapshot> {
    let file: LabelFile = serde_json::from_str(raw)
        .map_err(|e| AppError::invalid_config(format!("label file is not valid JSON: {}", e)))?;

    let mixer_labels: Vec<String> = match file.mixer_labels {
        Some(labels) => labels
            .into_iter()
            .map(|l| {
                let l = l.trim();
                if l.starts_with("0x") {
                    normalize_address(l).as_str().to_string()
                } else {
                    l.to_string()
                }
            })
            .collect(),
        None => DEFAULT_MIXER_LABELS.iter().map(|l| l.to_string()).collect(),
    };

    Ok(LabelSnapshot::new(
        file.blacklist.iter().map(|a| normalize_address(a)),
        mixer_labels,
    ))
}

/// Load labels from `path`, or the defaults when no path is configured
pub fn load_labels(path: Option<&Path>) -> AppResult<LabelSnapshot> {
    let Some(path) = path else {
        return Ok(default_labels());
    };

    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::invalid_config(format!("cannot read label file {}: {}", path.display(), e))
    })?;
    let labels = parse_labels(&raw)?;
    info!(
        "🏷️ Loaded {} blacklisted addresses and {} mixer labels from {}",
        labels.blacklist.len(),
        labels.mixer_labels.len(),
        path.display()
    );
    Ok(labels)
}
