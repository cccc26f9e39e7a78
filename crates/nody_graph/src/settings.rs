// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime settings for graphs, stored as RON.

use crate::error::Result;
use crate::loop_guard::DEFAULT_LOOP_WINDOW;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings applied to a graph when it is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Length of the loop guard window, in real-time seconds
    pub loop_window_secs: f64,
    /// Whether the graph ticks its nodes
    pub enabled: bool,
}

impl GraphSettings {
    /// Loop guard window as a [`Duration`]
    pub fn loop_window(&self) -> Duration {
        if self.loop_window_secs.is_finite() && self.loop_window_secs >= 0.0 {
            // Rounded to whole nanoseconds so 0.1 maps back to exactly 100ms
            Duration::from_nanos((self.loop_window_secs * 1e9).round() as u64)
        } else {
            DEFAULT_LOOP_WINDOW
        }
    }

    /// Serialize to RON
    pub fn to_ron(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Deserialize from RON; missing fields take their defaults
    pub fn from_ron(s: &str) -> Result<Self> {
        Ok(ron::from_str(s)?)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron(&contents).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            loop_window_secs: DEFAULT_LOOP_WINDOW.as_secs_f64(),
            enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = GraphSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.loop_window(), DEFAULT_LOOP_WINDOW);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let settings = GraphSettings::from_ron("(enabled: false)").unwrap();
        assert!(!settings.enabled);
        assert_eq!(settings.loop_window(), DEFAULT_LOOP_WINDOW);

        let settings = GraphSettings::from_ron("(loop_window_secs: 0.25)").unwrap();
        assert_eq!(settings.loop_window(), Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_window_falls_back() {
        let settings = GraphSettings {
            loop_window_secs: -1.0,
            enabled: true,
        };
        assert_eq!(settings.loop_window(), DEFAULT_LOOP_WINDOW);
    }

    #[test]
    fn test_settings_serialization() {
        let settings = GraphSettings {
            loop_window_secs: 0.5,
            enabled: false,
        };
        let ron = settings.to_ron().unwrap();
        assert_eq!(GraphSettings::from_ron(&ron).unwrap(), settings);
        assert!(GraphSettings::from_ron("(enabled: maybe)").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("nody_settings_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let good = dir.join("graph.ron");
        let bad = dir.join("broken.ron");
        std::fs::write(&good, "(loop_window_secs: 0.2)").unwrap();
        std::fs::write(&bad, "(loop_window_secs: ").unwrap();

        let settings = GraphSettings::load(&good).unwrap();
        assert_eq!(settings.loop_window(), Duration::from_millis(200));
        assert!(settings.enabled);
        assert_eq!(
            GraphSettings::load(&bad).unwrap_err().kind(),
            std::io::ErrorKind::InvalidData
        );
        assert_eq!(
            GraphSettings::load(&dir.join("missing.ron")).unwrap_err().kind(),
            std::io::ErrorKind::NotFound
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
