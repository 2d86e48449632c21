use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use crate::highlight::{OverlayStyle, RetryPolicy};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "citemark";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightSettings {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_view_change_delay_ms")]
    pub view_change_delay_ms: u64,

    #[serde(default)]
    pub overlay: OverlayStyle,
}

impl HighlightSettings {
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            max_retries: self.max_retries,
            view_change_delay: Duration::from_millis(self.view_change_delay_ms),
        }
        .clamped()
    }
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_retry_delay_ms() -> u64 {
    200
}

fn default_max_retries() -> u32 {
    5
}

fn default_view_change_delay_ms() -> u64 {
    100
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retries: default_max_retries(),
            view_change_delay_ms: default_view_change_delay_ms(),
            overlay: OverlayStyle::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub highlight: HighlightSettings,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            highlight: HighlightSettings::default(),
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the default location, creating the file on first run
pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };

    if path.exists() {
        load_settings_from_path(&path);
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
    }
}

/// Load settings from an explicit file; parse or read failures keep the current settings
pub fn load_settings_from_path(path: &Path) {
    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version > CURRENT_VERSION {
                    warn!(
                        "Settings file {path:?} is v{}, newer than supported v{CURRENT_VERSION}; unknown keys are ignored",
                        settings.version
                    );
                }

                if let Ok(mut global) = SETTINGS.write() {
                    *global = settings;
                }
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
        }
    }
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let content = generate_settings_yaml(settings);

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let h = &settings.highlight;
    let fill = &h.overlay.fill;
    let mut content = String::new();

    content.push_str(&format!("version: {}\n", settings.version));
    content.push('\n');
    content.push_str(HIGHLIGHT_TEMPLATE);
    content.push_str("highlight:\n");
    content.push_str(&format!("  initial_delay_ms: {}\n", h.initial_delay_ms));
    content.push_str(&format!("  retry_delay_ms: {}\n", h.retry_delay_ms));
    content.push_str(&format!("  max_retries: {}\n", h.max_retries));
    content.push_str(&format!(
        "  view_change_delay_ms: {}\n",
        h.view_change_delay_ms
    ));
    content.push_str("  overlay:\n");
    content.push_str(&format!(
        "    fill: {{ r: {}, g: {}, b: {}, a: {} }}\n",
        fill.r, fill.g, fill.b, fill.a
    ));
    content.push_str(&format!(
        "    corner_radius: {}\n",
        h.overlay.corner_radius
    ));
    content.push_str(&format!("    z_index: {}\n", h.overlay.z_index));
    content.push_str(&format!("    pass_through: {}\n", h.overlay.pass_through));

    content
}

const HIGHLIGHT_TEMPLATE: &str = r#"# ============================================================================
# Highlight
# ============================================================================
# initial_delay_ms      wait before the first locate attempt
# retry_delay_ms        wait between attempts while the page is still rendering
# max_retries           attempts after the first one before giving up
# view_change_delay_ms  wait after zoom/scroll before re-locating
# overlay               marker color (alpha 0.0-1.0), corner radius in px,
#                       stacking order, and whether clicks pass through

"#;

// Public API for accessing settings

pub fn get_settings() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

pub fn get_retry_policy() -> RetryPolicy {
    SETTINGS
        .read()
        .map(|s| s.highlight.retry_policy())
        .unwrap_or_default()
}

pub fn get_overlay_style() -> OverlayStyle {
    SETTINGS
        .read()
        .map(|s| s.highlight.overlay)
        .unwrap_or_default()
}

pub fn set_highlight_settings(highlight: HighlightSettings) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.highlight = highlight;
    }
}

/// Write the current settings to `path`
pub fn save_settings_to(path: &Path) {
    if let Ok(settings) = SETTINGS.read() {
        save_settings_to_file(&settings, path);
    }
}
