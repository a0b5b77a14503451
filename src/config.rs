use serde::Deserialize;
use thiserror::Error;

use crate::logging::LogLevel;

pub const CONFIG_ELEMENT_ID: &str = "interactions-config";

const DEFAULT_NAV_OFFSET_PX: f64 = 100.0;
const DEFAULT_ACTIVE_CLASSES: [&str; 2] = ["text-primary-600", "dark:text-primary-400"];
const DEFAULT_VISIBLE_CLASS: &str = "visible";
const DEFAULT_SUBMIT_RESET_DELAY_MS: u32 = 5_000;
const DEFAULT_FADE_THRESHOLD: f64 = 0.1;
const DEFAULT_FADE_BOTTOM_MARGIN_PX: f64 = 50.0;
const DEFAULT_FADE_STAGGER_MS: u32 = 100;
const DEFAULT_SKILL_THRESHOLD: f64 = 0.5;
const DEFAULT_SKILL_ATTRIBUTE: &str = "x-data";
const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Info;

const NAV_OFFSET_PX_BOUNDS: (f64, f64) = (0.0, 1_000.0);
const SUBMIT_RESET_DELAY_MS_BOUNDS: (u32, u32) = (100, 60_000);
const THRESHOLD_BOUNDS: (f64, f64) = (0.0, 1.0);
const FADE_BOTTOM_MARGIN_PX_BOUNDS: (f64, f64) = (0.0, 500.0);
const FADE_STAGGER_MS_BOUNDS: (u32, u32) = (0, 2_000);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("interaction config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub struct InteractionConfig {
    pub nav_offset_px: f64,
    pub active_classes: Vec<String>,
    pub visible_class: String,
    pub submit_reset_delay_ms: u32,
    pub fade_threshold: f64,
    pub fade_bottom_margin_px: f64,
    pub fade_stagger_ms: u32,
    pub skill_threshold: f64,
    pub skill_attribute: String,
    pub log_level: LogLevel,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            nav_offset_px: DEFAULT_NAV_OFFSET_PX,
            active_classes: DEFAULT_ACTIVE_CLASSES.iter().map(ToString::to_string).collect(),
            visible_class: DEFAULT_VISIBLE_CLASS.to_string(),
            submit_reset_delay_ms: DEFAULT_SUBMIT_RESET_DELAY_MS,
            fade_threshold: DEFAULT_FADE_THRESHOLD,
            fade_bottom_margin_px: DEFAULT_FADE_BOTTOM_MARGIN_PX,
            fade_stagger_ms: DEFAULT_FADE_STAGGER_MS,
            skill_threshold: DEFAULT_SKILL_THRESHOLD,
            skill_attribute: DEFAULT_SKILL_ATTRIBUTE.to_string(),
            log_level: DEFAULT_LOG_LEVEL,
        }
    }
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawInteractionConfig {
    nav_offset_px: Option<f64>,
    active_classes: Option<Vec<String>>,
    visible_class: Option<String>,
    submit_reset_delay_ms: Option<u32>,
    fade_threshold: Option<f64>,
    fade_bottom_margin_px: Option<f64>,
    fade_stagger_ms: Option<u32>,
    skill_threshold: Option<f64>,
    skill_attribute: Option<String>,
    log_level: Option<String>,
}

impl InteractionConfig {
    /// Reads overrides from the page's embedded JSON block. Fields that are
    /// missing, out of bounds or not usable as class/attribute tokens keep
    /// their defaults.
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }

        let raw: RawInteractionConfig = serde_json::from_str(source)?;
        let defaults = Self::default();

        Ok(Self {
            nav_offset_px: within_f64(raw.nav_offset_px, NAV_OFFSET_PX_BOUNDS)
                .unwrap_or(defaults.nav_offset_px),
            active_classes: raw
                .active_classes
                .filter(|classes| !classes.is_empty() && classes.iter().all(|class| is_token(class)))
                .unwrap_or(defaults.active_classes),
            visible_class: raw
                .visible_class
                .filter(|class| is_token(class))
                .unwrap_or(defaults.visible_class),
            submit_reset_delay_ms: raw
                .submit_reset_delay_ms
                .filter(|value| (SUBMIT_RESET_DELAY_MS_BOUNDS.0..=SUBMIT_RESET_DELAY_MS_BOUNDS.1).contains(value))
                .unwrap_or(defaults.submit_reset_delay_ms),
            fade_threshold: within_f64(raw.fade_threshold, THRESHOLD_BOUNDS)
                .unwrap_or(defaults.fade_threshold),
            fade_bottom_margin_px: within_f64(raw.fade_bottom_margin_px, FADE_BOTTOM_MARGIN_PX_BOUNDS)
                .unwrap_or(defaults.fade_bottom_margin_px),
            fade_stagger_ms: raw
                .fade_stagger_ms
                .filter(|value| (FADE_STAGGER_MS_BOUNDS.0..=FADE_STAGGER_MS_BOUNDS.1).contains(value))
                .unwrap_or(defaults.fade_stagger_ms),
            skill_threshold: within_f64(raw.skill_threshold, THRESHOLD_BOUNDS)
                .unwrap_or(defaults.skill_threshold),
            skill_attribute: raw
                .skill_attribute
                .filter(|name| is_token(name))
                .unwrap_or(defaults.skill_attribute),
            log_level: raw
                .log_level
                .as_deref()
                .and_then(LogLevel::parse)
                .unwrap_or(defaults.log_level),
        })
    }

    /// Root margin for the fade-in watcher: shrinks the viewport's bottom
    /// edge only.
    pub fn fade_root_margin(&self) -> String {
        format!("0px 0px -{}px 0px", self.fade_bottom_margin_px)
    }
}

fn within_f64(value: Option<f64>, bounds: (f64, f64)) -> Option<f64> {
    value.filter(|value| value.is_finite() && (bounds.0..=bounds.1).contains(value))
}

fn is_token(value: &str) -> bool {
    !value.is_empty() && !value.chars().any(char::is_whitespace)
}
