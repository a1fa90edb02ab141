use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use serde::de::Deserializer;
use serde::Deserialize;

use crate::assets::{AssetStore, DEFAULT_ASSET_DIR, DEFAULT_ASSET_EXTENSION};
use crate::fragment::{default_labels, FragmentOptions, DEFAULT_FRAGMENT_LENGTH};
use crate::search::SearchSettings;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_NAME: &str = "ocrcat";
const DEFAULT_CATALOG: &str = "catalogo_ocr.json";
const DEFAULT_IMAGE_WIDTH: u16 = 100;
const DEFAULT_COLUMNS: [u16; 2] = [1, 2];

#[derive(Debug, Clone)]
pub struct Config {
    /// File the configuration was read from, if any
    pub config_path: Option<PathBuf>,
    pub catalog: PathBuf,
    pub assets: AssetsConfig,
    pub presentation: PresentationConfig,
    pub keys: Keys,
    pub ui: UiConfig,
}

impl Config {
    pub fn asset_store(&self) -> AssetStore {
        AssetStore::new(self.assets.dir.clone(), self.assets.extension.clone())
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            fragment: FragmentOptions {
                length: self.presentation.fragment_length,
                clean: self.presentation.clean_text,
                labels: self.presentation.labels.clone(),
            },
            assets: self.asset_store(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: None,
            catalog: PathBuf::from(DEFAULT_CATALOG),
            assets: AssetsConfig::default(),
            presentation: PresentationConfig::default(),
            keys: Keys::default(),
            ui: UiConfig::default(),
        }
    }
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

// =============================================================================
// Assets & Presentation
// =============================================================================

#[derive(Debug, Clone)]
pub struct AssetsConfig {
    pub dir: PathBuf,
    pub extension: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_ASSET_DIR),
            extension: DEFAULT_ASSET_EXTENSION.to_string(),
        }
    }
}

/// Presentation knobs shared by the terminal UI and the `query` output.
#[derive(Debug, Clone)]
pub struct PresentationConfig {
    /// Characters of page text shown per result
    pub fragment_length: usize,
    /// Maximum width in cells of the full-image viewer
    pub image_width: u16,
    /// Relative widths of the thumbnail and fragment columns in the preview
    pub columns: [u16; 2],
    pub clean_text: bool,
    pub labels: Vec<String>,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            fragment_length: DEFAULT_FRAGMENT_LENGTH,
            image_width: DEFAULT_IMAGE_WIDTH,
            columns: DEFAULT_COLUMNS,
            clean_text: false,
            labels: default_labels(),
        }
    }
}

// =============================================================================
// UI
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct UiConfig {
    pub colors: UiColors,
}

#[derive(Debug, Clone)]
pub struct UiColors {
    pub border: RgbColor,
    pub selection_bg: RgbColor,
    pub selection_fg: RgbColor,
    pub separator: RgbColor,
    pub status_fg: RgbColor,
    pub status_bg: RgbColor,
    pub highlight: RgbColor,
}

impl Default for UiColors {
    fn default() -> Self {
        UiColorsFile::default().into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

// =============================================================================
// Key Bindings - Context-aware with multiple bindings per action
// =============================================================================

/// All key bindings organized by context
#[derive(Debug, Clone)]
pub struct Keys {
    /// Global keys (work outside the search input)
    pub global: GlobalKeys,
    /// Keys for search input mode
    pub search_input: SearchInputKeys,
    /// Keys for search results navigation
    pub search_results: SearchResultsKeys,
    /// Keys for the full-image viewer
    pub viewer: ViewerKeys,
}

#[derive(Debug, Clone)]
pub struct GlobalKeys {
    pub quit: Vec<String>,
    pub search: Vec<String>,
    pub help: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SearchInputKeys {
    pub cancel: Vec<String>,
    pub confirm: Vec<String>,
    pub next: Vec<String>,
    pub prev: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SearchResultsKeys {
    pub cancel: Vec<String>,
    pub confirm: Vec<String>,
    pub next: Vec<String>,
    pub prev: Vec<String>,
    pub page_down: Vec<String>,
    pub page_up: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ViewerKeys {
    pub close: Vec<String>,
    pub next: Vec<String>,
    pub prev: Vec<String>,
}

impl Default for Keys {
    fn default() -> Self {
        Self {
            global: GlobalKeys::default(),
            search_input: SearchInputKeys::default(),
            search_results: SearchResultsKeys::default(),
            viewer: ViewerKeys::default(),
        }
    }
}

impl Default for GlobalKeys {
    fn default() -> Self {
        Self {
            quit: vec!["q".into()],
            search: vec!["/".into()],
            help: vec!["F1".into(), "?".into()],
        }
    }
}

impl Default for SearchInputKeys {
    fn default() -> Self {
        Self {
            cancel: vec!["Escape".into()],
            confirm: vec!["Enter".into()],
            next: vec!["Down".into(), "Tab".into()],
            prev: vec!["Up".into(), "Backtab".into()],
        }
    }
}

impl Default for SearchResultsKeys {
    fn default() -> Self {
        Self {
            cancel: vec!["Escape".into()],
            confirm: vec!["Enter".into(), "Space".into()],
            next: vec!["j".into(), "Down".into(), "Tab".into()],
            prev: vec!["k".into(), "Up".into(), "Backtab".into()],
            page_down: vec!["PageDown".into()],
            page_up: vec!["PageUp".into()],
        }
    }
}

impl Default for ViewerKeys {
    fn default() -> Self {
        Self {
            close: vec!["Escape".into(), "q".into(), "Enter".into()],
            next: vec!["n".into(), "l".into(), "Right".into()],
            prev: vec!["p".into(), "h".into(), "Left".into()],
        }
    }
}

// =============================================================================
// Serde deserialization types (support both single string and array)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum KeyBinding {
    Single(String),
    Multiple(Vec<String>),
}

impl KeyBinding {
    fn into_vec(self) -> Vec<String> {
        match self {
            KeyBinding::Single(s) => vec![s],
            KeyBinding::Multiple(v) => v,
        }
    }
}

impl Default for KeyBinding {
    fn default() -> Self {
        KeyBinding::Multiple(vec![])
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct KeysFile {
    global: GlobalKeysFile,
    search_input: SearchInputKeysFile,
    search_results: SearchResultsKeysFile,
    viewer: ViewerKeysFile,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GlobalKeysFile {
    quit: KeyBinding,
    search: KeyBinding,
    help: KeyBinding,
}

impl Default for GlobalKeysFile {
    fn default() -> Self {
        let defaults = GlobalKeys::default();
        Self {
            quit: KeyBinding::Multiple(defaults.quit),
            search: KeyBinding::Multiple(defaults.search),
            help: KeyBinding::Multiple(defaults.help),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SearchInputKeysFile {
    cancel: KeyBinding,
    confirm: KeyBinding,
    next: KeyBinding,
    prev: KeyBinding,
}

impl Default for SearchInputKeysFile {
    fn default() -> Self {
        let defaults = SearchInputKeys::default();
        Self {
            cancel: KeyBinding::Multiple(defaults.cancel),
            confirm: KeyBinding::Multiple(defaults.confirm),
            next: KeyBinding::Multiple(defaults.next),
            prev: KeyBinding::Multiple(defaults.prev),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SearchResultsKeysFile {
    cancel: KeyBinding,
    confirm: KeyBinding,
    next: KeyBinding,
    prev: KeyBinding,
    page_down: KeyBinding,
    page_up: KeyBinding,
}

impl Default for SearchResultsKeysFile {
    fn default() -> Self {
        let defaults = SearchResultsKeys::default();
        Self {
            cancel: KeyBinding::Multiple(defaults.cancel),
            confirm: KeyBinding::Multiple(defaults.confirm),
            next: KeyBinding::Multiple(defaults.next),
            prev: KeyBinding::Multiple(defaults.prev),
            page_down: KeyBinding::Multiple(defaults.page_down),
            page_up: KeyBinding::Multiple(defaults.page_up),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ViewerKeysFile {
    close: KeyBinding,
    next: KeyBinding,
    prev: KeyBinding,
}

impl Default for ViewerKeysFile {
    fn default() -> Self {
        let defaults = ViewerKeys::default();
        Self {
            close: KeyBinding::Multiple(defaults.close),
            next: KeyBinding::Multiple(defaults.next),
            prev: KeyBinding::Multiple(defaults.prev),
        }
    }
}

// =============================================================================
// Conversion from file types to runtime types
// =============================================================================

impl From<KeysFile> for Keys {
    fn from(file: KeysFile) -> Self {
        Self {
            global: file.global.into(),
            search_input: file.search_input.into(),
            search_results: file.search_results.into(),
            viewer: file.viewer.into(),
        }
    }
}

impl From<GlobalKeysFile> for GlobalKeys {
    fn from(file: GlobalKeysFile) -> Self {
        Self {
            quit: file.quit.into_vec(),
            search: file.search.into_vec(),
            help: file.help.into_vec(),
        }
    }
}

impl From<SearchInputKeysFile> for SearchInputKeys {
    fn from(file: SearchInputKeysFile) -> Self {
        Self {
            cancel: file.cancel.into_vec(),
            confirm: file.confirm.into_vec(),
            next: file.next.into_vec(),
            prev: file.prev.into_vec(),
        }
    }
}

impl From<SearchResultsKeysFile> for SearchResultsKeys {
    fn from(file: SearchResultsKeysFile) -> Self {
        Self {
            cancel: file.cancel.into_vec(),
            confirm: file.confirm.into_vec(),
            next: file.next.into_vec(),
            prev: file.prev.into_vec(),
            page_down: file.page_down.into_vec(),
            page_up: file.page_up.into_vec(),
        }
    }
}

impl From<ViewerKeysFile> for ViewerKeys {
    fn from(file: ViewerKeysFile) -> Self {
        Self {
            close: file.close.into_vec(),
            next: file.next.into_vec(),
            prev: file.prev.into_vec(),
        }
    }
}

// =============================================================================
// Key binding validation
// =============================================================================

/// Normalize a key binding string to a canonical form for collision detection.
/// Single characters preserve case (since 'M' means Shift+m, different from 'm').
/// Multi-character key names are case-insensitive (Enter, ENTER, enter are the same).
fn normalize_binding(binding: &str) -> String {
    let trimmed = binding.trim();
    if trimmed.chars().count() == 1 {
        trimmed.to_string()
    } else {
        match trimmed.to_ascii_lowercase().as_str() {
            "esc" => "escape".to_string(),
            "shift+tab" => "backtab".to_string(),
            "page_up" => "pageup".to_string(),
            "page_down" => "pagedown".to_string(),
            other => other.to_string(),
        }
    }
}

/// Check for collisions within a single context
fn check_context_collisions(bindings: &[(&str, &[String])], context_name: &str) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();

    for (action_name, keys) in bindings {
        for key in *keys {
            let normalized = normalize_binding(key);
            if normalized.is_empty() {
                continue;
            }
            if let Some(existing_action) = seen.get(&normalized) {
                bail!(
                    "key binding collision in [keys.{}]: '{}' is bound to both '{}' and '{}'",
                    context_name,
                    key,
                    existing_action,
                    action_name
                );
            }
            seen.insert(normalized, action_name);
        }
    }

    Ok(())
}

/// Validate all key bindings for collisions within each context
fn validate_key_bindings(keys: &Keys) -> Result<()> {
    check_context_collisions(
        &[
            ("quit", &keys.global.quit),
            ("search", &keys.global.search),
            ("help", &keys.global.help),
        ],
        "global",
    )?;

    check_context_collisions(
        &[
            ("cancel", &keys.search_input.cancel),
            ("confirm", &keys.search_input.confirm),
            ("next", &keys.search_input.next),
            ("prev", &keys.search_input.prev),
        ],
        "search_input",
    )?;

    check_context_collisions(
        &[
            ("cancel", &keys.search_results.cancel),
            ("confirm", &keys.search_results.confirm),
            ("next", &keys.search_results.next),
            ("prev", &keys.search_results.prev),
            ("page_down", &keys.search_results.page_down),
            ("page_up", &keys.search_results.page_up),
        ],
        "search_results",
    )?;

    check_context_collisions(
        &[
            ("close", &keys.viewer.close),
            ("next", &keys.viewer.next),
            ("prev", &keys.viewer.prev),
        ],
        "viewer",
    )?;

    Ok(())
}

// =============================================================================
// Config file structure
// =============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    catalog: Option<PathBuf>,
    assets: AssetsFile,
    presentation: PresentationFile,
    keys: KeysFile,
    ui: UiFile,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct AssetsFile {
    dir: Option<PathBuf>,
    extension: Option<String>,
}

impl From<AssetsFile> for AssetsConfig {
    fn from(file: AssetsFile) -> Self {
        let defaults = AssetsConfig::default();
        let extension = file
            .extension
            .map(|ext| ext.trim().trim_start_matches('.').to_string())
            .filter(|ext| !ext.is_empty())
            .unwrap_or(defaults.extension);
        Self {
            dir: file
                .dir
                .map(|dir| expand_tilde(&dir))
                .unwrap_or(defaults.dir),
            extension,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PresentationFile {
    fragment_length: usize,
    image_width: u16,
    columns: [u16; 2],
    clean_text: bool,
    labels: Vec<String>,
}

impl Default for PresentationFile {
    fn default() -> Self {
        let defaults = PresentationConfig::default();
        Self {
            fragment_length: defaults.fragment_length,
            image_width: defaults.image_width,
            columns: defaults.columns,
            clean_text: defaults.clean_text,
            labels: defaults.labels,
        }
    }
}

impl From<PresentationFile> for PresentationConfig {
    fn from(file: PresentationFile) -> Self {
        let fragment_length = if file.fragment_length == 0 {
            DEFAULT_FRAGMENT_LENGTH
        } else {
            file.fragment_length
        };
        let image_width = if file.image_width == 0 {
            DEFAULT_IMAGE_WIDTH
        } else {
            file.image_width
        };
        let columns = if file.columns.iter().all(|&c| c == 0) {
            DEFAULT_COLUMNS
        } else {
            file.columns
        };
        let labels = file
            .labels
            .into_iter()
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .collect();
        Self {
            fragment_length,
            image_width,
            columns,
            clean_text: file.clean_text,
            labels,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct UiFile {
    colors: UiColorsFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct UiColorsFile {
    border: RgbColor,
    selection_bg: RgbColor,
    selection_fg: RgbColor,
    separator: RgbColor,
    status_fg: RgbColor,
    status_bg: RgbColor,
    highlight: RgbColor,
}

impl Default for UiColorsFile {
    fn default() -> Self {
        Self {
            border: RgbColor::new(255, 165, 0),
            selection_bg: RgbColor::new(255, 165, 0),
            selection_fg: RgbColor::new(0, 0, 0),
            separator: RgbColor::new(255, 165, 0),
            status_fg: RgbColor::new(255, 165, 0),
            status_bg: RgbColor::new(0, 0, 0),
            highlight: RgbColor::new(255, 215, 0),
        }
    }
}

impl From<UiColorsFile> for UiColors {
    fn from(file: UiColorsFile) -> Self {
        Self {
            border: file.border,
            selection_bg: file.selection_bg,
            selection_fg: file.selection_fg,
            separator: file.separator,
            status_fg: file.status_fg,
            status_bg: file.status_bg,
            highlight: file.highlight,
        }
    }
}

impl From<UiFile> for UiConfig {
    fn from(file: UiFile) -> Self {
        Self {
            colors: file.colors.into(),
        }
    }
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Load configuration from `explicit` or the default location.
///
/// An explicit path must exist. A missing default file yields built-in defaults.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => {
            let path = expand_tilde(path);
            if !path.exists() {
                bail!("configuration file not found at {}", path.display());
            }
            path
        }
        None => {
            let path = config_path()?;
            if !path.exists() {
                tracing::debug!(path = %path.display(), "no configuration file, using defaults");
                return Ok(Config::default());
            }
            path
        }
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;

    let mut config = parse(&raw).with_context(|| format!("invalid configuration in {}", path.display()))?;
    config.config_path = Some(path);
    Ok(config)
}

pub fn parse(raw: &str) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw).context("failed to parse configuration as TOML")?;

    warn_unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .context("failed to deserialize configuration")?;

    let keys: Keys = cfg_file.keys.into();
    validate_key_bindings(&keys)?;

    let catalog = cfg_file
        .catalog
        .map(|path| expand_tilde(&path))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG));

    Ok(Config {
        config_path: None,
        catalog,
        assets: cfg_file.assets.into(),
        presentation: cfg_file.presentation.into(),
        keys,
        ui: cfg_file.ui.into(),
    })
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn warn_unknown_keys(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    warn_unknown_in_table(
        value,
        "",
        &["catalog", "assets", "presentation", "keys", "ui"],
    );

    if let Some(v) = table.get("assets") {
        warn_unknown_in_table(v, "assets.", &["dir", "extension"]);
    }
    if let Some(v) = table.get("presentation") {
        warn_unknown_in_table(
            v,
            "presentation.",
            &["fragment_length", "image_width", "columns", "clean_text", "labels"],
        );
    }
    if let Some(keys_val) = table.get("keys") {
        warn_unknown_keys_section(keys_val);
    }
    if let Some(ui_val) = table.get("ui") {
        warn_unknown_in_table(ui_val, "ui.", &["colors"]);
        if let Some(colors) = ui_val.get("colors") {
            warn_unknown_in_table(
                colors,
                "ui.colors.",
                &[
                    "border",
                    "selection_bg",
                    "selection_fg",
                    "separator",
                    "status_fg",
                    "status_bg",
                    "highlight",
                ],
            );
        }
    }
}

fn warn_unknown_keys_section(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    warn_unknown_in_table(
        value,
        "keys.",
        &["global", "search_input", "search_results", "viewer"],
    );

    if let Some(v) = table.get("global") {
        warn_unknown_in_table(v, "keys.global.", &["quit", "search", "help"]);
    }
    if let Some(v) = table.get("search_input") {
        warn_unknown_in_table(
            v,
            "keys.search_input.",
            &["cancel", "confirm", "next", "prev"],
        );
    }
    if let Some(v) = table.get("search_results") {
        warn_unknown_in_table(
            v,
            "keys.search_results.",
            &["cancel", "confirm", "next", "prev", "page_down", "page_up"],
        );
    }
    if let Some(v) = table.get("viewer") {
        warn_unknown_in_table(v, "keys.viewer.", &["close", "next", "prev"]);
    }
}

fn warn_unknown_in_table(value: &toml::Value, prefix: &str, known: &[&str]) {
    let Some(table) = value.as_table() else {
        return;
    };
    let known_set: HashSet<&str> = known.iter().copied().collect();
    for key in table.keys() {
        if !known_set.contains(key.as_str()) {
            tracing::warn!("unknown configuration key `{}{}`", prefix, key);
        }
    }
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl<'de> serde::Deserialize<'de> for RgbColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Array([u8; 3]),
            Map { r: u8, g: u8, b: u8 },
        }

        let helper = Helper::deserialize(deserializer)?;
        let (r, g, b) = match helper {
            Helper::Array(values) => (values[0], values[1], values[2]),
            Helper::Map { r, g, b } => (r, g, b),
        };
        Ok(RgbColor { r, g, b })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.catalog, PathBuf::from("catalogo_ocr.json"));
        assert_eq!(config.assets.dir, PathBuf::from("thumbnails"));
        assert_eq!(config.assets.extension, "jpg");
        assert_eq!(config.presentation.fragment_length, 500);
        assert_eq!(config.presentation.columns, [1, 2]);
        assert!(!config.presentation.clean_text);
        assert_eq!(
            config.presentation.labels,
            vec!["Genero", "Cantidad", "Clima"]
        );
        assert_eq!(config.keys.global.quit, vec!["q".to_string()]);
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
            catalog = "/data/catalog.json"

            [assets]
            dir = "/data/thumbs"
            extension = ".png"

            [presentation]
            fragment_length = 300
            image_width = 80
            columns = [1, 3]
            clean_text = true
            labels = ["Genero", " ", "Clima"]

            [ui.colors]
            border = { r = 1, g = 2, b = 3 }
            highlight = [10, 20, 30]

            [keys.viewer]
            close = "x"
            "#,
        )
        .unwrap();

        assert_eq!(config.catalog, PathBuf::from("/data/catalog.json"));
        assert_eq!(config.assets.dir, PathBuf::from("/data/thumbs"));
        assert_eq!(config.assets.extension, "png");
        assert_eq!(config.presentation.fragment_length, 300);
        assert_eq!(config.presentation.image_width, 80);
        assert_eq!(config.presentation.columns, [1, 3]);
        assert!(config.presentation.clean_text);
        assert_eq!(config.presentation.labels, vec!["Genero", "Clima"]);
        assert_eq!(config.ui.colors.border, RgbColor::new(1, 2, 3));
        assert_eq!(config.ui.colors.highlight, RgbColor::new(10, 20, 30));
        assert_eq!(config.keys.viewer.close, vec!["x".to_string()]);
        // Untouched contexts keep their defaults
        assert_eq!(config.keys.viewer.next, ViewerKeys::default().next);
    }

    #[test]
    fn test_zero_values_fall_back_to_defaults() {
        let config = parse(
            r#"
            [presentation]
            fragment_length = 0
            image_width = 0
            columns = [0, 0]
            "#,
        )
        .unwrap();
        assert_eq!(config.presentation.fragment_length, DEFAULT_FRAGMENT_LENGTH);
        assert_eq!(config.presentation.image_width, DEFAULT_IMAGE_WIDTH);
        assert_eq!(config.presentation.columns, DEFAULT_COLUMNS);
    }

    #[test]
    fn test_empty_label_list_disables_labels() {
        let config = parse("[presentation]\nlabels = []\n").unwrap();
        assert!(config.presentation.labels.is_empty());
        assert!(config.search_settings().fragment.labels.is_empty());
    }

    #[test]
    fn test_search_settings_follow_config() {
        let config = parse(
            r#"
            [assets]
            dir = "imgs"
            extension = "png"

            [presentation]
            fragment_length = 42
            labels = ["Cantidad"]
            "#,
        )
        .unwrap();
        let settings = config.search_settings();
        assert_eq!(settings.fragment.length, 42);
        assert_eq!(settings.fragment.labels, vec!["Cantidad".to_string()]);
        assert_eq!(settings.assets.path_for(5), PathBuf::from("imgs/page_5.png"));
    }

    #[test]
    fn test_key_collision_is_rejected() {
        let err = parse(
            r#"
            [keys.search_results]
            next = ["j"]
            prev = ["j"]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("collision"));
    }

    #[test]
    fn test_key_collision_normalizes_aliases() {
        let err = parse(
            r#"
            [keys.viewer]
            close = ["Esc"]
            next = ["ESCAPE"]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("keys.viewer"));
    }

    #[test]
    fn test_normalize_binding() {
        assert_eq!(normalize_binding("M"), "M");
        assert_eq!(normalize_binding("m"), "m");
        assert_eq!(normalize_binding("ENTER"), "enter");
        assert_eq!(normalize_binding("Shift+Tab"), "backtab");
    }

    #[test]
    fn test_invalid_toml() {
        assert!(parse("catalog = [").is_err());
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = load(Some(&temp.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("configuration file not found"));
    }

    #[test]
    fn test_load_explicit_file_records_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "catalog = \"pages.json\"\n").unwrap();
        let config = load(Some(&path)).unwrap();
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(config.catalog, PathBuf::from("pages.json"));
    }
}
