use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tauri::{AppHandle, Manager};
use tracing::{info, warn};

use crate::corpus::{DEFAULT_CONTEXT_LINES, MAX_RESULTS, ScanOptions};
use crate::ocr::{DEFAULT_OCR_LANGUAGE, DEFAULT_TESSERACT_COMMAND};
use crate::trigger::clipboard::DEFAULT_CLIPBOARD_SETTLE_MS;
use crate::trigger::region::DEFAULT_REGION_SETTLE_MS;

pub const DEFAULT_CORPUS_PATH: &str = "mb.txt";
pub const DEFAULT_REGION_HOTKEY: &str = "CommandOrControl+Shift+S";
pub const CORPUS_PATH_ENV: &str = "CORPUS_LENS_CORPUS";
pub const DEFAULT_OCR_QUERY_WORDS: usize = 3;
pub const DEFAULT_MIN_OCR_QUERY_CHARS: usize = 3;

const MIN_MAX_RESULTS: usize = 1;
const MAX_MAX_RESULTS: usize = 16;
const MAX_CONTEXT_LINES: usize = 16;
const MAX_SETTLE_MS: u64 = 2_000;
const MIN_OCR_QUERY_WORDS: usize = 1;
const MAX_OCR_QUERY_WORDS: usize = 32;
const MAX_MIN_OCR_QUERY_CHARS: usize = 64;
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default = "default_corpus_path")]
    pub corpus_path: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
    #[serde(default = "default_clipboard_settle_ms")]
    pub clipboard_settle_ms: u64,
    #[serde(default = "default_region_settle_ms")]
    pub region_settle_ms: u64,
    #[serde(default = "default_ocr_query_words")]
    pub ocr_query_words: usize,
    #[serde(default = "default_min_ocr_query_chars")]
    pub min_ocr_query_chars: usize,
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,
    #[serde(default = "default_tesseract_command")]
    pub tesseract_command: String,
    #[serde(default = "default_region_hotkey")]
    pub region_hotkey: String,
    #[serde(default = "default_enabled")]
    pub clipboard_trigger_enabled: bool,
    #[serde(default = "default_enabled")]
    pub region_trigger_enabled: bool,
    #[serde(default = "default_enabled")]
    pub show_ocr_preview: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            corpus_path: default_corpus_path(),
            max_results: default_max_results(),
            context_lines: default_context_lines(),
            clipboard_settle_ms: default_clipboard_settle_ms(),
            region_settle_ms: default_region_settle_ms(),
            ocr_query_words: default_ocr_query_words(),
            min_ocr_query_chars: default_min_ocr_query_chars(),
            ocr_language: default_ocr_language(),
            tesseract_command: default_tesseract_command(),
            region_hotkey: default_region_hotkey(),
            clipboard_trigger_enabled: default_enabled(),
            region_trigger_enabled: default_enabled(),
            show_ocr_preview: default_enabled(),
        }
    }
}

impl AppSettings {
    pub fn lookup(&self) -> LookupSettings {
        LookupSettings {
            corpus_path: PathBuf::from(&self.corpus_path),
            scan: ScanOptions {
                max_results: self.max_results,
                context_lines: self.context_lines,
            },
            ocr_query_words: self.ocr_query_words,
            min_ocr_query_chars: self.min_ocr_query_chars,
            show_ocr_preview: self.show_ocr_preview,
        }
    }
}

/// The part of the settings the UI context needs to run a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupSettings {
    pub corpus_path: PathBuf,
    pub scan: ScanOptions,
    pub ocr_query_words: usize,
    pub min_ocr_query_chars: usize,
    pub show_ocr_preview: bool,
}

impl Default for LookupSettings {
    fn default() -> Self {
        AppSettings::default().lookup()
    }
}

fn default_corpus_path() -> String {
    DEFAULT_CORPUS_PATH.to_string()
}

fn default_max_results() -> usize {
    MAX_RESULTS
}

fn default_context_lines() -> usize {
    DEFAULT_CONTEXT_LINES
}

fn default_clipboard_settle_ms() -> u64 {
    DEFAULT_CLIPBOARD_SETTLE_MS
}

fn default_region_settle_ms() -> u64 {
    DEFAULT_REGION_SETTLE_MS
}

fn default_ocr_query_words() -> usize {
    DEFAULT_OCR_QUERY_WORDS
}

fn default_min_ocr_query_chars() -> usize {
    DEFAULT_MIN_OCR_QUERY_CHARS
}

fn default_ocr_language() -> String {
    DEFAULT_OCR_LANGUAGE.to_string()
}

fn default_tesseract_command() -> String {
    DEFAULT_TESSERACT_COMMAND.to_string()
}

fn default_region_hotkey() -> String {
    DEFAULT_REGION_HOTKEY.to_string()
}

fn default_enabled() -> bool {
    true
}

pub fn load_settings(app_handle: &AppHandle) -> Result<AppSettings, String> {
    let settings = normalize_loaded_settings(read_config(app_handle)?);
    Ok(apply_environment_override(
        settings,
        std::env::var(CORPUS_PATH_ENV).ok(),
    ))
}

pub fn save_settings(app_handle: &AppHandle, settings: AppSettings) -> Result<AppSettings, String> {
    let previous = load_settings(app_handle)?;
    let validated = validate_settings(settings)?;

    if previous.region_hotkey != validated.region_hotkey {
        apply_hotkey_change(app_handle, &previous.region_hotkey, &validated.region_hotkey)?;
    }

    if let Err(err) = write_config(app_handle, &validated) {
        if previous.region_hotkey != validated.region_hotkey {
            if let Err(rollback_err) =
                apply_hotkey_change(app_handle, &validated.region_hotkey, &previous.region_hotkey)
            {
                warn!("failed to roll back hotkey after config write error: {rollback_err}");
            }
        }
        return Err(err);
    }

    info!(corpus = validated.corpus_path.as_str(), "settings saved");
    Ok(validated)
}

fn apply_environment_override(mut settings: AppSettings, corpus: Option<String>) -> AppSettings {
    if let Some(path) = corpus {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            info!(corpus = trimmed, "corpus path overridden from {CORPUS_PATH_ENV}");
            settings.corpus_path = trimmed.to_string();
        }
    }
    settings
}

fn read_config(app_handle: &AppHandle) -> Result<AppSettings, String> {
    read_config_file(&config_path(app_handle)?)
}

fn write_config(app_handle: &AppHandle, config: &AppSettings) -> Result<(), String> {
    write_config_file(&config_path(app_handle)?, config)
}

/// A missing file means a first launch and yields the defaults.
fn read_config_file(path: &Path) -> Result<AppSettings, String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no saved settings; using defaults");
            return Ok(AppSettings::default());
        }
        Err(err) => return Err(format!("cannot read settings {}: {err}", path.display())),
    };

    serde_json::from_str(&content)
        .map_err(|err| format!("settings {} are not valid JSON: {err}", path.display()))
}

fn write_config_file(path: &Path, config: &AppSettings) -> Result<(), String> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .map_err(|err| format!("cannot create settings folder {}: {err}", dir.display()))?;
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|err| format!("cannot encode settings: {err}"))?;
    fs::write(path, json)
        .map_err(|err| format!("cannot write settings {}: {err}", path.display()))
}

fn config_path(app_handle: &AppHandle) -> Result<PathBuf, String> {
    app_handle
        .path()
        .app_config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .map_err(|err| format!("no config directory for corpus lens: {err}"))
}

fn normalize_loaded_settings(mut settings: AppSettings) -> AppSettings {
    settings.corpus_path = settings.corpus_path.trim().to_string();
    if settings.corpus_path.is_empty() {
        settings.corpus_path = default_corpus_path();
    }
    settings.ocr_language = normalize_ocr_language(&settings.ocr_language);
    settings.tesseract_command = settings.tesseract_command.trim().to_string();
    if settings.tesseract_command.is_empty() {
        settings.tesseract_command = default_tesseract_command();
    }
    settings.region_hotkey = normalize_hotkey(&settings.region_hotkey);

    if !(MIN_MAX_RESULTS..=MAX_MAX_RESULTS).contains(&settings.max_results) {
        warn!(
            max_results = settings.max_results,
            "loaded max results is out of range; resetting to default"
        );
        settings.max_results = default_max_results();
    }

    if settings.context_lines > MAX_CONTEXT_LINES {
        warn!(
            context_lines = settings.context_lines,
            "loaded context lines is out of range; resetting to default"
        );
        settings.context_lines = default_context_lines();
    }

    if settings.clipboard_settle_ms > MAX_SETTLE_MS {
        warn!(
            settle_ms = settings.clipboard_settle_ms,
            "loaded clipboard settle delay is out of range; resetting to default"
        );
        settings.clipboard_settle_ms = default_clipboard_settle_ms();
    }

    if settings.region_settle_ms > MAX_SETTLE_MS {
        warn!(
            settle_ms = settings.region_settle_ms,
            "loaded region settle delay is out of range; resetting to default"
        );
        settings.region_settle_ms = default_region_settle_ms();
    }

    if !(MIN_OCR_QUERY_WORDS..=MAX_OCR_QUERY_WORDS).contains(&settings.ocr_query_words) {
        warn!(
            words = settings.ocr_query_words,
            "loaded OCR query word count is out of range; resetting to default"
        );
        settings.ocr_query_words = default_ocr_query_words();
    }

    if settings.min_ocr_query_chars > MAX_MIN_OCR_QUERY_CHARS {
        warn!(
            chars = settings.min_ocr_query_chars,
            "loaded minimum OCR query length is out of range; resetting to default"
        );
        settings.min_ocr_query_chars = default_min_ocr_query_chars();
    }

    settings
}

fn validate_settings(mut settings: AppSettings) -> Result<AppSettings, String> {
    settings.corpus_path = settings.corpus_path.trim().to_string();
    if settings.corpus_path.is_empty() {
        return Err("corpusPath cannot be empty".to_string());
    }

    if !(MIN_MAX_RESULTS..=MAX_MAX_RESULTS).contains(&settings.max_results) {
        return Err(format!(
            "maxResults must be between {MIN_MAX_RESULTS} and {MAX_MAX_RESULTS}"
        ));
    }
    if settings.context_lines > MAX_CONTEXT_LINES {
        return Err(format!(
            "contextLines must be between 0 and {MAX_CONTEXT_LINES}"
        ));
    }
    if settings.clipboard_settle_ms > MAX_SETTLE_MS {
        return Err(format!(
            "clipboardSettleMs must be between 0 and {MAX_SETTLE_MS}"
        ));
    }
    if settings.region_settle_ms > MAX_SETTLE_MS {
        return Err(format!("regionSettleMs must be between 0 and {MAX_SETTLE_MS}"));
    }
    if !(MIN_OCR_QUERY_WORDS..=MAX_OCR_QUERY_WORDS).contains(&settings.ocr_query_words) {
        return Err(format!(
            "ocrQueryWords must be between {MIN_OCR_QUERY_WORDS} and {MAX_OCR_QUERY_WORDS}"
        ));
    }
    if settings.min_ocr_query_chars > MAX_MIN_OCR_QUERY_CHARS {
        return Err(format!(
            "minOcrQueryChars must be between 0 and {MAX_MIN_OCR_QUERY_CHARS}"
        ));
    }

    settings.ocr_language = normalize_ocr_language(&settings.ocr_language);
    if !is_valid_ocr_language(&settings.ocr_language) {
        return Err(
            "ocrLanguage must be tesseract language codes joined by '+', e.g. eng or eng+deu"
                .to_string(),
        );
    }

    settings.tesseract_command = settings.tesseract_command.trim().to_string();
    if settings.tesseract_command.is_empty() {
        return Err("tesseractCommand cannot be empty".to_string());
    }

    let trimmed_hotkey = settings.region_hotkey.trim();
    if trimmed_hotkey.is_empty() {
        return Err("regionHotkey cannot be empty".to_string());
    }
    validate_hotkey(trimmed_hotkey)?;
    settings.region_hotkey = trimmed_hotkey.to_string();

    Ok(settings)
}

fn normalize_ocr_language(language: &str) -> String {
    let normalized = language.trim().to_lowercase();
    match normalized.as_str() {
        "" | "en" | "english" => default_ocr_language(),
        _ => normalized,
    }
}

fn is_valid_ocr_language(language: &str) -> bool {
    language.split('+').all(|code| {
        !code.is_empty()
            && code
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    })
}

fn normalize_hotkey(hotkey: &str) -> String {
    match hotkey.trim() {
        "" => default_region_hotkey(),
        trimmed => match validate_hotkey(trimmed) {
            Ok(()) => trimmed.to_string(),
            Err(err) => {
                warn!("{err}; region capture will use {DEFAULT_REGION_HOTKEY}");
                default_region_hotkey()
            }
        },
    }
}

#[cfg(desktop)]
pub fn parse_shortcut(hotkey: &str) -> Result<tauri_plugin_global_shortcut::Shortcut, String> {
    hotkey
        .parse::<tauri_plugin_global_shortcut::Shortcut>()
        .map_err(|err| format!("invalid hotkey `{hotkey}`: {err}"))
}

#[cfg(desktop)]
fn validate_hotkey(hotkey: &str) -> Result<(), String> {
    parse_shortcut(hotkey).map(|_| ())
}

#[cfg(not(desktop))]
fn validate_hotkey(_hotkey: &str) -> Result<(), String> {
    Ok(())
}

/// Moves the region shortcut from `previous_hotkey` to `next_hotkey`. When the new
/// shortcut cannot be registered the old one is put back before returning the error.
#[cfg(desktop)]
fn apply_hotkey_change(
    app_handle: &AppHandle,
    previous_hotkey: &str,
    next_hotkey: &str,
) -> Result<(), String> {
    use tauri_plugin_global_shortcut::GlobalShortcutExt;

    let shortcuts = app_handle.global_shortcut();
    let previous = parse_shortcut(previous_hotkey).ok();
    let next = parse_shortcut(next_hotkey)?;

    if let Some(previous) = previous.filter(|shortcut| shortcuts.is_registered(*shortcut)) {
        if let Err(err) = shortcuts.unregister(previous) {
            warn!(hotkey = previous_hotkey, "region shortcut stayed registered: {err}");
        }
    }

    match shortcuts.register(next) {
        Ok(()) => {
            info!(from = previous_hotkey, to = next_hotkey, "region shortcut moved");
            Ok(())
        }
        Err(err) => {
            if let Some(previous) = previous {
                if let Err(restore_err) = shortcuts.register(previous) {
                    warn!(
                        hotkey = previous_hotkey,
                        "region shortcut lost while reverting: {restore_err}"
                    );
                }
            }
            Err(format!("`{next_hotkey}` is not available as the region shortcut: {err}"))
        }
    }
}

#[cfg(not(desktop))]
fn apply_hotkey_change(
    _app_handle: &AppHandle,
    _previous_hotkey: &str,
    _next_hotkey: &str,
) -> Result<(), String> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"corpusPath":"notes.txt","maxResults":2}"#)
                .expect("parse settings");
        assert_eq!(settings.corpus_path, "notes.txt");
        assert_eq!(settings.max_results, 2);
        assert_eq!(settings.context_lines, DEFAULT_CONTEXT_LINES);
        assert_eq!(settings.ocr_query_words, 3);
        assert_eq!(settings.region_hotkey, DEFAULT_REGION_HOTKEY);
        assert!(settings.clipboard_trigger_enabled);
    }

    #[test]
    fn out_of_range_values_are_reset_on_load() {
        let loaded = AppSettings {
            corpus_path: "  ".into(),
            max_results: 0,
            context_lines: 99,
            clipboard_settle_ms: 10_000,
            ocr_query_words: 0,
            region_hotkey: "not a hotkey".into(),
            ..AppSettings::default()
        };
        let normalized = normalize_loaded_settings(loaded);
        assert_eq!(normalized, AppSettings::default());
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let too_many = AppSettings {
            max_results: 17,
            ..AppSettings::default()
        };
        assert!(validate_settings(too_many).is_err());

        let no_corpus = AppSettings {
            corpus_path: " ".into(),
            ..AppSettings::default()
        };
        assert_eq!(
            validate_settings(no_corpus),
            Err("corpusPath cannot be empty".to_string())
        );

        let bad_language = AppSettings {
            ocr_language: "eng+".into(),
            ..AppSettings::default()
        };
        assert!(validate_settings(bad_language).is_err());
    }

    #[test]
    fn validation_trims_and_normalizes() {
        let settings = AppSettings {
            corpus_path: " corpus/mb.txt ".into(),
            ocr_language: " ENG+Deu ".into(),
            region_hotkey: " CommandOrControl+Shift+O ".into(),
            ..AppSettings::default()
        };
        let validated = validate_settings(settings).expect("valid settings");
        assert_eq!(validated.corpus_path, "corpus/mb.txt");
        assert_eq!(validated.ocr_language, "eng+deu");
        assert_eq!(validated.region_hotkey, "CommandOrControl+Shift+O");
    }

    #[test]
    fn environment_override_replaces_corpus_path() {
        let settings = apply_environment_override(AppSettings::default(), Some(" /data/mb.txt ".into()));
        assert_eq!(settings.corpus_path, "/data/mb.txt");

        let settings = apply_environment_override(AppSettings::default(), Some("   ".into()));
        assert_eq!(settings.corpus_path, DEFAULT_CORPUS_PATH);
    }

    #[test]
    fn lookup_settings_carry_scan_options() {
        let settings = AppSettings {
            max_results: 6,
            context_lines: 0,
            show_ocr_preview: false,
            ..AppSettings::default()
        };
        let lookup = settings.lookup();
        assert_eq!(lookup.corpus_path, PathBuf::from("mb.txt"));
        assert_eq!(
            lookup.scan,
            ScanOptions {
                max_results: 6,
                context_lines: 0,
            }
        );
        assert!(!lookup.show_ocr_preview);
    }

    #[test]
    fn config_file_round_trips_through_nested_folder() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let settings = AppSettings {
            corpus_path: "/srv/corpus/menu.txt".into(),
            ocr_query_words: 5,
            ..AppSettings::default()
        };

        write_config_file(&path, &settings).expect("write settings");
        let loaded = read_config_file(&path).expect("read settings");
        assert_eq!(loaded.corpus_path, "/srv/corpus/menu.txt");
        assert_eq!(loaded.ocr_query_words, 5);
    }

    #[test]
    fn absent_config_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = read_config_file(&dir.path().join(CONFIG_FILE_NAME)).expect("defaults");
        assert_eq!(loaded.corpus_path, DEFAULT_CORPUS_PATH);
    }

    #[test]
    fn corrupt_config_file_names_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").expect("write garbage");

        let err = read_config_file(&path).expect_err("invalid json");
        assert!(err.contains("not valid JSON"), "{err}");
        assert!(err.contains(CONFIG_FILE_NAME), "{err}");
    }

    #[test]
    fn blank_hotkey_is_reset_to_default() {
        assert_eq!(normalize_hotkey("   "), DEFAULT_REGION_HOTKEY);
    }
}
