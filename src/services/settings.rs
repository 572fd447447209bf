use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use super::error::PersistenceError;
use super::locale::Language;

pub const KEY_LANGUAGE: &str = "Language";
pub const KEY_AUTOSTART: &str = "Auto-start";
pub const KEY_REMINDER_TIME: &str = "Reminder-time";

/// Placeholder an installer may seed before the first run.
const UNSET_LANGUAGE: &str = "UNSET";

/// Folder under the platform local-data directory.
pub const APP_DIR_NAME: &str = "VisualBreak";

/// Overrides the JSON settings file location on every platform.
pub const SETTINGS_PATH_ENV: &str = "VISUAL_BREAK_SETTINGS";

/// `%LOCALAPPDATA%\VisualBreak` on Windows, `~/.local/share/VisualBreak` on Linux.
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// The three user settings. Always fully defined after `SettingsService::load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub language: Language,
    pub autostart_enabled: bool,
    pub reminder_interval_minutes: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: Language::En,
            autostart_enabled: true,
            reminder_interval_minutes: 30,
        }
    }
}

impl Settings {
    fn entries(&self) -> [(&'static str, StoredValue); 3] {
        [
            (KEY_LANGUAGE, encode_language(self.language)),
            (KEY_AUTOSTART, encode_autostart(self.autostart_enabled)),
            (KEY_REMINDER_TIME, encode_interval(self.reminder_interval_minutes)),
        ]
    }
}

/// A raw persisted value, typed the way the registry types it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Text(String),
    Bytes(Vec<u8>),
    /// Present in the backend but of a type no setting uses.
    #[serde(skip)]
    Unsupported,
}

/// Flat key/value storage under the settings store.
pub trait SettingsBackend: Send {
    /// Create the storage location if it does not exist yet.
    fn prepare(&mut self) -> Result<(), PersistenceError>;

    /// `Ok(None)` means the entry is absent.
    fn read(&self, key: &str) -> Result<Option<StoredValue>, PersistenceError>;

    fn write(&mut self, key: &str, value: StoredValue) -> Result<(), PersistenceError>;
}

// ============================================================================
// Value encoding
// ============================================================================

fn encode_language(language: Language) -> StoredValue {
    StoredValue::Text(language.code().to_string())
}

fn encode_autostart(enabled: bool) -> StoredValue {
    StoredValue::Bytes(vec![u8::from(enabled)])
}

fn encode_interval(minutes: u32) -> StoredValue {
    StoredValue::Bytes(encode_uint(minutes))
}

/// Minimal big-endian form, at least one byte.
fn encode_uint(value: u32) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

fn decode_uint(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    let significant: &[u8] = match bytes.iter().position(|&b| b != 0) {
        Some(first) => &bytes[first..],
        None => &[],
    };
    if significant.len() > 8 {
        return None;
    }
    Some(significant.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

fn decode_language(value: &StoredValue) -> Option<Language> {
    match value {
        StoredValue::Text(code) => Language::from_code(code),
        _ => None,
    }
}

fn decode_autostart(value: &StoredValue) -> Option<bool> {
    match value {
        StoredValue::Bytes(bytes) => match decode_uint(bytes)? {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        },
        _ => None,
    }
}

fn decode_interval(value: &StoredValue) -> Option<u32> {
    match value {
        StoredValue::Bytes(bytes) => {
            let minutes = u32::try_from(decode_uint(bytes)?).ok()?;
            (minutes > 0).then_some(minutes)
        }
        _ => None,
    }
}

fn is_placeholder(key: &str, value: &StoredValue) -> bool {
    key == KEY_LANGUAGE && matches!(value, StoredValue::Text(s) if s == UNSET_LANGUAGE)
}

// ============================================================================
// SettingsService
// ============================================================================

/// Loads and saves `Settings` on a best-effort basis.
///
/// Every entry is read, validated and written on its own. A bad or missing entry
/// falls back to its default and never fails the caller.
pub struct SettingsService {
    backend: Box<dyn SettingsBackend>,
}

impl SettingsService {
    /// Uses the platform backend: the registry on Windows, a JSON file elsewhere.
    /// `VISUAL_BREAK_SETTINGS` forces the JSON file on every platform.
    pub fn new() -> Self {
        match std::env::var_os(SETTINGS_PATH_ENV) {
            Some(path) => Self::with_backend(JsonFileBackend::at(PathBuf::from(path))),
            None => Self {
                backend: platform_backend(),
            },
        }
    }

    pub fn with_backend(backend: impl SettingsBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Total: returns defaults for anything unreadable. Absent entries are
    /// written back with their default so later saves land on an existing layout.
    pub fn load(&mut self) -> Settings {
        let heal = match self.backend.prepare() {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "settings storage unavailable, using defaults");
                false
            }
        };
        let defaults = Settings::default();

        let language = self
            .load_entry(KEY_LANGUAGE, encode_language(defaults.language), heal, decode_language)
            .unwrap_or(defaults.language);
        let autostart_enabled = self
            .load_entry(KEY_AUTOSTART, encode_autostart(defaults.autostart_enabled), heal, decode_autostart)
            .unwrap_or(defaults.autostart_enabled);
        let reminder_interval_minutes = self
            .load_entry(
                KEY_REMINDER_TIME,
                encode_interval(defaults.reminder_interval_minutes),
                heal,
                decode_interval,
            )
            .unwrap_or(defaults.reminder_interval_minutes);

        let settings = Settings {
            language,
            autostart_enabled,
            reminder_interval_minutes,
        };
        debug!(?settings, "settings loaded");
        settings
    }

    fn load_entry<T>(
        &mut self,
        key: &'static str,
        default: StoredValue,
        heal: bool,
        decode: fn(&StoredValue) -> Option<T>,
    ) -> Option<T> {
        match self.backend.read(key) {
            Ok(Some(value)) if !is_placeholder(key, &value) => {
                let decoded = decode(&value);
                if decoded.is_none() {
                    debug!(key, ?value, "ignoring invalid stored setting");
                }
                decoded
            }
            Ok(_) => {
                if heal {
                    match self.backend.write(key, default) {
                        Ok(()) => info!(key, "wrote default for missing setting"),
                        Err(err) => warn!(key, %err, "could not write default setting"),
                    }
                }
                None
            }
            Err(err) => {
                warn!(key, %err, "could not read setting");
                None
            }
        }
    }

    /// Attempts all three writes even if earlier ones fail. The error lists the
    /// keys that did not persist; callers log it and move on.
    pub fn save(&mut self, settings: &Settings) -> Result<(), PersistenceError> {
        let mut failed = Vec::new();
        for (key, value) in settings.entries() {
            if let Err(err) = self.backend.write(key, value) {
                warn!(key, %err, "failed to persist setting");
                failed.push(key);
            }
        }
        if failed.is_empty() {
            debug!(?settings, "settings saved");
            Ok(())
        } else {
            Err(PersistenceError::Incomplete { keys: failed })
        }
    }
}

#[cfg(windows)]
fn platform_backend() -> Box<dyn SettingsBackend> {
    Box::new(super::registry::RegistryBackend::new())
}

#[cfg(not(windows))]
fn platform_backend() -> Box<dyn SettingsBackend> {
    Box::new(JsonFileBackend::new())
}

impl Default for SettingsService {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// JSON file backend
// ============================================================================

/// Flat JSON object on disk. Text entries are strings, byte entries are arrays
/// of integers. Entries are decoded one at a time so one bad value does not
/// hide the others.
pub struct JsonFileBackend {
    file_path: PathBuf,
}

impl JsonFileBackend {
    pub fn new() -> Self {
        Self::at(data_dir().join("settings.json"))
    }

    pub fn at(file_path: PathBuf) -> Self {
        Self { file_path }
    }

    /// A file that is not a JSON object reads as empty.
    fn read_map(&self) -> Result<Map<String, Value>, PersistenceError> {
        if !self.file_path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.file_path)?;
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                debug!(path = %self.file_path.display(), "settings file is not a JSON object");
                Ok(Map::new())
            }
        }
    }
}

impl Default for JsonFileBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsBackend for JsonFileBackend {
    fn prepare(&mut self) -> Result<(), PersistenceError> {
        if let Some(folder) = self.file_path.parent() {
            if !folder.as_os_str().is_empty() && !folder.exists() {
                fs::create_dir_all(folder)?;
            }
        }
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<StoredValue>, PersistenceError> {
        let map = self.read_map()?;
        Ok(map.get(key).map(|value| {
            serde_json::from_value::<StoredValue>(value.clone()).unwrap_or(StoredValue::Unsupported)
        }))
    }

    fn write(&mut self, key: &str, value: StoredValue) -> Result<(), PersistenceError> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), serde_json::to_value(&value)?);
        let content = serde_json::to_string_pretty(&Value::Object(map))?;
        fs::write(&self.file_path, content)?;
        Ok(())
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Default)]
struct MemoryInner {
    values: HashMap<String, StoredValue>,
    failing_writes: HashSet<String>,
    unavailable: bool,
}

/// In-process backend. Clones share the same storage, so a handle kept outside
/// the store can inspect what was written.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, key: &str, value: StoredValue) {
        self.lock().values.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<StoredValue> {
        self.lock().values.get(key).cloned()
    }

    /// Makes every operation, including `prepare`, fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Makes writes to one key fail while the rest keep working.
    pub fn fail_writes_to(&self, key: &str) {
        self.lock().failing_writes.insert(key.to_string());
    }
}

impl SettingsBackend for MemoryBackend {
    fn prepare(&mut self) -> Result<(), PersistenceError> {
        if self.lock().unavailable {
            return Err(PersistenceError::Unavailable);
        }
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<StoredValue>, PersistenceError> {
        let inner = self.lock();
        if inner.unavailable {
            return Err(PersistenceError::Unavailable);
        }
        Ok(inner.values.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: StoredValue) -> Result<(), PersistenceError> {
        let mut inner = self.lock();
        if inner.unavailable || inner.failing_writes.contains(key) {
            return Err(PersistenceError::Unavailable);
        }
        inner.values.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(backend: &MemoryBackend) -> SettingsService {
        SettingsService::with_backend(backend.clone())
    }

    #[test]
    fn empty_backend_loads_defaults_and_heals() {
        let backend = MemoryBackend::new();
        let settings = store_with(&backend).load();

        assert_eq!(settings, Settings::default());
        assert_eq!(backend.get(KEY_LANGUAGE), Some(StoredValue::Text("en".into())));
        assert_eq!(backend.get(KEY_AUTOSTART), Some(StoredValue::Bytes(vec![1])));
        assert_eq!(backend.get(KEY_REMINDER_TIME), Some(StoredValue::Bytes(vec![30])));
    }

    #[test]
    fn positive_intervals_load_exactly() {
        for minutes in [1u32, 10, 45, 120, 255, 256, 1_000, 70_000] {
            let backend = MemoryBackend::new();
            backend.insert(KEY_REMINDER_TIME, StoredValue::Bytes(encode_uint(minutes)));
            assert_eq!(store_with(&backend).load().reminder_interval_minutes, minutes);
        }
    }

    #[test]
    fn invalid_intervals_fall_back_to_thirty() {
        let invalid = [
            StoredValue::Bytes(vec![0]),
            StoredValue::Bytes(vec![0, 0]),
            StoredValue::Bytes(vec![]),
            StoredValue::Bytes(vec![1, 0, 0, 0, 0]),
            StoredValue::Text("45".into()),
            StoredValue::Text("-5".into()),
            StoredValue::Unsupported,
        ];
        for value in invalid {
            let backend = MemoryBackend::new();
            backend.insert(KEY_REMINDER_TIME, value.clone());
            assert_eq!(
                store_with(&backend).load().reminder_interval_minutes,
                30,
                "value {value:?}"
            );
        }
    }

    #[test]
    fn leading_zero_bytes_are_tolerated() {
        let backend = MemoryBackend::new();
        backend.insert(KEY_REMINDER_TIME, StoredValue::Bytes(vec![0, 0, 0, 20]));
        assert_eq!(store_with(&backend).load().reminder_interval_minutes, 20);
    }

    #[test]
    fn language_validation() {
        for (stored, expected) in [
            ("en", Language::En),
            ("fr", Language::Fr),
            ("de", Language::En),
            ("FR", Language::En),
            ("", Language::En),
        ] {
            let backend = MemoryBackend::new();
            backend.insert(KEY_LANGUAGE, StoredValue::Text(stored.into()));
            assert_eq!(store_with(&backend).load().language, expected, "stored {stored:?}");
        }

        let backend = MemoryBackend::new();
        backend.insert(KEY_LANGUAGE, StoredValue::Bytes(vec![1]));
        assert_eq!(store_with(&backend).load().language, Language::En);
    }

    #[test]
    fn autostart_accepts_only_zero_or_one() {
        let cases = [
            (StoredValue::Bytes(vec![0]), false),
            (StoredValue::Bytes(vec![1]), true),
            (StoredValue::Bytes(vec![2]), true),
            (StoredValue::Text("0".into()), true),
        ];
        for (value, expected) in cases {
            let backend = MemoryBackend::new();
            backend.insert(KEY_AUTOSTART, value.clone());
            assert_eq!(store_with(&backend).load().autostart_enabled, expected, "value {value:?}");
        }
    }

    #[test]
    fn invalid_entries_are_not_overwritten_on_load() {
        let backend = MemoryBackend::new();
        backend.insert(KEY_LANGUAGE, StoredValue::Text("de".into()));
        store_with(&backend).load();
        assert_eq!(backend.get(KEY_LANGUAGE), Some(StoredValue::Text("de".into())));
    }

    #[test]
    fn unset_placeholder_is_healed() {
        let backend = MemoryBackend::new();
        backend.insert(KEY_LANGUAGE, StoredValue::Text(UNSET_LANGUAGE.into()));
        backend.insert(KEY_REMINDER_TIME, StoredValue::Bytes(vec![45]));

        let settings = store_with(&backend).load();

        assert_eq!(settings.language, Language::En);
        assert_eq!(settings.reminder_interval_minutes, 45);
        assert_eq!(backend.get(KEY_LANGUAGE), Some(StoredValue::Text("en".into())));
    }

    #[test]
    fn unavailable_backend_still_yields_defaults() {
        let backend = MemoryBackend::new();
        backend.set_unavailable(true);
        assert_eq!(store_with(&backend).load(), Settings::default());
    }

    #[test]
    fn save_attempts_every_entry() {
        let backend = MemoryBackend::new();
        backend.fail_writes_to(KEY_LANGUAGE);
        let settings = Settings {
            language: Language::Fr,
            autostart_enabled: false,
            reminder_interval_minutes: 60,
        };

        let err = store_with(&backend).save(&settings).unwrap_err();

        match err {
            PersistenceError::Incomplete { keys } => assert_eq!(keys, vec![KEY_LANGUAGE]),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(backend.get(KEY_LANGUAGE), None);
        assert_eq!(backend.get(KEY_AUTOSTART), Some(StoredValue::Bytes(vec![0])));
        assert_eq!(backend.get(KEY_REMINDER_TIME), Some(StoredValue::Bytes(vec![60])));
    }

    #[test]
    fn save_then_load_round_trips() {
        let backend = MemoryBackend::new();
        let mut store = store_with(&backend);
        for settings in [
            Settings::default(),
            Settings {
                language: Language::Fr,
                autostart_enabled: false,
                reminder_interval_minutes: 120,
            },
            Settings {
                language: Language::En,
                autostart_enabled: true,
                reminder_interval_minutes: 300,
            },
        ] {
            store.save(&settings).unwrap();
            assert_eq!(store.load(), settings);
        }
    }

    #[test]
    fn uint_encoding_is_minimal_big_endian() {
        assert_eq!(encode_uint(0), vec![0]);
        assert_eq!(encode_uint(30), vec![30]);
        assert_eq!(encode_uint(300), vec![1, 44]);
        assert_eq!(decode_uint(&[1, 44]), Some(300));
    }

    #[test]
    fn json_file_round_trips_and_creates_folder() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("settings.json");
        let mut store = SettingsService::with_backend(JsonFileBackend::at(path.clone()));

        assert_eq!(store.load(), Settings::default());
        assert!(path.exists());

        let settings = Settings {
            language: Language::Fr,
            autostart_enabled: false,
            reminder_interval_minutes: 20,
        };
        store.save(&settings).unwrap();

        let mut reopened = SettingsService::with_backend(JsonFileBackend::at(path));
        assert_eq!(reopened.load(), settings);
    }

    #[test]
    fn json_file_survives_corruption() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let mut store = SettingsService::with_backend(JsonFileBackend::at(path.clone()));
        assert_eq!(store.load(), Settings::default());

        let healed: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(healed[KEY_LANGUAGE], Value::String("en".into()));
        assert_eq!(healed[KEY_REMINDER_TIME], serde_json::json!([30]));
    }

    #[test]
    fn json_wrong_typed_entry_only_affects_itself() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{ "Language": "fr", "Auto-start": true, "Reminder-time": 45 }"#,
        )
        .unwrap();

        let settings = SettingsService::with_backend(JsonFileBackend::at(path)).load();

        assert_eq!(settings.language, Language::Fr);
        assert!(settings.autostart_enabled);
        assert_eq!(settings.reminder_interval_minutes, 30);
    }
}
