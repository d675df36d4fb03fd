//! Environment-sectioned settings files merged with prefixed environment variables.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use toml::{Table, Value};
use tracing::debug;

use super::SettingsError;

/// Settings files consulted in order; later files win.
pub const DEFAULT_SETTINGS_FILES: [&str; 2] = ["settings.toml", ".secrets.toml"];

/// Environment variable selecting the active settings section.
pub const ENV_SWITCHER: &str = "ENV_FOR_DYNACONF";

/// Prefix of environment variables that override layered keys.
pub const ENVVAR_PREFIX: &str = "DYNACONF_";

/// Section used when no environment is selected.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Snapshot of environment variables taken once at load time.
///
/// Variables are kept sorted by name so lookups that match several
/// spellings of a name resolve the same way every time.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Captures the current process environment.
    pub fn from_process() -> Self {
        Self::from_os_vars(std::env::vars_os())
    }

    /// Builds a snapshot from raw variables, skipping names or values that
    /// are not valid Unicode.
    pub fn from_os_vars(vars: impl IntoIterator<Item = (OsString, OsString)>) -> Self {
        let vars = vars
            .into_iter()
            .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => Some((key, value)),
                (key, _) => {
                    debug!(
                        name = %key.unwrap_or_else(|raw| raw.to_string_lossy().into_owned()),
                        "Skipping non-unicode environment variable"
                    );
                    None
                }
            })
            .collect();
        Self { vars }
    }

    /// Looks up a variable, falling back to a case-insensitive match.
    /// Among several case-insensitive matches the smallest name wins.
    pub fn get(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.vars.get(name) {
            return Some(value.as_str());
        }
        self.vars
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (String, &'a str)> + 'a {
        self.vars.iter().filter_map(move |(key, value)| {
            let upper = key.to_uppercase();
            let stripped = upper.strip_prefix(prefix)?;
            if stripped.is_empty() {
                return None;
            }
            Some((stripped.to_string(), value.as_str()))
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Resolved key/value view over the layered settings files.
///
/// Each file is split into `[default]`, `[<environment>]` and `[global]`
/// sections which are applied in that order. Top-level keys are
/// case-insensitive; a later layer replaces a key entirely.
#[derive(Debug, Clone)]
pub struct LayeredSource {
    environment: String,
    values: Table,
    loaded_files: Vec<PathBuf>,
}

impl LayeredSource {
    /// Loads `files` relative to `root`, then applies `DYNACONF_*` overrides.
    ///
    /// Missing files are skipped. Each file may be followed by a
    /// `<stem>.local.<ext>` sibling which is layered right after it.
    pub fn load(root: &Path, files: &[String], env: &EnvSnapshot) -> Result<Self, SettingsError> {
        let environment = env
            .get(ENV_SWITCHER)
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        let mut values = Table::new();
        let mut loaded_files = Vec::new();

        for file in files {
            for path in candidate_paths(root, file) {
                if !path.is_file() {
                    continue;
                }
                let table = read_settings_file(&path)?;
                merge_sections(&mut values, table, &environment);
                debug!(path = %path.display(), environment = %environment, "Settings file loaded");
                loaded_files.push(path);
            }
        }

        for (key, raw) in env.with_prefix(ENVVAR_PREFIX) {
            values.insert(key, parse_env_literal(raw));
        }

        Ok(Self {
            environment,
            values,
            loaded_files,
        })
    }

    /// Builds a source directly from resolved values (keys are upper-cased).
    pub fn from_table(environment: &str, table: Table) -> Self {
        Self {
            environment: environment.to_string(),
            values: table
                .into_iter()
                .map(|(k, v)| (k.to_uppercase(), v))
                .collect(),
            loaded_files: Vec::new(),
        }
    }

    /// Returns the resolved value for `key`, ignoring case.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(&key.to_uppercase())
    }

    /// Name of the active environment section.
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Files that were found and merged, in load order.
    pub fn loaded_files(&self) -> &[PathBuf] {
        &self.loaded_files
    }
}

fn candidate_paths(root: &Path, file: &str) -> [PathBuf; 2] {
    let path = root.join(file);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let local_name = match path.extension() {
        Some(ext) => format!("{}.local.{}", stem, ext.to_string_lossy()),
        None => format!("{}.local", stem),
    };
    let local = path.with_file_name(local_name);
    [path, local]
}

fn read_settings_file(path: &Path) -> Result<Table, SettingsError> {
    let content = fs::read_to_string(path).map_err(|source| SettingsError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "yaml" | "yml" => {
            serde_yaml::from_str::<Table>(&content).map_err(|e| SettingsError::parse(path, e))
        }
        "json" => serde_json::from_str::<Table>(&content).map_err(|e| SettingsError::parse(path, e)),
        _ => toml::from_str::<Table>(&content).map_err(|e| SettingsError::parse(path, e)),
    }
}

fn merge_sections(target: &mut Table, mut file: Table, environment: &str) {
    for section in ["default", environment, "global"] {
        let Some(name) = file
            .keys()
            .find(|k| k.eq_ignore_ascii_case(section))
            .cloned()
        else {
            continue;
        };

        match file.remove(&name) {
            Some(Value::Table(entries)) => {
                for (key, value) in entries {
                    target.insert(key.to_uppercase(), value);
                }
            }
            Some(_) => debug!(section = %name, "Ignoring non-table settings section"),
            None => {}
        }
    }
}

/// Parses an override value as a TOML literal, falling back to a plain string.
pub(crate) fn parse_env_literal(raw: &str) -> Value {
    toml::from_str::<Table>(&format!("value = {}", raw))
        .ok()
        .and_then(|mut t| t.remove("value"))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}
