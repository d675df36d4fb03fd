//! Field resolution: layered value, then explicit env override, then default.

use toml::Value;

use super::{EnvSnapshot, LayeredSource, SettingsError};

/// Where a field's candidate value came from, for error messages.
#[derive(Debug, Clone, Copy)]
enum Origin<'a> {
    Layered,
    Env(&'a str),
}

impl Origin<'_> {
    fn describe(&self) -> String {
        match self {
            Origin::Layered => "settings files".to_string(),
            Origin::Env(var) => format!("environment variable {}", var),
        }
    }
}

/// Lookup context shared by all fields of one settings object.
pub(crate) struct Resolver<'a> {
    pub(crate) layered: &'a LayeredSource,
    pub(crate) env: &'a EnvSnapshot,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(layered: &'a LayeredSource, env: &'a EnvSnapshot) -> Self {
        Self { layered, env }
    }

    pub(crate) fn string(&self, field: &str, env_var: &str) -> Result<Option<String>, SettingsError> {
        if let Some(raw) = self.env.get(env_var) {
            return Ok(Some(raw.to_string()));
        }
        match self.layered.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(type_error(field, "a string", other, Origin::Layered)),
        }
    }

    pub(crate) fn boolean(&self, field: &str, env_var: &str) -> Result<Option<bool>, SettingsError> {
        if let Some(raw) = self.env.get(env_var) {
            return parse_bool(raw)
                .map(Some)
                .ok_or_else(|| invalid_bool(field, raw, Origin::Env(env_var)));
        }
        match self.layered.get(field) {
            None => Ok(None),
            Some(Value::Boolean(b)) => Ok(Some(*b)),
            Some(Value::Integer(0)) => Ok(Some(false)),
            Some(Value::Integer(1)) => Ok(Some(true)),
            Some(Value::String(s)) => parse_bool(s)
                .map(Some)
                .ok_or_else(|| invalid_bool(field, s, Origin::Layered)),
            Some(other) => Err(type_error(field, "a boolean", other, Origin::Layered)),
        }
    }

    /// Integer field that also accepts numeric strings; an empty string is absent.
    pub(crate) fn integer(&self, field: &str, env_var: &str) -> Result<Option<i64>, SettingsError> {
        if let Some(raw) = self.env.get(env_var) {
            return parse_integer(field, raw, Origin::Env(env_var));
        }
        match self.layered.get(field) {
            None => Ok(None),
            Some(Value::Integer(i)) => Ok(Some(*i)),
            Some(Value::String(s)) => parse_integer(field, s, Origin::Layered),
            Some(other) => Err(type_error(field, "an integer", other, Origin::Layered)),
        }
    }
}

/// Parses the lenient boolean spellings accepted from text sources.
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "t" | "y" => Some(true),
        "false" | "0" | "no" | "off" | "f" | "n" => Some(false),
        _ => None,
    }
}

fn parse_integer(field: &str, raw: &str, origin: Origin<'_>) -> Result<Option<i64>, SettingsError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse::<i64>().map(Some).map_err(|_| {
        SettingsError::validation(
            field.to_lowercase(),
            format!("expected an integer from {}, got {:?}", origin.describe(), raw),
        )
    })
}

fn invalid_bool(field: &str, raw: &str, origin: Origin<'_>) -> SettingsError {
    SettingsError::validation(
        field.to_lowercase(),
        format!("expected a boolean from {}, got {:?}", origin.describe(), raw),
    )
}

fn type_error(field: &str, expected: &str, got: &Value, origin: Origin<'_>) -> SettingsError {
    SettingsError::validation(
        field.to_lowercase(),
        format!(
            "expected {} from {}, got {} {}",
            expected,
            origin.describe(),
            got.type_str(),
            got
        ),
    )
}
