//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Clinic configuration.
///
/// | Env Var                      | Default     |
/// |------------------------------|-------------|
/// | `CLINIC_DB_PATH`             | `clinic.db` |
/// | `CLINIC_EXPIRY_WARNING_DAYS` | `30`        |
/// | `CLINIC_DEFAULT_ACTOR`       | `admin`     |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicConfig {
    /// SQLite database file
    pub db_path: PathBuf,
    /// Horizon for "expiring soon" lot listings
    pub expiry_warning_days: u32,
    /// Username used by administrative tooling when none is given
    pub default_actor: String,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("clinic.db"),
            expiry_warning_days: 30,
            default_actor: "admin".into(),
        }
    }
}

impl ClinicConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let db_path = lookup("CLINIC_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let expiry_warning_days = match lookup("CLINIC_EXPIRY_WARNING_DAYS") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "CLINIC_EXPIRY_WARNING_DAYS",
                expected: "a non-negative number of days",
                value: raw.clone(),
            })?,
            None => defaults.expiry_warning_days,
        };

        let default_actor = lookup("CLINIC_DEFAULT_ACTOR")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.default_actor);

        Ok(Self {
            db_path,
            expiry_warning_days,
            default_actor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClinicConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ClinicConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = ClinicConfig::from_lookup(lookup_from(&[
            ("CLINIC_DB_PATH", "/var/lib/clinic/data.db"),
            ("CLINIC_EXPIRY_WARNING_DAYS", " 45 "),
            ("CLINIC_DEFAULT_ACTOR", "jefe"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/clinic/data.db"));
        assert_eq!(config.expiry_warning_days, 45);
        assert_eq!(config.default_actor, "jefe");
    }

    #[test]
    fn test_invalid_days() {
        let err = ClinicConfig::from_lookup(lookup_from(&[("CLINIC_EXPIRY_WARNING_DAYS", "-3")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "CLINIC_EXPIRY_WARNING_DAYS must be a non-negative number of days, got \"-3\""
        );
    }
}
