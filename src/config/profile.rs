use crate::config::taskfile::substitute_vars;
use crate::utils::error::{Result, TaskError};
use crate::utils::validation::{validate_identifier, validate_path, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// `[profile]` table of the task file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProfileSettings {
    /// Environment variable that selects the profile.
    pub variable: String,
    pub default: String,
    /// Env file to load, `${PROFILE}` expands to the selected name. Empty disables it.
    pub env_file: String,
    pub allowed: Option<Vec<String>>,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            variable: "ENV".to_string(),
            default: "dev".to_string(),
            env_file: ".env.${PROFILE}".to_string(),
            allowed: None,
        }
    }
}

impl ProfileSettings {
    pub fn is_allowed(&self, name: &str) -> bool {
        match &self.allowed {
            Some(allowed) => allowed.iter().any(|entry| entry == name),
            None => true,
        }
    }
}

impl Validate for ProfileSettings {
    fn validate(&self) -> Result<()> {
        let valid_variable = !self.variable.is_empty()
            && !self.variable.starts_with(|c: char| c.is_ascii_digit())
            && self
                .variable
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_variable {
            return Err(TaskError::InvalidConfigValueError {
                field: "profile.variable".to_string(),
                value: self.variable.clone(),
                reason: "Not a valid environment variable name".to_string(),
            });
        }

        validate_identifier("profile.default", &self.default)?;
        if !self.env_file.is_empty() {
            validate_path("profile.env_file", &self.env_file)?;
        }

        if let Some(allowed) = &self.allowed {
            for name in allowed {
                validate_identifier("profile.allowed", name)?;
            }
            if !self.is_allowed(&self.default) {
                return Err(TaskError::InvalidConfigValueError {
                    field: "profile.default".to_string(),
                    value: self.default.clone(),
                    reason: "Default profile is not listed in profile.allowed".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Where the selected profile name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
    CommandLine,
    Environment,
    Default,
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub source: ProfileSource,
    pub variable: String,
    pub env_file: Option<PathBuf>,
    pub vars: BTreeMap<String, String>,
}

impl Profile {
    /// `--env` wins over the profile variable, which wins over the default.
    pub fn resolve(
        settings: &ProfileSettings,
        cli_override: Option<&str>,
        base_dir: &Path,
    ) -> Result<Self> {
        let from_env = std::env::var(&settings.variable).ok();
        Self::from_sources(settings, cli_override, from_env.as_deref(), base_dir)
    }

    pub fn from_sources(
        settings: &ProfileSettings,
        cli_override: Option<&str>,
        env_value: Option<&str>,
        base_dir: &Path,
    ) -> Result<Self> {
        // an empty variable counts as unset
        let env_value = env_value.map(str::trim).filter(|value| !value.is_empty());

        let (name, source) = match (cli_override, env_value) {
            (Some(name), _) => (name.to_string(), ProfileSource::CommandLine),
            (None, Some(name)) => (name.to_string(), ProfileSource::Environment),
            (None, None) => (settings.default.clone(), ProfileSource::Default),
        };

        validate_identifier("profile", &name)?;
        if !settings.is_allowed(&name) {
            return Err(TaskError::InvalidConfigValueError {
                field: "profile".to_string(),
                value: name,
                reason: format!(
                    "Choose one of: {}",
                    settings.allowed.as_deref().unwrap_or_default().join(", ")
                ),
            });
        }

        let env_file = if settings.env_file.is_empty() {
            None
        } else {
            let expanded = substitute_vars(&settings.env_file, |var| match var {
                "PROFILE" => Some(name.clone()),
                other => std::env::var(other).ok(),
            });
            Some(base_dir.join(expanded))
        };

        let vars = match &env_file {
            Some(path) => load_env_file(path)?,
            None => BTreeMap::new(),
        };

        tracing::info!(
            "🌍 Profile '{}' ({:?}), {} variable(s) loaded",
            name,
            source,
            vars.len()
        );

        Ok(Self {
            name,
            source,
            variable: settings.variable.clone(),
            env_file,
            vars,
        })
    }

    pub fn is_production(&self) -> bool {
        matches!(self.name.as_str(), "prod" | "production")
    }

    /// Env-file values plus the profile variable itself, for child processes.
    pub fn child_env(&self) -> BTreeMap<String, String> {
        let mut env = self.vars.clone();
        env.insert(self.variable.clone(), self.name.clone());
        env
    }
}

/// Reads `KEY=VALUE` lines. Values are taken literally, `$` included.
/// A missing file or a malformed line only warns.
pub fn load_env_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let mut vars = BTreeMap::new();

    if !path.exists() {
        tracing::warn!(
            "⚠️ Environment file {} not found, continuing without it",
            path.display()
        );
        return Ok(vars);
    }

    let content = std::fs::read_to_string(path).map_err(|e| TaskError::ConfigError {
        message: format!("Cannot read environment file {}: {}", path.display(), e),
    })?;
    let literal = escape_substitutions(&content);

    for entry in dotenvy::from_read_iter(literal.as_bytes()) {
        match entry {
            Ok((key, value)) => {
                vars.insert(key, value);
            }
            Err(dotenvy::Error::Io(e)) => {
                return Err(TaskError::IoError(e));
            }
            Err(e) => {
                tracing::warn!("⚠️ Skipping invalid line in {}: {}", path.display(), e);
            }
        }
    }

    tracing::debug!("Loaded {} variable(s) from {}", vars.len(), path.display());
    Ok(vars)
}

/// dotenvy expands `$VAR` in unquoted and double-quoted values; `\$` keeps the
/// dollar sign. Single-quoted values are already literal and stay untouched.
fn escape_substitutions(content: &str) -> String {
    let mut out = String::with_capacity(content.len());

    for line in content.split_inclusive('\n') {
        let single_quoted = line
            .split_once('=')
            .is_some_and(|(_, value)| value.trim_start().starts_with('\''));
        if single_quoted {
            out.push_str(line);
        } else {
            out.push_str(&line.replace('$', "\\$"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings() -> ProfileSettings {
        ProfileSettings {
            allowed: Some(vec!["dev".to_string(), "prod".to_string()]),
            ..ProfileSettings::default()
        }
    }

    #[test]
    fn test_default_profile_is_dev() {
        let dir = TempDir::new().unwrap();
        let profile = Profile::from_sources(&settings(), None, None, dir.path()).unwrap();

        assert_eq!(profile.name, "dev");
        assert_eq!(profile.source, ProfileSource::Default);
        assert_eq!(profile.env_file, Some(dir.path().join(".env.dev")));
        assert!(profile.vars.is_empty());
        assert!(!profile.is_production());
    }

    #[test]
    fn test_precedence_cli_over_environment() {
        let dir = TempDir::new().unwrap();

        let profile =
            Profile::from_sources(&settings(), None, Some("prod"), dir.path()).unwrap();
        assert_eq!(profile.name, "prod");
        assert_eq!(profile.source, ProfileSource::Environment);
        assert!(profile.is_production());

        let profile =
            Profile::from_sources(&settings(), Some("dev"), Some("prod"), dir.path()).unwrap();
        assert_eq!(profile.name, "dev");
        assert_eq!(profile.source, ProfileSource::CommandLine);
    }

    #[test]
    fn test_empty_variable_falls_back_to_default() {
        let dir = TempDir::new().unwrap();
        let profile = Profile::from_sources(&settings(), None, Some("  "), dir.path()).unwrap();
        assert_eq!(profile.name, "dev");
        assert_eq!(profile.source, ProfileSource::Default);
    }

    #[test]
    fn test_profile_outside_allowed_list_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = Profile::from_sources(&settings(), Some("staging"), None, dir.path())
            .unwrap_err();
        assert!(err.to_string().contains("dev, prod"));
    }

    #[test]
    fn test_env_file_is_loaded_and_exported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".env.prod"),
            "# production settings\n\nDATABASE_URL=\"postgres://db/app\"\nDEBUG=false\nSECRET_KEY='s3cr3t'\n",
        )
        .unwrap();

        let profile = Profile::from_sources(&settings(), Some("prod"), None, dir.path()).unwrap();
        assert_eq!(profile.vars.len(), 3);
        assert_eq!(profile.vars["DATABASE_URL"], "postgres://db/app");
        assert_eq!(profile.vars["SECRET_KEY"], "s3cr3t");

        let env = profile.child_env();
        assert_eq!(env["ENV"], "prod");
        assert_eq!(env["DEBUG"], "false");
    }

    #[test]
    fn test_invalid_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.env");
        std::fs::write(&path, "GOOD=1\nthis line is broken\nALSO_GOOD=2\n").unwrap();

        let vars = load_env_file(&path).unwrap();
        assert_eq!(vars.get("GOOD").map(String::as_str), Some("1"));
        assert_eq!(vars.get("ALSO_GOOD").map(String::as_str), Some("2"));
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn test_dollar_signs_are_kept_literally() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.env");
        std::fs::write(
            &path,
            "SECRET_KEY=ab$cdef\nPW=\"x$yz\"\nRAW='p$ss'\nDATABASE_URL=postgres://u:pa$${HOME}@db/app\n",
        )
        .unwrap();

        let vars = load_env_file(&path).unwrap();
        assert_eq!(vars["SECRET_KEY"], "ab$cdef");
        assert_eq!(vars["PW"], "x$yz");
        assert_eq!(vars["RAW"], "p$ss");
        assert_eq!(vars["DATABASE_URL"], "postgres://u:pa$${HOME}@db/app");
        assert_eq!(vars.len(), 4);
    }

    #[test]
    fn test_missing_env_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let vars = load_env_file(&dir.path().join("nope.env")).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn test_disabled_env_file() {
        let dir = TempDir::new().unwrap();
        let settings = ProfileSettings {
            env_file: String::new(),
            ..ProfileSettings::default()
        };
        let profile = Profile::from_sources(&settings, Some("qa"), None, dir.path()).unwrap();
        assert!(profile.env_file.is_none());
        assert_eq!(profile.child_env().len(), 1);
    }

    #[test]
    fn test_settings_validation() {
        assert!(ProfileSettings::default().validate().is_ok());

        let bad_variable = ProfileSettings {
            variable: "APP ENV".to_string(),
            ..ProfileSettings::default()
        };
        assert!(bad_variable.validate().is_err());

        let default_not_allowed = ProfileSettings {
            allowed: Some(vec!["prod".to_string()]),
            ..ProfileSettings::default()
        };
        assert!(default_not_allowed.validate().is_err());
    }
}
