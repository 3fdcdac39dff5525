use crate::utils::error::{Result, TaskError};
use std::path::{Component, Path};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(TaskError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(TaskError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

/// Paths that get deleted on failure must stay inside the project directory.
pub fn validate_relative_path(field_name: &str, path: &str) -> Result<()> {
    validate_path(field_name, path)?;

    let parsed = Path::new(path);
    if parsed.is_absolute() {
        return Err(TaskError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path must be relative to the task file".to_string(),
        });
    }

    let escapes = parsed.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(TaskError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path must not leave the project directory".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(TaskError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TaskError::MissingConfigError {
            field: field_name.to_string(),
        });
    }
    Ok(())
}

/// Task and profile names: `[A-Za-z0-9][A-Za-z0-9_.-]*`.
pub fn validate_identifier(field_name: &str, value: &str) -> Result<()> {
    let mut chars = value.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        _ => false,
    };

    if !valid {
        return Err(TaskError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Use letters, digits, '_', '-' or '.', starting with a letter or digit"
                .to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("test", "build/out").is_ok());
        assert!(validate_path("test", "").is_err());
        assert!(validate_path("test", "a\0b").is_err());
    }

    #[test]
    fn test_validate_relative_path() {
        assert!(validate_relative_path("outputs", "requirements.txt").is_ok());
        assert!(validate_relative_path("outputs", "dist/wheels").is_ok());
        assert!(validate_relative_path("outputs", "./dist").is_ok());
        assert!(validate_relative_path("outputs", "/etc/passwd").is_err());
        assert!(validate_relative_path("outputs", "../outside").is_err());
        assert!(validate_relative_path("outputs", "dist/../../x").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("timeout", 5, 1).is_ok());
        assert!(validate_positive_number("timeout", 1, 1).is_ok());
        assert!(validate_positive_number("timeout", 0, 1).is_err());
    }

    #[test]
    fn test_validate_non_empty_string() {
        assert!(validate_non_empty_string("name", "app").is_ok());
        assert!(validate_non_empty_string("name", "").is_err());
        assert!(validate_non_empty_string("name", "   ").is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("task", "docker-build").is_ok());
        assert!(validate_identifier("task", "export_requirements").is_ok());
        assert!(validate_identifier("task", "v1.2").is_ok());
        assert!(validate_identifier("task", "").is_err());
        assert!(validate_identifier("task", "-lint").is_err());
        assert!(validate_identifier("task", "has space").is_err());
    }
}
