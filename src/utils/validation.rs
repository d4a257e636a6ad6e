use crate::utils::error::{EstatError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(EstatError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(EstatError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(EstatError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(EstatError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(EstatError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(EstatError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| EstatError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EstatError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(EstatError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// e-Stat の統計表ID・政府統計コードは数字のみ
pub fn validate_numeric_id(field_name: &str, value: &str, expected_len: usize) -> Result<()> {
    if value.len() != expected_len || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(EstatError::ValidationError {
            message: format!(
                "{} must be a {}-digit numeric code, got '{}'",
                field_name, expected_len, value
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("estat.base_url", "https://api.e-stat.go.jp/rest/3.0/app").is_ok());
        assert!(validate_url("ollama.base_url", "http://localhost:11434").is_ok());
        assert!(validate_url("estat.base_url", "").is_err());
        assert!(validate_url("estat.base_url", "invalid-url").is_err());
        assert!(validate_url("estat.base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("estat.page_size", 100, 1).is_ok());
        assert!(validate_positive_number("estat.page_size", 0, 1).is_err());
    }

    #[test]
    fn test_validate_numeric_id() {
        assert!(validate_numeric_id("stats_data_id", "0003084821", 10).is_ok());
        assert!(validate_numeric_id("stats_code", "00200521", 8).is_ok());
        assert!(validate_numeric_id("stats_data_id", "00030848", 10).is_err());
        assert!(validate_numeric_id("stats_data_id", "00030848ab", 10).is_err());

        let err = validate_numeric_id("stats_data_id", "abc", 10).unwrap_err();
        assert_ne!(err.severity().exit_code(), 0);
    }

    #[test]
    fn test_validate_required_field() {
        let present = Some("appid".to_string());
        let absent: Option<String> = None;
        assert_eq!(validate_required_field("estat.app_id", &present).unwrap(), "appid");
        assert!(matches!(
            validate_required_field("estat.app_id", &absent),
            Err(EstatError::MissingConfigError { .. })
        ));
    }
}
