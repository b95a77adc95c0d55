//! Validation Traits
//!
//! Common request validation shared by the route handlers.

use crate::error::{ApiError, ApiResult};
use crm_core::import::{is_valid_email, MAX_FIELD_LEN};

/// Validate that a string is non-empty after trimming.
pub trait ValidateNonEmpty {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()>;
}

impl ValidateNonEmpty for str {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()> {
        if self.trim().is_empty() {
            return Err(ApiError::missing_field(field_name));
        }
        Ok(())
    }
}

impl ValidateNonEmpty for String {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()> {
        self.as_str().validate_non_empty(field_name)
    }
}

impl<T: ValidateNonEmpty> ValidateNonEmpty for Option<T> {
    fn validate_non_empty(&self, field_name: &str) -> ApiResult<()> {
        match self {
            Some(value) => value.validate_non_empty(field_name),
            None => Err(ApiError::missing_field(field_name)),
        }
    }
}

/// Validate numeric ranges.
pub trait ValidateRange {
    fn validate_positive(&self, field_name: &str) -> ApiResult<()>;

    fn validate_range(&self, field_name: &str, min: Self, max: Self) -> ApiResult<()>
    where
        Self: Sized;
}

macro_rules! impl_validate_range {
    ($($t:ty),*) => {
        $(
            impl ValidateRange for $t {
                fn validate_positive(&self, field_name: &str) -> ApiResult<()> {
                    if *self <= 0 as $t {
                        return Err(ApiError::invalid_range(field_name, 1, <$t>::MAX as i64));
                    }
                    Ok(())
                }

                fn validate_range(&self, field_name: &str, min: Self, max: Self) -> ApiResult<()> {
                    if *self < min || *self > max {
                        return Err(ApiError::invalid_range(field_name, min as i64, max as i64));
                    }
                    Ok(())
                }
            }
        )*
    };
}

impl_validate_range!(i32, i64);

/// Validate free-text fields against the shared length limit and email format.
pub trait ValidateText {
    fn validate_max_len(&self, field_name: &str) -> ApiResult<()>;

    fn validate_email(&self, field_name: &str) -> ApiResult<()>;
}

impl ValidateText for str {
    fn validate_max_len(&self, field_name: &str) -> ApiResult<()> {
        if self.chars().count() > MAX_FIELD_LEN {
            return Err(ApiError::invalid_input(format!(
                "{} must be at most {} characters",
                field_name, MAX_FIELD_LEN
            )));
        }
        Ok(())
    }

    fn validate_email(&self, field_name: &str) -> ApiResult<()> {
        self.validate_max_len(field_name)?;
        if !is_valid_email(self.trim()) {
            return Err(ApiError::invalid_format(field_name, "email address"));
        }
        Ok(())
    }
}

impl ValidateText for String {
    fn validate_max_len(&self, field_name: &str) -> ApiResult<()> {
        self.as_str().validate_max_len(field_name)
    }

    fn validate_email(&self, field_name: &str) -> ApiResult<()> {
        self.as_str().validate_email(field_name)
    }
}

/// Absent values are valid.
impl<T: ValidateText> ValidateText for Option<T> {
    fn validate_max_len(&self, field_name: &str) -> ApiResult<()> {
        self.as_ref()
            .map_or(Ok(()), |v| v.validate_max_len(field_name))
    }

    fn validate_email(&self, field_name: &str) -> ApiResult<()> {
        self.as_ref().map_or(Ok(()), |v| v.validate_email(field_name))
    }
}

/// Implemented by PATCH request bodies.
pub trait HasUpdates {
    fn has_any_updates(&self) -> bool;

    fn validate_has_updates(&self) -> ApiResult<()> {
        if !self.has_any_updates() {
            return Err(ApiError::invalid_input(
                "At least one field must be provided for update",
            ));
        }
        Ok(())
    }
}

/// Trim a text value, mapping blank strings to `None`.
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_non_empty() {
        assert!("hello".validate_non_empty("test").is_ok());
        assert!("   ".validate_non_empty("test").is_err());
        assert!(Some(String::from("x")).validate_non_empty("test").is_ok());
        assert!(None::<String>.validate_non_empty("test").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(50i32.validate_range("probability", 0, 100).is_ok());
        assert!(101i32.validate_range("probability", 0, 100).is_err());
        assert!((-1i32).validate_range("probability", 0, 100).is_err());
        assert!(0i64.validate_positive("size_bytes").is_err());
    }

    #[test]
    fn test_validate_text() {
        assert!("a@b.co".validate_email("email").is_ok());
        assert!("not-an-email".validate_email("email").is_err());
        assert!(None::<String>.validate_email("email").is_ok());
        assert!("x".repeat(MAX_FIELD_LEN + 1).validate_max_len("name").is_err());
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean(Some("  Acme ".to_string())), Some("Acme".to_string()));
        assert_eq!(clean(Some("   ".to_string())), None);
        assert_eq!(clean(None), None);
    }
}
