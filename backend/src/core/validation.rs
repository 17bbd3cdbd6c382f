use crate::core::{ApiError, FieldError};

/// Collects per-field validation failures for a request body.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, field: &str, message: String) -> &mut Self {
        self.errors.push(FieldError::new(field, message));
        self
    }

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.fail(field, format!("{field} is required"));
        }
        self
    }

    /// Required and at least `min` characters long.
    pub fn min_len(&mut self, field: &str, value: &str, min: usize) -> &mut Self {
        if value.trim().is_empty() {
            self.fail(field, format!("{field} is required"));
        } else if value.chars().count() < min {
            self.fail(field, format!("{field} must be at least {min} characters"));
        }
        self
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        if value.chars().count() > max {
            self.fail(field, format!("{field} must be at most {max} characters"));
        }
        self
    }

    /// Optional text: only checked for length when present.
    pub fn optional_min_len(&mut self, field: &str, value: Option<&str>, min: usize) -> &mut Self {
        if let Some(value) = value {
            self.min_len(field, value, min);
        }
        self
    }

    pub fn alphanumeric(&mut self, field: &str, value: &str) -> &mut Self {
        if !value.is_empty() && !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            self.fail(field, format!("{field} must contain only alphanumeric characters"));
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.fail(field, format!("{field} is required"));
        } else if !is_email(value) {
            self.fail(field, format!("{field} must be a valid email"));
        }
        self
    }

    pub fn range(&mut self, field: &str, value: i64, min: i64, max: i64) -> &mut Self {
        if value < min || value > max {
            self.fail(field, format!("{field} must be between {min} and {max}"));
        }
        self
    }

    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) -> &mut Self {
        if !allowed.contains(&value) {
            self.fail(field, format!("{field} must be one of [{}]", allowed.join(", ")));
        }
        self
    }

    pub fn non_empty_list<T>(&mut self, field: &str, values: &[T]) -> &mut Self {
        if values.is_empty() {
            self.fail(field, format!("{field} must contain at least one item"));
        }
        self
    }

    pub fn max_items<T>(&mut self, field: &str, values: &[T], max: usize) -> &mut Self {
        if values.len() > max {
            self.fail(field, format!("{field} must contain at most {max} items"));
        }
        self
    }

    pub fn json_object(&mut self, field: &str, value: &serde_json::Value) -> &mut Self {
        if !value.is_object() {
            self.fail(field, format!("{field} must be an object"));
        }
        self
    }

    /// Fails with 422 and the collected details when any check failed.
    pub fn finish(&mut self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

fn is_email(value: &str) -> bool {
    let mut parts = value.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

/// Trims optional text, treating blank input as absent.
#[must_use]
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Lowercases and joins the words of `name` with single hyphens.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("Population Census 2020"), "population-census-2020");
        assert_eq!(slugify("  Air_Quality / Jakarta  "), "air-quality-jakarta");
        assert_eq!(slugify("a---b"), "a-b");
        assert_eq!(slugify("Ümlaut Daten"), "ümlaut-daten");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_non_blank_drops_whitespace_only_values() {
        assert_eq!(non_blank(Some("  x ".into())), Some("x".to_string()));
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_email_shapes() {
        assert!(is_email("a@x"));
        assert!(is_email("first.last@example.com"));
        assert!(!is_email("no-at-sign"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("a@"));
        assert!(!is_email("a@b@c"));
        assert!(!is_email("a b@example.com"));
    }

    #[test]
    fn test_validator_collects_every_failure() {
        let result = Validator::new()
            .required("name", "")
            .min_len("password", "short", 8)
            .alphanumeric("username", "bad name")
            .email("email", "nope")
            .range("rating", 9, 1, 5)
            .one_of("status", "gone", &["draft", "published"])
            .finish();

        let Err(ApiError::Validation(details)) = result else {
            panic!("expected validation failure");
        };
        let messages: Vec<_> = details.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "name is required",
                "password must be at least 8 characters",
                "username must contain only alphanumeric characters",
                "email must be a valid email",
                "rating must be between 1 and 5",
                "status must be one of [draft, published]",
            ]
        );
    }

    #[test]
    fn test_validator_passes_clean_input() {
        assert!(
            Validator::new()
                .required("name", "B")
                .min_len("username", "bbb", 3)
                .alphanumeric("username", "bbb")
                .email("email", "a@x")
                .finish()
                .is_ok()
        );
    }
}
