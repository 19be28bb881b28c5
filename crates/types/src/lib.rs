/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// The input was not a plausible email address
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    ///
    /// # Arguments
    ///
    /// * `input` - Any type that can be converted to a string reference
    ///
    /// # Returns
    ///
    /// Returns `Ok(NonEmptyText)` if the trimmed input is non-empty,
    /// or `Err(TextError::Empty)` if it's empty or contains only whitespace.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A validated email address.
///
/// This does not attempt full RFC 5322 parsing; it only guarantees the shape
/// `local@domain` with a dotted, whitespace-free domain. The address is
/// trimmed during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Parses and validates an email address.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` for empty/whitespace-only input, or
    /// `TextError::InvalidEmail` when the shape checks fail.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }

        if trimmed.chars().any(char::is_whitespace) {
            return Err(TextError::InvalidEmail(trimmed.to_owned()));
        }

        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(TextError::InvalidEmail(trimmed.to_owned()));
        };

        if local.is_empty()
            || domain.is_empty()
            || domain.contains('@')
            || !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
        {
            return Err(TextError::InvalidEmail(trimmed.to_owned()));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for EmailAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for EmailAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        EmailAddress::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_input() {
        let text = NonEmptyText::new("  My Location Name  ").expect("should accept");
        assert_eq!(text.as_str(), "My Location Name");
    }

    #[test]
    fn non_empty_text_rejects_whitespace_only() {
        let err = NonEmptyText::new("   ").expect_err("should reject");
        assert!(matches!(err, TextError::Empty));
    }

    #[test]
    fn email_address_accepts_plain_address() {
        let email = EmailAddress::parse("nosuchaddress@nhs.net").expect("should accept");
        assert_eq!(email.as_str(), "nosuchaddress@nhs.net");
    }

    #[test]
    fn email_address_rejects_missing_at() {
        let err = EmailAddress::parse("nhs.net").expect_err("should reject");
        assert!(matches!(err, TextError::InvalidEmail(_)));
    }

    #[test]
    fn email_address_rejects_undotted_domain() {
        let err = EmailAddress::parse("admin@localhost").expect_err("should reject");
        assert!(matches!(err, TextError::InvalidEmail(_)));
    }

    #[test]
    fn email_address_rejects_embedded_whitespace() {
        let err = EmailAddress::parse("no such@nhs.net").expect_err("should reject");
        assert!(matches!(err, TextError::InvalidEmail(_)));
    }
}
