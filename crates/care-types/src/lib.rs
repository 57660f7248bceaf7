//! Validated identifier types shared across the workspace.
//!
//! Case and provider identifiers travel through URLs, audit events and log
//! lines, so they are constrained at construction time to a short,
//! non-identifying character set. Free-form client data never belongs in
//! these types.

/// Errors that can occur when creating validated identifier types.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// The input was empty or contained only whitespace
    #[error("identifier cannot be empty")]
    Empty,
    /// The input exceeded the maximum permitted length
    #[error("identifier exceeds {0} characters")]
    TooLong(usize),
    /// The input contained a character outside the permitted set
    #[error("identifier contains invalid character {0:?}")]
    InvalidCharacter(char),
    /// A fax number did not contain enough digits to be dialable
    #[error("fax number must contain at least {0} digits")]
    TooFewDigits(usize),
}

const MAX_ID_LEN: usize = 64;
const MIN_FAX_DIGITS: usize = 7;
const MAX_FAX_LEN: usize = 24;

fn validate_id(input: impl AsRef<str>) -> Result<String, IdError> {
    let trimmed = input.as_ref().trim();
    if trimmed.is_empty() {
        return Err(IdError::Empty);
    }
    if trimmed.len() > MAX_ID_LEN {
        return Err(IdError::TooLong(MAX_ID_LEN));
    }
    for ch in trimmed.chars() {
        if !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_') {
            return Err(IdError::InvalidCharacter(ch));
        }
    }
    Ok(trimmed.to_owned())
}

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from the given input.
            ///
            /// The input is trimmed of leading and trailing whitespace and
            /// must then be 1 to 64 characters drawn from ASCII
            /// alphanumerics, `-` and `_`.
            pub fn new(input: impl AsRef<str>) -> Result<Self, IdError> {
                validate_id(input).map(Self)
            }

            /// Returns the inner identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $name::new(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

id_type! {
    /// A case identifier such as `CASE-01234`.
    ///
    /// Case ids are deliberately non-identifying and are the only case
    /// reference permitted in URLs, audit events and log output.
    CaseId
}

id_type! {
    /// An external provider identifier.
    ProviderId
}

/// A dialable fax number for an external provider.
///
/// Accepts digits plus common formatting characters (`+ - ( )` and
/// spaces). At least seven digits must be present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaxNumber(String);

impl FaxNumber {
    /// Creates a new `FaxNumber` from the given input.
    pub fn new(input: impl AsRef<str>) -> Result<Self, IdError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(IdError::Empty);
        }
        if trimmed.len() > MAX_FAX_LEN {
            return Err(IdError::TooLong(MAX_FAX_LEN));
        }
        let mut digits = 0usize;
        for ch in trimmed.chars() {
            match ch {
                '0'..='9' => digits += 1,
                '+' | '-' | '(' | ')' | ' ' => {}
                other => return Err(IdError::InvalidCharacter(other)),
            }
        }
        if digits < MIN_FAX_DIGITS {
            return Err(IdError::TooFewDigits(MIN_FAX_DIGITS));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the fax number as entered, trimmed.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FaxNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for FaxNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for FaxNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FaxNumber::new(&s).map_err(serde::de::Error::custom)
    }
}
