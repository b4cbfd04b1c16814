//! Core identifier types with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated user identifier.
    ///
    /// All events of one user form the unit of work for segmentation and
    /// role labeling.
    UserId, "user ID"
);

define_string_id!(
    /// A validated session identifier, rendered as `{user}_{ordinal}`.
    SessionId, "session ID"
);

define_string_id!(
    /// A validated subsession identifier, rendered as `{session}__{ordinal}`.
    SubsessionId, "subsession ID"
);

impl SessionId {
    /// Builds the ID of the `ordinal`-th session boundary of `user`.
    pub fn for_user(user: &UserId, ordinal: usize) -> Self {
        // Non-empty because `user` is non-empty.
        Self(format!("{user}_{ordinal}"))
    }
}

impl SubsessionId {
    /// Builds the ID of the subsession with the given ordinal inside `session`.
    pub fn for_session(session: &SessionId, ordinal: usize) -> Self {
        Self(format!("{session}__{ordinal}"))
    }
}
