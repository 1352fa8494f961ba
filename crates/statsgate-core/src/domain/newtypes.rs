//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for the identifiers that end up inside request
//! paths. Each newtype ensures the value is URL-path safe at construction
//! time, so the client never has to escape or re-check them.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Returns `true` if `c` may appear in a provider identifier.
///
/// Provider identifiers are URNs such as `sr:competitor:14882`.
fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == ':' || c == '-' || c == '_'
}

fn validate_id(kind: &str, id: &str) -> Result<(), DomainError> {
    if id.is_empty() {
        return Err(DomainError::InvalidId(format!("{kind} cannot be empty")));
    }
    if !id.chars().all(is_id_char) {
        return Err(DomainError::InvalidId(format!(
            "{kind} contains invalid characters: {id}"
        )));
    }
    Ok(())
}

macro_rules! provider_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Create a new ", $kind)]
            ///
            /// # Errors
            /// Returns error if the identifier is empty or not URL-path safe
            pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
                let id = id.into();
                validate_id($kind, &id)?;
                Ok(Self(id))
            }

            /// Get the inner string reference
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

provider_id!(
    /// Competitor (player or team) identifier, e.g. `sr:competitor:14882`
    CompetitorId,
    "Competitor ID"
);

provider_id!(
    /// Sport event (match) identifier, e.g. `sr:sport_event:41234567`
    SportEventId,
    "Sport event ID"
);

provider_id!(
    /// Season identifier, e.g. `sr:season:106755`
    SeasonId,
    "Season ID"
);

/// Calendar date used by the daily schedule endpoint.
///
/// Always rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleDate(NaiveDate);

impl ScheduleDate {
    /// Wrap an existing date
    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Today's date in UTC
    #[must_use]
    pub fn today() -> Self {
        Self(chrono::Utc::now().date_naive())
    }

    /// Get the inner date
    #[must_use]
    pub const fn as_date(&self) -> NaiveDate {
        self.0
    }
}

impl Display for ScheduleDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for ScheduleDate {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|e| DomainError::InvalidDate(format!("{s}: {e}")))
    }
}

impl From<NaiveDate> for ScheduleDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}
