//! Strongly-typed identifiers.
//!
//! Every entity in the system is referenced through its own identifier type so
//! that an encounter id can never be passed where a prescription id is
//! expected. All of them are UUID-backed except [`NationalId`], which is the
//! natural cross-facility patient key and carries whatever format the national
//! registry issues.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::TextError;

/// The national patient identifier driving cross-facility aggregation.
///
/// Opaque to this system: any trimmed, non-empty string is accepted. Equality
/// is exact (case-sensitive), matching the issuing registry's behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NationalId(String);

impl NationalId {
    /// Validates and wraps a national identifier.
    ///
    /// The input is trimmed; an empty or whitespace-only input is rejected.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NationalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for NationalId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NationalId::new(&s).map_err(serde::de::Error::custom)
    }
}

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Allocates a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the underlying UUID.
            pub fn uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// Identifies one authenticated facility (tenant).
    FacilityId
}

uuid_id! {
    /// Identifies one staff principal (doctor, triage nurse).
    StaffId
}

uuid_id! {
    /// Identifies one clinical episode at one facility.
    EncounterId
}

uuid_id! {
    /// Identifies one lab request.
    LabRequestId
}

uuid_id! {
    /// Identifies one prescription.
    PrescriptionId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_national_id_trims_and_preserves_case() {
        let id = NationalId::new(" ET-001 ").unwrap();
        assert_eq!(id.as_str(), "ET-001");
        assert_ne!(id, NationalId::new("et-001").unwrap());
    }

    #[test]
    fn test_national_id_rejects_empty() {
        assert!(NationalId::new("  ").is_err());
    }

    #[test]
    fn test_uuid_ids_are_distinct_types_and_values() {
        let a = EncounterId::new();
        let b = EncounterId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 36);
    }
}
