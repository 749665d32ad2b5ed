//! Error types for the medinet core.
//!
//! Every component failure is mapped to exactly one of these kinds before it
//! crosses the external boundary. Security-relevant denials deliberately share
//! a single message: a caller must not be able to tell "record does not exist"
//! apart from "record belongs to someone else" or "record is in the wrong
//! state". Validation failures, by contrast, always enumerate the offending
//! fields because those paths are not existence-sensitive.

/// The single error type surfaced by all core services.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Required input is missing or malformed. Lists the offending fields.
    #[error("missing or invalid fields: {}", fields.join(", "))]
    Validation {
        /// Boundary names of the fields that failed validation.
        fields: Vec<&'static str>,
    },

    /// No facility credential was presented.
    #[error("facility credential is required")]
    Unauthenticated,

    /// The caller is not authorised for the requested record.
    ///
    /// One fixed message for every denial cause. Do not add variants or
    /// parameters that would let callers distinguish non-existence from
    /// wrong-owner or wrong-state.
    #[error("you are not authorised to access this record")]
    Forbidden,

    /// Lookup by an identifier whose existence is not sensitive.
    #[error("record not found")]
    NotFound,

    /// A lifecycle precondition was not met.
    ///
    /// Like [`RecordError::Forbidden`], the possible causes are merged into
    /// one message on purpose.
    #[error("record not found, not assigned to you, or not in the required status")]
    InvalidTransition,

    /// Storage or other unexpected failure. Logged at the call site; callers
    /// only ever see this generic form.
    #[error("internal error")]
    Internal(String),
}

impl RecordError {
    /// Convenience constructor for [`RecordError::Validation`].
    pub fn validation(fields: Vec<&'static str>) -> Self {
        Self::Validation { fields }
    }
}

pub type RecordResult<T> = std::result::Result<T, RecordError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_fields() {
        let err = RecordError::validation(vec!["firstName", "gender"]);
        assert_eq!(
            err.to_string(),
            "missing or invalid fields: firstName, gender"
        );
    }

    #[test]
    fn test_denials_carry_no_detail() {
        // The uniform-denial property rests on these messages staying fixed.
        assert_eq!(
            RecordError::Forbidden.to_string(),
            "you are not authorised to access this record"
        );
        assert_eq!(
            RecordError::InvalidTransition.to_string(),
            "record not found, not assigned to you, or not in the required status"
        );
        assert_eq!(
            RecordError::Internal("lock poisoned".into()).to_string(),
            "internal error"
        );
    }
}
