//! Facility authentication.
//!
//! Every central write is admitted only after the presenting facility's secret
//! key resolves to an approved credential. The resolved identity is handed
//! back as a [`FacilityContext`] and passed explicitly into the write path --
//! no component downstream re-validates it, and none of it lives in ambient
//! request state.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use medinet_types::{FacilityId, NonEmptyText};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{RecordError, RecordResult};

/// One facility's credential record.
///
/// Credential issuance and facility onboarding are external concerns; this
/// system only consumes the resulting records.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FacilityCredential {
    /// The facility this credential resolves to.
    pub facility: FacilityId,
    /// Human-readable facility name.
    pub name: NonEmptyText,
    /// The shared secret presented on write requests.
    pub secret_key: String,
    /// Whether the facility has been approved to contribute records.
    pub approved: bool,
}

/// The facility identity bound to one request's execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FacilityContext {
    pub facility: FacilityId,
}

/// Lookup table of facility credentials, keyed by secret key.
#[derive(Clone, Default)]
pub struct FacilityDirectory {
    credentials: Arc<RwLock<HashMap<String, FacilityCredential>>>,
}

impl FacilityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a credential. Used by startup seeding and by
    /// whatever external onboarding flow manages facilities.
    pub async fn insert(&self, credential: FacilityCredential) {
        let mut credentials = self.credentials.write().await;
        credentials.insert(credential.secret_key.clone(), credential);
    }

    /// Loads credentials from a JSON seed file (an array of
    /// [`FacilityCredential`]) and returns how many were registered.
    pub async fn load_seed(&self, path: &Path) -> RecordResult<usize> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            tracing::error!("failed to read facility seed {}: {e}", path.display());
            RecordError::Internal(e.to_string())
        })?;
        let seed: Vec<FacilityCredential> = serde_json::from_str(&contents).map_err(|e| {
            tracing::error!("failed to parse facility seed {}: {e}", path.display());
            RecordError::Internal(e.to_string())
        })?;

        let count = seed.len();
        let mut credentials = self.credentials.write().await;
        for credential in seed {
            credentials.insert(credential.secret_key.clone(), credential);
        }
        tracing::info!("loaded {count} facility credentials");
        Ok(count)
    }

    /// Resolves a presented secret key to a facility identity.
    ///
    /// No key at all fails with [`RecordError::Unauthenticated`]. A key that
    /// matches no credential, or matches one that is not approved, fails with
    /// [`RecordError::Forbidden`] -- the two causes are not distinguished.
    pub async fn authenticate(&self, presented: Option<&str>) -> RecordResult<FacilityContext> {
        let Some(presented) = presented.filter(|k| !k.is_empty()) else {
            return Err(RecordError::Unauthenticated);
        };

        let credentials = self.credentials.read().await;
        match credentials.get(presented) {
            Some(credential) if credential.approved => Ok(FacilityContext {
                facility: credential.facility,
            }),
            Some(_) => {
                tracing::warn!("write rejected: facility credential not approved");
                Err(RecordError::Forbidden)
            }
            None => {
                tracing::warn!("write rejected: unknown facility credential");
                Err(RecordError::Forbidden)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn credential(secret: &str, approved: bool) -> FacilityCredential {
        FacilityCredential {
            facility: FacilityId::new(),
            name: NonEmptyText::new("St. Paul's Hospital").unwrap(),
            secret_key: secret.to_string(),
            approved,
        }
    }

    #[tokio::test]
    async fn test_missing_key_is_unauthenticated() {
        let directory = FacilityDirectory::new();
        assert!(matches!(
            directory.authenticate(None).await,
            Err(RecordError::Unauthenticated)
        ));
        assert!(matches!(
            directory.authenticate(Some("")).await,
            Err(RecordError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_unknown_and_unapproved_keys_are_both_forbidden() {
        let directory = FacilityDirectory::new();
        directory.insert(credential("pending-key", false)).await;

        assert!(matches!(
            directory.authenticate(Some("no-such-key")).await,
            Err(RecordError::Forbidden)
        ));
        assert!(matches!(
            directory.authenticate(Some("pending-key")).await,
            Err(RecordError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_approved_key_resolves_to_its_facility() {
        let directory = FacilityDirectory::new();
        let cred = credential("good-key", true);
        let facility = cred.facility;
        directory.insert(cred).await;

        let ctx = directory.authenticate(Some("good-key")).await.unwrap();
        assert_eq!(ctx.facility, facility);
    }

    #[tokio::test]
    async fn test_load_seed_registers_credentials_from_file() {
        let directory = FacilityDirectory::new();
        let seed = vec![credential("seed-a", true), credential("seed-b", false)];

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&seed).unwrap()).unwrap();

        let count = directory.load_seed(file.path()).await.unwrap();
        assert_eq!(count, 2);
        assert!(directory.authenticate(Some("seed-a")).await.is_ok());
        assert!(matches!(
            directory.authenticate(Some("seed-b")).await,
            Err(RecordError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_load_seed_missing_file_is_internal() {
        let directory = FacilityDirectory::new();
        let err = directory
            .load_seed(Path::new("/definitely/not/here.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::Internal(_)));
    }
}
