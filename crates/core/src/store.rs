//! Shared in-memory storage.
//!
//! One collection per aggregate, each behind its own `tokio::sync::RwLock`.
//! The handle is cheap to clone and every clone sees the same data, so
//! request handlers can run in parallel and suspend only while acquiring a
//! lock.
//!
//! Atomicity discipline: a conditional update (check-and-set on an encounter
//! status, find-or-create on a national id) is performed by holding the
//! collection's *write* guard across both the check and the mutation. Never
//! read under one guard, drop it, and write under another. When one
//! operation touches several collections, acquire them in declaration order:
//! `patients`, then `encounters`, then `lab_requests`, then `prescriptions`.

use std::collections::HashMap;
use std::sync::Arc;

use medinet_types::{EncounterId, LabRequestId, NationalId, PrescriptionId};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::artifacts::{LabRequest, Prescription};
use crate::central::PatientIdentity;
use crate::encounter::Encounter;

/// Handle to the shared collections.
#[derive(Clone, Default)]
pub struct MemoryStore {
    patients: Arc<RwLock<HashMap<NationalId, PatientIdentity>>>,
    encounters: Arc<RwLock<HashMap<EncounterId, Encounter>>>,
    lab_requests: Arc<RwLock<HashMap<LabRequestId, LabRequest>>>,
    prescriptions: Arc<RwLock<HashMap<PrescriptionId, Prescription>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn patients(&self) -> RwLockReadGuard<'_, HashMap<NationalId, PatientIdentity>> {
        self.patients.read().await
    }

    pub async fn patients_mut(
        &self,
    ) -> RwLockWriteGuard<'_, HashMap<NationalId, PatientIdentity>> {
        self.patients.write().await
    }

    pub async fn encounters(&self) -> RwLockReadGuard<'_, HashMap<EncounterId, Encounter>> {
        self.encounters.read().await
    }

    pub async fn encounters_mut(
        &self,
    ) -> RwLockWriteGuard<'_, HashMap<EncounterId, Encounter>> {
        self.encounters.write().await
    }

    pub async fn lab_requests(&self) -> RwLockReadGuard<'_, HashMap<LabRequestId, LabRequest>> {
        self.lab_requests.read().await
    }

    pub async fn lab_requests_mut(
        &self,
    ) -> RwLockWriteGuard<'_, HashMap<LabRequestId, LabRequest>> {
        self.lab_requests.write().await
    }

    pub async fn prescriptions(
        &self,
    ) -> RwLockReadGuard<'_, HashMap<PrescriptionId, Prescription>> {
        self.prescriptions.read().await
    }

    pub async fn prescriptions_mut(
        &self,
    ) -> RwLockWriteGuard<'_, HashMap<PrescriptionId, Prescription>> {
        self.prescriptions.write().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_the_same_collections() {
        let store = MemoryStore::new();
        let other = store.clone();

        let id = EncounterId::new();
        store
            .encounters_mut()
            .await
            .insert(id, Encounter::open(NationalId::new("ET-100").unwrap(), Default::default()));

        assert!(other.encounters().await.contains_key(&id));
    }
}
