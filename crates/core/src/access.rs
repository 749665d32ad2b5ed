//! Per-assignment access control.
//!
//! A doctor's reach is exactly the set of encounters assigned to them --
//! working at the same facility grants nothing. Every denial on these paths
//! is the single [`RecordError::Forbidden`] value regardless of whether the
//! record exists, belongs to someone else, or never existed: the uniformity
//! is an anti-enumeration property, not an oversight, and must be preserved.

use chrono::Utc;
use medinet_types::{EncounterId, NationalId, StaffId};
use serde::Serialize;

use crate::central::{BloodGroup, Gender};
use crate::config::CoreConfig;
use crate::encounter::{Encounter, EncounterStatus};
use crate::projection::{self, PatientProfile};
use crate::store::MemoryStore;
use crate::{RecordError, RecordResult};

/// Encounter-scoped authorization: assigned-doctor equality, nothing else.
pub fn authorize_encounter(principal: &StaffId, encounter: &Encounter) -> RecordResult<()> {
    if encounter.assigned_doctor == Some(*principal) {
        Ok(())
    } else {
        Err(RecordError::Forbidden)
    }
}

/// One row of a doctor's "my patients" listing.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedPatient {
    pub encounter_id: EncounterId,
    pub status: EncounterStatus,
    #[serde(rename = "nationalID")]
    pub national_id: NationalId,
    /// Demographics from the central aggregate, when the patient has one.
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<Gender>,
    pub blood_group: Option<BloodGroup>,
}

/// Gates doctor-scoped reads and produces the narrowed query results.
#[derive(Clone)]
pub struct AccessGuard {
    store: MemoryStore,
    listing_limit: usize,
}

impl AccessGuard {
    pub fn new(store: MemoryStore, config: &CoreConfig) -> Self {
        Self {
            store,
            listing_limit: config.listing_limit(),
        }
    }

    /// Full detail of one encounter, for its assigned doctor only.
    ///
    /// Reads are independent of lifecycle state; a `Completed` encounter is
    /// as readable as an active one.
    pub async fn encounter_detail(
        &self,
        doctor: &StaffId,
        encounter_id: &EncounterId,
    ) -> RecordResult<Encounter> {
        let encounters = self.store.encounters().await;
        let encounter = encounters.get(encounter_id).ok_or(RecordError::Forbidden)?;
        authorize_encounter(doctor, encounter)?;
        Ok(encounter.clone())
    }

    /// Permits reading a patient's profile iff at least one encounter joins
    /// (patient, doctor). Absence is `Forbidden`, never `NotFound`.
    pub async fn authorize_patient(
        &self,
        doctor: &StaffId,
        patient: &NationalId,
    ) -> RecordResult<()> {
        let encounters = self.store.encounters().await;
        let related = encounters
            .values()
            .any(|e| e.patient == *patient && e.assigned_doctor == Some(*doctor));
        if related {
            Ok(())
        } else {
            Err(RecordError::Forbidden)
        }
    }

    /// The doctor's visible patient set: encounters assigned to them in
    /// {Assigned, InTreatment}, most-recent-first, capped at the configured
    /// limit. An optional free-text fragment narrows by national id or name;
    /// it can never widen the scope.
    pub async fn my_patients(
        &self,
        doctor: &StaffId,
        search: Option<&str>,
    ) -> Vec<AssignedPatient> {
        let patients = self.store.patients().await;
        let encounters = self.store.encounters().await;

        let mut scoped: Vec<&Encounter> = encounters
            .values()
            .filter(|e| e.assigned_doctor == Some(*doctor) && e.status.is_in_care())
            .collect();
        scoped.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let needle = search.map(str::trim).filter(|s| !s.is_empty()).map(str::to_lowercase);

        scoped
            .into_iter()
            .map(|e| {
                let identity = patients.get(&e.patient);
                AssignedPatient {
                    encounter_id: e.id,
                    status: e.status,
                    national_id: e.patient.clone(),
                    first_name: identity.map(|p| p.first_name.to_string()),
                    last_name: identity.map(|p| p.last_name.to_string()),
                    gender: identity.map(|p| p.gender),
                    blood_group: identity.and_then(|p| p.blood_group),
                }
            })
            .filter(|row| match &needle {
                None => true,
                Some(needle) => {
                    row.national_id.as_str().to_lowercase().contains(needle)
                        || row
                            .first_name
                            .as_deref()
                            .is_some_and(|n| n.to_lowercase().contains(needle))
                        || row
                            .last_name
                            .as_deref()
                            .is_some_and(|n| n.to_lowercase().contains(needle))
                }
            })
            .take(self.listing_limit)
            .collect()
    }

    /// The composite profile for a patient the doctor is authorized on:
    /// guard first, then pure projection over the prefetched collections.
    ///
    /// # Errors
    ///
    /// [`RecordError::Forbidden`] when no encounter joins (patient, doctor);
    /// [`RecordError::NotFound`] when the relationship exists but the patient
    /// has no central aggregate to build demographics from.
    pub async fn patient_profile(
        &self,
        doctor: &StaffId,
        patient: &NationalId,
    ) -> RecordResult<PatientProfile> {
        self.authorize_patient(doctor, patient).await?;

        let patients = self.store.patients().await;
        let identity = patients.get(patient).ok_or(RecordError::NotFound)?;

        let encounters = self.store.encounters().await;
        let patient_encounters: Vec<Encounter> = encounters
            .values()
            .filter(|e| e.patient == *patient)
            .cloned()
            .collect();

        let lab_requests = self.store.lab_requests().await;
        let prescriptions = self.store.prescriptions().await;

        Ok(projection::project_profile(
            identity,
            patient_encounters,
            &lab_requests,
            &prescriptions,
            Utc::now().date_naive(),
        ))
    }
}
