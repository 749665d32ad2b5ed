//! Central patient-history aggregation.
//!
//! Many independently-authenticated facilities contribute per-visit entries
//! that merge into one longitudinal record per patient, keyed by the national
//! identifier. Creation happens on the first write from any facility;
//! subsequent writes append. Appends never clobber prior appends; the only
//! scalar that later writes may touch is the blood group, which is
//! last-write-wins with no conflict detection.
//!
//! Reads are deliberately not facility-scoped: any caller holding a valid
//! national id may fetch the full aggregate. That trust boundary is distinct
//! from the per-facility access control in [`crate::access`].

use chrono::{DateTime, NaiveDate, Utc};
use medinet_types::{FacilityId, NationalId, NonEmptyText, PrescriptionId};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;

use crate::artifacts::MedicineLine;
use crate::auth::FacilityContext;
use crate::store::MemoryStore;
use crate::{RecordError, RecordResult};

/// Patient gender as recorded by the national registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// ABO/Rh blood group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BloodGroup {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

/// Clinical notes carried by one visit entry.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DoctorNotes {
    pub diagnosis: Option<String>,
    pub treatment_plan: Option<String>,
    pub prescriptions: Vec<PrescriptionId>,
}

impl DoctorNotes {
    fn is_empty(&self) -> bool {
        self.diagnosis.is_none() && self.treatment_plan.is_none() && self.prescriptions.is_empty()
    }
}

/// One lab result attached to a visit entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabResultEntry {
    pub test_name: String,
    pub result: String,
    #[serde(default = "Utc::now")]
    pub date: DateTime<Utc>,
}

/// One immutable contribution to a patient's central history.
///
/// Owned by the [`PatientIdentity`] it was appended to; never independently
/// deleted, and no facility may mutate another facility's entries.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitEntry {
    /// The facility that submitted this entry, stamped by the write path.
    pub facility: FacilityId,
    pub doctor_notes: DoctorNotes,
    pub lab_results: Vec<LabResultEntry>,
    /// Free-form snapshot of medicines dispensed during the visit.
    pub prescription: Vec<MedicineLine>,
    pub submitted_at: DateTime<Utc>,
}

/// The central aggregate: one per national id.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientIdentity {
    #[serde(rename = "nationalID")]
    pub national_id: NationalId,
    pub first_name: NonEmptyText,
    pub last_name: NonEmptyText,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub blood_group: Option<BloodGroup>,
    /// Append-only; insertion order is chronological.
    pub visits: Vec<VisitEntry>,
}

/// The record payload of a submission.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisitRecordInput {
    pub doctor_notes: Option<DoctorNotes>,
    pub lab_results: Vec<LabResultEntry>,
    pub prescription: Vec<MedicineLine>,
}

/// Boundary input for a central submission.
///
/// Everything is optional at the edge so that validation, not
/// deserialization, reports what is missing.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisitSubmission {
    #[serde(rename = "nationalID")]
    pub national_id: Option<NationalId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub blood_group: Option<BloodGroup>,
    pub record: Option<VisitRecordInput>,
}

/// Whether a submission created the aggregate or appended to it.
#[derive(Clone, Debug)]
pub enum SubmitOutcome {
    Created(PatientIdentity),
    Updated(PatientIdentity),
}

impl SubmitOutcome {
    pub fn patient(&self) -> &PatientIdentity {
        match self {
            Self::Created(patient) | Self::Updated(patient) => patient,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Read-side shape of the full aggregate.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientHistory {
    #[serde(rename = "nationalID")]
    pub national_id: NationalId,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub blood_group: Option<BloodGroup>,
    pub total_visits: usize,
    /// Most-recent-first.
    pub visits: Vec<VisitEntry>,
}

struct ValidSubmission {
    national_id: NationalId,
    first_name: NonEmptyText,
    last_name: NonEmptyText,
    date_of_birth: NaiveDate,
    gender: Gender,
    blood_group: Option<BloodGroup>,
    record: VisitRecordInput,
}

fn validate(submission: VisitSubmission) -> RecordResult<ValidSubmission> {
    let mut missing = Vec::new();

    let national_id = submission.national_id;
    if national_id.is_none() {
        missing.push("nationalID");
    }
    let first_name = submission.first_name.and_then(|n| NonEmptyText::new(n).ok());
    if first_name.is_none() {
        missing.push("firstName");
    }
    let last_name = submission.last_name.and_then(|n| NonEmptyText::new(n).ok());
    if last_name.is_none() {
        missing.push("lastName");
    }
    if submission.date_of_birth.is_none() {
        missing.push("dateOfBirth");
    }
    if submission.gender.is_none() {
        missing.push("gender");
    }
    let record = submission.record;
    let has_notes = record
        .as_ref()
        .and_then(|r| r.doctor_notes.as_ref())
        .is_some_and(|notes| !notes.is_empty());
    if !has_notes {
        missing.push("record.doctorNotes");
    }

    if !missing.is_empty() {
        return Err(RecordError::validation(missing));
    }

    Ok(ValidSubmission {
        national_id: national_id.expect("checked above"),
        first_name: first_name.expect("checked above"),
        last_name: last_name.expect("checked above"),
        date_of_birth: submission.date_of_birth.expect("checked above"),
        gender: submission.gender.expect("checked above"),
        blood_group: submission.blood_group,
        record: record.expect("checked above"),
    })
}

/// Upserts aggregates and serves the cross-facility read model.
#[derive(Clone)]
pub struct CentralHistoryService {
    store: MemoryStore,
}

impl CentralHistoryService {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    /// Admits one facility-stamped visit entry into the aggregate for
    /// `nationalID`, creating the aggregate on first contact.
    ///
    /// The find-or-create runs under a single write-lock hold, so two
    /// concurrent first submissions for the same id cannot both create.
    /// Re-submitting an identical entry appends a duplicate: the operation is
    /// retry-safe only in the sense that it never corrupts, not that it
    /// deduplicates.
    ///
    /// # Errors
    ///
    /// [`RecordError::Validation`] enumerating every missing demographic
    /// field, and `record.doctorNotes` when the payload carries no clinical
    /// notes.
    pub async fn submit_visit(
        &self,
        ctx: &FacilityContext,
        submission: VisitSubmission,
    ) -> RecordResult<SubmitOutcome> {
        let valid = validate(submission)?;

        let entry = VisitEntry {
            facility: ctx.facility,
            doctor_notes: valid.record.doctor_notes.unwrap_or_default(),
            lab_results: valid.record.lab_results,
            prescription: valid.record.prescription,
            submitted_at: Utc::now(),
        };

        let mut patients = self.store.patients_mut().await;
        match patients.entry(valid.national_id.clone()) {
            Entry::Occupied(mut occupied) => {
                let patient = occupied.get_mut();
                patient.visits.push(entry);
                if let Some(blood_group) = valid.blood_group {
                    patient.blood_group = Some(blood_group);
                }
                Ok(SubmitOutcome::Updated(patient.clone()))
            }
            Entry::Vacant(vacant) => {
                tracing::info!(national_id = %valid.national_id, "created central patient aggregate");
                let patient = PatientIdentity {
                    national_id: valid.national_id,
                    first_name: valid.first_name,
                    last_name: valid.last_name,
                    date_of_birth: valid.date_of_birth,
                    gender: valid.gender,
                    blood_group: valid.blood_group,
                    visits: vec![entry],
                };
                Ok(SubmitOutcome::Created(vacant.insert(patient).clone()))
            }
        }
    }

    /// Returns the aggregate for `national_id`, visits most-recent-first.
    ///
    /// # Errors
    ///
    /// [`RecordError::NotFound`] when no aggregate exists. Existence of a
    /// national id is not treated as sensitive on this path.
    pub async fn fetch_history(&self, national_id: &NationalId) -> RecordResult<PatientHistory> {
        let patients = self.store.patients().await;
        let patient = patients.get(national_id).ok_or(RecordError::NotFound)?;

        Ok(PatientHistory {
            national_id: patient.national_id.clone(),
            full_name: format!("{} {}", patient.first_name, patient.last_name),
            date_of_birth: patient.date_of_birth,
            gender: patient.gender,
            blood_group: patient.blood_group,
            total_visits: patient.visits.len(),
            visits: patient.visits.iter().rev().cloned().collect(),
        })
    }
}
