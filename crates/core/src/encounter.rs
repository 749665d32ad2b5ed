//! Encounter lifecycle.
//!
//! One encounter is one clinical episode for a patient at one facility,
//! governed by an explicit finite-state machine:
//!
//! ```text
//! Pending -> Assigned -> InTreatment -> Completed
//! ```
//!
//! `Completed` is terminal. Every transition is driven through the single
//! table in [`EncounterStatus::apply`]; operations never check ad hoc status
//! conditions of their own. Transitions are conditioned atomically on the
//! stored status (check-and-set under the collection's write guard), so two
//! concurrent actors cannot double-advance the same encounter.
//!
//! Mutations of clinical content are lifecycle-gated; *reads* of an encounter
//! are not -- they are gated only by [`crate::access`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use medinet_types::{EncounterId, FacilityId, LabRequestId, NationalId, StaffId};
use serde::{Deserialize, Serialize};

use crate::central::DoctorNotes;
use crate::store::MemoryStore;
use crate::{RecordError, RecordResult};

/// Lifecycle state of an encounter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncounterStatus {
    /// Created at intake, no doctor bound yet.
    Pending,
    /// A doctor has been bound.
    Assigned,
    /// The assigned doctor is actively working the episode.
    InTreatment,
    /// Terminal. No transition leads out of this state.
    Completed,
}

/// The actions that drive lifecycle transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncounterAction {
    Assign,
    StartTreatment,
    Complete,
}

impl EncounterStatus {
    /// The transition table: from-state x action -> to-state, or `None` for
    /// every pair not listed. This is the only place transitions are defined.
    pub fn apply(self, action: EncounterAction) -> Option<EncounterStatus> {
        use EncounterAction::*;
        use EncounterStatus::*;

        match (self, action) {
            (Pending, Assign) => Some(Assigned),
            (Assigned, StartTreatment) => Some(InTreatment),
            (InTreatment, Complete) => Some(Completed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EncounterStatus::Completed)
    }

    /// Under active clinical care. Drives the "my patients" scope and the
    /// current-visit projection.
    pub fn is_in_care(self) -> bool {
        matches!(self, EncounterStatus::Assigned | EncounterStatus::InTreatment)
    }
}

/// Clinical urgency, as recorded at triage and on lab requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    #[default]
    Normal,
    Urgent,
    Critical,
}

/// Triage sub-record attached to an encounter.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageRecord {
    /// Measured vitals, e.g. `"bp" -> "120/80"`.
    pub vitals: BTreeMap<String, String>,
    pub chief_complaint: String,
    pub urgency: Urgency,
    /// The staff member who performed triage.
    pub staff: StaffId,
    pub completed_at: DateTime<Utc>,
}

/// One clinical episode at one facility.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    pub id: EncounterId,
    pub patient: NationalId,
    pub facility: FacilityId,
    pub assigned_doctor: Option<StaffId>,
    pub status: EncounterStatus,
    pub triage: Option<TriageRecord>,
    pub doctor_notes: DoctorNotes,
    /// Set semantics: a lab request id appears at most once.
    pub lab_requests: Vec<LabRequestId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Encounter {
    /// A fresh `Pending` encounter.
    pub fn open(patient: NationalId, facility: FacilityId) -> Self {
        let now = Utc::now();
        Self {
            id: EncounterId::new(),
            patient,
            facility,
            assigned_doctor: None,
            status: EncounterStatus::Pending,
            triage: None,
            doctor_notes: DoctorNotes::default(),
            lab_requests: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Triage findings submitted by intake staff.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriageInput {
    pub vitals: BTreeMap<String, String>,
    pub chief_complaint: String,
    pub urgency: Urgency,
}

/// Notes submitted when completing treatment.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompletionNotes {
    pub diagnosis: Option<String>,
    pub treatment_plan: Option<String>,
    /// Late vital-sign corrections, merged into the triage record.
    pub vitals: Option<BTreeMap<String, String>>,
}

/// Owns encounter creation and every lifecycle transition.
#[derive(Clone)]
pub struct EncounterService {
    store: MemoryStore,
}

impl EncounterService {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    /// Opens a `Pending` encounter for a patient at a facility.
    ///
    /// At most one non-terminal encounter may exist per (patient, facility)
    /// pair; opening a second one is rejected.
    pub async fn open_encounter(
        &self,
        patient: &NationalId,
        facility: &FacilityId,
    ) -> RecordResult<Encounter> {
        let mut encounters = self.store.encounters_mut().await;

        let already_active = encounters.values().any(|e| {
            e.patient == *patient && e.facility == *facility && !e.status.is_terminal()
        });
        if already_active {
            return Err(RecordError::InvalidTransition);
        }

        let encounter = Encounter::open(patient.clone(), *facility);
        tracing::info!(encounter = %encounter.id, patient = %patient, "opened encounter");
        encounters.insert(encounter.id, encounter.clone());
        Ok(encounter)
    }

    /// Attaches triage findings. Allowed in any non-terminal state.
    pub async fn record_triage(
        &self,
        encounter_id: &EncounterId,
        staff: &StaffId,
        input: TriageInput,
    ) -> RecordResult<Encounter> {
        if input.chief_complaint.trim().is_empty() {
            return Err(RecordError::validation(vec!["chiefComplaint"]));
        }

        let mut encounters = self.store.encounters_mut().await;
        let encounter = encounters
            .get_mut(encounter_id)
            .ok_or(RecordError::InvalidTransition)?;
        if encounter.status.is_terminal() {
            return Err(RecordError::InvalidTransition);
        }

        encounter.triage = Some(TriageRecord {
            vitals: input.vitals,
            chief_complaint: input.chief_complaint.trim().to_owned(),
            urgency: input.urgency,
            staff: *staff,
            completed_at: Utc::now(),
        });
        encounter.updated_at = Utc::now();
        Ok(encounter.clone())
    }

    /// Binds a doctor: `Pending -> Assigned`.
    ///
    /// Performed by scheduling/triage logic; recorded here because it is the
    /// precondition for treatment.
    pub async fn assign_doctor(
        &self,
        encounter_id: &EncounterId,
        doctor: &StaffId,
    ) -> RecordResult<Encounter> {
        let mut encounters = self.store.encounters_mut().await;
        let encounter = encounters
            .get_mut(encounter_id)
            .ok_or(RecordError::InvalidTransition)?;

        let next = encounter
            .status
            .apply(EncounterAction::Assign)
            .ok_or(RecordError::InvalidTransition)?;

        encounter.assigned_doctor = Some(*doctor);
        encounter.status = next;
        encounter.updated_at = Utc::now();
        Ok(encounter.clone())
    }

    /// `Assigned -> InTreatment`, by the assigned doctor only.
    ///
    /// The owner and status checks happen under the write guard, against the
    /// stored record at the moment of update. Absent record, wrong owner and
    /// wrong status all produce the same
    /// [`RecordError::InvalidTransition`].
    pub async fn start_treatment(
        &self,
        doctor: &StaffId,
        encounter_id: &EncounterId,
    ) -> RecordResult<Encounter> {
        let mut encounters = self.store.encounters_mut().await;
        let encounter = encounters
            .get_mut(encounter_id)
            .ok_or(RecordError::InvalidTransition)?;

        let next = match (
            encounter.assigned_doctor,
            encounter.status.apply(EncounterAction::StartTreatment),
        ) {
            (Some(owner), Some(next)) if owner == *doctor => next,
            _ => return Err(RecordError::InvalidTransition),
        };

        encounter.status = next;
        encounter.updated_at = Utc::now();
        Ok(encounter.clone())
    }

    /// `InTreatment -> Completed`, by the assigned doctor only.
    ///
    /// Requires diagnosis and treatment plan; stamps the clinical notes
    /// (preserving prescription references attached during treatment),
    /// merges any late vitals into the triage record, and freezes the
    /// encounter. Clinical fields cannot be written afterwards because no
    /// transition leads out of `Completed`.
    pub async fn complete_treatment(
        &self,
        doctor: &StaffId,
        encounter_id: &EncounterId,
        notes: CompletionNotes,
    ) -> RecordResult<Encounter> {
        let mut missing = Vec::new();
        let diagnosis = notes.diagnosis.as_deref().map(str::trim).filter(|d| !d.is_empty());
        if diagnosis.is_none() {
            missing.push("diagnosis");
        }
        let treatment_plan = notes
            .treatment_plan
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        if treatment_plan.is_none() {
            missing.push("treatmentPlan");
        }
        if !missing.is_empty() {
            return Err(RecordError::validation(missing));
        }

        let mut encounters = self.store.encounters_mut().await;
        let encounter = encounters
            .get_mut(encounter_id)
            .ok_or(RecordError::InvalidTransition)?;

        let next = match (
            encounter.assigned_doctor,
            encounter.status.apply(EncounterAction::Complete),
        ) {
            (Some(owner), Some(next)) if owner == *doctor => next,
            _ => return Err(RecordError::InvalidTransition),
        };

        encounter.doctor_notes.diagnosis = diagnosis.map(str::to_owned);
        encounter.doctor_notes.treatment_plan = treatment_plan.map(str::to_owned);
        if let (Some(vitals), Some(triage)) = (notes.vitals, encounter.triage.as_mut()) {
            triage.vitals.extend(vitals);
        }
        encounter.status = next;
        encounter.updated_at = Utc::now();
        tracing::info!(encounter = %encounter.id, "encounter completed");
        Ok(encounter.clone())
    }
}
