//! Read-side composition of a patient's clinical view.
//!
//! Pure functions only: nothing here performs authorization or touches
//! storage. Callers are expected to have passed [`crate::access`] already and
//! to hand in prefetched data. The composed shape mirrors what clinicians see:
//! demographics with a derived age, the current visit if one is under way,
//! and the full per-encounter history, most-recent-first.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use medinet_types::{EncounterId, LabRequestId, NationalId, PrescriptionId, StaffId};
use serde::Serialize;

use crate::artifacts::{LabRequest, Prescription};
use crate::central::{BloodGroup, Gender, PatientIdentity};
use crate::encounter::{Encounter, EncounterStatus, Urgency};

/// Placeholder rendered for clinical fields that were never written.
pub const NOT_DOCUMENTED: &str = "Not documented";

/// Triage as shown in a history entry.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageSummary {
    pub vitals: BTreeMap<String, String>,
    pub chief_complaint: String,
    pub urgency: Urgency,
    pub triaged_by: StaffId,
}

/// One encounter reduced to its clinician-facing summary.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub encounter_id: EncounterId,
    pub status: EncounterStatus,
    pub date: DateTime<Utc>,
    pub doctor: Option<StaffId>,
    pub triage: Option<TriageSummary>,
    pub diagnosis: String,
    pub treatment: String,
    pub prescriptions: Vec<Prescription>,
    pub lab_requests: Vec<LabRequest>,
}

/// The composite profile view.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientProfile {
    #[serde(rename = "nationalID")]
    pub national_id: NationalId,
    pub full_name: String,
    /// Whole years, from date of birth against the supplied reference date.
    pub age: u32,
    pub gender: Gender,
    pub blood_group: Option<BloodGroup>,
    /// The single encounter currently in {Assigned, InTreatment}, if any.
    pub current_visit: Option<HistoryEntry>,
    /// Every encounter, most-recent-first.
    pub history: Vec<HistoryEntry>,
}

/// Whole-year age at `on`, by calendar-date difference.
pub fn age_in_years(date_of_birth: NaiveDate, on: NaiveDate) -> u32 {
    let mut age = on.year() - date_of_birth.year();
    if (on.month(), on.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

fn documented(field: &Option<String>) -> String {
    field
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map_or_else(|| NOT_DOCUMENTED.to_owned(), str::to_owned)
}

fn history_entry(
    encounter: &Encounter,
    lab_index: &HashMap<LabRequestId, LabRequest>,
    prescription_index: &HashMap<PrescriptionId, Prescription>,
) -> HistoryEntry {
    HistoryEntry {
        encounter_id: encounter.id,
        status: encounter.status,
        date: encounter.created_at,
        doctor: encounter.assigned_doctor,
        triage: encounter.triage.as_ref().map(|t| TriageSummary {
            vitals: t.vitals.clone(),
            chief_complaint: t.chief_complaint.clone(),
            urgency: t.urgency,
            triaged_by: t.staff,
        }),
        diagnosis: documented(&encounter.doctor_notes.diagnosis),
        treatment: documented(&encounter.doctor_notes.treatment_plan),
        prescriptions: encounter
            .doctor_notes
            .prescriptions
            .iter()
            .filter_map(|id| prescription_index.get(id).cloned())
            .collect(),
        lab_requests: encounter
            .lab_requests
            .iter()
            .filter_map(|id| lab_index.get(id).cloned())
            .collect(),
    }
}

/// Assembles the composite profile from prefetched collections.
///
/// `encounters` may arrive in any order; they are sorted most-recent-first
/// here. Artifact references that resolve to nothing are skipped.
pub fn project_profile(
    patient: &PatientIdentity,
    mut encounters: Vec<Encounter>,
    lab_index: &HashMap<LabRequestId, LabRequest>,
    prescription_index: &HashMap<PrescriptionId, Prescription>,
    today: NaiveDate,
) -> PatientProfile {
    encounters.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let history: Vec<HistoryEntry> = encounters
        .iter()
        .map(|e| history_entry(e, lab_index, prescription_index))
        .collect();
    let current_visit = encounters
        .iter()
        .position(|e| e.status.is_in_care())
        .map(|i| history[i].clone());

    PatientProfile {
        national_id: patient.national_id.clone(),
        full_name: format!("{} {}", patient.first_name, patient.last_name),
        age: age_in_years(patient.date_of_birth, today),
        gender: patient.gender,
        blood_group: patient.blood_group,
        current_visit,
        history,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medinet_types::{FacilityId, NonEmptyText};

    fn identity(dob: NaiveDate) -> PatientIdentity {
        PatientIdentity {
            national_id: NationalId::new("ET-030").unwrap(),
            first_name: NonEmptyText::new("Abebe").unwrap(),
            last_name: NonEmptyText::new("Kebede").unwrap(),
            date_of_birth: dob,
            gender: Gender::Male,
            blood_group: Some(BloodGroup::OPositive),
            visits: Vec::new(),
        }
    }

    #[test]
    fn test_age_counts_whole_years_only() {
        let dob = NaiveDate::from_ymd_opt(1990, 6, 15).unwrap();
        assert_eq!(age_in_years(dob, NaiveDate::from_ymd_opt(2026, 6, 14).unwrap()), 35);
        assert_eq!(age_in_years(dob, NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()), 36);
        assert_eq!(age_in_years(dob, dob), 0);
        // A reference date before birth never goes negative.
        assert_eq!(age_in_years(dob, NaiveDate::from_ymd_opt(1989, 1, 1).unwrap()), 0);
    }

    #[test]
    fn test_profile_orders_history_and_picks_current_visit() {
        let patient = identity(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap());
        let facility = FacilityId::new();

        let mut first = Encounter::open(patient.national_id.clone(), facility);
        first.status = EncounterStatus::Completed;
        let mut second = Encounter::open(patient.national_id.clone(), facility);
        second.status = EncounterStatus::InTreatment;
        second.created_at = first.created_at + chrono::Duration::hours(1);

        let profile = project_profile(
            &patient,
            vec![first.clone(), second.clone()],
            &HashMap::new(),
            &HashMap::new(),
            NaiveDate::from_ymd_opt(2026, 8, 6).unwrap(),
        );

        assert_eq!(profile.age, 36);
        assert_eq!(profile.full_name, "Abebe Kebede");
        assert_eq!(profile.history.len(), 2);
        assert_eq!(profile.history[0].encounter_id, second.id);
        assert_eq!(
            profile.current_visit.as_ref().map(|v| v.encounter_id),
            Some(second.id)
        );
    }

    #[test]
    fn test_undocumented_fields_render_placeholder() {
        let patient = identity(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap());
        let mut encounter = Encounter::open(patient.national_id.clone(), FacilityId::new());
        encounter.doctor_notes.diagnosis = Some("  ".into());

        let profile = project_profile(
            &patient,
            vec![encounter],
            &HashMap::new(),
            &HashMap::new(),
            NaiveDate::from_ymd_opt(2026, 8, 6).unwrap(),
        );

        let entry = &profile.history[0];
        assert_eq!(entry.diagnosis, NOT_DOCUMENTED);
        assert_eq!(entry.treatment, NOT_DOCUMENTED);
        assert!(profile.current_visit.is_none());
    }
}
