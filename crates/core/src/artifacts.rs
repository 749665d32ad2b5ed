//! Lab requests and prescriptions.
//!
//! Both artifact kinds are created only against an encounter that exists, is
//! owned by the requesting doctor, and is exactly `InTreatment`. Those three
//! checks collapse into one uniform denial so a caller cannot probe which of
//! them failed. On success the artifact is persisted and its reference is
//! appended to the encounter with set semantics.

use chrono::{DateTime, Utc};
use medinet_types::{EncounterId, LabRequestId, NationalId, PrescriptionId, StaffId};
use serde::{Deserialize, Serialize};

use crate::encounter::{Encounter, EncounterStatus, Urgency};
use crate::store::MemoryStore;
use crate::{RecordError, RecordResult};

/// Fulfilment state of a lab request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabStatus {
    Pending,
    Completed,
}

/// One ordered lab test.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabRequest {
    pub id: LabRequestId,
    pub patient: NationalId,
    /// The ordering doctor.
    pub doctor: StaffId,
    pub test_type: String,
    pub urgency: Urgency,
    pub status: LabStatus,
    pub instructions: Option<String>,
    pub requested_at: DateTime<Utc>,
}

/// One medicine line item. A line is usable only when all four fields are
/// present; see [`MedicineLine::is_complete`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MedicineLine {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
}

impl MedicineLine {
    /// Name, dosage, frequency and duration are all mandatory.
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.dosage, &self.frequency, &self.duration]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

/// One issued prescription.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: PrescriptionId,
    pub patient: NationalId,
    /// The prescribing doctor.
    pub doctor: StaffId,
    pub medicines: Vec<MedicineLine>,
    pub instructions: Option<String>,
    pub is_filled: bool,
    pub prescribed_at: DateTime<Utc>,
}

/// Boundary input for ordering a lab test.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabRequestInput {
    pub test_type: String,
    pub instructions: Option<String>,
    pub urgency: Option<Urgency>,
}

/// Boundary input for issuing a prescription.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrescriptionInput {
    pub medicines: Vec<MedicineLine>,
    pub instructions: Option<String>,
}

/// Creates clinical artifacts and links them to their encounter.
#[derive(Clone)]
pub struct ArtifactService {
    store: MemoryStore,
}

/// The creation gate shared by both artifact kinds: the encounter must exist,
/// belong to the doctor, and be exactly `InTreatment`. Everything else is the
/// one uniform denial.
fn gate_in_treatment<'a>(
    encounter: Option<&'a mut Encounter>,
    doctor: &StaffId,
) -> RecordResult<&'a mut Encounter> {
    match encounter {
        Some(encounter)
            if encounter.assigned_doctor == Some(*doctor)
                && encounter.status == EncounterStatus::InTreatment =>
        {
            Ok(encounter)
        }
        _ => Err(RecordError::Forbidden),
    }
}

impl ArtifactService {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    /// Orders a lab test against an in-treatment encounter.
    pub async fn create_lab_request(
        &self,
        doctor: &StaffId,
        encounter_id: &EncounterId,
        input: LabRequestInput,
    ) -> RecordResult<LabRequest> {
        if input.test_type.trim().is_empty() {
            return Err(RecordError::validation(vec!["testType"]));
        }

        let mut encounters = self.store.encounters_mut().await;
        let encounter = gate_in_treatment(encounters.get_mut(encounter_id), doctor)?;

        let request = LabRequest {
            id: LabRequestId::new(),
            patient: encounter.patient.clone(),
            doctor: *doctor,
            test_type: input.test_type.trim().to_owned(),
            urgency: input.urgency.unwrap_or_default(),
            status: LabStatus::Pending,
            instructions: input.instructions,
            requested_at: Utc::now(),
        };

        if !encounter.lab_requests.contains(&request.id) {
            encounter.lab_requests.push(request.id);
        }
        encounter.updated_at = Utc::now();

        self.store
            .lab_requests_mut()
            .await
            .insert(request.id, request.clone());
        Ok(request)
    }

    /// Issues a prescription against an in-treatment encounter.
    ///
    /// Line items are individually validated; incomplete lines are dropped
    /// and only logged, and the submission is accepted as long as at least
    /// one line survives. A batch with no complete line is rejected.
    pub async fn create_prescription(
        &self,
        doctor: &StaffId,
        encounter_id: &EncounterId,
        input: PrescriptionInput,
    ) -> RecordResult<Prescription> {
        if input.medicines.is_empty() {
            return Err(RecordError::validation(vec!["medicines"]));
        }

        let mut encounters = self.store.encounters_mut().await;
        let encounter = gate_in_treatment(encounters.get_mut(encounter_id), doctor)?;

        let submitted = input.medicines.len();
        let medicines: Vec<MedicineLine> = input
            .medicines
            .into_iter()
            .filter(MedicineLine::is_complete)
            .collect();
        if medicines.is_empty() {
            return Err(RecordError::validation(vec!["medicines"]));
        }
        if medicines.len() < submitted {
            tracing::warn!(
                encounter = %encounter_id,
                dropped = submitted - medicines.len(),
                "dropped incomplete medicine lines from prescription"
            );
        }

        let prescription = Prescription {
            id: PrescriptionId::new(),
            patient: encounter.patient.clone(),
            doctor: *doctor,
            medicines,
            instructions: input.instructions,
            is_filled: false,
            prescribed_at: Utc::now(),
        };

        if !encounter.doctor_notes.prescriptions.contains(&prescription.id) {
            encounter.doctor_notes.prescriptions.push(prescription.id);
        }
        encounter.updated_at = Utc::now();

        self.store
            .prescriptions_mut()
            .await
            .insert(prescription.id, prescription.clone());
        Ok(prescription)
    }

    /// All lab requests for the patient of an encounter the doctor owns,
    /// most-recent-first. Ownership is required; status is not.
    pub async fn lab_requests_for(
        &self,
        doctor: &StaffId,
        encounter_id: &EncounterId,
    ) -> RecordResult<Vec<LabRequest>> {
        let patient = self.owned_encounter_patient(doctor, encounter_id).await?;

        let lab_requests = self.store.lab_requests().await;
        let mut requests: Vec<LabRequest> = lab_requests
            .values()
            .filter(|r| r.patient == patient)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(requests)
    }

    /// All prescriptions for the patient of an encounter the doctor owns,
    /// most-recent-first.
    pub async fn prescriptions_for(
        &self,
        doctor: &StaffId,
        encounter_id: &EncounterId,
    ) -> RecordResult<Vec<Prescription>> {
        let patient = self.owned_encounter_patient(doctor, encounter_id).await?;

        let prescriptions = self.store.prescriptions().await;
        let mut issued: Vec<Prescription> = prescriptions
            .values()
            .filter(|p| p.patient == patient)
            .cloned()
            .collect();
        issued.sort_by(|a, b| b.prescribed_at.cmp(&a.prescribed_at));
        Ok(issued)
    }

    async fn owned_encounter_patient(
        &self,
        doctor: &StaffId,
        encounter_id: &EncounterId,
    ) -> RecordResult<NationalId> {
        let encounters = self.store.encounters().await;
        match encounters.get(encounter_id) {
            Some(encounter) if encounter.assigned_doctor == Some(*doctor) => {
                Ok(encounter.patient.clone())
            }
            _ => Err(RecordError::Forbidden),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encounter::EncounterService;
    use medinet_types::FacilityId;

    fn line(name: &str, dosage: &str, frequency: &str, duration: &str) -> MedicineLine {
        MedicineLine {
            name: name.into(),
            dosage: dosage.into(),
            frequency: frequency.into(),
            duration: duration.into(),
        }
    }

    async fn in_treatment(store: &MemoryStore, doctor: &StaffId) -> Encounter {
        let encounters = EncounterService::new(store.clone());
        let encounter = encounters
            .open_encounter(&NationalId::new("ET-020").unwrap(), &FacilityId::new())
            .await
            .unwrap();
        encounters.assign_doctor(&encounter.id, doctor).await.unwrap();
        encounters.start_treatment(doctor, &encounter.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_lab_request_links_to_encounter() {
        let store = MemoryStore::new();
        let doctor = StaffId::new();
        let encounter = in_treatment(&store, &doctor).await;
        let service = ArtifactService::new(store.clone());

        let request = service
            .create_lab_request(
                &doctor,
                &encounter.id,
                LabRequestInput {
                    test_type: "CBC".into(),
                    instructions: Some("Fasting".into()),
                    urgency: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(request.status, LabStatus::Pending);
        assert_eq!(request.urgency, Urgency::Normal);
        let stored = store.encounters().await.get(&encounter.id).unwrap().clone();
        assert_eq!(stored.lab_requests, vec![request.id]);
    }

    #[tokio::test]
    async fn test_lab_request_denied_outside_treatment_or_for_strangers() {
        let store = MemoryStore::new();
        let doctor = StaffId::new();
        let encounters = EncounterService::new(store.clone());
        let encounter = encounters
            .open_encounter(&NationalId::new("ET-021").unwrap(), &FacilityId::new())
            .await
            .unwrap();
        encounters.assign_doctor(&encounter.id, &doctor).await.unwrap();
        let service = ArtifactService::new(store.clone());

        let input = || LabRequestInput {
            test_type: "CBC".into(),
            ..LabRequestInput::default()
        };

        // Assigned but not yet in treatment.
        let wrong_state = service
            .create_lab_request(&doctor, &encounter.id, input())
            .await
            .unwrap_err();
        // Unknown encounter.
        let missing = service
            .create_lab_request(&doctor, &EncounterId::new(), input())
            .await
            .unwrap_err();

        encounters.start_treatment(&doctor, &encounter.id).await.unwrap();
        // Wrong owner.
        let stranger = service
            .create_lab_request(&StaffId::new(), &encounter.id, input())
            .await
            .unwrap_err();

        for err in [wrong_state, missing, stranger] {
            assert!(matches!(err, RecordError::Forbidden));
        }
    }

    #[tokio::test]
    async fn test_lab_request_requires_test_type() {
        let store = MemoryStore::new();
        let doctor = StaffId::new();
        let encounter = in_treatment(&store, &doctor).await;
        let service = ArtifactService::new(store);

        let err = service
            .create_lab_request(&doctor, &encounter.id, LabRequestInput::default())
            .await
            .unwrap_err();
        match err {
            RecordError::Validation { fields } => assert_eq!(fields, vec!["testType"]),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_prescription_keeps_only_complete_lines() {
        let store = MemoryStore::new();
        let doctor = StaffId::new();
        let encounter = in_treatment(&store, &doctor).await;
        let service = ArtifactService::new(store.clone());

        let prescription = service
            .create_prescription(
                &doctor,
                &encounter.id,
                PrescriptionInput {
                    medicines: vec![
                        line("Amoxicillin", "500mg", "3x daily", "7 days"),
                        line("Paracetamol", "", "2x daily", "3 days"),
                    ],
                    instructions: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(prescription.medicines.len(), 1);
        assert_eq!(prescription.medicines[0].name, "Amoxicillin");
        assert!(!prescription.is_filled);

        let stored = store.encounters().await.get(&encounter.id).unwrap().clone();
        assert_eq!(stored.doctor_notes.prescriptions, vec![prescription.id]);
    }

    #[tokio::test]
    async fn test_prescription_with_no_complete_line_is_rejected() {
        let store = MemoryStore::new();
        let doctor = StaffId::new();
        let encounter = in_treatment(&store, &doctor).await;
        let service = ArtifactService::new(store.clone());

        let err = service
            .create_prescription(
                &doctor,
                &encounter.id,
                PrescriptionInput {
                    medicines: vec![line("Amoxicillin", "", "", "7 days")],
                    instructions: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::Validation { .. }));

        // An empty batch is rejected the same way, before the gate.
        let err = service
            .create_prescription(&doctor, &encounter.id, PrescriptionInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::Validation { .. }));

        // Nothing was persisted or linked.
        assert!(store.prescriptions().await.is_empty());
        let stored = store.encounters().await.get(&encounter.id).unwrap().clone();
        assert!(stored.doctor_notes.prescriptions.is_empty());
    }

    #[tokio::test]
    async fn test_listings_are_owner_gated_and_most_recent_first() {
        let store = MemoryStore::new();
        let doctor = StaffId::new();
        let encounter = in_treatment(&store, &doctor).await;
        let service = ArtifactService::new(store.clone());

        for test_type in ["CBC", "LFT"] {
            service
                .create_lab_request(
                    &doctor,
                    &encounter.id,
                    LabRequestInput {
                        test_type: test_type.into(),
                        ..LabRequestInput::default()
                    },
                )
                .await
                .unwrap();
        }

        let requests = service.lab_requests_for(&doctor, &encounter.id).await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].requested_at >= requests[1].requested_at);

        let err = service
            .lab_requests_for(&StaffId::new(), &encounter.id)
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::Forbidden));

        let err = service
            .prescriptions_for(&doctor, &EncounterId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::Forbidden));
    }
}
