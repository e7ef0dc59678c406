//! Teleconsultation requests: submit, read back, answer once.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{RequiredFields, optional_text};
use crate::error::{RegistryError, RegistryResult};
use crate::models::{ConsultationRow, ConsultationStatus, NewConsultation};
use crate::store::RecordStore;

pub const DEFAULT_LANGUAGE: &str = "English";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Emergency,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Emergency => "emergency",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Urgency {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Urgency::Low),
            "medium" => Ok(Urgency::Medium),
            "high" => Ok(Urgency::High),
            "emergency" => Ok(Urgency::Emergency),
            other => Err(RegistryError::validation(format!(
                "urgency must be one of low, medium, high, emergency (got '{other}')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRequest {
    #[serde(default)]
    pub health_id: Option<String>,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default, alias = "consultationSubject")]
    pub subject: Option<String>,
    #[serde(default, alias = "consultationDescription")]
    pub description: Option<String>,
    #[serde(default, alias = "consultationUrgency")]
    pub urgency: Option<String>,
    #[serde(default)]
    pub preferred_language: Option<String>,
    /// `null` and absent both mean no attachments.
    #[serde(default)]
    pub attached_images: Option<Vec<String>>,
    #[serde(default)]
    pub submission_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRequest {
    #[serde(default, deserialize_with = "super::lenient_number")]
    pub consultation_id: Option<i32>,
    #[serde(default, alias = "doctorResponse")]
    pub response: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationView {
    pub id: i32,
    pub health_id: String,
    pub patient_name: String,
    pub subject: String,
    pub description: String,
    pub urgency: String,
    pub preferred_language: String,
    pub attached_images: Vec<String>,
    pub submitted_at: NaiveDateTime,
    pub status: String,
    pub doctor_response: Option<String>,
    pub responded_at: Option<NaiveDateTime>,
}

impl ConsultationView {
    /// Unreadable attachment data reads back as no attachments.
    fn from_row(row: ConsultationRow) -> Self {
        let attached_images = match row.attached_images.as_deref() {
            None | Some("") => Vec::new(),
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|err| {
                warn!(consultation_id = row.id, error = %err, "malformed attachment list; treating as empty");
                Vec::new()
            }),
        };
        Self {
            id: row.id,
            health_id: row.health_id,
            patient_name: row.patient_name,
            subject: row.subject,
            description: row.description,
            urgency: row.urgency,
            preferred_language: row.preferred_language,
            attached_images,
            submitted_at: row.submitted_at,
            status: row.status,
            doctor_response: row.doctor_response,
            responded_at: row.responded_at,
        }
    }
}

#[derive(Clone)]
pub struct ConsultationService {
    store: Arc<dyn RecordStore>,
}

impl ConsultationService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn submit(&self, request: &ConsultationRequest) -> RegistryResult<ConsultationView> {
        let mut required = RequiredFields::default();
        let health_id = required.text("healthId", request.health_id.as_deref());
        let subject = required.text("subject", request.subject.as_deref());
        let description = required.text("description", request.description.as_deref());
        let urgency = required.text("urgency", request.urgency.as_deref());
        required.finish()?;
        let urgency: Urgency = urgency.parse()?;

        let person = self
            .store
            .get_person(&health_id)?
            .ok_or_else(|| RegistryError::not_found("person", health_id.clone()))?;

        let attachments = match request.attached_images.as_deref() {
            None | Some([]) => None,
            Some(images) => {
                let encoded = serde_json::to_string(images).map_err(|e| RegistryError::Internal {
                    reason: format!("encoding attachment list: {e}"),
                })?;
                Some(encoded)
            }
        };

        let row = self.store.add_consultation(&NewConsultation {
            health_id: health_id.clone(),
            patient_name: optional_text(request.patient_name.as_deref()).unwrap_or(person.name),
            subject,
            description,
            urgency: urgency.as_str().to_string(),
            preferred_language: optional_text(request.preferred_language.as_deref())
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            attached_images: attachments,
            submitted_at: request.submission_date.unwrap_or_else(Utc::now).naive_utc(),
            status: ConsultationStatus::Pending.as_str().to_string(),
        })?;

        info!(health_id = %health_id, consultation_id = row.id, urgency = %urgency, "consultation submitted");
        Ok(ConsultationView::from_row(row))
    }

    /// Newest first.
    pub fn list_history(&self, health_id: &str) -> RegistryResult<Vec<ConsultationView>> {
        Ok(self
            .store
            .list_consultations(health_id)?
            .into_iter()
            .map(ConsultationView::from_row)
            .collect())
    }

    pub fn respond(&self, request: &ResponseRequest) -> RegistryResult<ConsultationView> {
        let mut required = RequiredFields::default();
        let id = required.value("consultationId", request.consultation_id);
        let response = required.text("response", request.response.as_deref());
        required.finish()?;

        let row = self.store.record_consultation_response(id, &response, Utc::now().naive_utc())?;
        info!(consultation_id = id, health_id = %row.health_id, "consultation answered");
        Ok(ConsultationView::from_row(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_store, person};

    const OWNER: &str = "HLTH-20250101-10001";

    fn service() -> (Arc<dyn RecordStore>, ConsultationService) {
        let store = memory_store();
        store.create_person(&person(OWNER, "a@x.com")).unwrap();
        (store.clone(), ConsultationService::new(store))
    }

    fn request(subject: &str, minute: u32) -> ConsultationRequest {
        ConsultationRequest {
            health_id: Some(OWNER.into()),
            subject: Some(subject.into()),
            description: Some("persistent cough".into()),
            urgency: Some("High".into()),
            attached_images: Some(vec!["IMG-1".into(), "IMG-2".into()]),
            submission_date: Some(
                DateTime::parse_from_rfc3339(&format!("2025-03-01T10:{minute:02}:00Z"))
                    .unwrap()
                    .with_timezone(&Utc),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn urgency_is_case_insensitive_and_closed() {
        assert_eq!("EMERGENCY".parse::<Urgency>().unwrap(), Urgency::Emergency);
        assert_eq!(" low ".parse::<Urgency>().unwrap(), Urgency::Low);
        assert!(matches!("urgent".parse::<Urgency>(), Err(RegistryError::Validation { .. })));
    }

    #[test]
    fn submission_fills_defaults_and_starts_pending() {
        let (_, svc) = service();
        let view = svc.submit(&request("Cough", 0)).unwrap();
        assert_eq!(view.status, "pending");
        assert_eq!(view.urgency, "high");
        assert_eq!(view.patient_name, "Asha Kumar");
        assert_eq!(view.preferred_language, DEFAULT_LANGUAGE);
        assert_eq!(view.attached_images, ["IMG-1", "IMG-2"]);
    }

    #[test]
    fn history_is_newest_first() {
        let (_, svc) = service();
        svc.submit(&request("first", 1)).unwrap();
        svc.submit(&request("second", 2)).unwrap();
        let subjects: Vec<_> = svc
            .list_history(OWNER)
            .unwrap()
            .into_iter()
            .map(|c| c.subject)
            .collect();
        assert_eq!(subjects, ["second", "first"]);
    }

    #[test]
    fn malformed_attachments_read_as_empty() {
        let (store, svc) = service();
        store
            .add_consultation(&NewConsultation {
                health_id: OWNER.into(),
                patient_name: "Asha Kumar".into(),
                subject: "legacy".into(),
                description: "imported".into(),
                urgency: "low".into(),
                preferred_language: DEFAULT_LANGUAGE.into(),
                attached_images: Some("not json".into()),
                submitted_at: Utc::now().naive_utc(),
                status: ConsultationStatus::Pending.as_str().into(),
            })
            .unwrap();
        let history = svc.list_history(OWNER).unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].attached_images.is_empty());
    }

    #[test]
    fn null_attachments_mean_none() {
        let (_, svc) = service();
        let request: ConsultationRequest = serde_json::from_value(serde_json::json!({
            "healthId": OWNER,
            "subject": "Fever",
            "description": "three days",
            "urgency": "medium",
            "attachedImages": null,
        }))
        .unwrap();
        assert_eq!(request.attached_images, None);

        let view = svc.submit(&request).unwrap();
        assert!(view.attached_images.is_empty());
    }

    #[test]
    fn submission_validates_fields_and_owner() {
        let (_, svc) = service();
        let err = svc.submit(&ConsultationRequest::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required fields: healthId, subject, description, urgency"
        );

        let mut stranger = request("Cough", 0);
        stranger.health_id = Some("HLTH-20250101-99999".into());
        assert!(matches!(svc.submit(&stranger), Err(RegistryError::NotFound { .. })));
    }

    #[test]
    fn a_consultation_is_answered_once() {
        let (_, svc) = service();
        let submitted = svc.submit(&request("Cough", 0)).unwrap();
        let answer = ResponseRequest {
            consultation_id: Some(submitted.id),
            response: Some("Rest and fluids".into()),
        };

        let answered = svc.respond(&answer).unwrap();
        assert_eq!(answered.status, "responded");
        assert_eq!(answered.doctor_response.as_deref(), Some("Rest and fluids"));
        assert!(answered.responded_at.is_some());

        assert!(matches!(svc.respond(&answer), Err(RegistryError::InvalidState { .. })));
        assert!(matches!(
            svc.respond(&ResponseRequest {
                consultation_id: Some(9999),
                response: Some("x".into()),
            }),
            Err(RegistryError::NotFound { .. })
        ));
    }
}
