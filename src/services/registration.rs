//! Two-step registration: issue an identifier, then confirm it.
//!
//! Issuing persists nothing, so an abandoned identifier leaves no orphan row.
//! Confirmation writes the person first; the health profile is secondary data
//! and a failure writing it is logged without failing the registration.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::benefits::BenefitsSummary;
use super::directory::{FamilyMemberView, redact_national_id};
use super::{RequiredFields, optional_text};
use crate::error::{RegistryError, RegistryResult};
use crate::ids::{self, IdentifierSource};
use crate::models::{HealthProfile, Person};
use crate::store::RecordStore;

const BLOOD_GROUPS: [&str; 8] = ["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

/// Identity fields as submitted by a client. Everything is optional here so
/// that validation can report all missing fields at once.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonCandidate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "dateOfBirth")]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "bloodGroup")]
    pub blood_group: Option<String>,
    #[serde(default, alias = "aadhar_number", alias = "nationalId", alias = "aadharNumber")]
    pub national_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileFields {
    #[serde(default, alias = "chronic_diseases", alias = "chronicConditions", alias = "chronicDiseases")]
    pub chronic_conditions: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default, alias = "emergencyContact")]
    pub emergency_contact: Option<String>,
    #[serde(default, alias = "currentMedication")]
    pub current_medication: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationRequest {
    #[serde(default, alias = "healthId")]
    pub health_id: Option<String>,
    #[serde(flatten)]
    pub person: PersonCandidate,
    #[serde(flatten)]
    pub profile: ProfileFields,
}

/// Validated identity fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDetails {
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub city: String,
    pub email: String,
    pub blood_group: String,
    pub national_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedIdentifier {
    pub health_id: String,
    pub person: PersonDetails,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub person: Person,
    pub profile_saved: bool,
}

/// Person joined with their health profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonView {
    pub health_id: String,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub city: String,
    pub email: String,
    pub blood_group: String,
    pub national_id: String,
    pub fingerprint_scanned: bool,
    pub chronic_conditions: Option<String>,
    pub allergies: Option<String>,
    pub emergency_contact: Option<String>,
    pub current_medication: Option<String>,
    pub created_at: NaiveDateTime,
}

impl PersonView {
    fn join(person: Person, profile: Option<HealthProfile>) -> Self {
        let (chronic_conditions, allergies, emergency_contact, current_medication) = match profile {
            Some(p) => (
                Some(p.chronic_conditions),
                Some(p.allergies),
                Some(p.emergency_contact),
                Some(p.current_medication),
            ),
            None => (None, None, None, None),
        };
        Self {
            health_id: person.health_id,
            name: person.name,
            date_of_birth: person.date_of_birth,
            city: person.city,
            email: person.email,
            blood_group: person.blood_group,
            national_id: person.national_id,
            fingerprint_scanned: person.fingerprint_scanned,
            chronic_conditions,
            allergies,
            emergency_contact,
            current_medication,
            created_at: person.created_at,
        }
    }
}

/// Everything known about a person, with national IDs redacted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    #[serde(flatten)]
    pub person: PersonView,
    pub benefits: Option<BenefitsSummary>,
    pub family_members: Vec<FamilyMemberView>,
}

#[derive(Clone)]
pub struct RegistrationService {
    store: Arc<dyn RecordStore>,
    ids: Arc<dyn IdentifierSource>,
    id_attempts: u32,
}

impl RegistrationService {
    pub fn new(store: Arc<dyn RecordStore>, ids: Arc<dyn IdentifierSource>, id_attempts: u32) -> Self {
        Self { store, ids, id_attempts }
    }

    /// Validates the candidate and reserves nothing: the identifier is only
    /// checked against the store and handed back with the validated fields.
    pub fn issue_identifier(&self, candidate: &PersonCandidate) -> RegistryResult<IssuedIdentifier> {
        let person = validate_person(candidate)?;
        if self.store.get_person_by_email(&person.email)?.is_some() {
            return Err(RegistryError::DuplicateEmail(person.email));
        }

        let health_id = ids::issue_unique(
            "health identifier",
            self.id_attempts,
            || self.ids.person_id(),
            |candidate| self.store.health_identifier_in_use(candidate),
        )?;
        info!(health_id = %health_id, "health identifier issued");
        Ok(IssuedIdentifier { health_id, person })
    }

    pub fn complete_registration(&self, request: &RegistrationRequest) -> RegistryResult<Registration> {
        let mut required = RequiredFields::default();
        let health_id = required.text("health_id", request.health_id.as_deref());
        let person = validate_person_with(&request.person, required)?;
        if !ids::is_health_id(&health_id) {
            return Err(RegistryError::validation(format!(
                "'{health_id}' is not a valid health identifier"
            )));
        }
        // Identifiers already issued to family members are taken too.
        if self.store.health_identifier_in_use(&health_id)? {
            return Err(RegistryError::DuplicateIdentifier(health_id));
        }

        let now = Utc::now().naive_utc();
        let person = self.store.create_person(&Person {
            health_id: health_id.clone(),
            name: person.name,
            date_of_birth: person.date_of_birth,
            city: person.city,
            email: person.email,
            blood_group: person.blood_group,
            national_id: person.national_id,
            fingerprint_scanned: false,
            created_at: now,
        })?;

        let profile = &request.profile;
        let profile_saved = match self.store.upsert_health_profile(&HealthProfile {
            health_id: health_id.clone(),
            chronic_conditions: optional_text(profile.chronic_conditions.as_deref()).unwrap_or_default(),
            allergies: optional_text(profile.allergies.as_deref()).unwrap_or_default(),
            emergency_contact: optional_text(profile.emergency_contact.as_deref()).unwrap_or_default(),
            current_medication: optional_text(profile.current_medication.as_deref()).unwrap_or_default(),
            updated_at: now,
        }) {
            Ok(_) => true,
            Err(err) => {
                warn!(health_id = %health_id, error = %err, "health profile not saved; registration kept");
                false
            }
        };

        info!(health_id = %health_id, profile_saved, "registration completed");
        Ok(Registration { person, profile_saved })
    }

    pub fn mark_fingerprint_scanned(&self, health_id: Option<&str>) -> RegistryResult<()> {
        let health_id = require_health_id(health_id)?;
        self.store.set_fingerprint_status(&health_id, true)?;
        info!(health_id = %health_id, "fingerprint scan recorded");
        Ok(())
    }

    pub fn login(&self, health_id: Option<&str>) -> RegistryResult<PersonView> {
        let health_id = require_health_id(health_id)?;
        let person = self
            .store
            .get_person(&health_id)?
            .ok_or_else(|| RegistryError::not_found("health identifier", health_id.as_str()))?;
        let profile = self.store.get_health_profile(&health_id)?;
        Ok(PersonView::join(person, profile))
    }

    /// Login view extended with benefits and family, national IDs redacted.
    pub fn dashboard(&self, health_id: Option<&str>) -> RegistryResult<DashboardView> {
        let mut person = self.login(health_id)?;
        person.national_id = redact_national_id(&person.national_id);

        let benefits = self
            .store
            .get_benefits_enrollment(&person.health_id)?
            .filter(|e| e.enrolled)
            .map(|e| BenefitsSummary::from(&e));
        let family_members = self
            .store
            .list_family_members(&person.health_id)?
            .into_iter()
            .map(FamilyMemberView::from)
            .collect();

        Ok(DashboardView {
            person,
            benefits,
            family_members,
        })
    }
}

fn require_health_id(health_id: Option<&str>) -> RegistryResult<String> {
    let mut required = RequiredFields::default();
    let health_id = required.text("healthId", health_id);
    required.finish()?;
    Ok(health_id)
}

pub fn validate_person(candidate: &PersonCandidate) -> RegistryResult<PersonDetails> {
    validate_person_with(candidate, RequiredFields::default())
}

fn validate_person_with(
    candidate: &PersonCandidate,
    mut required: RequiredFields,
) -> RegistryResult<PersonDetails> {
    let name = required.text("name", candidate.name.as_deref());
    let date_of_birth = required.text("date_of_birth", candidate.date_of_birth.as_deref());
    let city = required.text("city", candidate.city.as_deref());
    let email = required.text("email", candidate.email.as_deref());
    let blood_group = required.text("blood_group", candidate.blood_group.as_deref());
    let national_id = required.text("national_id", candidate.national_id.as_deref());
    required.finish()?;

    let date_of_birth = NaiveDate::parse_from_str(&date_of_birth, "%Y-%m-%d").map_err(|_| {
        RegistryError::validation(format!("date of birth '{date_of_birth}' must be YYYY-MM-DD"))
    })?;
    if date_of_birth > Utc::now().date_naive() {
        return Err(RegistryError::validation("date of birth cannot be in the future"));
    }

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {}
        _ => return Err(RegistryError::validation(format!("'{email}' is not a valid email address"))),
    }

    let blood_group = blood_group.to_ascii_uppercase();
    if !BLOOD_GROUPS.contains(&blood_group.as_str()) {
        return Err(RegistryError::validation(format!(
            "blood group must be one of {}",
            BLOOD_GROUPS.join(", ")
        )));
    }

    Ok(PersonDetails {
        name,
        date_of_birth,
        city,
        email,
        blood_group,
        national_id,
    })
}
