//! Persistence boundary for the registry.
//!
//! `RecordStore` is a per-entity interface: joins across entities (person +
//! profile + enrollment + family) are composed by the services. Absence is
//! reported as `Ok(None)`; only writes against a missing owner fail with
//! `NotFound`. Uniqueness is enforced by the storage layer itself, so the
//! `Duplicate*` errors are authoritative even under concurrent writers.

mod diesel_store;
pub mod seed;

use chrono::NaiveDateTime;

use crate::error::RegistryResult;
use crate::models::{
    BenefitsEnrollment, ConsultationRow, FamilyMember, HealthProfile, Hospital, MedicalImage,
    NewConsultation, NewFamilyMember, NewHospital, Person,
};

pub use diesel_store::DieselStore;

/// Case-insensitive substring filter over empaneled hospitals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HospitalFilter {
    pub city_contains: Option<String>,
    pub specialty_contains: Option<String>,
    pub limit: i64,
}

pub trait RecordStore: Send + Sync {
    /// Fails with `DuplicateEmail` or `DuplicateIdentifier` on conflict.
    fn create_person(&self, person: &Person) -> RegistryResult<Person>;
    fn get_person(&self, health_id: &str) -> RegistryResult<Option<Person>>;
    fn get_person_by_email(&self, email: &str) -> RegistryResult<Option<Person>>;
    /// True when a person or a family member already carries `health_id`.
    fn health_identifier_in_use(&self, health_id: &str) -> RegistryResult<bool>;
    fn set_fingerprint_status(&self, health_id: &str, scanned: bool) -> RegistryResult<()>;

    fn upsert_health_profile(&self, profile: &HealthProfile) -> RegistryResult<HealthProfile>;
    fn get_health_profile(&self, health_id: &str) -> RegistryResult<Option<HealthProfile>>;

    /// Insert-or-replace keyed by health identifier. The stored row is exactly
    /// `enrollment`; nothing from a previous enrollment is carried over.
    fn upsert_benefits_enrollment(
        &self,
        enrollment: &BenefitsEnrollment,
    ) -> RegistryResult<BenefitsEnrollment>;
    fn get_benefits_enrollment(&self, health_id: &str) -> RegistryResult<Option<BenefitsEnrollment>>;
    fn card_number_in_use(&self, card_number: &str) -> RegistryResult<bool>;

    fn add_family_member(&self, member: &NewFamilyMember) -> RegistryResult<FamilyMember>;
    /// Oldest first.
    fn list_family_members(&self, owner_health_id: &str) -> RegistryResult<Vec<FamilyMember>>;

    /// Inserts hospitals whose code is not yet present. Returns rows inserted.
    fn seed_hospitals(&self, hospitals: &[NewHospital]) -> RegistryResult<usize>;
    /// Ordered by name, capped at `filter.limit`.
    fn list_hospitals(&self, filter: &HospitalFilter) -> RegistryResult<Vec<Hospital>>;

    fn add_medical_image(&self, image: &MedicalImage) -> RegistryResult<MedicalImage>;
    /// Newest first.
    fn list_medical_images(&self, health_id: &str) -> RegistryResult<Vec<MedicalImage>>;
    /// Idempotent. Returns whether a row was removed.
    fn delete_medical_image(&self, image_id: &str) -> RegistryResult<bool>;

    fn add_consultation(&self, consultation: &NewConsultation) -> RegistryResult<ConsultationRow>;
    /// Newest first.
    fn list_consultations(&self, health_id: &str) -> RegistryResult<Vec<ConsultationRow>>;
    /// Moves a pending consultation to responded. `NotFound` for an unknown id,
    /// `InvalidState` when it was already answered.
    fn record_consultation_response(
        &self,
        id: i32,
        response: &str,
        responded_at: NaiveDateTime,
    ) -> RegistryResult<ConsultationRow>;
}
