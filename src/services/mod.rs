//! Stateless services over a shared `RecordStore`.
//!
//! All methods are synchronous and short-lived; the HTTP layer runs them on
//! actix's blocking pool.

pub mod benefits;
pub mod consultation;
pub mod directory;
pub mod media;
pub mod registration;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, de};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::ids::IdentifierSource;
use crate::store::RecordStore;

pub use benefits::BenefitsService;
pub use consultation::ConsultationService;
pub use directory::DirectoryService;
pub use media::MediaService;
pub use registration::RegistrationService;

/// Every service, wired to one store and one identifier source.
#[derive(Clone)]
pub struct Registry {
    pub registration: RegistrationService,
    pub benefits: BenefitsService,
    pub directory: DirectoryService,
    pub consultations: ConsultationService,
    pub media: MediaService,
}

impl Registry {
    pub fn new(
        store: Arc<dyn RecordStore>,
        ids: Arc<dyn IdentifierSource>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            registration: RegistrationService::new(store.clone(), ids.clone(), config.id_attempts),
            benefits: BenefitsService::new(store.clone(), ids.clone(), &config),
            directory: DirectoryService::new(store.clone(), ids, &config),
            consultations: ConsultationService::new(store.clone()),
            media: MediaService::new(store),
        }
    }
}

/// Collects every missing field before failing, so one response lists them all.
#[derive(Debug, Default)]
pub(crate) struct RequiredFields {
    missing: Vec<&'static str>,
}

impl RequiredFields {
    /// Trimmed value of a required text field; records it as missing when blank.
    pub(crate) fn text(&mut self, name: &'static str, value: Option<&str>) -> String {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => v.to_string(),
            None => {
                self.missing.push(name);
                String::new()
            }
        }
    }

    pub(crate) fn value<T: Copy + Default>(&mut self, name: &'static str, value: Option<T>) -> T {
        value.unwrap_or_else(|| {
            self.missing.push(name);
            T::default()
        })
    }

    pub(crate) fn finish(self) -> RegistryResult<()> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::missing_fields(&self.missing))
        }
    }
}

/// Trimmed optional text; blank becomes `None`.
pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText<T> {
    Number(T),
    Text(String),
}

/// Optional number that may arrive as JSON text (`"400000"`); blank text is `None`.
pub(crate) fn lenient_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: fmt::Display,
{
    match Option::<NumberOrText<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse()
                .map(Some)
                .map_err(|e| de::Error::custom(format!("'{text}' is not a number: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_fields_report_every_gap() {
        let mut required = RequiredFields::default();
        assert_eq!(required.text("name", Some("  Asha ")), "Asha");
        required.text("email", Some("   "));
        required.text("city", None);
        let income: f64 = required.value("annualIncome", None);
        assert_eq!(income, 0.0);

        let err = required.finish().unwrap_err();
        assert_eq!(err.to_string(), "missing required fields: email, city, annualIncome");
    }

    #[test]
    fn services_share_one_store() {
        use crate::ids::RandomIdentifiers;
        use crate::services::benefits::{VerificationOutcome, VerificationRequest};
        use crate::test_support::{memory_store, person, registry_with};

        let store = memory_store();
        store.create_person(&person("HLTH-20250101-10001", "a@x.com")).unwrap();
        let registry = registry_with(store, Arc::new(RandomIdentifiers));

        let outcome = registry
            .benefits
            .verify(&VerificationRequest {
                health_id: Some("HLTH-20250101-10001".into()),
                annual_income: Some(10_000.0),
                ..Default::default()
            })
            .unwrap();
        assert!(matches!(outcome, VerificationOutcome::Enrolled(_)));

        let dashboard = registry.registration.dashboard(Some("HLTH-20250101-10001")).unwrap();
        assert_eq!(dashboard.benefits.map(|b| b.coverage_amount), Some(500_000.0));
        assert_eq!(registry.directory.seed_hospitals().unwrap(), 3);
    }

    #[test]
    fn numbers_may_arrive_as_text() {
        use crate::services::benefits::VerificationRequest;
        use crate::services::directory::FamilyMemberRequest;

        let request: VerificationRequest = serde_json::from_value(serde_json::json!({
            "annualIncome": " 400000 ",
            "familySize": "5",
        }))
        .unwrap();
        assert_eq!(request.annual_income, Some(400_000.0));
        assert_eq!(request.family_size, Some(5));

        let request: VerificationRequest =
            serde_json::from_value(serde_json::json!({ "annualIncome": 12.5, "familySize": "" })).unwrap();
        assert_eq!(request.annual_income, Some(12.5));
        assert_eq!(request.family_size, None);

        let member: FamilyMemberRequest = serde_json::from_value(serde_json::json!({ "age": "7" })).unwrap();
        assert_eq!(member.age, Some(7));
        let member: FamilyMemberRequest = serde_json::from_value(serde_json::json!({ "age": null })).unwrap();
        assert_eq!(member.age, None);

        assert!(serde_json::from_value::<VerificationRequest>(serde_json::json!({ "annualIncome": "lots" })).is_err());
        assert!(serde_json::from_value::<FamilyMemberRequest>(serde_json::json!({ "age": "7.5" })).is_err());
    }

    #[test]
    fn blank_optional_text_is_none() {
        assert_eq!(optional_text(Some("  ")), None);
        assert_eq!(optional_text(Some(" x ")), Some("x".to_string()));
    }
}
