//! Benefits-scheme verification and coverage statements.
//!
//! An eligible verification always replaces the person's enrollment with a
//! fresh card and zero usage. An ineligible one writes nothing, so an earlier
//! enrollment survives untouched.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{RequiredFields, optional_text};
use crate::config::RegistryConfig;
use crate::eligibility::EligibilityPolicy;
use crate::error::{RegistryError, RegistryResult};
use crate::ids::{self, IdentifierSource};
use crate::models::BenefitsEnrollment;
use crate::store::RecordStore;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    #[serde(default)]
    pub health_id: Option<String>,
    #[serde(default, deserialize_with = "super::lenient_number")]
    pub annual_income: Option<f64>,
    #[serde(default, deserialize_with = "super::lenient_number")]
    pub family_size: Option<i32>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub block: Option<String>,
    #[serde(default)]
    pub village: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Enrolled(BenefitsEnrollment),
    Ineligible { reason: String },
}

/// Coverage figures shown alongside a login.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenefitsSummary {
    pub card_number: Option<String>,
    pub coverage_amount: f64,
    pub used_amount: f64,
    pub remaining_amount: f64,
    pub family_size: i32,
    pub state: String,
    pub district: String,
}

impl From<&BenefitsEnrollment> for BenefitsSummary {
    fn from(e: &BenefitsEnrollment) -> Self {
        Self {
            card_number: e.card_number.clone(),
            coverage_amount: e.coverage_amount,
            used_amount: e.used_amount,
            remaining_amount: e.remaining_amount(),
            family_size: e.family_size,
            state: e.state.clone(),
            district: e.district.clone(),
        }
    }
}

/// Enrollment joined with the beneficiary's name and city.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenefitsStatement {
    pub card_number: Option<String>,
    pub beneficiary_name: String,
    pub family_size: i32,
    pub coverage_amount: f64,
    pub used_amount: f64,
    pub remaining_amount: f64,
    pub city: String,
    pub state: String,
    pub district: String,
}

#[derive(Clone)]
pub struct BenefitsService {
    store: Arc<dyn RecordStore>,
    ids: Arc<dyn IdentifierSource>,
    policy: EligibilityPolicy,
    id_attempts: u32,
    default_family_size: i32,
}

impl BenefitsService {
    pub fn new(store: Arc<dyn RecordStore>, ids: Arc<dyn IdentifierSource>, config: &RegistryConfig) -> Self {
        Self {
            store,
            ids,
            policy: config.eligibility,
            id_attempts: config.id_attempts,
            default_family_size: config.default_family_size,
        }
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    pub fn verify(&self, request: &VerificationRequest) -> RegistryResult<VerificationOutcome> {
        let mut required = RequiredFields::default();
        let health_id = required.text("healthId", request.health_id.as_deref());
        let annual_income = required.value("annualIncome", request.annual_income);
        required.finish()?;

        if !annual_income.is_finite() || annual_income < 0.0 {
            return Err(RegistryError::validation("annual income must be a non-negative amount"));
        }
        let family_size = match request.family_size {
            Some(size) if size < 1 => {
                return Err(RegistryError::validation("family size must be at least 1"));
            }
            Some(size) => size,
            None => self.default_family_size,
        };

        let person = self
            .store
            .get_person(&health_id)?
            .ok_or_else(|| RegistryError::not_found("person", health_id.as_str()))?;

        let eligibility = self.policy.evaluate(annual_income);
        if !eligibility.eligible {
            info!(health_id = %health_id, annual_income, "benefits verification: ineligible");
            return Ok(VerificationOutcome::Ineligible {
                reason: eligibility.reason,
            });
        }

        let enrolled_at = Utc::now().naive_utc();
        let enrollment = ids::issue_and_commit(
            "card number",
            self.id_attempts,
            || self.ids.card_number(),
            |card| self.store.card_number_in_use(card),
            |card| {
                self.store.upsert_benefits_enrollment(&BenefitsEnrollment {
                    health_id: health_id.clone(),
                    enrolled: true,
                    card_number: Some(card),
                    household_head: Some(person.name.clone()),
                    family_size,
                    annual_income,
                    coverage_amount: self.policy.default_coverage,
                    used_amount: 0.0,
                    state: optional_text(request.state.as_deref()).unwrap_or_default(),
                    district: optional_text(request.district.as_deref()).unwrap_or_default(),
                    block: optional_text(request.block.as_deref()).unwrap_or_default(),
                    village: optional_text(request.village.as_deref()).unwrap_or_default(),
                    enrolled_at,
                })
            },
        )?;

        info!(
            health_id = %health_id,
            card_number = enrollment.card_number.as_deref().unwrap_or_default(),
            "benefits card issued"
        );
        Ok(VerificationOutcome::Enrolled(enrollment))
    }

    pub fn get_benefits(&self, health_id: &str) -> RegistryResult<BenefitsStatement> {
        let enrollment = self
            .store
            .get_benefits_enrollment(health_id)?
            .ok_or_else(|| RegistryError::not_found("benefits enrollment", health_id))?;
        let person = self
            .store
            .get_person(health_id)?
            .ok_or_else(|| RegistryError::not_found("person", health_id))?;

        Ok(BenefitsStatement {
            card_number: enrollment.card_number.clone(),
            beneficiary_name: person.name,
            family_size: enrollment.family_size,
            coverage_amount: enrollment.coverage_amount,
            used_amount: enrollment.used_amount,
            remaining_amount: enrollment.remaining_amount(),
            city: person.city,
            state: enrollment.state,
            district: enrollment.district,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{RandomIdentifiers, is_card_number};
    use crate::test_support::{ScriptedIdentifiers, memory_store, person};

    const ALICE: &str = "HLTH-20250101-10001";
    const BOB: &str = "HLTH-20250101-10002";

    fn request(health_id: &str, income: f64) -> VerificationRequest {
        VerificationRequest {
            health_id: Some(health_id.into()),
            annual_income: Some(income),
            state: Some("Kerala".into()),
            district: Some("Ernakulam".into()),
            ..Default::default()
        }
    }

    fn service_with(ids: Arc<dyn IdentifierSource>) -> (Arc<dyn RecordStore>, BenefitsService) {
        let store = memory_store();
        store.create_person(&person(ALICE, "a@x.com")).unwrap();
        store.create_person(&person(BOB, "b@x.com")).unwrap();
        let svc = BenefitsService::new(store.clone(), ids, &RegistryConfig::default());
        (store, svc)
    }

    fn enrolled(outcome: VerificationOutcome) -> BenefitsEnrollment {
        match outcome {
            VerificationOutcome::Enrolled(e) => e,
            other => panic!("expected enrollment, got {other:?}"),
        }
    }

    #[test]
    fn eligible_income_issues_a_card() {
        let (_, svc) = service_with(Arc::new(RandomIdentifiers));
        let enrollment = enrolled(svc.verify(&request(ALICE, 400_000.0)).unwrap());
        assert!(enrollment.enrolled);
        assert!(is_card_number(enrollment.card_number.as_deref().unwrap()));
        assert_eq!(enrollment.family_size, 4);
        assert_eq!(enrollment.household_head.as_deref(), Some("Asha Kumar"));

        let statement = svc.get_benefits(ALICE).unwrap();
        assert_eq!(statement.coverage_amount, 500_000.0);
        assert_eq!(statement.used_amount, 0.0);
        assert_eq!(statement.remaining_amount, 500_000.0);
        assert_eq!(statement.beneficiary_name, "Asha Kumar");
        assert_eq!(statement.city, "Kochi");
        assert_eq!(statement.district, "Ernakulam");
    }

    #[test]
    fn ineligible_reverification_leaves_enrollment_untouched() {
        let (_, svc) = service_with(Arc::new(RandomIdentifiers));
        let first = enrolled(svc.verify(&request(ALICE, 400_000.0)).unwrap());

        let second = svc.verify(&request(ALICE, 600_000.0)).unwrap();
        assert!(matches!(second, VerificationOutcome::Ineligible { ref reason } if reason.contains("exceeds")));

        let statement = svc.get_benefits(ALICE).unwrap();
        assert_eq!(statement.card_number, first.card_number);
        assert_eq!(statement.remaining_amount, 500_000.0);
    }

    #[test]
    fn ineligible_first_verification_persists_nothing() {
        let (store, svc) = service_with(Arc::new(RandomIdentifiers));
        svc.verify(&request(ALICE, 500_001.0)).unwrap();
        assert_eq!(store.get_benefits_enrollment(ALICE).unwrap(), None);
        assert!(matches!(svc.get_benefits(ALICE), Err(RegistryError::NotFound { .. })));
    }

    #[test]
    fn eligible_reverification_resets_usage() {
        let (store, svc) = service_with(Arc::new(RandomIdentifiers));
        let mut first = enrolled(svc.verify(&request(ALICE, 100_000.0)).unwrap());
        first.used_amount = 75_000.0;
        store.upsert_benefits_enrollment(&first).unwrap();
        assert_eq!(svc.get_benefits(ALICE).unwrap().remaining_amount, 425_000.0);

        let second = enrolled(svc.verify(&request(ALICE, 200_000.0)).unwrap());
        assert_ne!(second.card_number, first.card_number);
        let statement = svc.get_benefits(ALICE).unwrap();
        assert_eq!(statement.used_amount, 0.0);
        assert_eq!(statement.remaining_amount, statement.coverage_amount);
    }

    #[test]
    fn card_collisions_are_retried() {
        let ids = ScriptedIdentifiers::new(&[], &["ABY-100000000000001", "ABY-100000000000001", "ABY-100000000000002"]);
        let (_, svc) = service_with(Arc::new(ids));
        let alice = enrolled(svc.verify(&request(ALICE, 1.0)).unwrap());
        let bob = enrolled(svc.verify(&request(BOB, 1.0)).unwrap());
        assert_eq!(alice.card_number.as_deref(), Some("ABY-100000000000001"));
        assert_eq!(bob.card_number.as_deref(), Some("ABY-100000000000002"));
    }

    #[test]
    fn card_generation_is_bounded() {
        let ids = ScriptedIdentifiers::new(&[], &["ABY-100000000000001"]);
        let (_, svc) = service_with(Arc::new(ids));
        enrolled(svc.verify(&request(ALICE, 1.0)).unwrap());
        let err = svc.verify(&request(BOB, 1.0)).unwrap_err();
        assert!(matches!(err, RegistryError::GenerationExhausted { attempts: 5, .. }));
    }

    #[test]
    fn verification_validates_input() {
        let (_, svc) = service_with(Arc::new(RandomIdentifiers));
        let err = svc.verify(&VerificationRequest::default()).unwrap_err();
        assert_eq!(err.to_string(), "missing required fields: healthId, annualIncome");

        assert!(matches!(svc.verify(&request(ALICE, -5.0)), Err(RegistryError::Validation { .. })));

        let mut zero_family = request(ALICE, 1.0);
        zero_family.family_size = Some(0);
        assert!(matches!(svc.verify(&zero_family), Err(RegistryError::Validation { .. })));

        assert!(matches!(
            svc.verify(&request("HLTH-20250101-99999", 1.0)),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn income_at_threshold_is_eligible() {
        let (_, svc) = service_with(Arc::new(RandomIdentifiers));
        assert!(matches!(
            svc.verify(&request(ALICE, svc.policy().income_threshold)).unwrap(),
            VerificationOutcome::Enrolled(_)
        ));
    }
}
