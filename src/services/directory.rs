//! Family members and empaneled-hospital search.

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{RequiredFields, optional_text};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::ids::{self, IdentifierSource};
use crate::models::{FamilyMember, Hospital, NewFamilyMember};
use crate::store::{HospitalFilter, RecordStore, seed};

/// Keeps only the last four characters: `****-****-3456`.
pub fn redact_national_id(national_id: &str) -> String {
    let chars: Vec<char> = national_id.trim().chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("****-****-{tail}")
}

fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMemberRequest {
    #[serde(default, alias = "ownerHealthId")]
    pub primary_health_id: Option<String>,
    #[serde(default, alias = "name")]
    pub member_name: Option<String>,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default, deserialize_with = "super::lenient_number")]
    pub age: Option<i32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, alias = "aadharNumber")]
    pub national_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMemberView {
    pub id: i32,
    pub name: String,
    pub relation: String,
    pub age: i32,
    pub gender: String,
    pub health_id: Option<String>,
    pub national_id: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<FamilyMember> for FamilyMemberView {
    fn from(member: FamilyMember) -> Self {
        Self {
            id: member.id,
            name: member.name,
            relation: member.relation,
            age: member.age,
            gender: member.gender,
            health_id: member.member_health_id,
            national_id: member.national_id.as_deref().map(redact_national_id),
            created_at: member.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HospitalQuery {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HospitalView {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub phone: String,
    pub specialties: Vec<String>,
    pub packages_available: Vec<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<Hospital> for HospitalView {
    fn from(h: Hospital) -> Self {
        Self {
            specialties: split_tags(&h.specialties),
            packages_available: split_tags(&h.packages),
            id: h.id,
            name: h.name,
            code: h.code,
            address: h.address,
            city: h.city,
            state: h.state,
            postal_code: h.postal_code,
            phone: h.phone,
            latitude: h.latitude,
            longitude: h.longitude,
        }
    }
}

#[derive(Clone)]
pub struct DirectoryService {
    store: Arc<dyn RecordStore>,
    ids: Arc<dyn IdentifierSource>,
    id_attempts: u32,
    default_limit: i64,
    max_limit: i64,
}

impl DirectoryService {
    pub fn new(store: Arc<dyn RecordStore>, ids: Arc<dyn IdentifierSource>, config: &RegistryConfig) -> Self {
        Self {
            store,
            ids,
            id_attempts: config.id_attempts,
            default_limit: config.hospital_default_limit,
            max_limit: config.hospital_max_limit,
        }
    }

    /// Members who bring a national ID get their own health identifier.
    pub fn add_family_member(&self, request: &FamilyMemberRequest) -> RegistryResult<FamilyMemberView> {
        let mut required = RequiredFields::default();
        let owner = required.text("primaryHealthId", request.primary_health_id.as_deref());
        let name = required.text("memberName", request.member_name.as_deref());
        let relation = required.text("relation", request.relation.as_deref());
        required.finish()?;

        let age = request.age.unwrap_or(0);
        if !(0..=150).contains(&age) {
            return Err(RegistryError::validation("age must be between 0 and 150"));
        }
        if self.store.get_person(&owner)?.is_none() {
            return Err(RegistryError::not_found("person", owner));
        }

        let member = NewFamilyMember {
            owner_health_id: owner.clone(),
            name,
            relation,
            age,
            gender: optional_text(request.gender.as_deref()).unwrap_or_default(),
            national_id: optional_text(request.national_id.as_deref()),
            member_health_id: None,
            created_at: Utc::now().naive_utc(),
        };

        let stored = if member.national_id.is_some() {
            ids::issue_and_commit(
                "member health identifier",
                self.id_attempts,
                || self.ids.person_id(),
                |candidate| self.store.health_identifier_in_use(candidate),
                |member_health_id| {
                    self.store.add_family_member(&NewFamilyMember {
                        member_health_id: Some(member_health_id),
                        ..member.clone()
                    })
                },
            )?
        } else {
            self.store.add_family_member(&member)?
        };

        info!(
            owner = %owner,
            member_id = stored.id,
            member_health_id = stored.member_health_id.as_deref().unwrap_or("-"),
            "family member added"
        );
        Ok(FamilyMemberView::from(stored))
    }

    pub fn list_family_members(&self, owner_health_id: &str) -> RegistryResult<Vec<FamilyMemberView>> {
        Ok(self
            .store
            .list_family_members(owner_health_id)?
            .into_iter()
            .map(FamilyMemberView::from)
            .collect())
    }

    pub fn list_hospitals(&self, query: &HospitalQuery) -> RegistryResult<Vec<HospitalView>> {
        let limit = match query.limit {
            Some(limit) if limit < 1 => {
                return Err(RegistryError::validation("limit must be a positive number"));
            }
            Some(limit) => limit.min(self.max_limit),
            None => self.default_limit,
        };
        let filter = HospitalFilter {
            city_contains: optional_text(query.city.as_deref()),
            specialty_contains: optional_text(query.specialty.as_deref()),
            limit,
        };
        Ok(self
            .store
            .list_hospitals(&filter)?
            .into_iter()
            .map(HospitalView::from)
            .collect())
    }

    /// Loads the built-in hospital list unless it is already present.
    pub fn seed_hospitals(&self) -> RegistryResult<usize> {
        self.store.seed_hospitals(&seed::empaneled_hospitals())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RandomIdentifiers;
    use crate::test_support::{ScriptedIdentifiers, memory_store, person};

    const OWNER: &str = "HLTH-20250101-10001";

    fn service_with(ids: Arc<dyn IdentifierSource>) -> DirectoryService {
        let store = memory_store();
        store.create_person(&person(OWNER, "a@x.com")).unwrap();
        DirectoryService::new(store, ids, &RegistryConfig::default())
    }

    fn member(name: &str, national_id: Option<&str>) -> FamilyMemberRequest {
        FamilyMemberRequest {
            primary_health_id: Some(OWNER.into()),
            member_name: Some(name.into()),
            relation: Some("child".into()),
            age: Some(7),
            gender: Some("female".into()),
            national_id: national_id.map(str::to_string),
        }
    }

    #[test]
    fn redaction_keeps_last_four() {
        assert_eq!(redact_national_id("1234567890123456"), "****-****-3456");
        assert_eq!(redact_national_id("12"), "****-****-12");
    }

    #[test]
    fn listing_redacts_national_ids() {
        let svc = service_with(Arc::new(RandomIdentifiers));
        let added = svc.add_family_member(&member("Diya", Some("1234567890123456"))).unwrap();
        assert_eq!(added.national_id.as_deref(), Some("****-****-3456"));

        let listed = svc.list_family_members(OWNER).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].national_id.as_deref(), Some("****-****-3456"));
        assert!(ids::is_health_id(listed[0].health_id.as_deref().unwrap()));
    }

    #[test]
    fn members_without_national_id_get_no_identifier() {
        let svc = service_with(Arc::new(RandomIdentifiers));
        let added = svc.add_family_member(&member("Kabir", None)).unwrap();
        assert_eq!(added.health_id, None);
        assert_eq!(added.national_id, None);
    }

    #[test]
    fn member_identifier_avoids_the_owner() {
        let ids = ScriptedIdentifiers::new(&[OWNER, "HLTH-20250101-10002"], &[]);
        let svc = service_with(Arc::new(ids));
        let added = svc.add_family_member(&member("Diya", Some("9999"))).unwrap();
        assert_eq!(added.health_id.as_deref(), Some("HLTH-20250101-10002"));
    }

    #[test]
    fn member_requires_owner_name_and_relation() {
        let svc = service_with(Arc::new(RandomIdentifiers));
        let err = svc.add_family_member(&FamilyMemberRequest::default()).unwrap_err();
        assert_eq!(err.to_string(), "missing required fields: primaryHealthId, memberName, relation");

        let mut orphan = member("Diya", None);
        orphan.primary_health_id = Some("HLTH-20250101-99999".into());
        assert!(matches!(svc.add_family_member(&orphan), Err(RegistryError::NotFound { .. })));
    }

    #[test]
    fn hospitals_split_tags_and_respect_limits() {
        let svc = service_with(Arc::new(RandomIdentifiers));
        assert_eq!(svc.seed_hospitals().unwrap(), 3);
        assert_eq!(svc.seed_hospitals().unwrap(), 0);

        let delhi = svc
            .list_hospitals(&HospitalQuery {
                city: Some("delhi".into()),
                ..Default::default()
            })
            .unwrap();
        let names: Vec<_> = delhi.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["AIIMS Delhi", "Safdarjung Hospital"]);
        assert!(delhi[0].specialties.contains(&"Neurology".to_string()));
        assert_eq!(delhi[0].packages_available.len(), 3);

        let one = svc
            .list_hospitals(&HospitalQuery {
                limit: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(one.len(), 1);

        let cardio = svc
            .list_hospitals(&HospitalQuery {
                specialty: Some("CARDIOLOGY".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(cardio.len(), 2);

        assert!(matches!(
            svc.list_hospitals(&HospitalQuery {
                limit: Some(0),
                ..Default::default()
            }),
            Err(RegistryError::Validation { .. })
        ));
    }
}
