//! Fixtures shared by the unit tests.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::RegistryConfig;
use crate::ids::IdentifierSource;
use crate::models::{NewHospital, Person};
use crate::services::Registry;
use crate::store::{DieselStore, RecordStore};

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .expect("valid fixture timestamp")
}

pub fn person(health_id: &str, email: &str) -> Person {
    Person {
        health_id: health_id.to_string(),
        name: "Asha Kumar".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 12).expect("valid fixture date"),
        city: "Kochi".to_string(),
        email: email.to_string(),
        blood_group: "O+".to_string(),
        national_id: "123456789012".to_string(),
        fingerprint_scanned: false,
        created_at: at(2025, 1, 1, 8, 0),
    }
}

pub fn hospital(name: &str, code: &str, city: &str, specialties: &str) -> NewHospital {
    NewHospital {
        name: name.to_string(),
        code: code.to_string(),
        address: String::new(),
        city: city.to_string(),
        state: String::new(),
        postal_code: String::new(),
        phone: String::new(),
        specialties: specialties.to_string(),
        latitude: 0.0,
        longitude: 0.0,
        packages: String::new(),
    }
}

pub fn memory_store() -> Arc<dyn RecordStore> {
    Arc::new(DieselStore::in_memory().expect("in-memory store"))
}

pub fn registry_with(store: Arc<dyn RecordStore>, ids: Arc<dyn IdentifierSource>) -> Registry {
    Registry::new(store, ids, RegistryConfig::default())
}

/// Hands out a fixed sequence of identifiers, repeating the last one.
pub struct ScriptedIdentifiers {
    person_ids: Vec<String>,
    cards: Vec<String>,
    cursor: std::sync::Mutex<(usize, usize)>,
}

impl ScriptedIdentifiers {
    pub fn new(person_ids: &[&str], cards: &[&str]) -> Self {
        Self {
            person_ids: person_ids.iter().map(|s| s.to_string()).collect(),
            cards: cards.iter().map(|s| s.to_string()).collect(),
            cursor: std::sync::Mutex::new((0, 0)),
        }
    }
}

impl IdentifierSource for ScriptedIdentifiers {
    fn person_id(&self) -> String {
        let mut cursor = self.cursor.lock().expect("cursor lock");
        let id = self.person_ids[cursor.0.min(self.person_ids.len() - 1)].clone();
        cursor.0 += 1;
        id
    }

    fn card_number(&self) -> String {
        let mut cursor = self.cursor.lock().expect("cursor lock");
        let card = self.cards[cursor.1.min(self.cards.len() - 1)].clone();
        cursor.1 += 1;
        card
    }
}
