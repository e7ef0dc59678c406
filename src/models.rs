use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{
    benefits_enrollments, consultations, empaneled_hospitals, family_members, health_profiles,
    medical_images, persons,
};

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = persons)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub health_id: String,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub city: String,
    pub email: String,
    pub blood_group: String,
    pub national_id: String,
    pub fingerprint_scanned: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = health_profiles)]
#[diesel(primary_key(health_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct HealthProfile {
    pub health_id: String,
    pub chronic_conditions: String,
    pub allergies: String,
    pub emergency_contact: String,
    pub current_medication: String,
    pub updated_at: NaiveDateTime,
}

/// A person's enrollment in the benefits scheme. One row per person; a new
/// verification replaces the whole row.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = benefits_enrollments)]
#[diesel(primary_key(health_id))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct BenefitsEnrollment {
    pub health_id: String,
    pub enrolled: bool,
    pub card_number: Option<String>,
    pub household_head: Option<String>,
    pub family_size: i32,
    pub annual_income: f64,
    pub coverage_amount: f64,
    pub used_amount: f64,
    pub state: String,
    pub district: String,
    pub block: String,
    pub village: String,
    pub enrolled_at: NaiveDateTime,
}

impl BenefitsEnrollment {
    pub fn remaining_amount(&self) -> f64 {
        self.coverage_amount - self.used_amount
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = family_members)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FamilyMember {
    pub id: i32,
    pub owner_health_id: String,
    pub name: String,
    pub relation: String,
    pub age: i32,
    pub gender: String,
    pub national_id: Option<String>,
    pub member_health_id: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = family_members)]
pub struct NewFamilyMember {
    pub owner_health_id: String,
    pub name: String,
    pub relation: String,
    pub age: i32,
    pub gender: String,
    pub national_id: Option<String>,
    pub member_health_id: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = empaneled_hospitals)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Hospital {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub phone: String,
    pub specialties: String,
    pub latitude: f64,
    pub longitude: f64,
    pub packages: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = empaneled_hospitals)]
pub struct NewHospital {
    pub name: String,
    pub code: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub phone: String,
    pub specialties: String,
    pub latitude: f64,
    pub longitude: f64,
    pub packages: String,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = medical_images)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct MedicalImage {
    pub image_id: String,
    pub health_id: String,
    pub filename: String,
    pub byte_size: i64,
    pub content_type: String,
    pub payload: String,
    pub uploaded_at: NaiveDateTime,
}

/// Lifecycle of a teleconsultation request. `Responded` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationStatus {
    Pending,
    Responded,
}

impl ConsultationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Pending => "pending",
            ConsultationStatus::Responded => "responded",
        }
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsultationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ConsultationStatus::Pending),
            "responded" => Ok(ConsultationStatus::Responded),
            other => Err(format!("unknown consultation status '{other}'")),
        }
    }
}

/// Consultation as stored: attachments are a JSON array in a text column and
/// the status is its lowercase name.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = consultations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ConsultationRow {
    pub id: i32,
    pub health_id: String,
    pub patient_name: String,
    pub subject: String,
    pub description: String,
    pub urgency: String,
    pub preferred_language: String,
    pub attached_images: Option<String>,
    pub submitted_at: NaiveDateTime,
    pub status: String,
    pub doctor_response: Option<String>,
    pub responded_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = consultations)]
pub struct NewConsultation {
    pub health_id: String,
    pub patient_name: String,
    pub subject: String,
    pub description: String,
    pub urgency: String,
    pub preferred_language: String,
    pub attached_images: Option<String>,
    pub submitted_at: NaiveDateTime,
    pub status: String,
}
