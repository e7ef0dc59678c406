use chrono::NaiveDateTime;
use diesel::connection::SimpleConnection;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use tracing::{debug, error, info};

use super::{HospitalFilter, RecordStore};
use crate::error::{RegistryError, RegistryResult};
use crate::models::{
    BenefitsEnrollment, ConsultationRow, ConsultationStatus, FamilyMember, HealthProfile, Hospital,
    MedicalImage, NewConsultation, NewFamilyMember, NewHospital, Person,
};
use crate::schema::{
    benefits_enrollments, consultations, empaneled_hospitals, family_members, health_profiles,
    medical_images, persons,
};

// Database connection pool type
type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

type Conn = PooledConnection<ConnectionManager<SqliteConnection>>;

const SCHEMA: &str = include_str!("../../migrations/2025-06-01-000000_create_registry/up.sql");
const MEMORY_URL: &str = ":memory:";

/// Foreign keys are off by default in SQLite and the setting is per connection.
#[derive(Debug)]
struct ConnectionPragmas;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionPragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(r2d2::Error::QueryError)
    }
}

/// `RecordStore` over a pooled SQLite database.
#[derive(Clone)]
pub struct DieselStore {
    pool: DbPool,
}

impl DieselStore {
    /// Opens (or creates) the database and applies the schema.
    pub fn open(database_url: &str, pool_size: u32) -> RegistryResult<Self> {
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let builder = r2d2::Pool::builder().connection_customizer(Box::new(ConnectionPragmas));

        // Every connection to ":memory:" is a separate database, so the pool
        // must hold exactly one connection for its whole lifetime.
        let builder = if database_url == MEMORY_URL {
            builder
                .max_size(1)
                .min_idle(Some(1))
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            builder.max_size(pool_size.max(1))
        };

        let pool = builder
            .build(manager)
            .map_err(|e| RegistryError::storage("building the connection pool", e))?;
        let store = Self { pool };
        store.migrate()?;
        info!(database_url, "record store ready");
        Ok(store)
    }

    /// Private database that lives as long as the store. Used by tests.
    pub fn in_memory() -> RegistryResult<Self> {
        Self::open(MEMORY_URL, 1)
    }

    fn migrate(&self) -> RegistryResult<()> {
        let mut conn = self.conn()?;
        conn.batch_execute(SCHEMA)
            .map_err(|e| failure("applying the schema", "", e))
    }

    fn conn(&self) -> RegistryResult<Conn> {
        self.pool.get().map_err(|e| {
            error!(error = %e, "could not acquire a database connection");
            RegistryError::storage("acquiring a database connection", e)
        })
    }
}

/// `table.column` named by a SQLite unique-constraint failure.
fn violated_unique(err: &DieselError) -> Option<String> {
    match err {
        DieselError::DatabaseError(_, info) => info
            .message()
            .strip_prefix("UNIQUE constraint failed: ")
            .map(|column| column.trim().to_string()),
        _ => None,
    }
}

fn is_foreign_key_violation(err: &DieselError) -> bool {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => true,
        DieselError::DatabaseError(_, info) => info.message().contains("FOREIGN KEY constraint failed"),
        _ => false,
    }
}

/// Maps errors not handled by the caller: a missing owner becomes `NotFound`,
/// anything else is logged and wrapped as a storage failure.
fn failure(context: &str, owner: &str, err: DieselError) -> RegistryError {
    if is_foreign_key_violation(&err) {
        return RegistryError::not_found("person", owner);
    }
    error!(context, error = %err, "storage operation failed");
    RegistryError::storage(context, err)
}

fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.trim().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

impl RecordStore for DieselStore {
    fn create_person(&self, person: &Person) -> RegistryResult<Person> {
        let mut conn = self.conn()?;
        diesel::insert_into(persons::table)
            .values(person)
            .execute(&mut conn)
            .map_err(|e| match violated_unique(&e).as_deref() {
                Some("persons.email") => RegistryError::DuplicateEmail(person.email.clone()),
                Some("persons.health_id") => RegistryError::DuplicateIdentifier(person.health_id.clone()),
                _ => failure("inserting person", &person.health_id, e),
            })?;
        debug!(health_id = %person.health_id, "person stored");
        Ok(person.clone())
    }

    fn get_person(&self, health_id: &str) -> RegistryResult<Option<Person>> {
        let mut conn = self.conn()?;
        persons::table
            .find(health_id)
            .select(Person::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| failure("loading person", health_id, e))
    }

    fn get_person_by_email(&self, email: &str) -> RegistryResult<Option<Person>> {
        let mut conn = self.conn()?;
        persons::table
            .filter(persons::email.eq(email))
            .select(Person::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| failure("loading person by email", "", e))
    }

    fn health_identifier_in_use(&self, health_id: &str) -> RegistryResult<bool> {
        let mut conn = self.conn()?;
        let as_person: bool = diesel::select(exists(persons::table.find(health_id)))
            .get_result(&mut conn)
            .map_err(|e| failure("checking person identifiers", health_id, e))?;
        if as_person {
            return Ok(true);
        }
        diesel::select(exists(
            family_members::table.filter(family_members::member_health_id.eq(health_id)),
        ))
        .get_result(&mut conn)
        .map_err(|e| failure("checking member identifiers", health_id, e))
    }

    fn set_fingerprint_status(&self, health_id: &str, scanned: bool) -> RegistryResult<()> {
        let mut conn = self.conn()?;
        let updated = diesel::update(persons::table.find(health_id))
            .set(persons::fingerprint_scanned.eq(scanned))
            .execute(&mut conn)
            .map_err(|e| failure("updating fingerprint status", health_id, e))?;
        if updated == 0 {
            return Err(RegistryError::not_found("person", health_id));
        }
        Ok(())
    }

    fn upsert_health_profile(&self, profile: &HealthProfile) -> RegistryResult<HealthProfile> {
        let mut conn = self.conn()?;
        diesel::insert_into(health_profiles::table)
            .values(profile)
            .on_conflict(health_profiles::health_id)
            .do_update()
            .set(profile)
            .execute(&mut conn)
            .map_err(|e| failure("writing health profile", &profile.health_id, e))?;
        Ok(profile.clone())
    }

    fn get_health_profile(&self, health_id: &str) -> RegistryResult<Option<HealthProfile>> {
        let mut conn = self.conn()?;
        health_profiles::table
            .find(health_id)
            .select(HealthProfile::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| failure("loading health profile", health_id, e))
    }

    fn upsert_benefits_enrollment(
        &self,
        enrollment: &BenefitsEnrollment,
    ) -> RegistryResult<BenefitsEnrollment> {
        if !(enrollment.used_amount >= 0.0 && enrollment.used_amount <= enrollment.coverage_amount) {
            return Err(RegistryError::validation(
                "used amount must be between zero and the coverage amount",
            ));
        }
        let mut conn = self.conn()?;
        diesel::insert_into(benefits_enrollments::table)
            .values(enrollment)
            .on_conflict(benefits_enrollments::health_id)
            .do_update()
            .set(enrollment)
            .execute(&mut conn)
            .map_err(|e| match violated_unique(&e).as_deref() {
                Some("benefits_enrollments.card_number") => {
                    RegistryError::DuplicateCard(enrollment.card_number.clone().unwrap_or_default())
                }
                _ => failure("writing benefits enrollment", &enrollment.health_id, e),
            })?;
        info!(health_id = %enrollment.health_id, enrolled = enrollment.enrolled, "benefits enrollment written");
        Ok(enrollment.clone())
    }

    fn get_benefits_enrollment(&self, health_id: &str) -> RegistryResult<Option<BenefitsEnrollment>> {
        let mut conn = self.conn()?;
        benefits_enrollments::table
            .find(health_id)
            .select(BenefitsEnrollment::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| failure("loading benefits enrollment", health_id, e))
    }

    fn card_number_in_use(&self, card_number: &str) -> RegistryResult<bool> {
        let mut conn = self.conn()?;
        diesel::select(exists(
            benefits_enrollments::table.filter(benefits_enrollments::card_number.eq(card_number)),
        ))
        .get_result(&mut conn)
        .map_err(|e| failure("checking card numbers", "", e))
    }

    fn add_family_member(&self, member: &NewFamilyMember) -> RegistryResult<FamilyMember> {
        let mut conn = self.conn()?;
        diesel::insert_into(family_members::table)
            .values(member)
            .returning(FamilyMember::as_returning())
            .get_result(&mut conn)
            .map_err(|e| match violated_unique(&e).as_deref() {
                Some("family_members.member_health_id") => RegistryError::DuplicateIdentifier(
                    member.member_health_id.clone().unwrap_or_default(),
                ),
                _ => failure("inserting family member", &member.owner_health_id, e),
            })
    }

    fn list_family_members(&self, owner_health_id: &str) -> RegistryResult<Vec<FamilyMember>> {
        let mut conn = self.conn()?;
        family_members::table
            .filter(family_members::owner_health_id.eq(owner_health_id))
            .order((family_members::created_at.asc(), family_members::id.asc()))
            .select(FamilyMember::as_select())
            .load(&mut conn)
            .map_err(|e| failure("listing family members", owner_health_id, e))
    }

    fn seed_hospitals(&self, hospitals: &[NewHospital]) -> RegistryResult<usize> {
        let mut conn = self.conn()?;
        let codes: Vec<&str> = hospitals.iter().map(|h| h.code.as_str()).collect();
        let present: i64 = empaneled_hospitals::table
            .filter(empaneled_hospitals::code.eq_any(codes))
            .count()
            .get_result(&mut conn)
            .map_err(|e| failure("counting seeded hospitals", "", e))?;
        if present as usize >= hospitals.len() {
            debug!(present, "hospital reference data already seeded");
            return Ok(0);
        }

        let inserted = conn
            .immediate_transaction(|conn| {
                let mut inserted = 0;
                for hospital in hospitals {
                    inserted += diesel::insert_or_ignore_into(empaneled_hospitals::table)
                        .values(hospital)
                        .execute(conn)?;
                }
                Ok::<_, DieselError>(inserted)
            })
            .map_err(|e| failure("seeding hospitals", "", e))?;
        info!(inserted, "hospital reference data seeded");
        Ok(inserted)
    }

    fn list_hospitals(&self, filter: &HospitalFilter) -> RegistryResult<Vec<Hospital>> {
        let mut conn = self.conn()?;
        let mut query = empaneled_hospitals::table.into_boxed();
        if let Some(city) = filter.city_contains.as_deref().filter(|c| !c.trim().is_empty()) {
            query = query.filter(empaneled_hospitals::city.like(like_pattern(city)).escape('\\'));
        }
        if let Some(specialty) = filter.specialty_contains.as_deref().filter(|s| !s.trim().is_empty()) {
            query = query.filter(
                empaneled_hospitals::specialties
                    .like(like_pattern(specialty))
                    .escape('\\'),
            );
        }
        query
            .order((empaneled_hospitals::name.asc(), empaneled_hospitals::id.asc()))
            .limit(filter.limit.max(0))
            .select(Hospital::as_select())
            .load(&mut conn)
            .map_err(|e| failure("listing hospitals", "", e))
    }

    fn add_medical_image(&self, image: &MedicalImage) -> RegistryResult<MedicalImage> {
        let mut conn = self.conn()?;
        diesel::insert_into(medical_images::table)
            .values(image)
            .execute(&mut conn)
            .map_err(|e| match violated_unique(&e).as_deref() {
                Some("medical_images.image_id") => RegistryError::DuplicateImage(image.image_id.clone()),
                _ => failure("inserting medical image", &image.health_id, e),
            })?;
        Ok(image.clone())
    }

    fn list_medical_images(&self, health_id: &str) -> RegistryResult<Vec<MedicalImage>> {
        let mut conn = self.conn()?;
        medical_images::table
            .filter(medical_images::health_id.eq(health_id))
            .order((medical_images::uploaded_at.desc(), medical_images::image_id.desc()))
            .select(MedicalImage::as_select())
            .load(&mut conn)
            .map_err(|e| failure("listing medical images", health_id, e))
    }

    fn delete_medical_image(&self, image_id: &str) -> RegistryResult<bool> {
        let mut conn = self.conn()?;
        let removed = diesel::delete(medical_images::table.find(image_id))
            .execute(&mut conn)
            .map_err(|e| failure("deleting medical image", "", e))?;
        Ok(removed > 0)
    }

    fn add_consultation(&self, consultation: &NewConsultation) -> RegistryResult<ConsultationRow> {
        let mut conn = self.conn()?;
        diesel::insert_into(consultations::table)
            .values(consultation)
            .returning(ConsultationRow::as_returning())
            .get_result(&mut conn)
            .map_err(|e| failure("inserting consultation", &consultation.health_id, e))
    }

    fn list_consultations(&self, health_id: &str) -> RegistryResult<Vec<ConsultationRow>> {
        let mut conn = self.conn()?;
        consultations::table
            .filter(consultations::health_id.eq(health_id))
            .order((consultations::submitted_at.desc(), consultations::id.desc()))
            .select(ConsultationRow::as_select())
            .load(&mut conn)
            .map_err(|e| failure("listing consultations", health_id, e))
    }

    fn record_consultation_response(
        &self,
        id: i32,
        response: &str,
        responded_at: NaiveDateTime,
    ) -> RegistryResult<ConsultationRow> {
        let mut conn = self.conn()?;
        let outcome = conn
            .immediate_transaction(|conn| {
                let updated = diesel::update(
                    consultations::table
                        .filter(consultations::id.eq(id))
                        .filter(consultations::status.eq(ConsultationStatus::Pending.as_str())),
                )
                .set((
                    consultations::status.eq(ConsultationStatus::Responded.as_str()),
                    consultations::doctor_response.eq(Some(response)),
                    consultations::responded_at.eq(Some(responded_at)),
                ))
                .returning(ConsultationRow::as_returning())
                .get_result(conn)
                .optional()?;
                match updated {
                    Some(row) => Ok::<_, DieselError>(Ok(row)),
                    None => consultations::table
                        .find(id)
                        .select(consultations::status)
                        .first::<String>(conn)
                        .optional()
                        .map(Err),
                }
            })
            .map_err(|e| failure("recording consultation response", "", e))?;

        match outcome {
            Ok(row) => Ok(row),
            Err(None) => Err(RegistryError::not_found("consultation", id.to_string())),
            Err(Some(status)) => Err(RegistryError::InvalidState {
                reason: format!("consultation {id} is already {status}"),
            }),
        }
    }
}
