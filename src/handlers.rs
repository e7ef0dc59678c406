use actix_web::{HttpResponse, ResponseError, web};
use serde::Deserialize;
use serde_json::json;

use crate::error::{RegistryError, RegistryResult};
use crate::services::Registry;
use crate::services::benefits::{VerificationOutcome, VerificationRequest};
use crate::services::consultation::{ConsultationRequest, ResponseRequest};
use crate::services::directory::{FamilyMemberRequest, HospitalQuery};
use crate::services::media::{ImageDeletion, ImageUpload};
use crate::services::registration::{PersonCandidate, RegistrationRequest};

const HEALTH_SCAN_STATUS: &str = "Health scan complete. All parameters normal. Registration process finished.";

type HandlerResult = Result<HttpResponse, RegistryError>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthIdBody {
    #[serde(default, alias = "health_id")]
    pub health_id: Option<String>,
}

/// Runs a service call on the blocking pool; every store access is synchronous.
async fn run<T, F>(registry: web::Data<Registry>, op: F) -> RegistryResult<T>
where
    F: FnOnce(&Registry) -> RegistryResult<T> + Send + 'static,
    T: Send + 'static,
{
    web::block(move || op(registry.get_ref()))
        .await
        .map_err(|e| RegistryError::Internal {
            reason: format!("blocking task failed: {e}"),
        })?
}

/// Routes, plus extractor configs that turn malformed input into the
/// standard 400 envelope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        RegistryError::validation(format!("invalid request body: {err}")).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        RegistryError::validation(format!("invalid query string: {err}")).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        RegistryError::validation(format!("invalid path: {err}")).into()
    }))
    .route("/", web::get().to(health))
    .route("/generate-health-id", web::post().to(generate_health_id))
    .route("/complete-registration", web::post().to(complete_registration))
    .route("/fingerprint-scan", web::post().to(fingerprint_scan))
    .route("/login", web::post().to(login))
    .route("/login-with-aby", web::post().to(login_with_benefits))
    .route("/verify-aby", web::post().to(verify_benefits))
    .route("/aby-benefits/{health_id}", web::get().to(benefits))
    .route("/empaneled-hospitals", web::get().to(hospitals))
    .route("/add-family-member", web::post().to(add_family_member))
    .route("/family-members/{health_id}", web::get().to(family_members))
    .route("/upload-medical-image", web::post().to(upload_medical_image))
    .route("/medical-images/{health_id}", web::get().to(medical_images))
    .route("/delete-medical-image", web::post().to(delete_medical_image))
    .route("/submit-consultation", web::post().to(submit_consultation))
    .route("/consultation-history/{health_id}", web::get().to(consultation_history))
    .route("/respond-consultation", web::post().to(respond_consultation))
    .default_service(web::to(not_found));
}

// Handler to report that the registry is up
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "message": "Health registry is running" }))
}

// Handler for any route not registered below
async fn not_found() -> HttpResponse {
    RegistryError::not_found("route", "requested path").error_response()
}

// Handler to issue a health ID for a validated applicant
pub async fn generate_health_id(registry: web::Data<Registry>, body: web::Json<PersonCandidate>) -> HandlerResult {
    let candidate = body.into_inner();
    let issued = run(registry, move |r| r.registration.issue_identifier(&candidate)).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Health ID generated successfully!",
        "healthId": issued.health_id,
        "userData": issued.person,
    })))
}

// Handler to persist a person under a previously issued health ID
pub async fn complete_registration(
    registry: web::Data<Registry>,
    body: web::Json<RegistrationRequest>,
) -> HandlerResult {
    let request = body.into_inner();
    let registration = run(registry, move |r| r.registration.complete_registration(&request)).await?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Registration completed successfully!",
        "healthId": registration.person.health_id,
        "profileSaved": registration.profile_saved,
    })))
}

// Handler to record a completed fingerprint scan
pub async fn fingerprint_scan(registry: web::Data<Registry>, body: web::Json<HealthIdBody>) -> HandlerResult {
    let health_id = body.into_inner().health_id;
    run(registry, move |r| r.registration.mark_fingerprint_scanned(health_id.as_deref())).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Fingerprint scan completed successfully!",
        "healthStatus": HEALTH_SCAN_STATUS,
    })))
}

// Handler to log in by health ID
pub async fn login(registry: web::Data<Registry>, body: web::Json<HealthIdBody>) -> HandlerResult {
    let health_id = body.into_inner().health_id;
    let user = run(registry, move |r| r.registration.login(health_id.as_deref())).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Login successful!", "user": user })))
}

// Handler to log in and return the benefits dashboard
pub async fn login_with_benefits(registry: web::Data<Registry>, body: web::Json<HealthIdBody>) -> HandlerResult {
    let health_id = body.into_inner().health_id;
    let user = run(registry, move |r| r.registration.dashboard(health_id.as_deref())).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Login successful!", "user": user })))
}

// Handler to verify benefits eligibility.
// An ineligible applicant gets 200 with `success: false`.
pub async fn verify_benefits(registry: web::Data<Registry>, body: web::Json<VerificationRequest>) -> HandlerResult {
    let request = body.into_inner();
    let outcome = run(registry, move |r| r.benefits.verify(&request)).await?;
    let body = match outcome {
        VerificationOutcome::Enrolled(enrollment) => json!({
            "success": true,
            "message": format!(
                "Benefits verification successful! You are eligible for {:.0} coverage.",
                enrollment.coverage_amount
            ),
            "abyData": {
                "eligible": true,
                "cardNumber": enrollment.card_number,
                "coverageAmount": enrollment.coverage_amount,
                "familySize": enrollment.family_size,
                "remainingAmount": enrollment.remaining_amount(),
            },
        }),
        VerificationOutcome::Ineligible { reason } => json!({
            "success": false,
            "message": reason,
            "abyData": { "eligible": false, "reason": reason },
        }),
    };
    Ok(HttpResponse::Ok().json(body))
}

// Handler to fetch a benefits statement
pub async fn benefits(registry: web::Data<Registry>, path: web::Path<String>) -> HandlerResult {
    let health_id = path.into_inner();
    let statement = run(registry, move |r| r.benefits.get_benefits(&health_id)).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "ok", "abyBenefits": statement })))
}

// Handler to list empaneled hospitals
pub async fn hospitals(registry: web::Data<Registry>, query: web::Query<HospitalQuery>) -> HandlerResult {
    let query = query.into_inner();
    let hospitals = run(registry, move |r| r.directory.list_hospitals(&query)).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("{} hospitals found", hospitals.len()),
        "hospitals": hospitals,
    })))
}

// Handler to add a family member under a primary health ID
pub async fn add_family_member(registry: web::Data<Registry>, body: web::Json<FamilyMemberRequest>) -> HandlerResult {
    let request = body.into_inner();
    let member = run(registry, move |r| r.directory.add_family_member(&request)).await?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Family member added successfully!",
        "memberHealthId": member.health_id,
        "member": member,
    })))
}

// Handler to list family members
pub async fn family_members(registry: web::Data<Registry>, path: web::Path<String>) -> HandlerResult {
    let health_id = path.into_inner();
    let members = run(registry, move |r| r.directory.list_family_members(&health_id)).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "ok", "familyMembers": members })))
}

// Handler to upload a medical image
pub async fn upload_medical_image(registry: web::Data<Registry>, body: web::Json<ImageUpload>) -> HandlerResult {
    let upload = body.into_inner();
    let image = run(registry, move |r| r.media.upload(&upload)).await?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Medical image uploaded successfully",
        "imageId": image.id,
    })))
}

// Handler to list medical images
pub async fn medical_images(registry: web::Data<Registry>, path: web::Path<String>) -> HandlerResult {
    let health_id = path.into_inner();
    let images = run(registry, move |r| r.media.list(&health_id)).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "ok", "images": images })))
}

// Handler to delete a medical image
pub async fn delete_medical_image(registry: web::Data<Registry>, body: web::Json<ImageDeletion>) -> HandlerResult {
    let image_id = body.into_inner().image_id;
    let removed = run(registry, move |r| r.media.delete(image_id.as_deref())).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Medical image deleted successfully",
        "removed": removed,
    })))
}

// Handler to submit a teleconsultation request
pub async fn submit_consultation(
    registry: web::Data<Registry>,
    body: web::Json<ConsultationRequest>,
) -> HandlerResult {
    let request = body.into_inner();
    let consultation = run(registry, move |r| r.consultations.submit(&request)).await?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Consultation request submitted successfully",
        "consultationId": consultation.id,
        "consultation": consultation,
    })))
}

// Handler to list consultation history
pub async fn consultation_history(registry: web::Data<Registry>, path: web::Path<String>) -> HandlerResult {
    let health_id = path.into_inner();
    let consultations = run(registry, move |r| r.consultations.list_history(&health_id)).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "ok", "consultations": consultations })))
}

// Handler to record a doctor response
pub async fn respond_consultation(registry: web::Data<Registry>, body: web::Json<ResponseRequest>) -> HandlerResult {
    let request = body.into_inner();
    let consultation = run(registry, move |r| r.consultations.respond(&request)).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Consultation response recorded",
        "consultation": consultation,
    })))
}
