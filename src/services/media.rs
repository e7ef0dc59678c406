//! Medical images stored inline as base64 payloads.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{RequiredFields, optional_text};
use crate::error::{RegistryError, RegistryResult};
use crate::models::MedicalImage;
use crate::store::RecordStore;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpload {
    #[serde(default)]
    pub health_id: Option<String>,
    #[serde(default, alias = "imageId")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::lenient_number")]
    pub size: Option<i64>,
    #[serde(default, rename = "type")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub data_url: Option<String>,
    #[serde(default)]
    pub upload_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDeletion {
    #[serde(default)]
    pub image_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageView {
    pub id: String,
    pub name: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub data_url: String,
    pub upload_date: NaiveDateTime,
    pub health_id: String,
}

impl From<MedicalImage> for ImageView {
    fn from(image: MedicalImage) -> Self {
        Self {
            id: image.image_id,
            name: image.filename,
            size: image.byte_size,
            content_type: image.content_type,
            data_url: image.payload,
            upload_date: image.uploaded_at,
            health_id: image.health_id,
        }
    }
}

/// A validated payload: the MIME type named by a data URL, if any, and the
/// decoded byte count.
#[derive(Debug, PartialEq)]
struct Payload<'a> {
    declared_type: Option<&'a str>,
    decoded_len: usize,
}

/// Accepts `data:<type>;base64,<data>` or bare base64.
fn inspect_payload(raw: &str) -> RegistryResult<Payload<'_>> {
    let (declared_type, encoded) = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| RegistryError::validation("data URL has no payload"))?;
            let mime = header
                .strip_suffix(";base64")
                .ok_or_else(|| RegistryError::validation("data URL must be base64 encoded"))?;
            (Some(mime).filter(|m| !m.is_empty()), data)
        }
        None => (None, raw),
    };
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| RegistryError::validation(format!("image payload is not valid base64: {e}")))?;
    Ok(Payload {
        declared_type,
        decoded_len: bytes.len(),
    })
}

#[derive(Clone)]
pub struct MediaService {
    store: Arc<dyn RecordStore>,
}

impl MediaService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn upload(&self, upload: &ImageUpload) -> RegistryResult<ImageView> {
        let mut required = RequiredFields::default();
        let health_id = required.text("healthId", upload.health_id.as_deref());
        let data_url = required.text("dataUrl", upload.data_url.as_deref());
        required.finish()?;

        let payload = inspect_payload(&data_url)?;
        if upload.size.is_some_and(|size| size < 0) {
            return Err(RegistryError::validation("size must not be negative"));
        }

        let image_id = optional_text(upload.id.as_deref()).unwrap_or_else(|| format!("IMG-{}", Uuid::new_v4()));
        let content_type = optional_text(upload.content_type.as_deref())
            .or_else(|| payload.declared_type.map(str::to_string))
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());

        let image = MedicalImage {
            filename: optional_text(upload.name.as_deref()).unwrap_or_else(|| image_id.clone()),
            byte_size: upload.size.unwrap_or(payload.decoded_len as i64),
            content_type,
            payload: data_url,
            uploaded_at: upload.upload_date.unwrap_or_else(Utc::now).naive_utc(),
            image_id,
            health_id,
        };
        let stored = self.store.add_medical_image(&image)?;
        info!(
            health_id = %stored.health_id,
            image_id = %stored.image_id,
            bytes = stored.byte_size,
            "medical image stored"
        );
        Ok(ImageView::from(stored))
    }

    /// Newest first.
    pub fn list(&self, health_id: &str) -> RegistryResult<Vec<ImageView>> {
        Ok(self
            .store
            .list_medical_images(health_id)?
            .into_iter()
            .map(ImageView::from)
            .collect())
    }

    /// Deleting an absent image is not an error.
    pub fn delete(&self, image_id: Option<&str>) -> RegistryResult<bool> {
        let mut required = RequiredFields::default();
        let image_id = required.text("imageId", image_id);
        required.finish()?;

        let removed = self.store.delete_medical_image(&image_id)?;
        info!(image_id = %image_id, removed, "medical image delete");
        Ok(removed)
    }
}
