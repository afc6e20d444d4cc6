//! Multipart member forms and the photo files they carry.
//!
//! Photos live flat in the upload directory as `<nra>_<name><ext>`. The file
//! name follows the member, so a change of NRA or name renames the file.

use std::collections::HashMap;
use std::path::Path;

use axum::extract::Multipart;
use chrono::NaiveDate;

use crate::errors::AppError;
use crate::models::{dmy_date, MembershipStatus, Role};

/// An uploaded photo, not yet written to disk.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Text fields and the optional `photo` part of a multipart form.
#[derive(Debug, Default)]
pub struct MemberForm {
    fields: HashMap<String, String>,
    pub photo: Option<PhotoUpload>,
}

impl MemberForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = MemberForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            if name == "photo" {
                let file_name = field.file_name().unwrap_or("").to_string();
                let data = field.bytes().await?;
                if !data.is_empty() {
                    form.photo = Some(PhotoUpload {
                        file_name,
                        bytes: data.to_vec(),
                    });
                }
            } else if !name.is_empty() {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Trimmed field value. Blank counts as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn date(&self, name: &str) -> Result<Option<NaiveDate>, AppError> {
        self.text(name)
            .map(|raw| {
                dmy_date::parse(raw).ok_or_else(|| {
                    AppError::Validation("Invalid date format, use DD-MM-YYYY".to_string())
                })
            })
            .transpose()
    }

    pub fn role(&self, name: &str) -> Result<Option<Role>, AppError> {
        self.text(name)
            .map(|raw| {
                Role::parse(raw)
                    .ok_or_else(|| AppError::Validation(format!("Unknown role '{}'", raw)))
            })
            .transpose()
    }

    pub fn membership_status(&self, name: &str) -> Result<Option<MembershipStatus>, AppError> {
        self.text(name)
            .map(|raw| {
                MembershipStatus::parse(raw).ok_or_else(|| {
                    AppError::Validation(format!("Unknown membership status '{}'", raw))
                })
            })
            .transpose()
    }
}

/// `<nra>_<name with underscores><ext>`, with the extension taken from `source_name`.
pub fn photo_file_name(nra: &str, name: &str, source_name: &str) -> String {
    let ext = Path::new(source_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    // Only the name part comes from user input; keep it a single path segment
    let safe_name: String = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect();

    format!("{}_{}{}", nra, safe_name.trim_start_matches('.'), ext)
}

pub async fn save_photo(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<(), AppError> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(file_name), bytes).await?;
    Ok(())
}

pub async fn rename_photo(dir: &Path, from: &str, to: &str) -> Result<(), AppError> {
    tokio::fs::rename(dir.join(from), dir.join(to)).await?;
    Ok(())
}

/// Best effort. A leftover file is logged, not reported to the caller.
pub async fn remove_photo(dir: &Path, file_name: &str) {
    if let Err(e) = tokio::fs::remove_file(dir.join(file_name)).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(file = %file_name, "Failed to remove photo: {}", e);
        }
    }
}
