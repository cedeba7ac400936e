use crate::error::{AppError, Result};
use crate::models::SupportedLanguage;
use axum::{extract::Path, Json};
use tandem_protocol::LanguageData;

pub async fn list_languages() -> Json<Vec<LanguageData>> {
    Json(SupportedLanguage::catalog())
}

pub async fn get_language(Path(code): Path<String>) -> Result<Json<LanguageData>> {
    SupportedLanguage::from_code(&code)
        .map(|lang| Json(lang.to_data()))
        .ok_or_else(|| AppError::NotFound(format!("Unsupported language: {}", code)))
}
