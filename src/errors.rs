// src/errors.rs
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContactSheetError {
    #[error("Nothing to process: no qualifying images in the input")]
    InputEmpty,

    #[error("Too many selected! Reject {excess} more.")]
    OverCapacity { excess: usize },

    #[error("Nothing to export")]
    ExportEmpty,

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Unknown record: {0}")]
    UnknownRecord(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed input: {0}")]
    Input(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ContactSheetError {
    fn code(&self) -> &'static str {
        match self {
            ContactSheetError::InputEmpty => "input_empty",
            ContactSheetError::OverCapacity { .. } => "over_capacity",
            ContactSheetError::ExportEmpty => "export_empty",
            ContactSheetError::SessionNotFound(_) => "session_not_found",
            ContactSheetError::UnknownRecord(_) => "unknown_record",
            ContactSheetError::InvalidTransition(_) => "invalid_transition",
            ContactSheetError::Validation(_) => "validation_error",
            ContactSheetError::Input(_) => "malformed_input",
            ContactSheetError::ImageProcessing(_) => "image_processing_error",
            ContactSheetError::SessionStore(_) => "session_store_error",
            ContactSheetError::Serialization(_) => "serialization_error",
        }
    }
}

impl ResponseError for ContactSheetError {
    fn status_code(&self) -> StatusCode {
        match self {
            ContactSheetError::InputEmpty
            | ContactSheetError::Validation(_)
            | ContactSheetError::Input(_) => StatusCode::BAD_REQUEST,
            ContactSheetError::SessionNotFound(_) | ContactSheetError::UnknownRecord(_) => {
                StatusCode::NOT_FOUND
            }
            ContactSheetError::OverCapacity { .. }
            | ContactSheetError::ExportEmpty
            | ContactSheetError::InvalidTransition(_) => StatusCode::CONFLICT,
            ContactSheetError::ImageProcessing(_)
            | ContactSheetError::SessionStore(_)
            | ContactSheetError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = serde_json::json!({
            "error": self.code(),
            "message": self.to_string()
        });
        if let ContactSheetError::OverCapacity { excess } = self {
            body["excess"] = serde_json::json!(excess);
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}
