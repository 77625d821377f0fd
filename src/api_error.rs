use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Serialize;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub struct ApiError {
    pub status_code: u16,
    pub message: String,
}

/// Body of every successful mutation: `{"success": true, "message": ...}`.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        ActionResponse {
            success: true,
            message: Some(message.into()),
        }
    }
}

impl ApiError {
    pub fn new(status_code: u16, message: String) -> ApiError {
        ApiError {
            status_code,
            message,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> ApiError {
        ApiError::new(400, message.into())
    }

    pub fn unauthorized() -> ApiError {
        ApiError::new(401, "Invalid Request".to_string())
    }

    pub fn forbidden() -> ApiError {
        ApiError::new(403, "You are not allowed to access this resource".to_string())
    }

    pub fn not_found(message: impl Into<String>) -> ApiError {
        ApiError::new(404, message.into())
    }

    /// Like `From<DieselError>`, but a unique violation reports `duplicate` instead
    /// of the generic duplicate-entry message.
    pub fn from_diesel_or_duplicate(error: DieselError, duplicate: &str) -> ApiError {
        match error {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                ApiError::new(409, duplicate.to_string())
            }
            err => ApiError::from(err),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.message.as_str())
    }
}

impl From<DieselError> for ApiError {
    fn from(error: DieselError) -> ApiError {
        match error {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, err) => {
                debug!("Unique violation: {}", err.message());
                ApiError::new(409, "Duplicate entry: this record already exists".to_string())
            }
            DieselError::DatabaseError(_, err) => {
                error!("Database error: {}", err.message());
                ApiError::new(500, err.message().to_string())
            }
            DieselError::NotFound => ApiError::new(404, "Record not found".to_string()),
            err => {
                error!("Diesel error: {}", err);
                ApiError::new(500, format!("Diesel error: {}", err))
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self.status_code() {
            status if status.is_server_error() => "Internal server error".to_string(),
            _ => self.message.clone(),
        };

        HttpResponse::build(self.status_code()).json(json!({ "success": false, "message": message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_maps_to_conflict() {
        let err = DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key value violates unique constraint".to_string()),
        );
        let api = ApiError::from(err);
        assert_eq!(api.status_code, 409);
        assert!(api.message.starts_with("Duplicate entry"));
    }

    #[test]
    fn duplicate_message_can_be_replaced() {
        let err = DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("course_assignments_course_id_teacher_id_section_key".to_string()),
        );
        let api = ApiError::from_diesel_or_duplicate(err, "This assignment already exists.");
        assert_eq!(api.status_code, 409);
        assert_eq!(api.message, "This assignment already exists.");
    }

    #[test]
    fn not_found_is_404_and_other_errors_pass_through() {
        assert_eq!(ApiError::from(DieselError::NotFound).status_code, 404);
        let api = ApiError::from_diesel_or_duplicate(DieselError::NotFound, "unused");
        assert_eq!(api.status_code, 404);
    }

    #[test]
    fn server_errors_hide_details_in_body() {
        let api = ApiError::new(500, "connection refused".to_string());
        let response = api.error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
