use crate::models::file::LinkStatus;
use crate::templates::{render, LoginTemplate, UploadFailedTemplate};
use actix_web::{HttpResponse, http::StatusCode, http::header, ResponseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("login required")]
    LoginRequired,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("not found")]
    NotFound,
    #[error("{}", .0.reason())]
    LinkUnavailable(LinkStatus),
    #[error("internal server error")]
    Internal,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::LoginRequired => StatusCode::SEE_OTHER,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::LinkUnavailable(_) => StatusCode::FORBIDDEN,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut resp = HttpResponse::build(self.status_code());
        match self {
            ApiError::BadRequest(msg) => resp
                .content_type("text/html; charset=utf-8")
                .body(render(&UploadFailedTemplate { message: msg })),
            ApiError::LoginRequired => resp.insert_header((header::LOCATION, "/login")).finish(),
            ApiError::InvalidCredentials => resp
                .content_type("text/html; charset=utf-8")
                .body(render(&LoginTemplate {
                    error: Some("Wrong username or password."),
                })),
            ApiError::NotFound => resp
                .content_type("text/plain; charset=utf-8")
                .body("File not found or the link is invalid."),
            ApiError::LinkUnavailable(status) => resp
                .content_type("text/plain; charset=utf-8")
                .body(status.reason()),
            ApiError::Internal => resp
                .content_type("text/plain; charset=utf-8")
                .body(self.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        log::error!("io error: {e:?}");
        ApiError::Internal
    }
}
