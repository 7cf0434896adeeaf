use std::io::Error as IoError;

use argon2::Error as Argon2Error;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use log::{error, warn};
use rocket::{
    http::{Status, StatusClass},
    response::{self, status::Custom, Responder},
    serde::json::{serde_json::Error as JsonError, Json},
    Request,
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{1}")]
    Status(Status, String),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("Storage error: {0}")]
    Io(#[from] IoError),
    #[error("Malformed data file: {0}")]
    Json(#[from] JsonError),
}

impl Error {
    /// Something that was looked up does not exist.
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::Status(Status::NotFound, format!("{} not found", what.into()))
    }

    /// The request was well-formed but not acceptable.
    pub fn bad_request<S: Into<String>>(reason: S) -> Self {
        Self::Status(Status::BadRequest, reason.into())
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Status(status, _) => *status,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Argon2(_) | Self::Io(_) | Self::Json(_) => Status::InternalServerError,
        }
    }
}

/// The JSON body of every error response.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status.class() == StatusClass::ServerError {
            error!("{} {}: {self}", req.method(), req.uri());
        } else {
            warn!("{} {}: {self}", req.method(), req.uri());
        }
        // Internal details stay in the log.
        let message = match status.class() {
            StatusClass::ServerError => "Internal server error".to_string(),
            _ => self.to_string(),
        };
        Custom(status, Json(ErrorBody { error: message })).respond_to(req)
    }
}
