use std::fmt::{Debug, Display};
use std::io::Error as IoError;

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use derivative::Derivative;
use mongodb::error::Error as DatabaseError;
use reqwest::Error as RemoteError;
use serde::{Serialize, Serializer};
use serde_json::Error as JsonError;

use crate::campaign::CampaignId;
use crate::wizard::{WizardId, WizardStep};

#[derive(Debug, Serialize, Derivative)]
#[derivative(PartialEq)]
#[serde(untagged)]
pub enum Error {
    // 400
    #[serde(serialize_with = "display")]
    InvalidJson(#[derivative(PartialEq = "ignore")] JsonPayloadError),
    #[serde(serialize_with = "display")]
    InvalidPath(#[derivative(PartialEq = "ignore")] PathError),
    #[serde(serialize_with = "display")]
    InvalidQuery(#[derivative(PartialEq = "ignore")] QueryPayloadError),
    MissingRequiredField {
        field: &'static str,
    },
    InvalidUrl {
        url: String,
    },
    PasswordTooShort {
        minimum_length: usize,
    },
    PasswordsDoNotMatch,
    InvalidBudget {
        budget: String,
    },
    InvalidDays {
        days: String,
    },
    InvalidResetToken,
    InvalidAmount {
        amount: f64,
    },

    // 401
    InvalidCredentials,
    NotAuthenticated,

    // 404
    PathNotFound,
    CampaignNotFound {
        campaign_id: CampaignId,
    },
    WizardNotFound {
        wizard_id: WizardId,
    },

    // 409
    EmailAlreadyInUse {
        email: String,
    },
    WizardStepMismatch {
        wizard_id: WizardId,
        expected_step: WizardStep,
        current_step: WizardStep,
    },
    WizardCannotGoBack {
        wizard_id: WizardId,
        current_step: WizardStep,
    },
    WizardSubmissionInProgress {
        wizard_id: WizardId,
    },

    // 502
    RemoteCallFailed {
        message: String,
    },
    RemoteRejected {
        status: u16,
    },
    InvalidRemoteResponse {
        message: String,
    },

    // 500
    #[serde(serialize_with = "display")]
    FailedDatabaseCall(#[derivative(PartialEq = "ignore")] DatabaseError),
    #[serde(serialize_with = "display")]
    FailedToSerializeJson(#[derivative(PartialEq = "ignore")] JsonError),
    #[serde(serialize_with = "display")]
    IoError(#[derivative(PartialEq = "ignore")] IoError),
}

impl Error {
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "E4001000",
            Error::InvalidPath(_) => "E4001001",
            Error::MissingRequiredField { .. } => "E4001002",
            Error::InvalidUrl { .. } => "E4001003",
            Error::PasswordTooShort { .. } => "E4001004",
            Error::PasswordsDoNotMatch => "E4001005",
            Error::InvalidBudget { .. } => "E4001006",
            Error::InvalidDays { .. } => "E4001007",
            Error::InvalidResetToken => "E4001008",
            Error::InvalidAmount { .. } => "E4001009",
            Error::InvalidQuery(_) => "E4001010",
            Error::InvalidCredentials => "E4011000",
            Error::NotAuthenticated => "E4011001",
            Error::PathNotFound => "E4041000",
            Error::CampaignNotFound { .. } => "E4041001",
            Error::WizardNotFound { .. } => "E4041002",
            Error::EmailAlreadyInUse { .. } => "E4091000",
            Error::WizardStepMismatch { .. } => "E4091001",
            Error::WizardCannotGoBack { .. } => "E4091002",
            Error::WizardSubmissionInProgress { .. } => "E4091003",
            Error::RemoteCallFailed { .. } => "E5021000",
            Error::RemoteRejected { .. } => "E5021001",
            Error::InvalidRemoteResponse { .. } => "E5021002",
            Error::FailedDatabaseCall(_) => "E5001000",
            Error::FailedToSerializeJson(_) => "E5001001",
            Error::IoError(_) => "E5001002",
        }
    }

    pub fn error_message(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "The given json could not be parsed",
            Error::InvalidPath(_) => "The given path could not be parsed",
            Error::InvalidQuery(_) => "The given query could not be parsed",
            Error::MissingRequiredField { .. } => "Please fill out all required fields",
            Error::InvalidUrl { .. } => {
                "Please enter a valid URL starting with http:// or https://"
            }
            Error::PasswordTooShort { .. } => "The password is too short",
            Error::PasswordsDoNotMatch => "Passwords do not match",
            Error::InvalidBudget { .. } => "The requested budget is not valid",
            Error::InvalidDays { .. } => "The requested duration is not valid",
            Error::InvalidResetToken => "Invalid or expired token",
            Error::InvalidAmount { .. } => "The payment amount must be positive",
            Error::InvalidCredentials => "Invalid email or password",
            Error::NotAuthenticated => "The request requires an authenticated user",
            Error::PathNotFound => "The requested path was not found",
            Error::CampaignNotFound { .. } => "The requested campaign was not found",
            Error::WizardNotFound { .. } => "The requested wizard was not found",
            Error::EmailAlreadyInUse { .. } => "Email already in use",
            Error::WizardStepMismatch { .. } => {
                "The requested wizard is not at the expected step"
            }
            Error::WizardCannotGoBack { .. } => {
                "The requested wizard cannot go back from its current step"
            }
            Error::WizardSubmissionInProgress { .. } => {
                "The requested wizard is already submitting"
            }
            Error::RemoteCallFailed { .. } => "An error occurred when calling the backend",
            Error::RemoteRejected { .. } => "The backend rejected the request",
            Error::InvalidRemoteResponse { .. } => "The backend sent an unexpected response",
            Error::FailedDatabaseCall(_) => {
                "An error occurred when communicating with the database"
            }
            Error::FailedToSerializeJson(_) => {
                "An error occurred when serializing an object to json"
            }
            Error::IoError(_) => "An error occurred during an I/O operation",
        }
    }

    /// Whether the backend could not be reached or failed on its own side, as
    /// opposed to rejecting the request. Only these errors permit falling back
    /// to mock data.
    pub fn is_backend_unavailable(&self) -> bool {
        match self {
            Error::RemoteCallFailed { .. } => true,
            Error::RemoteRejected { status } => *status >= 500,
            _ => false,
        }
    }

    pub fn remote_status(&self) -> Option<u16> {
        match self {
            Error::RemoteRejected { status } => Some(*status),
            _ => None,
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Error::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Error::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Error::MissingRequiredField { .. } => StatusCode::BAD_REQUEST,
            Error::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
            Error::PasswordTooShort { .. } => StatusCode::BAD_REQUEST,
            Error::PasswordsDoNotMatch => StatusCode::BAD_REQUEST,
            Error::InvalidBudget { .. } => StatusCode::BAD_REQUEST,
            Error::InvalidDays { .. } => StatusCode::BAD_REQUEST,
            Error::InvalidResetToken => StatusCode::BAD_REQUEST,
            Error::InvalidAmount { .. } => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Error::PathNotFound => StatusCode::NOT_FOUND,
            Error::CampaignNotFound { .. } => StatusCode::NOT_FOUND,
            Error::WizardNotFound { .. } => StatusCode::NOT_FOUND,
            Error::EmailAlreadyInUse { .. } => StatusCode::CONFLICT,
            Error::WizardStepMismatch { .. } => StatusCode::CONFLICT,
            Error::WizardCannotGoBack { .. } => StatusCode::CONFLICT,
            Error::WizardSubmissionInProgress { .. } => StatusCode::CONFLICT,
            Error::RemoteCallFailed { .. } => StatusCode::BAD_GATEWAY,
            Error::RemoteRejected { .. } => StatusCode::BAD_GATEWAY,
            Error::InvalidRemoteResponse { .. } => StatusCode::BAD_GATEWAY,
            Error::FailedDatabaseCall(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedToSerializeJson(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        #[derive(Serialize)]
        struct Dummy<'a> {
            error_code: &'static str,
            error_message: &'static str,
            error_meta: &'a Error,
        }

        HttpResponse::build(self.status_code()).json(&Dummy {
            error_code: self.error_code(),
            error_message: self.error_message(),
            error_meta: self,
        })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        Debug::fmt(self, f)
    }
}

impl From<DatabaseError> for Error {
    fn from(error: DatabaseError) -> Error {
        Error::FailedDatabaseCall(error)
    }
}

impl From<JsonError> for Error {
    fn from(error: JsonError) -> Error {
        Error::FailedToSerializeJson(error)
    }
}

impl From<RemoteError> for Error {
    fn from(error: RemoteError) -> Error {
        if error.is_decode() {
            // the backend answered, just not in a shape we understand
            return Error::InvalidRemoteResponse {
                message: error.to_string(),
            };
        }

        match error.status() {
            Some(status) => Error::RemoteRejected {
                status: status.as_u16(),
            },
            None => Error::RemoteCallFailed {
                message: error.to_string(),
            },
        }
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::IoError(error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidJson(err) => Some(err),
            Error::InvalidPath(err) => Some(err),
            Error::InvalidQuery(err) => Some(err),
            Error::FailedDatabaseCall(err) => Some(err),
            Error::FailedToSerializeJson(err) => Some(err),
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

fn display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Display,
    S: Serializer,
{
    serializer.collect_str(value)
}
