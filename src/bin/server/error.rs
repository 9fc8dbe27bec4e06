use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::{error, warn};

/// A failed request. The message is sent back as the plain-text body.
#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    Timeout(String),
    Internal(String),
}

impl From<cfmwrap::Error> for ApiError {
    fn from(e: cfmwrap::Error) -> Self {
        use cfmwrap::Error::*;
        match e {
            NoMolecules => {
                Self::BadRequest("No valid molecules found in file".to_owned())
            }
            Timeout { .. } => Self::Timeout(e.to_string()),
            Spawn { .. } | Exit { .. } => {
                Self::Internal(format!("cfm-predict failed: {e}"))
            }
            Export(_) => Self::Internal(format!("Export to Excel failed: {e}")),
            Io(_) => Self::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        if status.is_server_error() {
            error!("{status}: {msg}");
        } else {
            warn!("{status}: {msg}");
        }
        (status, format!("{msg}\n")).into_response()
    }
}
