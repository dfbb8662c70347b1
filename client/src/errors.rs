use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http {status}: {text}")]
    HttpStatus { status: StatusCode, text: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl ApiError {
    /// True when the failure means the session is no longer valid and the
    /// user must log in again.
    pub fn is_auth(&self) -> bool {
        match self {
            ApiError::Auth(_) => true,
            ApiError::HttpStatus { status, .. } => {
                *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_detection_covers_401_and_403() {
        assert!(ApiError::Auth("bad credentials".into()).is_auth());
        assert!(ApiError::HttpStatus {
            status: StatusCode::UNAUTHORIZED,
            text: String::new()
        }
        .is_auth());
        assert!(ApiError::HttpStatus {
            status: StatusCode::FORBIDDEN,
            text: String::new()
        }
        .is_auth());
        assert!(!ApiError::HttpStatus {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            text: String::new()
        }
        .is_auth());
        assert!(!ApiError::Decode("bad json".into()).is_auth());
    }
}
