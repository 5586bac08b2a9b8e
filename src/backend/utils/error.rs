use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt::{Debug, Display, Formatter};

pub type BackendResult<T> = Result<T, BackendError>;

/// Error with the http status which is returned to the client.
pub struct BackendError {
    pub status: StatusCode,
    pub error: anyhow::Error,
}

impl BackendError {
    fn with_status(status: StatusCode, message: impl Display) -> Self {
        BackendError {
            status,
            error: anyhow::anyhow!("{message}"),
        }
    }

    pub fn bad_request(message: impl Display) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Display) -> Self {
        Self::with_status(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Display) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, message)
    }
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.error, f)
    }
}

impl Debug for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.status, self.error)
    }
}

impl<T> From<T> for BackendError
where
    T: Into<anyhow::Error>,
{
    fn from(t: T) -> Self {
        let error = t.into();
        let status = match error.downcast_ref::<diesel::result::Error>() {
            Some(diesel::result::Error::NotFound) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        BackendError { status, error }
    }
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            log::error!("{:?}", self.error);
        }
        (self.status, format!("{}", self.error)).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_not_found_mapping() {
        let err: BackendError = diesel::result::Error::NotFound.into();
        assert_eq!(StatusCode::NOT_FOUND, err.status);

        let err: BackendError = anyhow::anyhow!("boom").into();
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, err.status);
        assert_eq!("boom", err.to_string());
    }

    #[test]
    fn test_forbidden() {
        let err = BackendError::forbidden("Only developers can do this");
        assert_eq!(StatusCode::FORBIDDEN, err.status);
        assert_eq!(StatusCode::FORBIDDEN, err.into_response().status());
    }
}
