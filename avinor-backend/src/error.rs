///! Error kinds surfaced by the feed and detail clients

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Connection error for {url}: {cause}")]
    Connection { url: String, cause: reqwest::Error },

    #[error("Unexpected payload: {message}")]
    Parse { message: String },

    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Remote service error: {message}")]
    Remote { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// Classify a transport-level reqwest error.
    ///
    /// `url` must not carry credentials; the URL embedded in `cause` is stripped.
    pub(crate) fn from_transport(url: &str, cause: reqwest::Error) -> Self {
        if cause.is_timeout() {
            return Error::Timeout {
                url: url.to_string(),
            };
        }
        if let Some(status) = cause.status() {
            return Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            };
        }
        Error::Connection {
            url: url.to_string(),
            cause: cause.without_url(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
