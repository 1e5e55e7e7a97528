use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub type Result<T> = core::result::Result<T, Error>;

const UNEXPECTED_MESSAGE: &str = "Something happened while processing your request!";

/// The kinds of failure a pipeline stage can report. Each kind carries its
/// own HTTP status; anything not classified is `Unexpected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    NotFound,
    WriteOpen,
    Unexpected,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Authentication => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::WriteOpen | ErrorKind::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A failed request. `message` is what the client sees; `source` is only
/// logged.
#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    message: String,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn authentication() -> Self {
        Self::new(ErrorKind::Authentication, "Could not authenticate")
    }

    pub fn file_not_found(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::new(ErrorKind::NotFound, "404 not found").with_source(source)
    }

    pub fn missing_handler() -> Self {
        Self::new(ErrorKind::NotFound, "Missing handler")
    }

    pub fn write_open(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::new(ErrorKind::WriteOpen, "Could not open file for write").with_source(source)
    }

    pub fn unexpected(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::new(ErrorKind::Unexpected, UNEXPECTED_MESSAGE).with_source(source)
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        match &self.source {
            Some(source) => write!(fmt, "{:?}: {} ({source})", self.kind, self.message),
            None => write!(fmt, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status(), self.message).into_response()
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::unexpected(err)
    }
}

impl From<axum::Error> for Error {
    fn from(err: axum::Error) -> Self {
        Self::unexpected(err)
    }
}
