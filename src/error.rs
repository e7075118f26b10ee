use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::fmt;
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    SourceUnavailable(String),
    MalformedSchema(String),
    PersistenceUnavailable(String),
    ConfigError(String),
    FormatError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SourceUnavailable(s) => write!(f, "source unavailable: {}", s),
            Error::MalformedSchema(s) => write!(f, "unrecognized telemetry shape: {}", s),
            Error::PersistenceUnavailable(s) => write!(f, "watermark store unavailable: {}", s),
            Error::ConfigError(s) => write!(f, "configuration error: {}", s),
            Error::FormatError => write!(f, "unable to format response"),
        }
    }
}

impl std::error::Error for Error {}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let status = match self {
            Error::SourceUnavailable(_) => Status::BadGateway,
            Error::PersistenceUnavailable(_) => Status::ServiceUnavailable,
            _ => Status::InternalServerError,
        };
        let error = format!(
            "<html><body><h3>{}</h3><code>{}</code></body></html>",
            status, self
        );
        Response::build()
            .status(status)
            .sized_body(error.len(), Cursor::new(error))
            .header(ContentType::new("text", "html"))
            .ok()
    }
}
