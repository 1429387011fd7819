//! Error types for docgate

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::types::ErrorResponse;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing DB!")]
    MissingDb,

    #[error("Missing Collection!")]
    MissingCollection,

    #[error("Missing Action!")]
    MissingAction,

    #[error("Unknown Action!")]
    UnknownAction,

    #[error("Missing Query!")]
    MissingQuery,

    #[error("Missing Data!")]
    MissingData,

    #[error("Method Not Allowed!")]
    MethodNotAllowed,

    #[error("Not Found!")]
    NotFound,

    /// Path or body that never reached JSON decoding (bad percent-encoding, oversized body).
    #[error("{0}")]
    InvalidRequest(String),

    /// Body that could not be decoded as JSON; the decoder message is passed through.
    #[error("{0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("{0}")]
    InvalidDocument(String),

    #[error("{operation} exceeded its deadline of {budget:?}")]
    Timeout {
        operation: &'static str,
        budget: std::time::Duration,
    },

    /// Driver errors are surfaced verbatim.
    #[error("{0}")]
    Database(#[from] mongodb::error::Error),

    #[error("{0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<mongodb::bson::extjson::de::Error> for Error {
    fn from(err: mongodb::bson::extjson::de::Error) -> Self {
        Error::InvalidDocument(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}
