//! Failure taxonomy for a single entity fetch.

use thiserror::Error;

/// Reasons a monitored entity could not produce a reading this pass.
///
/// None of these abort a refresh pass; each one is confined to the entity it
/// belongs to and rendered through [`FetchError::display_label`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// An arrival timestamp did not match the expected upstream format.
    #[error("malformed timestamp {value:?} (expected {format})")]
    MalformedTimestamp {
        /// Raw text as received.
        value: String,
        /// `strftime` pattern it was parsed against.
        format: &'static str,
    },

    /// The response body could not be parsed as XML/JSON.
    #[error("malformed response: {0}")]
    MalformedDocument(String),

    /// The upstream API returned an explicit error message.
    #[error("upstream error: {0}")]
    UpstreamError(String),

    /// A train stop has no predicted arrivals (or the stop id is unknown).
    #[error("no arrivals predicted")]
    NoDataAvailable,

    /// A configured bike-share station is absent from the station feed.
    #[error("station {0} not found in feed")]
    StationNotFound(String),

    /// The request could not complete (connect failure, timeout, bad status).
    #[error("network failure: {0}")]
    NetworkFailure(String),
}

impl FetchError {
    /// Short text shown on the board in place of a value.
    pub fn display_label(&self) -> String {
        match self {
            FetchError::UpstreamError(message) => message.clone(),
            FetchError::NoDataAvailable => "None".to_string(),
            FetchError::NetworkFailure(_) => "Unavailable".to_string(),
            FetchError::MalformedTimestamp { .. } => "Bad time".to_string(),
            FetchError::MalformedDocument(_) => "Bad response".to_string(),
            FetchError::StationNotFound(_) => "No station".to_string(),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::NetworkFailure("request timed out".to_string())
        } else {
            FetchError::NetworkFailure(err.to_string())
        }
    }
}
