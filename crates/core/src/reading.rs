//! Fetch outcomes and their board text.

use crate::error::FetchError;

/// Text shown for an entity before its first fetch completes.
pub const LOADING_TEXT: &str = "Loading";

/// Latest fetch outcome for one monitored entity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ArrivalReading {
    /// No pass has completed yet.
    #[default]
    Loading,
    /// Minutes until each predicted arrival, soonest first.
    Minutes(Vec<u32>),
    /// Bike-share station counts.
    Availability {
        /// Bikes ready to rent.
        bikes: u32,
        /// Empty docks.
        docks: u32,
    },
    /// The fetch failed; the error decides the board text.
    Unavailable(FetchError),
}

impl ArrivalReading {
    /// Human-readable board text for this reading.
    pub fn display_text(&self) -> String {
        match self {
            ArrivalReading::Loading => LOADING_TEXT.to_string(),
            ArrivalReading::Minutes(minutes) => minutes
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            ArrivalReading::Availability { bikes, docks } => format!("{bikes} / {docks}"),
            ArrivalReading::Unavailable(err) => err.display_label(),
        }
    }

    /// Whether the reading represents a failed fetch.
    pub fn is_failure(&self) -> bool {
        matches!(self, ArrivalReading::Unavailable(_))
    }
}

impl From<Result<ArrivalReading, FetchError>> for ArrivalReading {
    fn from(result: Result<ArrivalReading, FetchError>) -> Self {
        result.unwrap_or_else(ArrivalReading::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_join_with_commas() {
        let reading = ArrivalReading::Minutes(vec![3, 10, 24]);
        assert_eq!(reading.display_text(), "3, 10, 24");
    }

    #[test]
    fn empty_prediction_list_is_blank() {
        assert_eq!(ArrivalReading::Minutes(Vec::new()).display_text(), "");
    }

    #[test]
    fn availability_shows_bikes_over_docks() {
        let reading = ArrivalReading::Availability { bikes: 3, docks: 11 };
        assert_eq!(reading.display_text(), "3 / 11");
    }

    #[test]
    fn default_is_loading() {
        assert_eq!(ArrivalReading::default().display_text(), "Loading");
    }

    #[test]
    fn failures_use_error_label() {
        let reading: ArrivalReading =
            Err(FetchError::StationNotFound("278".to_string())).into();
        assert!(reading.is_failure());
        assert_eq!(reading.display_text(), "No station");
    }
}
