//! Source fetchers: one per upstream API family.

/// Bike-share station feed.
pub mod bike;
/// Bus tracker predictions.
pub mod bus;
/// Train tracker arrivals.
pub mod train;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use roxmltree::Document;

use crate::{
    config::AppConfig,
    error::FetchError,
    reading::ArrivalReading,
    registry::EntityId,
};

/// Readings produced by one fetcher for the entities it owns.
pub type Readings = Vec<(EntityId, ArrivalReading)>;

/// Upstream endpoints and result caps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Bus tracker predictions URL.
    pub bus: String,
    /// Train tracker arrivals URL.
    pub train: String,
    /// Bike-share station feed URL.
    pub bike: String,
    /// Maximum predictions requested per bus stop.
    pub bus_limit: u32,
    /// Maximum arrivals requested per train stop.
    pub train_limit: u32,
}

impl From<&AppConfig> for Endpoints {
    fn from(config: &AppConfig) -> Self {
        Self {
            bus: config.bus_api_url.clone(),
            train: config.train_api_url.clone(),
            bike: config.bike_api_url.clone(),
            bus_limit: config.bus_result_limit,
            train_limit: config.train_result_limit,
        }
    }
}

/// Inputs shared by every fetcher during one pass.
pub struct FetchContext<'a, T> {
    /// Request transport.
    pub transport: &'a T,
    /// Endpoints and caps.
    pub endpoints: &'a Endpoints,
    /// Zone the upstream timestamps are expressed in.
    pub zone: Tz,
    /// Reference instant for the whole pass.
    pub now: DateTime<Utc>,
}

pub(crate) fn parse_xml(body: &str) -> Result<Document<'_>, FetchError> {
    Document::parse(body).map_err(|err| FetchError::MalformedDocument(err.to_string()))
}

/// Text of every `<parent>/<child>` element directly beneath the root, in
/// document order.
pub(crate) fn child_texts<'a>(doc: &'a Document<'_>, parent: &str, child: &str) -> Vec<&'a str> {
    doc.root_element()
        .children()
        .filter(|node| node.has_tag_name(parent))
        .flat_map(|node| node.children().filter(|inner| inner.has_tag_name(child)))
        .map(|node| node.text().unwrap_or("").trim())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_texts_follow_document_order() {
        let doc = parse_xml(
            "<root><prd><prdtm>a</prdtm></prd><other><prdtm>x</prdtm></other>\
             <prd><prdtm> b </prdtm><prdtm>c</prdtm></prd></root>",
        )
        .unwrap();
        assert_eq!(child_texts(&doc, "prd", "prdtm"), vec!["a", "b", "c"]);
        assert!(child_texts(&doc, "error", "msg").is_empty());
    }

    #[test]
    fn invalid_xml_is_malformed_document() {
        assert!(matches!(
            parse_xml("<root><open></root>"),
            Err(FetchError::MalformedDocument(_))
        ));
    }
}
