use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{FetchContext, Readings};
use crate::{
    error::FetchError,
    reading::ArrivalReading,
    registry::MonitoredEntity,
    transport::Transport,
};

/// Decoded bike-share station feed.
///
/// Entries stay as raw JSON so one malformed station only fails the
/// configured station that resolves to it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationFeed {
    /// Every station the operator publishes.
    pub station_bean_list: Vec<Value>,
}

/// Counts carried by one station entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationBean {
    /// Bikes ready to rent.
    pub available_bikes: u32,
    /// Empty docks.
    pub available_docks: u32,
}

fn id_text(station: &Value) -> Option<String> {
    match station.get("id")? {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Decode the station feed body.
pub fn parse_feed(body: &str) -> Result<StationFeed, FetchError> {
    serde_json::from_str(body).map_err(|err| FetchError::MalformedDocument(err.to_string()))
}

/// Find `station_id` in the feed.
///
/// Stations are matched on their `id` field. Only when the entry at position
/// `station_id` has no id at all is the configured id taken as an array index,
/// which is how id-less feeds were addressed.
pub fn lookup(feed: &StationFeed, station_id: &str) -> Result<ArrivalReading, FetchError> {
    let wanted = station_id.trim();
    let by_id = feed
        .station_bean_list
        .iter()
        .find(|station| id_text(station).as_deref() == Some(wanted));

    let by_index = || {
        let index = wanted.parse::<usize>().ok()?;
        feed.station_bean_list
            .get(index)
            .filter(|station| station.get("id").is_none())
    };

    let station = by_id
        .or_else(by_index)
        .ok_or_else(|| FetchError::StationNotFound(wanted.to_string()))?;
    let bean = StationBean::deserialize(station).map_err(|err| {
        FetchError::MalformedDocument(format!("station {wanted}: {err}"))
    })?;
    Ok(ArrivalReading::Availability {
        bikes: bean.available_bikes,
        docks: bean.available_docks,
    })
}

/// A single feed request serves every configured station.
pub async fn fetch<T: Transport>(
    ctx: &FetchContext<'_, T>,
    entities: &[&MonitoredEntity],
) -> Readings {
    if entities.is_empty() {
        return Readings::new();
    }

    let feed = match ctx.transport.get(&ctx.endpoints.bike, &[]).await {
        Ok(body) => parse_feed(&body),
        Err(err) => Err(err),
    };

    entities
        .iter()
        .map(|entity| {
            let result = feed
                .as_ref()
                .map_err(Clone::clone)
                .and_then(|feed| lookup(feed, &entity.route));
            if let Err(err) = &result {
                warn!(entity = %entity.id, %err, "Bike-share lookup failed");
            }
            (entity.id.clone(), result.into())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fetch::Endpoints,
        registry::{tests::spec, SourceKind},
        transport::tests::ScriptedTransport,
    };
    use chrono::Utc;
    use chrono_tz::US::Central;
    use serde_json::json;

    const URL: &str = "http://bike.test/stations.json";

    fn legacy_feed() -> String {
        let stations = (0..10)
            .map(|index| {
                if index == 7 {
                    json!({"availableBikes": 3, "availableDocks": 11})
                } else {
                    json!({"availableBikes": index, "availableDocks": 0})
                }
            })
            .collect::<Vec<_>>();
        json!({ "executionTime": "2024-01-01 10:00:00 AM", "stationBeanList": stations })
            .to_string()
    }

    #[test]
    fn legacy_feed_is_addressed_by_index() {
        let feed = parse_feed(&legacy_feed()).unwrap();
        let reading = lookup(&feed, "7").unwrap();
        assert_eq!(reading.display_text(), "3 / 11");
    }

    #[test]
    fn identified_stations_are_matched_by_id_not_position() {
        let body = json!({
            "stationBeanList": [
                {"id": 5, "availableBikes": 1, "availableDocks": 2},
                {"id": "278", "availableBikes": 9, "availableDocks": 6},
                {"id": 1, "availableBikes": 4, "availableDocks": 4}
            ]
        })
        .to_string();
        let feed = parse_feed(&body).unwrap();
        assert_eq!(lookup(&feed, "278").unwrap().display_text(), "9 / 6");
        assert_eq!(lookup(&feed, "1").unwrap().display_text(), "4 / 4");
        // Position 2 holds station 1, not station 2.
        assert_eq!(
            lookup(&feed, "2").unwrap_err(),
            FetchError::StationNotFound("2".to_string())
        );
    }

    #[test]
    fn malformed_sibling_only_fails_its_own_station() {
        let body = json!({
            "stationBeanList": [
                {"id": 1, "availableBikes": 4, "availableDocks": 4},
                {"id": 2, "availableBikes": null, "availableDocks": 9}
            ]
        })
        .to_string();
        let feed = parse_feed(&body).unwrap();
        assert_eq!(lookup(&feed, "1").unwrap().display_text(), "4 / 4");

        let reading: ArrivalReading = lookup(&feed, "2").into();
        assert!(matches!(
            reading,
            ArrivalReading::Unavailable(FetchError::MalformedDocument(_))
        ));
        assert_eq!(reading.display_text(), "Bad response");
    }

    #[test]
    fn out_of_range_station_is_not_found() {
        let feed = parse_feed(&legacy_feed()).unwrap();
        let err = lookup(&feed, "268").unwrap_err();
        let reading: ArrivalReading = Err(err).into();
        assert_eq!(reading.display_text(), "No station");
    }

    #[test]
    fn feed_without_station_list_is_malformed() {
        assert!(matches!(
            parse_feed(r#"{"data": []}"#),
            Err(FetchError::MalformedDocument(_))
        ));
    }

    #[tokio::test]
    async fn one_request_serves_all_stations() {
        let transport = ScriptedTransport::default().respond(URL, "", &legacy_feed());
        let endpoints = Endpoints {
            bus: "http://bus.test".to_string(),
            train: "http://train.test".to_string(),
            bike: URL.to_string(),
            bus_limit: 6,
            train_limit: 7,
        };
        let ctx = FetchContext {
            transport: &transport,
            endpoints: &endpoints,
            zone: Central,
            now: Utc::now(),
        };
        let found: MonitoredEntity = spec(SourceKind::BikeShare, "7", "Somewhere").into();
        let missing: MonitoredEntity = spec(SourceKind::BikeShare, "278", "Elsewhere").into();
        let other: MonitoredEntity = spec(SourceKind::BikeShare, "2", "Nearby").into();
        let readings = fetch(&ctx, &[&found, &missing, &other]).await;

        assert_eq!(transport.call_count(URL), 1);
        assert_eq!(readings[0].1.display_text(), "3 / 11");
        assert_eq!(readings[1].1.display_text(), "No station");
        assert_eq!(readings[2].1.display_text(), "2 / 0");
    }

    #[tokio::test]
    async fn failed_feed_marks_every_station() {
        let transport = ScriptedTransport::default();
        let endpoints = Endpoints {
            bus: String::new(),
            train: String::new(),
            bike: URL.to_string(),
            bus_limit: 6,
            train_limit: 7,
        };
        let ctx = FetchContext {
            transport: &transport,
            endpoints: &endpoints,
            zone: Central,
            now: Utc::now(),
        };
        let a: MonitoredEntity = spec(SourceKind::BikeShare, "1", "A").into();
        let b: MonitoredEntity = spec(SourceKind::BikeShare, "2", "B").into();
        let readings = fetch(&ctx, &[&a, &b]).await;
        assert!(readings.iter().all(|(_, reading)| reading.is_failure()));
        assert_eq!(transport.call_count(URL), 1);
    }
}
