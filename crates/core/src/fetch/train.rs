use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use super::{child_texts, parse_xml, FetchContext, Readings};
use crate::{
    error::FetchError,
    normalize::{minutes_until, TimestampFormat},
    reading::ArrivalReading,
    registry::MonitoredEntity,
    transport::Transport,
};

/// Parse a `ttarrivals` response.
///
/// At least one `eta/staNm` node marks a valid stop with predictions; without
/// one the stop reports [`FetchError::NoDataAvailable`].
pub fn parse_arrivals(
    body: &str,
    zone: Tz,
    now: DateTime<Utc>,
) -> Result<ArrivalReading, FetchError> {
    let doc = parse_xml(body)?;
    if child_texts(&doc, "eta", "staNm").is_empty() {
        if let Some(reason) = doc
            .root_element()
            .children()
            .find(|node| node.has_tag_name("errNm"))
            .and_then(|node| node.text())
        {
            debug!(reason, "Train tracker returned no arrivals");
        }
        return Err(FetchError::NoDataAvailable);
    }

    let minutes = child_texts(&doc, "eta", "arrT")
        .into_iter()
        .map(|raw| minutes_until(raw, TimestampFormat::Train, zone, now))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ArrivalReading::Minutes(minutes))
}

/// One request per train stop; failures stay with the stop that produced them.
pub async fn fetch<T: Transport>(
    ctx: &FetchContext<'_, T>,
    key: &str,
    entities: &[&MonitoredEntity],
) -> Readings {
    let limit = ctx.endpoints.train_limit.to_string();
    let mut readings = Readings::with_capacity(entities.len());
    for entity in entities {
        let query = [
            ("key", key),
            ("stpid", entity.stop.as_str()),
            ("rt", entity.route.as_str()),
            ("max", limit.as_str()),
        ];
        let result = match ctx.transport.get(&ctx.endpoints.train, &query).await {
            Ok(body) => parse_arrivals(&body, ctx.zone, ctx.now),
            Err(err) => Err(err),
        };
        match &result {
            Err(FetchError::NoDataAvailable) => {
                debug!(entity = %entity.id, "No train arrivals predicted")
            }
            Err(err) => warn!(entity = %entity.id, %err, "Train fetch failed"),
            Ok(_) => {}
        }
        readings.push((entity.id.clone(), result.into()));
    }
    readings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fetch::Endpoints,
        registry::{tests::spec, SourceKind},
        transport::tests::ScriptedTransport,
    };
    use chrono_tz::US::Central;

    const URL: &str = "http://train.test/ttarrivals.aspx";

    fn now() -> DateTime<Utc> {
        "2024-01-01T16:00:00Z".parse::<DateTime<Utc>>().unwrap()
    }

    const ARRIVALS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ctatt>
  <tmst>20240101 10:00:00</tmst>
  <errCd>0</errCd>
  <errNm />
  <eta><staId>40630</staId><staNm>Clark/Division</staNm><rt>Red</rt><arrT>20240101 10:01:29</arrT></eta>
  <eta><staId>40630</staId><staNm>Clark/Division</staNm><rt>Red</rt><arrT>20240101 10:09:00</arrT></eta>
  <eta><staId>40630</staId><staNm>Clark/Division</staNm><rt>Red</rt><arrT>20240101 09:59:30</arrT></eta>
</ctatt>"#;

    #[test]
    fn arrivals_become_minutes() {
        let reading = parse_arrivals(ARRIVALS, Central, now()).unwrap();
        assert_eq!(reading, ArrivalReading::Minutes(vec![1, 9, 0]));
    }

    #[test]
    fn missing_station_name_means_none() {
        let body = r#"<ctatt><tmst>20240101 10:00:00</tmst><errCd>0</errCd><errNm /></ctatt>"#;
        let err = parse_arrivals(body, Central, now()).unwrap_err();
        assert_eq!(err, FetchError::NoDataAvailable);
        let reading: ArrivalReading = Err(err).into();
        assert_eq!(reading.display_text(), "None");
    }

    #[test]
    fn invalid_stop_error_is_still_none() {
        let body = r#"<ctatt><errCd>101</errCd><errNm>Invalid stop id</errNm></ctatt>"#;
        assert_eq!(
            parse_arrivals(body, Central, now()).unwrap_err(),
            FetchError::NoDataAvailable
        );
    }

    #[test]
    fn bus_style_timestamp_is_malformed() {
        let body = "<ctatt><eta><staNm>Belmont</staNm><arrT>20240101 10:05</arrT></eta></ctatt>";
        assert!(matches!(
            parse_arrivals(body, Central, now()),
            Err(FetchError::MalformedTimestamp { .. })
        ));
    }

    #[tokio::test]
    async fn requests_carry_train_limit() {
        let transport = ScriptedTransport::default().respond(URL, "Red:30121", ARRIVALS);
        let endpoints = Endpoints {
            bus: "http://bus.test".to_string(),
            train: URL.to_string(),
            bike: "http://bike.test".to_string(),
            bus_limit: 6,
            train_limit: 7,
        };
        let ctx = FetchContext {
            transport: &transport,
            endpoints: &endpoints,
            zone: Central,
            now: now(),
        };
        let red: MonitoredEntity = spec(SourceKind::Train, "Red", "30121").into();
        let readings = fetch(&ctx, "train-key", &[&red]).await;

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].1.display_text(), "1, 9, 0");
        let calls = transport.calls.borrow();
        assert!(calls[0].1.contains(&("max".to_string(), "7".to_string())));
        assert!(calls[0].1.contains(&("key".to_string(), "train-key".to_string())));
    }
}
