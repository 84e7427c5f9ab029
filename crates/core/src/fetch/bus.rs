use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

use super::{child_texts, parse_xml, FetchContext, Readings};
use crate::{
    error::FetchError,
    normalize::{minutes_until, TimestampFormat},
    reading::ArrivalReading,
    registry::MonitoredEntity,
    transport::Transport,
};

/// Parse a `getpredictions` response.
///
/// An `error/msg` node wins over any predictions in the same document.
pub fn parse_predictions(
    body: &str,
    zone: Tz,
    now: DateTime<Utc>,
) -> Result<ArrivalReading, FetchError> {
    let doc = parse_xml(body)?;
    if let Some(message) = child_texts(&doc, "error", "msg").first() {
        return Err(FetchError::UpstreamError(message.to_string()));
    }

    let minutes = child_texts(&doc, "prd", "prdtm")
        .into_iter()
        .map(|raw| minutes_until(raw, TimestampFormat::Bus, zone, now))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ArrivalReading::Minutes(minutes))
}

/// One request per bus stop; failures stay with the stop that produced them.
pub async fn fetch<T: Transport>(
    ctx: &FetchContext<'_, T>,
    key: &str,
    entities: &[&MonitoredEntity],
) -> Readings {
    let limit = ctx.endpoints.bus_limit.to_string();
    let mut readings = Readings::with_capacity(entities.len());
    for entity in entities {
        let query = [
            ("key", key),
            ("stpid", entity.stop.as_str()),
            ("rt", entity.route.as_str()),
            ("top", limit.as_str()),
        ];
        let result = match ctx.transport.get(&ctx.endpoints.bus, &query).await {
            Ok(body) => parse_predictions(&body, ctx.zone, ctx.now),
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            warn!(entity = %entity.id, %err, "Bus fetch failed");
        }
        readings.push((entity.id.clone(), result.into()));
    }
    readings
}
