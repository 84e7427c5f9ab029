//! Application configuration and API credentials.

use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use chrono_tz::Tz;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::registry::{EntitySpec, Position, SourceKind};

/// Environment variable holding the bus tracker key.
pub const BUS_KEY_VAR: &str = "CTA_BUS_KEY";
/// Environment variable holding the train tracker key.
pub const TRAIN_KEY_VAR: &str = "CTA_TRAIN_KEY";

const DEFAULT_CONFIG: &str = r#"# etaboard configuration
#
# Values here override the built-in defaults; ETABOARD_* environment
# variables override this file (e.g. ETABOARD_REFRESH_INTERVAL_SECS=30).
# API keys are read from CTA_BUS_KEY and CTA_TRAIN_KEY.

bus_api_url = "http://www.ctabustracker.com/bustime/api/v1/getpredictions"
train_api_url = "http://lapi.transitchicago.com/api/1.0/ttarrivals.aspx"
bike_api_url = "https://feeds.divvybikes.com/stations/stations.json"
timezone = "America/Chicago"
refresh_interval_secs = 15
request_timeout_secs = 10
bus_result_limit = 6
train_result_limit = 7
# display_duration_secs = 600

# Bike-share entries use the station id as `route` and its name as `stop`.

[[entities]]
kind = "train"
route = "Red"
stop = "30121"
label = "Red N"
position = { x = 2, y = 3 }

[[entities]]
kind = "train"
route = "Red"
stop = "30122"
label = "Red S"
position = { x = 42, y = 3 }

[[entities]]
kind = "train"
route = "Brn"
stop = "30155"
label = "Brown N"
position = { x = 2, y = 5 }

[[entities]]
kind = "train"
route = "Brn"
stop = "30156"
label = "Brown S"
position = { x = 42, y = 5 }

[[entities]]
kind = "train"
route = "P"
stop = "30155"
label = "Purple N"
position = { x = 2, y = 7 }

[[entities]]
kind = "train"
route = "P"
stop = "30156"
label = "Purple S"
position = { x = 42, y = 7 }

[[entities]]
kind = "bus"
route = "156"
stop = "1450"
label = "156 N"
position = { x = 2, y = 11 }

[[entities]]
kind = "bus"
route = "156"
stop = "1411"
label = "156 S"
position = { x = 42, y = 11 }

[[entities]]
kind = "bus"
route = "22"
stop = "1902"
label = "22 N"
position = { x = 2, y = 13 }

[[entities]]
kind = "bus"
route = "22"
stop = "1847"
label = "22 S"
position = { x = 42, y = 13 }

[[entities]]
kind = "bus"
route = "36"
stop = "1902"
label = "36 N"
position = { x = 2, y = 15 }

[[entities]]
kind = "bus"
route = "36"
stop = "1847"
label = "36 S"
position = { x = 42, y = 15 }

[[entities]]
kind = "bus"
route = "72"
stop = "923"
label = "72 W"
position = { x = 2, y = 17 }

[[entities]]
kind = "bike_share"
route = "266"
stop = "Wells St & Concord Ln"
label = "Wells/Concord"
position = { x = 2, y = 21 }

[[entities]]
kind = "bike_share"
route = "112"
stop = "Clark St & North Ave"
label = "Clark/North"
position = { x = 42, y = 21 }

[[entities]]
kind = "bike_share"
route = "268"
stop = "Wells St & Evergreen Ave"
label = "Wells/Evergreen"
position = { x = 2, y = 23 }

[[entities]]
kind = "bike_share"
route = "278"
stop = "Clark St & Schiller St"
label = "Clark/Schiller"
position = { x = 42, y = 23 }
"#;

#[rustfmt::skip]
const DEFAULT_CATALOG: &[(SourceKind, &str, &str, &str, u16, u16)] = &[
    (SourceKind::Train, "Red", "30121", "Red N", 2, 3),
    (SourceKind::Train, "Red", "30122", "Red S", 42, 3),
    (SourceKind::Train, "Brn", "30155", "Brown N", 2, 5),
    (SourceKind::Train, "Brn", "30156", "Brown S", 42, 5),
    (SourceKind::Train, "P", "30155", "Purple N", 2, 7),
    (SourceKind::Train, "P", "30156", "Purple S", 42, 7),
    (SourceKind::Bus, "156", "1450", "156 N", 2, 11),
    (SourceKind::Bus, "156", "1411", "156 S", 42, 11),
    (SourceKind::Bus, "22", "1902", "22 N", 2, 13),
    (SourceKind::Bus, "22", "1847", "22 S", 42, 13),
    (SourceKind::Bus, "36", "1902", "36 N", 2, 15),
    (SourceKind::Bus, "36", "1847", "36 S", 42, 15),
    (SourceKind::Bus, "72", "923", "72 W", 2, 17),
    (SourceKind::BikeShare, "266", "Wells St & Concord Ln", "Wells/Concord", 2, 21),
    (SourceKind::BikeShare, "112", "Clark St & North Ave", "Clark/North", 42, 21),
    (SourceKind::BikeShare, "268", "Wells St & Evergreen Ave", "Wells/Evergreen", 2, 23),
    (SourceKind::BikeShare, "278", "Clark St & Schiller St", "Clark/Schiller", 42, 23),
];

/// Built-in Chicago catalog used when no entities are configured.
pub fn default_catalog() -> Vec<EntitySpec> {
    DEFAULT_CATALOG
        .iter()
        .map(|&(kind, route, stop, label, x, y)| EntitySpec {
            kind,
            route: route.to_string(),
            stop: stop.to_string(),
            label: label.to_string(),
            position: Position { x, y },
        })
        .collect()
}

/// Runtime configuration for the board.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Bus tracker predictions endpoint.
    pub bus_api_url: String,
    /// Train tracker arrivals endpoint.
    pub train_api_url: String,
    /// Bike-share station feed.
    pub bike_api_url: String,
    /// IANA zone the transit timestamps are expressed in.
    pub timezone: String,
    /// Delay between the end of one pass and the start of the next.
    pub refresh_interval_secs: u64,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Close the board after this many seconds; run until exit when unset.
    pub display_duration_secs: Option<u64>,
    /// `top` parameter sent to the bus tracker.
    pub bus_result_limit: u32,
    /// `max` parameter sent to the train tracker.
    pub train_result_limit: u32,
    /// Monitored stops and stations.
    pub entities: Vec<EntitySpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bus_api_url: "http://www.ctabustracker.com/bustime/api/v1/getpredictions".to_string(),
            train_api_url: "http://lapi.transitchicago.com/api/1.0/ttarrivals.aspx".to_string(),
            bike_api_url: "https://feeds.divvybikes.com/stations/stations.json".to_string(),
            timezone: "America/Chicago".to_string(),
            refresh_interval_secs: 15,
            request_timeout_secs: 10,
            display_duration_secs: None,
            bus_result_limit: 6,
            train_result_limit: 7,
            entities: default_catalog(),
        }
    }
}

impl AppConfig {
    /// Load from the default config path, then `ETABOARD_*` overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path()?)
    }

    /// Load from `path` (optional on disk), then `ETABOARD_*` overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("ETABOARD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read config {}", path.display()))?;

        let mut config: AppConfig = settings
            .try_deserialize()
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        if config.entities.is_empty() {
            config.entities = default_catalog();
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            bail!("refresh_interval_secs must be greater than zero");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        self.zone()?;
        Ok(())
    }

    /// Source time zone.
    pub fn zone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|err| anyhow!("invalid timezone {:?}: {err}", self.timezone))
    }

    /// Delay between passes.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// How long the board stays up, if bounded.
    pub fn display_duration(&self) -> Option<Duration> {
        self.display_duration_secs.map(Duration::from_secs)
    }
}

/// Path of the user configuration file.
pub fn config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| anyhow!("unable to locate config directory"))?;
    Ok(base.join("etaboard").join("config.toml"))
}

/// Write the default configuration file if none exists yet.
pub fn ensure_default_config() -> Result<()> {
    write_default_config(config_path()?)
}

/// Write the default configuration to `path` unless a file is already there.
pub fn write_default_config(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config {}", path.display()))?;
    info!(path = %path.display(), "Wrote default configuration");
    Ok(())
}

/// Transit API keys supplied out-of-band.
#[derive(Clone)]
pub struct Credentials {
    /// Bus tracker key.
    pub bus_key: String,
    /// Train tracker key.
    pub train_key: String,
}

impl Credentials {
    /// Read both keys from the environment; either one missing is fatal.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bus_key: required_var(BUS_KEY_VAR)?,
            train_key: required_var(TRAIN_KEY_VAR)?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("bus_key", &"<redacted>")
            .field("train_key", &"<redacted>")
            .finish()
    }
}

fn required_var(name: &str) -> Result<String> {
    let value = env::var(name).with_context(|| format!("{name} is not set"))?;
    let value = value.trim();
    if value.is_empty() {
        bail!("{name} is empty");
    }
    Ok(value.to_string())
}
