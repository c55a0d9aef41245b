use chrono::NaiveDate;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::VenueId;
use crate::scanner::debouncer::{DEFAULT_DISPLAY_DURATION, DEFAULT_QUIET_INTERVAL};
use crate::services::allocator::DEFAULT_MAX_ATTEMPTS;
use crate::services::gate::DEFAULT_LOOKUP_TIMEOUT;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    /// Without a database URL the server runs on an in-memory ledger.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub port: u16,
    pub allocation_max_attempts: u32,
    pub scan: ScanConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),
            port: env_or("PORT", DEFAULT_PORT),
            allocation_max_attempts: env_or("ALLOCATION_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
            scan: ScanConfig::from_env(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            port: DEFAULT_PORT,
            allocation_max_attempts: DEFAULT_MAX_ATTEMPTS,
            scan: ScanConfig::default(),
        }
    }
}

/// Door-side settings shared by the redemption endpoint and scanner devices.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub quiet_interval: Duration,
    pub display_duration: Duration,
    pub lookup_timeout: Duration,
    pub show_ticket_details: bool,
    /// Fixes "today" for rehearsals. Unset on a live door.
    pub pinned_date: Option<NaiveDate>,
    pub venue_id: Option<VenueId>,
}

impl ScanConfig {
    pub fn from_env() -> Self {
        let pinned_date = env::var("SCAN_PINNED_DATE").ok().and_then(|raw| {
            match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
                Ok(date) => {
                    tracing::warn!(%date, "Scanning pinned to a fixed operating day");
                    Some(date)
                }
                Err(e) => {
                    tracing::warn!("Config: ignoring SCAN_PINNED_DATE '{}': {}", raw, e);
                    None
                }
            }
        });

        Self {
            quiet_interval: millis_or("SCAN_QUIET_INTERVAL_MS", DEFAULT_QUIET_INTERVAL),
            display_duration: millis_or("SCAN_DISPLAY_MS", DEFAULT_DISPLAY_DURATION),
            lookup_timeout: millis_or("SCAN_LOOKUP_TIMEOUT_MS", DEFAULT_LOOKUP_TIMEOUT),
            show_ticket_details: env_or("SCAN_SHOW_DETAILS", false),
            pinned_date,
            venue_id: env::var("SCANNER_VENUE_ID")
                .ok()
                .map(VenueId::new)
                .filter(|id| !id.is_blank()),
        }
    }

    /// The calendar day redemptions are checked against.
    pub fn operating_day(&self) -> NaiveDate {
        self.pinned_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            quiet_interval: DEFAULT_QUIET_INTERVAL,
            display_duration: DEFAULT_DISPLAY_DURATION,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            show_ticket_details: false,
            pinned_date: None,
            venue_id: None,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => parse_or(key, &raw, default),
        Err(_) => default,
    }
}

fn millis_or(key: &str, default: Duration) -> Duration {
    let millis = env_or(key, u64::try_from(default.as_millis()).unwrap_or(u64::MAX));
    Duration::from_millis(millis)
}

fn parse_or<T: FromStr>(key: &str, raw: &str, default: T) -> T {
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Config: invalid value '{}' for {}, using default", raw, key);
            default
        }
    }
}
