//! Country lookup for visitor IP addresses.

use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;

/// Shown when an address cannot be resolved.
pub const UNKNOWN_COUNTRY: &str = "N/A";

#[derive(Debug, thiserror::Error)]
pub enum GeoIpError {
    #[error("failed to open GeoIP database: {0}")]
    Open(#[from] maxminddb::MaxMindDBError),
}

pub trait CountryLookup: Send + Sync {
    /// English country name for `ip`.
    ///
    /// Unresolvable addresses yield [`UNKNOWN_COUNTRY`]; a record without an
    /// English name yields an empty string.
    fn country(&self, ip: IpAddr) -> String;
}

/// Lookup backed by a MaxMind GeoLite2/GeoIP2 database file.
pub struct MaxMindCountryLookup {
    reader: Reader<Vec<u8>>,
}

impl MaxMindCountryLookup {
    /// # Errors
    /// Returns an error if the database file is missing or corrupt.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GeoIpError> {
        let reader = Reader::open_readfile(path)?;
        Ok(Self { reader })
    }
}

impl CountryLookup for MaxMindCountryLookup {
    fn country(&self, ip: IpAddr) -> String {
        match self.reader.lookup::<geoip2::Country>(ip) {
            Ok(record) => english_name(&record).unwrap_or_default().to_string(),
            Err(err) => {
                tracing::debug!(%ip, error = %err, "no GeoIP record");
                UNKNOWN_COUNTRY.to_string()
            }
        }
    }
}

fn english_name<'a>(record: &geoip2::Country<'a>) -> Option<&'a str> {
    record
        .country
        .as_ref()?
        .names
        .as_ref()?
        .get("en")
        .copied()
}

/// Used when no GeoIP database is configured.
pub struct NoCountryLookup;

impl CountryLookup for NoCountryLookup {
    fn country(&self, _ip: IpAddr) -> String {
        UNKNOWN_COUNTRY.to_string()
    }
}
