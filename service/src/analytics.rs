//! Visitor details captured from incoming requests.

use axum::http::{header::USER_AGENT, HeaderMap};
use std::net::IpAddr;
use woothee::parser::Parser;

use crate::geo::{CountryLookup, UNKNOWN_COUNTRY};
use crate::models::{escape_html, NewVisitor};
use crate::validator::HeaderValidator;

/// Value woothee reports for fields it cannot detect.
const WOOTHEE_UNKNOWN: &str = "UNKNOWN";

/// Browser and operating system derived from a `User-Agent` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub browser: String,
    pub operating_system: String,
}

impl ClientInfo {
    fn unknown() -> Self {
        Self {
            browser: UNKNOWN_COUNTRY.to_string(),
            operating_system: UNKNOWN_COUNTRY.to_string(),
        }
    }
}

/// Parse a user agent string. Browser is name and version concatenated;
/// anything undetected is reported as `N/A`.
#[must_use]
pub fn parse_user_agent(user_agent: &str) -> ClientInfo {
    let parser = Parser::new();
    let Some(result) = parser.parse(user_agent) else {
        return ClientInfo::unknown();
    };

    let known = |value: &str| !value.is_empty() && value != WOOTHEE_UNKNOWN;

    let browser = if known(result.name) && known(result.version) {
        format!("{}{}", result.name, result.version)
    } else {
        UNKNOWN_COUNTRY.to_string()
    };
    let operating_system = if known(result.os) {
        result.os.to_string()
    } else {
        UNKNOWN_COUNTRY.to_string()
    };

    ClientInfo {
        browser,
        operating_system,
    }
}

/// Client details from the request's `User-Agent` header.
///
/// The header is re-validated as a `User-Agent: value` line first; a line
/// that fails validation is discarded entirely.
#[must_use]
pub fn client_info(validator: &HeaderValidator, headers: &HeaderMap) -> ClientInfo {
    let Some(value) = headers.get(USER_AGENT) else {
        return ClientInfo::unknown();
    };

    // Header bytes outside ASCII are read as Latin-1 so the validator sees
    // the same code points the client sent.
    let value: String = value.as_bytes().iter().map(|&b| char::from(b)).collect();
    if !validator.is_valid(&format!("User-Agent: {value}")) {
        tracing::debug!("discarding invalid User-Agent header");
        return ClientInfo::unknown();
    }

    parse_user_agent(&value)
}

/// Build the visitor row for a request, HTML-escaping every field.
#[must_use]
pub fn capture_visitor(
    validator: &HeaderValidator,
    lookup: &dyn CountryLookup,
    remote_ip: Option<IpAddr>,
    headers: &HeaderMap,
) -> NewVisitor {
    let country = remote_ip.map_or_else(|| UNKNOWN_COUNTRY.to_string(), |ip| lookup.country(ip));
    let client = client_info(validator, headers);

    NewVisitor {
        country: escape_html(&country),
        browser: escape_html(&client.browser),
        operating_system: escape_html(&client.operating_system),
    }
}
