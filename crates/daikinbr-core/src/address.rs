//! Device address normalisation

use thiserror::Error;
use url::Url;

/// TCP port of the local AC control API
pub const DEVICE_API_PORT: u16 = 15914;

/// Errors produced while turning a configured address into a URL
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid device address '{address}': {source}")]
    Invalid {
        address: String,
        #[source]
        source: url::ParseError,
    },

    #[error("device address '{address}' has no host")]
    MissingHost { address: String },
}

/// Build the base URL of a device's local API
///
/// - an empty address falls back to the mDNS name `http://<apn>.local.:15914`
/// - a bare host gets the `http://` scheme
/// - an address without an explicit port gets [`DEVICE_API_PORT`]
pub fn device_url(address: &str, apn: &str) -> Result<Url, AddressError> {
    let address = address.trim();

    let mut normalized = if address.is_empty() {
        format!("http://{}.local.:{}", apn, DEVICE_API_PORT)
    } else {
        address.to_string()
    };

    if !normalized.starts_with("http") {
        normalized = format!("http://{}", normalized);
    }

    if !has_explicit_port(&normalized) {
        normalized = insert_port(&normalized, DEVICE_API_PORT);
    }

    let url = Url::parse(&normalized).map_err(|source| AddressError::Invalid {
        address: address.to_string(),
        source,
    })?;

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(AddressError::MissingHost {
            address: address.to_string(),
        });
    }

    Ok(url)
}

/// Split `scheme://authority/rest` into (`scheme://`, authority, `/rest`)
fn split_authority(url: &str) -> (&str, &str, &str) {
    let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
    let (scheme, rest) = url.split_at(scheme_end);
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    (scheme, authority, tail)
}

fn has_explicit_port(url: &str) -> bool {
    let (_, authority, _) = split_authority(url);
    let host_port = authority.rsplit('@').next().unwrap_or(authority);

    // IPv6 literal: the port follows the closing bracket
    if let Some(end) = host_port.rfind(']') {
        return host_port[end + 1..].starts_with(':');
    }
    host_port.contains(':')
}

fn insert_port(url: &str, port: u16) -> String {
    let (scheme, authority, tail) = split_authority(url);
    format!("{}{}:{}{}", scheme, authority, port, tail)
}
