//! APN (access point name) helpers
//!
//! Devices announce themselves on the local network with a zeroconf APN such
//! as `DAIKIN:A07B79AB5497` (the MAC address, colon separators optional),
//! while the cloud knows the same device as `DAIKIN797BA0`: the `DAIKIN`
//! prefix followed by the last three bytes of the byte-reversed MAC.

/// Prefix of APNs announced over zeroconf
pub const ZEROCONF_APN_PREFIX: &str = "DAIKIN:";

/// Prefix of APNs stored in the cloud thing metadata
pub const THING_APN_PREFIX: &str = "DAIKIN";

/// Number of hex characters kept from the reversed MAC
const THING_APN_SUFFIX_LEN: usize = 6;

/// Convert a zeroconf APN to the cloud (thing) APN format
///
/// Values without the zeroconf prefix are returned unchanged. When the hex
/// part cannot be reversed (odd length, or not hex at all) the stripped
/// part is returned.
///
/// ```
/// use daikinbr_core::thing_apn_from_zeroconf;
///
/// assert_eq!(thing_apn_from_zeroconf("DAIKIN:A07B79AB5497"), "DAIKIN797BA0");
/// ```
pub fn thing_apn_from_zeroconf(zeroconf_apn: &str) -> String {
    let Some(hex) = zeroconf_apn.strip_prefix(ZEROCONF_APN_PREFIX) else {
        return zeroconf_apn.to_string();
    };

    match reverse_hex_pairs(hex) {
        Some(reversed) => {
            let start = reversed.len().saturating_sub(THING_APN_SUFFIX_LEN);
            format!("{}{}", THING_APN_PREFIX, &reversed[start..])
        }
        None => hex.to_string(),
    }
}

/// MQTT object id derived from an APN
pub fn mqtt_id_for_apn(apn: &str) -> String {
    apn.to_lowercase()
}

/// Reverse a hex string byte-wise (`A07B` -> `7BA0`), ignoring `:` separators
///
/// The result is plain ASCII, so it can be sliced by byte offsets.
fn reverse_hex_pairs(hex: &str) -> Option<String> {
    let cleaned: Vec<u8> = hex.bytes().filter(|b| *b != b':').collect();
    if cleaned.len() % 2 != 0 || !cleaned.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }

    Some(cleaned.chunks(2).rev().flatten().map(|b| *b as char).collect())
}
