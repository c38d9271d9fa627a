//! Vendor cloud integration
//!
//! Fetches the things (devices) registered in a Daikin Smart AC account,
//! including their pairing keys, and merges them into the configuration.

mod account;
mod error;
mod refresh;
mod things;

pub use account::{
    AccountSession, CloudAccount, CloudSettings, IotalabsAccount, DEFAULT_REGION,
    REQUIRED_SETTINGS,
};
pub use error::{CloudError, CloudResult};
pub use refresh::{refresh_things, RefreshSummary};
pub use things::parse_things;
