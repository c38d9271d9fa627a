//! Merge of the cloud device list into the configuration

use daikinbr_config::{Config, MergeOutcome};
use tracing::info;

use crate::account::CloudAccount;
use crate::error::CloudResult;

/// Counts of devices touched by a refresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub created: usize,
    pub updated: usize,
}

/// Fetch the account's things and merge them into `config`
///
/// Known things (by thing id) are updated in place, unknown ones are
/// appended. Devices absent from the account are kept.
pub async fn refresh_things(
    config: &mut Config,
    account: &dyn CloudAccount,
) -> CloudResult<RefreshSummary> {
    let things = account.fetch_things().await?;
    let mut summary = RefreshSummary::default();

    for thing in &things {
        match config.merge_thing(thing) {
            MergeOutcome::Updated => {
                info!(thing_id = %thing.id, apn = %thing.apn, "Updating device");
                summary.updated += 1;
            }
            MergeOutcome::Created => {
                info!(thing_id = %thing.id, apn = %thing.apn, "Creating device");
                summary.created += 1;
            }
        }
    }

    Ok(summary)
}
