//! Shared cross-component state types.

use serde::Serialize;

/// Observable sync status derived from the most recent bracket signals.
///
/// Overlapping reconciliations share one flag, so this reflects only the
/// latest started or completed call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Syncing,
    Synced,
    Error,
}
