//! Acceptance rules for remote upsert notifications.
//!
//! Revision timestamps are the only ordering key: a remote change wins only
//! over a strictly older local copy.

use crate::models::{Collection, Revisioned, SyncNotification};

/// Outcome of comparing a cipher notification with the local copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertDecision {
    Accept,
    Reject,
    /// Reject unless one of the notification's collections is visible locally
    VerifyCollections,
}

/// Whether a folder notification should overwrite local state.
pub fn folder_upsert_accepted(
    local: Option<&impl Revisioned>,
    notification: &SyncNotification,
    is_edit: bool,
) -> bool {
    match local {
        None => !is_edit,
        Some(local) => is_edit && local.is_older_than(notification.revision_date),
    }
}

/// Decide a cipher notification against the local copy.
///
/// Ciphers can move between personal and organization ownership, so a
/// rejected create or edit that names collections is re-checked against the
/// user's visible collections before it is finally rejected.
pub fn decide_cipher_upsert(
    local: Option<&impl Revisioned>,
    notification: &SyncNotification,
    is_edit: bool,
) -> UpsertDecision {
    let mut should_update =
        local.map_or(true, |local| local.is_older_than(notification.revision_date));

    let mut check_collections = false;
    if should_update {
        if is_edit {
            should_update = local.is_some();
            check_collections = true;
        } else if notification.has_organization_association() {
            should_update = false;
            check_collections = true;
        } else {
            should_update = local.is_none();
        }
    }

    if should_update {
        UpsertDecision::Accept
    } else if check_collections
        && notification.organization_id.is_some()
        && !notification.collection_ids().is_empty()
    {
        UpsertDecision::VerifyCollections
    } else {
        UpsertDecision::Reject
    }
}

/// Whether any collection named by the notification is visible to the user.
pub fn shares_visible_collection(
    notification: &SyncNotification,
    collections: &[Collection],
) -> bool {
    let wanted = notification.collection_ids();
    collections
        .iter()
        .any(|collection| wanted.contains(&collection.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Folder;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn local(revision_secs: i64) -> Folder {
        Folder {
            id: "r1".to_string(),
            name: "local".to_string(),
            revision_date: at(revision_secs),
        }
    }

    fn personal(revision_secs: i64) -> SyncNotification {
        SyncNotification::personal("r1", at(revision_secs))
    }

    fn shared(revision_secs: i64, collections: &[&str]) -> SyncNotification {
        SyncNotification::shared(
            "r1",
            "org-1",
            collections.iter().map(|id| (*id).to_string()).collect(),
            at(revision_secs),
        )
    }

    #[test]
    fn folder_create_accepted_only_without_local_copy() {
        let none: Option<&Folder> = None;
        for secs in [-10_000, 0, 10_000] {
            assert!(folder_upsert_accepted(none, &personal(secs), false));
        }
        assert!(!folder_upsert_accepted(Some(&local(0)), &personal(10), false));
    }

    #[test]
    fn folder_edit_requires_strictly_older_local_copy() {
        let none: Option<&Folder> = None;
        assert!(!folder_upsert_accepted(none, &personal(10), true));
        assert!(folder_upsert_accepted(Some(&local(0)), &personal(10), true));
        assert!(!folder_upsert_accepted(Some(&local(10)), &personal(10), true));
        assert!(!folder_upsert_accepted(Some(&local(20)), &personal(10), true));
    }

    #[test]
    fn folder_edit_compares_sub_second_revisions() {
        let mut older = local(10);
        older.revision_date -= Duration::milliseconds(1);
        assert!(folder_upsert_accepted(Some(&older), &personal(10), true));
    }

    #[test]
    fn duplicate_personal_create_is_rejected() {
        assert_eq!(
            decide_cipher_upsert(Some(&local(0)), &personal(10), false),
            UpsertDecision::Reject
        );
        let none: Option<&Folder> = None;
        assert_eq!(
            decide_cipher_upsert(none, &personal(10), false),
            UpsertDecision::Accept
        );
    }

    #[test]
    fn shared_create_needs_collection_check() {
        let none: Option<&Folder> = None;
        assert_eq!(
            decide_cipher_upsert(none, &shared(10, &["col-a"]), false),
            UpsertDecision::VerifyCollections
        );
        assert_eq!(
            decide_cipher_upsert(none, &shared(10, &[]), false),
            UpsertDecision::Reject
        );
    }

    #[test]
    fn edit_of_newer_local_copy_is_rejected_outright() {
        assert_eq!(
            decide_cipher_upsert(Some(&local(10)), &shared(10, &["col-a"]), true),
            UpsertDecision::Reject
        );
        assert_eq!(
            decide_cipher_upsert(Some(&local(0)), &personal(10), true),
            UpsertDecision::Accept
        );
    }

    #[test]
    fn edit_of_unknown_shared_cipher_checks_collections() {
        let none: Option<&Folder> = None;
        assert_eq!(
            decide_cipher_upsert(none, &shared(10, &["col-a"]), true),
            UpsertDecision::VerifyCollections
        );
        assert_eq!(
            decide_cipher_upsert(none, &personal(10), true),
            UpsertDecision::Reject
        );
    }

    #[test]
    fn organization_without_collection_list_is_treated_as_personal() {
        let mut notification = personal(10);
        notification.organization_id = Some("org-1".to_string());
        let none: Option<&Folder> = None;
        assert_eq!(
            decide_cipher_upsert(none, &notification, false),
            UpsertDecision::Accept
        );
    }

    #[test]
    fn visible_collection_intersection() {
        let collections = vec![Collection {
            id: "col-b".to_string(),
            organization_id: "org-1".to_string(),
            name: "Engineering".to_string(),
        }];
        assert!(shares_visible_collection(
            &shared(0, &["col-a", "col-b"]),
            &collections
        ));
        assert!(!shares_visible_collection(&shared(0, &["col-a"]), &collections));
        assert!(!shares_visible_collection(&shared(0, &["col-b"]), &[]));
    }
}
