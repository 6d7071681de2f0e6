//! Remote change notification model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A remote create/update/delete announcement for a folder or cipher.
///
/// Consumed once per reconciliation call and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncNotification {
    /// Record identifier
    pub id: String,
    /// Owning organization, when the record is shared
    #[serde(default)]
    pub organization_id: Option<String>,
    /// Collections the record belongs to, when the record is shared
    #[serde(default)]
    pub collection_ids: Option<Vec<String>>,
    /// Server-assigned revision timestamp of the change
    pub revision_date: DateTime<Utc>,
}

impl SyncNotification {
    /// Notification for a record with no organization association.
    #[must_use]
    pub fn personal(id: impl Into<String>, revision_date: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            organization_id: None,
            collection_ids: None,
            revision_date,
        }
    }

    /// Notification for a record shared through organization collections.
    #[must_use]
    pub fn shared(
        id: impl Into<String>,
        organization_id: impl Into<String>,
        collection_ids: Vec<String>,
        revision_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            organization_id: Some(organization_id.into()),
            collection_ids: Some(collection_ids),
            revision_date,
        }
    }

    /// Whether the notification carries both an organization and collection list.
    #[must_use]
    pub const fn has_organization_association(&self) -> bool {
        self.organization_id.is_some() && self.collection_ids.is_some()
    }

    /// Collection ids named by the notification, empty when personal.
    #[must_use]
    pub fn collection_ids(&self) -> &[String] {
        self.collection_ids.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_camel_case_payload() {
        let payload = r#"{
            "id": "c1",
            "organizationId": "org-1",
            "collectionIds": ["col-a"],
            "revisionDate": "2024-03-01T10:00:00.000Z"
        }"#;
        let notification: SyncNotification = serde_json::from_str(payload).unwrap();
        assert_eq!(notification.id, "c1");
        assert_eq!(notification.collection_ids(), ["col-a".to_string()]);
        assert!(notification.has_organization_association());
        assert_eq!(
            notification.revision_date,
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn organization_without_collections_is_not_associated() {
        let mut notification = SyncNotification::personal("c1", Utc::now());
        notification.organization_id = Some("org-1".to_string());
        assert!(!notification.has_organization_association());
        assert!(notification.collection_ids().is_empty());
    }
}
