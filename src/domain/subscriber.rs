use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_status::SubscriberStatus;

/// One row per email address, for the whole lifetime of that address:
/// re-subscription reuses the row instead of creating a new one.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: SubscriberEmail,
    pub status: SubscriberStatus,
    /// Present only while the subscriber is pending; cleared on confirmation.
    pub confirm_token: Option<String>,
    pub confirm_token_expires_at: Option<DateTime<Utc>>,
    /// Issued once at row creation, never regenerated: unsubscribe links in
    /// already-delivered emails must keep working.
    pub unsubscribe_token: String,
    pub subscribed_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub allow_analytics: bool,
    pub allow_marketing: bool,
}

impl Subscriber {
    pub fn confirm_token_expired(&self, now: DateTime<Utc>) -> bool {
        match self.confirm_token_expires_at {
            Some(expires_at) => expires_at < now,
            None => true,
        }
    }
}

/// Audit metadata captured at subscribe/re-subscribe time.
#[derive(Debug, Clone, Default)]
pub struct AuditMetadata {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
