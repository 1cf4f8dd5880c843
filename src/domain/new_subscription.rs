use serde::Deserialize;

use crate::domain::subscriber::AuditMetadata;
use crate::domain::subscriber_email::SubscriberEmail;

/// Validated subscribe input: the address plus whatever audit metadata the
/// transport captured.
pub struct NewSubscription {
    pub email: SubscriberEmail,
    pub audit: AuditMetadata,
}

#[derive(Deserialize)]
pub struct NewSubscriptionBody {
    pub email: String,
}

impl NewSubscription {
    pub fn parse(email: String, audit: AuditMetadata) -> Result<NewSubscription, String> {
        let email = SubscriberEmail::parse(email)?;

        Ok(NewSubscription { email, audit })
    }
}
