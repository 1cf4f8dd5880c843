use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::subscriber::AuditMetadata;

/// Version string stamped on every consent row; bump when the privacy policy
/// text changes so old rows stay attributable to the text they were given.
pub const CURRENT_POLICY_VERSION: &str = "2026-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ConsentType {
    Newsletter,
    Analytics,
    Marketing,
}

impl ConsentType {
    pub fn parse(value: String) -> Result<ConsentType, String> {
        match value.as_str() {
            "newsletter" => Ok(ConsentType::Newsletter),
            "analytics" => Ok(ConsentType::Analytics),
            "marketing" => Ok(ConsentType::Marketing),
            _ => Err(format!("{} is not a valid consent type", value)),
        }
    }
}

impl AsRef<str> for ConsentType {
    fn as_ref(&self) -> &str {
        match self {
            ConsentType::Newsletter => "newsletter",
            ConsentType::Analytics => "analytics",
            ConsentType::Marketing => "marketing",
        }
    }
}

/// Append-only audit record. Keyed by plain email, not a foreign key: the row
/// outlives subscriber deletion until its own retention period elapses.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConsentEvent {
    pub id: Uuid,
    pub email: String,
    pub consent_type: ConsentType,
    pub granted: bool,
    pub policy_version: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ConsentEvent {
    pub fn record(
        email: &str,
        consent_type: ConsentType,
        granted: bool,
        audit: &AuditMetadata,
    ) -> ConsentEvent {
        ConsentEvent {
            id: Uuid::new_v4(),
            email: email.to_string(),
            consent_type,
            granted,
            policy_version: CURRENT_POLICY_VERSION.to_string(),
            ip_address: audit.ip_address.clone(),
            user_agent: audit.user_agent.clone(),
            created_at: Utc::now(),
        }
    }
}
