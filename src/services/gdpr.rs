use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::consent::ConsentEvent;
use crate::domain::subscriber::{AuditMetadata, Subscriber};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::email_client::EmailClient;
use crate::rate_limit::{Limiter, LimiterError, ANONYMOUS_CLIENT};
use crate::repository::consent_log::ConsentLogRepository;
use crate::repository::subscribers::SubscriberRepository;
use crate::repository::RepositoryError;
use crate::tokens::{generate_token, TokenStore, TokenStoreError};

/// Verification links die quickly: possession of a live one is the only
/// proof of inbox control we accept before exporting or erasing data.
pub const PRIVACY_TOKEN_VALIDITY: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataAction {
    Export,
    Delete,
}

impl DataAction {
    pub fn parse(value: String) -> Result<DataAction, String> {
        match value.as_str() {
            "export" => Ok(DataAction::Export),
            "delete" => Ok(DataAction::Delete),
            _ => Err(format!("{} is not a valid data request action", value)),
        }
    }
}

/// What the token store holds between the two steps.
#[derive(Serialize, Deserialize)]
struct PendingDataRequest {
    action: DataAction,
    email: String,
}

pub struct DataRequest {
    pub email: SubscriberEmail,
    pub action: DataAction,
    pub audit: AuditMetadata,
}

#[derive(Debug, Serialize)]
pub struct ExportDocument {
    pub subscriber: Subscriber,
    pub consent_events: Vec<ConsentEvent>,
}

#[derive(Debug)]
pub enum VerifyOutcome {
    Exported(ExportDocument),
    Deleted,
}

#[derive(thiserror::Error)]
pub enum GdprError {
    #[error("{0}")]
    Validation(String),
    #[error("No data is held for this email address.")]
    NotFound,
    #[error("Unknown or already used verification link.")]
    TokenNotFound,
    #[error("Too many requests. Please try again later.")]
    RateLimited,
    #[error("Failed to query the subscriber store.")]
    Repository(#[from] RepositoryError),
    #[error("Failed to check the rate limit.")]
    Limiter(#[from] LimiterError),
    #[error("Failed to talk to the token store.")]
    TokenStore(#[from] TokenStoreError),
    #[error("Failed to decode the stored request.")]
    Payload(#[from] serde_json::Error),
    #[error("Failed to send the verification email.")]
    Email(#[from] reqwest::Error),
}

impl std::fmt::Debug for GdprError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Caused by:\n\t({})", self)
    }
}

fn storage_key(token: &str) -> String {
    format!("privacy:{}", token)
}

/// First step: park the requested action behind a short-lived single-use
/// token and mail a verification link. Nothing is exported or deleted until
/// someone with access to the inbox clicks it.
#[tracing::instrument(
    name = "Handling a data request",
    skip(request, subscribers, limiter, token_store, email_client, base_url),
    fields(email = %request.email, action = ?request.action)
)]
pub async fn request_data_action(
    request: DataRequest,
    subscribers: &impl SubscriberRepository,
    limiter: &impl Limiter,
    token_store: &impl TokenStore,
    email_client: &EmailClient,
    base_url: &str,
) -> Result<(), GdprError> {
    // Limited both per client and per target address: neither a single
    // machine nor a single victim email can be hammered
    let client_key = request.audit.ip_address.as_deref().unwrap_or(ANONYMOUS_CLIENT);

    if limiter.check(client_key).await?.is_limited() {
        return Err(GdprError::RateLimited);
    }

    if limiter.check(request.email.as_ref()).await?.is_limited() {
        return Err(GdprError::RateLimited);
    }

    if subscribers
        .find_by_email(request.email.as_ref())
        .await?
        .is_none()
    {
        return Err(GdprError::NotFound);
    }

    let token = generate_token();
    let pending = PendingDataRequest {
        action: request.action,
        email: request.email.as_ref().to_string(),
    };

    token_store
        .put(
            &storage_key(&token),
            &serde_json::to_string(&pending)?,
            PRIVACY_TOKEN_VALIDITY,
        )
        .await?;

    send_verification_email(email_client, &request, base_url, &token).await?;

    Ok(())
}

/// Second step: consume the token (single use, deleted on read) and perform
/// the parked action.
#[tracing::instrument(
    name = "Verifying a data request",
    skip(token, client_ip, subscribers, consent_log, limiter, token_store)
)]
pub async fn verify_data_action(
    token: &str,
    client_ip: &str,
    subscribers: &impl SubscriberRepository,
    consent_log: &impl ConsentLogRepository,
    limiter: &impl Limiter,
    token_store: &impl TokenStore,
) -> Result<VerifyOutcome, GdprError> {
    if limiter.check(client_ip).await?.is_limited() {
        return Err(GdprError::RateLimited);
    }

    let payload = token_store
        .take(&storage_key(token))
        .await?
        .ok_or(GdprError::TokenNotFound)?;
    let pending: PendingDataRequest = serde_json::from_str(&payload)?;

    match pending.action {
        DataAction::Export => {
            let subscriber = subscribers
                .find_by_email(&pending.email)
                .await?
                .ok_or(GdprError::NotFound)?;
            let consent_events = consent_log.find_by_email(&pending.email).await?;

            tracing::info!(email = %pending.email, "Exported subscriber data");

            Ok(VerifyOutcome::Exported(ExportDocument {
                subscriber,
                consent_events,
            }))
        }
        DataAction::Delete => {
            let deleted = subscribers.delete_with_consent_logs(&pending.email).await?;

            if !deleted {
                return Err(GdprError::NotFound);
            }

            tracing::info!(email = %pending.email, "Erased subscriber data");

            Ok(VerifyOutcome::Deleted)
        }
    }
}

#[tracing::instrument(
    name = "Sending a data request verification email",
    skip(email_client, request, base_url, token)
)]
async fn send_verification_email(
    email_client: &EmailClient,
    request: &DataRequest,
    base_url: &str,
    token: &str,
) -> Result<(), reqwest::Error> {
    let verification_link = format!("{}/privacy/verify?token={}", base_url, token);
    let action_label = match request.action {
        DataAction::Export => "export a copy of your data",
        DataAction::Delete => "permanently delete your data",
    };
    let html_body = format!(
        r#"
            <div>
                <h1>Confirm your data request</h1>
                <p>Someone asked to {} for this address. Click <a href="{}">here</a> within 15 minutes to proceed.</p>
                <p>If this was not you, ignore this email and nothing will happen.</p>
            </div>
        "#,
        action_label, verification_link
    );

    email_client
        .send_email(
            request.email.clone(),
            "Confirm your data request",
            html_body.as_str(),
        )
        .await
}
