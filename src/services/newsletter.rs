use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::domain::consent::{ConsentEvent, ConsentType};
use crate::domain::new_subscription::NewSubscription;
use crate::domain::subscriber::{AuditMetadata, Subscriber};
use crate::domain::subscriber_status::SubscriberStatus;
use crate::email_client::EmailClient;
use crate::rate_limit::{Limiter, LimiterError, ANONYMOUS_CLIENT};
use crate::repository::consent_log::ConsentLogRepository;
use crate::repository::subscribers::SubscriberRepository;
use crate::repository::RepositoryError;
use crate::tokens::generate_token;

pub const CONFIRM_TOKEN_VALIDITY_HOURS: i64 = 24;

#[derive(Debug, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Created,
    ConfirmationResent,
    Resubscribed,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    AlreadyConfirmed,
}

#[derive(Debug, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Unsubscribed,
    AlreadyUnsubscribed,
}

#[derive(thiserror::Error)]
pub enum NewsletterError {
    #[error("{0}")]
    Validation(String),
    #[error("Disposable email domains are not accepted.")]
    DisposableEmail,
    #[error("This email address is already subscribed.")]
    AlreadySubscribed,
    #[error("Too many requests. Please try again later.")]
    RateLimited,
    #[error("Unknown token.")]
    TokenNotFound,
    #[error("This confirmation link has expired. Please subscribe again.")]
    TokenExpired,
    #[error("Failed to query the subscriber store.")]
    Repository(#[from] RepositoryError),
    #[error("Failed to check the rate limit.")]
    Limiter(#[from] LimiterError),
    #[error("Failed to send an email.")]
    Email(#[from] reqwest::Error),
}

impl std::fmt::Debug for NewsletterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Caused by:\n\t({})", self)
    }
}

pub struct PreferencesUpdate {
    pub token: String,
    pub allow_analytics: bool,
    pub allow_marketing: bool,
    pub audit: AuditMetadata,
}

fn limiter_key(audit: &AuditMetadata) -> &str {
    audit.ip_address.as_deref().unwrap_or(ANONYMOUS_CLIENT)
}

/// Double-opt-in entry point. The rate limit runs before any database access
/// so a limited request provably mutates nothing.
#[tracing::instrument(
    name = "Subscribing an email to the newsletter",
    skip(new_subscription, subscribers, limiter, email_client, base_url),
    fields(subscriber_email = %new_subscription.email)
)]
pub async fn subscribe(
    new_subscription: NewSubscription,
    subscribers: &impl SubscriberRepository,
    limiter: &impl Limiter,
    email_client: &EmailClient,
    base_url: &str,
) -> Result<SubscribeOutcome, NewsletterError> {
    if new_subscription.email.is_disposable() {
        tracing::warn!(
            subscriber_email = %new_subscription.email,
            ip_address = ?new_subscription.audit.ip_address,
            "Rejected disposable email domain"
        );
        return Err(NewsletterError::DisposableEmail);
    }

    if limiter
        .check(limiter_key(&new_subscription.audit))
        .await?
        .is_limited()
    {
        return Err(NewsletterError::RateLimited);
    }

    let email = new_subscription.email.as_ref();
    let confirm_token = generate_token();
    let expires_at = Utc::now() + Duration::hours(CONFIRM_TOKEN_VALIDITY_HOURS);

    let outcome = match subscribers.find_by_email(email).await? {
        None => {
            let subscriber = Subscriber {
                id: Uuid::new_v4(),
                email: new_subscription.email.clone(),
                status: SubscriberStatus::Pending,
                confirm_token: Some(confirm_token.clone()),
                confirm_token_expires_at: Some(expires_at),
                unsubscribe_token: generate_token(),
                subscribed_at: Utc::now(),
                confirmed_at: None,
                unsubscribed_at: None,
                ip_address: new_subscription.audit.ip_address.clone(),
                user_agent: new_subscription.audit.user_agent.clone(),
                allow_analytics: false,
                allow_marketing: false,
            };

            subscribers.insert(&subscriber).await?;

            SubscribeOutcome::Created
        }
        Some(subscriber) if subscriber.status.is_pending() => {
            // Same row, fresh token: the previous link dies here
            subscribers
                .reset_to_pending(email, &confirm_token, expires_at, &new_subscription.audit)
                .await?;

            SubscribeOutcome::ConfirmationResent
        }
        Some(subscriber) if subscriber.status.is_unsubscribed() => {
            subscribers
                .reset_to_pending(email, &confirm_token, expires_at, &new_subscription.audit)
                .await?;

            SubscribeOutcome::Resubscribed
        }
        Some(_) => return Err(NewsletterError::AlreadySubscribed),
    };

    // State first, email second: a failed send leaves a consistent pending
    // row and a retry regenerates the token.
    send_confirmation_email(email_client, &new_subscription, base_url, &confirm_token).await?;

    Ok(outcome)
}

/// Consumes a confirmation token. "Not found" and "expired" are distinct
/// terminal outcomes so the page can tell the user what to actually do.
#[tracing::instrument(
    name = "Confirming a newsletter subscription",
    skip(token, client_ip, subscribers, consent_log, limiter, email_client, base_url),
    fields(client_ip = %client_ip)
)]
pub async fn confirm(
    token: &str,
    client_ip: &str,
    subscribers: &impl SubscriberRepository,
    consent_log: &impl ConsentLogRepository,
    limiter: &impl Limiter,
    email_client: &EmailClient,
    base_url: &str,
) -> Result<ConfirmOutcome, NewsletterError> {
    // Separate small quota to blunt token enumeration
    if limiter.check(client_ip).await?.is_limited() {
        return Err(NewsletterError::RateLimited);
    }

    let subscriber = subscribers
        .find_by_confirm_token(token)
        .await?
        .ok_or(NewsletterError::TokenNotFound)?;

    if subscriber.status.is_confirmed() {
        return Ok(ConfirmOutcome::AlreadyConfirmed);
    }

    let now = Utc::now();

    if subscriber.confirm_token_expired(now) {
        tracing::info!(
            subscriber_email = %subscriber.email,
            "Rejected expired confirmation token"
        );
        return Err(NewsletterError::TokenExpired);
    }

    if !subscriber
        .status
        .can_transition_to(SubscriberStatus::Confirmed)
    {
        // A stale token on a row that left the pending state cannot revive it
        return Err(NewsletterError::TokenNotFound);
    }

    let email = subscriber.email.as_ref();

    subscribers.mark_confirmed(email, now).await?;

    let audit = AuditMetadata {
        ip_address: subscriber.ip_address.clone(),
        user_agent: subscriber.user_agent.clone(),
    };
    consent_log
        .append(&ConsentEvent::record(
            email,
            ConsentType::Newsletter,
            true,
            &audit,
        ))
        .await?;

    // The welcome email is advisory: a failed send never rolls the
    // confirmation back.
    if let Err(err) = send_welcome_email(email_client, &subscriber, base_url).await {
        tracing::error!(
            subscriber_email = %subscriber.email,
            error = ?err,
            "Failed to send the welcome email"
        );
    }

    Ok(ConfirmOutcome::Confirmed)
}

/// One-click opt-out, idempotent: a second click reports the state without
/// touching `unsubscribed_at`.
#[tracing::instrument(
    name = "Unsubscribing from the newsletter",
    skip(token, subscribers, consent_log)
)]
pub async fn unsubscribe(
    token: &str,
    subscribers: &impl SubscriberRepository,
    consent_log: &impl ConsentLogRepository,
) -> Result<UnsubscribeOutcome, NewsletterError> {
    let subscriber = subscribers
        .find_by_unsubscribe_token(token)
        .await?
        .ok_or(NewsletterError::TokenNotFound)?;

    if subscriber.status.is_unsubscribed() {
        return Ok(UnsubscribeOutcome::AlreadyUnsubscribed);
    }

    let email = subscriber.email.as_ref();

    subscribers.mark_unsubscribed(email, Utc::now()).await?;

    let audit = AuditMetadata {
        ip_address: subscriber.ip_address.clone(),
        user_agent: subscriber.user_agent.clone(),
    };
    consent_log
        .append(&ConsentEvent::record(
            email,
            ConsentType::Newsletter,
            false,
            &audit,
        ))
        .await?;

    Ok(UnsubscribeOutcome::Unsubscribed)
}

/// Consent-flag updates, keyed by the permanent unsubscribe token. Every
/// change lands in the consent log.
#[tracing::instrument(name = "Updating subscriber preferences", skip(update, subscribers, consent_log))]
pub async fn update_preferences(
    update: PreferencesUpdate,
    subscribers: &impl SubscriberRepository,
    consent_log: &impl ConsentLogRepository,
) -> Result<(), NewsletterError> {
    let subscriber = subscribers
        .find_by_unsubscribe_token(&update.token)
        .await?
        .ok_or(NewsletterError::TokenNotFound)?;

    let email = subscriber.email.as_ref();

    subscribers
        .update_consent_flags(email, update.allow_analytics, update.allow_marketing)
        .await?;

    if subscriber.allow_analytics != update.allow_analytics {
        consent_log
            .append(&ConsentEvent::record(
                email,
                ConsentType::Analytics,
                update.allow_analytics,
                &update.audit,
            ))
            .await?;
    }

    if subscriber.allow_marketing != update.allow_marketing {
        consent_log
            .append(&ConsentEvent::record(
                email,
                ConsentType::Marketing,
                update.allow_marketing,
                &update.audit,
            ))
            .await?;
    }

    Ok(())
}

#[tracing::instrument(
    name = "Sending a confirmation email",
    skip(email_client, new_subscription, base_url, confirm_token)
)]
async fn send_confirmation_email(
    email_client: &EmailClient,
    new_subscription: &NewSubscription,
    base_url: &str,
    confirm_token: &str,
) -> Result<(), reqwest::Error> {
    let confirmation_link = format!("{}/subscriptions/confirm?token={}", base_url, confirm_token);
    let html_body = format!(
        r#"
            <div>
                <h1>One more step</h1>
                <p>Click <a href="{}">here</a> to confirm your subscription. The link is valid for {} hours.</p>
            </div>
        "#,
        confirmation_link, CONFIRM_TOKEN_VALIDITY_HOURS
    );

    email_client
        .send_email(
            new_subscription.email.clone(),
            "Confirm your subscription",
            html_body.as_str(),
        )
        .await
}

async fn send_welcome_email(
    email_client: &EmailClient,
    subscriber: &Subscriber,
    base_url: &str,
) -> Result<(), reqwest::Error> {
    let unsubscribe_link = format!(
        "{}/subscriptions/unsubscribe?token={}",
        base_url, subscriber.unsubscribe_token
    );
    let html_body = format!(
        r#"
            <div>
                <h1>Welcome to the newsletter!</h1>
                <p>You will hear from me when something worth reading ships.</p>
                <p><a href="{}">Unsubscribe</a> at any time.</p>
            </div>
        "#,
        unsubscribe_link
    );

    email_client
        .send_email(subscriber.email.clone(), "Welcome!", html_body.as_str())
        .await
}
