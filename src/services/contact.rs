use crate::domain::contact_message::ContactMessage;
use crate::domain::subscriber::AuditMetadata;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::email_client::EmailClient;
use crate::rate_limit::{Limiter, LimiterError, ANONYMOUS_CLIENT};

#[derive(thiserror::Error)]
pub enum ContactError {
    #[error("{0}")]
    Validation(String),
    #[error("Disposable email domains are not accepted.")]
    DisposableEmail,
    #[error("Too many requests. Please try again later.")]
    RateLimited,
    #[error("Failed to check the rate limit.")]
    Limiter(#[from] LimiterError),
    #[error("Failed to send the message.")]
    Email(#[from] reqwest::Error),
}

impl std::fmt::Debug for ContactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Caused by:\n\t({})", self)
    }
}

/// Relays a validated contact-form submission to the admin mailbox.
#[tracing::instrument(
    name = "Sending a contact message",
    skip(message, audit, limiter, email_client, admin_email),
    fields(sender_email = %message.email, subject = %message.subject)
)]
pub async fn send_contact_message(
    message: ContactMessage,
    audit: AuditMetadata,
    limiter: &impl Limiter,
    email_client: &EmailClient,
    admin_email: &SubscriberEmail,
) -> Result<(), ContactError> {
    if message.email.is_disposable() {
        tracing::warn!(
            sender_email = %message.email,
            ip_address = ?audit.ip_address,
            "Rejected disposable contact sender domain"
        );
        return Err(ContactError::DisposableEmail);
    }

    let limiter_key = audit.ip_address.as_deref().unwrap_or(ANONYMOUS_CLIENT);

    if limiter.check(limiter_key).await?.is_limited() {
        return Err(ContactError::RateLimited);
    }

    let subject = format!("[contact] {}", message.subject);
    let html_body = format!(
        r#"
            <div>
                <p><strong>From:</strong> {} &lt;{}&gt;</p>
                <p>{}</p>
            </div>
        "#,
        escape_html(message.name.as_ref()),
        message.email.as_ref(),
        escape_html(&message.message)
    );

    email_client
        .send_email(admin_email.clone(), &subject, html_body.as_str())
        .await?;

    Ok(())
}

// The body is arbitrary visitor input headed for an HTML email
fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
