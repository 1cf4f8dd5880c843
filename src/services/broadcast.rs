use futures::future::join_all;

use crate::domain::subscriber_email::SubscriberEmail;
use crate::email_client::EmailClient;
use crate::repository::subscribers::{BroadcastRecipient, SubscriberRepository};
use crate::repository::RepositoryError;

/// Recipients per dispatch wave. Sends inside a wave run concurrently; the
/// next wave only starts once every outcome of the previous one is in.
pub const BROADCAST_CHUNK_SIZE: usize = 10;

#[derive(Debug, PartialEq, Eq, serde::Serialize)]
pub struct BroadcastSummary {
    pub sent: usize,
    pub failed: usize,
}

#[derive(thiserror::Error)]
pub enum BroadcastError {
    #[error("Failed to get the broadcast recipients from the database.")]
    Repository(#[from] RepositoryError),
    #[error("Failed to send the test newsletter.")]
    Email(#[from] reqwest::Error),
}

impl std::fmt::Debug for BroadcastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Caused by:\n\t({})", self)
    }
}

/// Sends an issue to every confirmed subscriber. Individual failures are
/// logged and counted, never retried; the caller gets the tally.
#[tracing::instrument(
    name = "Broadcasting a newsletter issue",
    skip(subject, content_html, subscribers, email_client, base_url),
    fields(subject = %subject)
)]
pub async fn send_broadcast(
    subject: &str,
    content_html: &str,
    subscribers: &impl SubscriberRepository,
    email_client: &EmailClient,
    base_url: &str,
) -> Result<BroadcastSummary, BroadcastError> {
    let recipients = subscribers.confirmed_recipients().await?;
    let mut summary = BroadcastSummary { sent: 0, failed: 0 };

    for chunk in recipients.chunks(BROADCAST_CHUNK_SIZE) {
        let sends = chunk
            .iter()
            .map(|recipient| send_issue(email_client, recipient, subject, content_html, base_url));

        for (recipient, outcome) in chunk.iter().zip(join_all(sends).await) {
            match outcome {
                Ok(()) => summary.sent += 1,
                Err(err) => {
                    tracing::error!(
                        recipient = %recipient.email,
                        error = ?err,
                        "Failed to deliver the newsletter issue"
                    );
                    summary.failed += 1;
                }
            }
        }
    }

    tracing::info!(sent = summary.sent, failed = summary.failed, "Broadcast finished");

    Ok(summary)
}

/// Single send to the admin address, for eyeballing an issue before the
/// real broadcast.
#[tracing::instrument(
    name = "Sending a test newsletter",
    skip(subject, content_html, recipient, email_client),
    fields(subject = %subject)
)]
pub async fn send_test(
    subject: &str,
    content_html: &str,
    recipient: SubscriberEmail,
    email_client: &EmailClient,
) -> Result<(), BroadcastError> {
    let body = format!("{}\n<p><em>This is a test issue.</em></p>", content_html);

    email_client.send_email(recipient, subject, &body).await?;

    Ok(())
}

async fn send_issue(
    email_client: &EmailClient,
    recipient: &BroadcastRecipient,
    subject: &str,
    content_html: &str,
    base_url: &str,
) -> Result<(), reqwest::Error> {
    let unsubscribe_link = format!(
        "{}/subscriptions/unsubscribe?token={}",
        base_url, recipient.unsubscribe_token
    );
    let body = format!(
        r#"{}
            <p><a href="{}">Unsubscribe</a></p>
        "#,
        content_html, unsubscribe_link
    );

    email_client
        .send_email(recipient.email.clone(), subject, &body)
        .await
}
