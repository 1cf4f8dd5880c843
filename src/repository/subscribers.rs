use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::domain::subscriber::{AuditMetadata, Subscriber};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_status::SubscriberStatus;
use crate::repository::RepositoryError;

const SUBSCRIBER_COLUMNS: &str = "id, email, status, confirm_token, confirm_token_expires_at, \
     unsubscribe_token, subscribed_at, confirmed_at, unsubscribed_at, ip_address, user_agent, \
     allow_analytics, allow_marketing";

/// Email + unsubscribe token pair, the only pieces of a subscriber row a
/// broadcast needs.
pub struct BroadcastRecipient {
    pub email: SubscriberEmail,
    pub unsubscribe_token: String,
}

pub trait SubscriberRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Subscriber>, RepositoryError>;
    async fn find_by_confirm_token(
        &self,
        token: &str,
    ) -> Result<Option<Subscriber>, RepositoryError>;
    async fn find_by_unsubscribe_token(
        &self,
        token: &str,
    ) -> Result<Option<Subscriber>, RepositoryError>;
    async fn insert(&self, subscriber: &Subscriber) -> Result<(), RepositoryError>;
    /// Used both to re-send a pending confirmation and to re-subscribe an
    /// unsubscribed row: fresh confirm token + expiry, `unsubscribed_at`
    /// cleared, audit metadata refreshed. The unsubscribe token is untouched.
    async fn reset_to_pending(
        &self,
        email: &str,
        confirm_token: &str,
        expires_at: DateTime<Utc>,
        audit: &AuditMetadata,
    ) -> Result<(), RepositoryError>;
    async fn mark_confirmed(
        &self,
        email: &str,
        confirmed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    async fn mark_unsubscribed(
        &self,
        email: &str,
        unsubscribed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    async fn update_consent_flags(
        &self,
        email: &str,
        allow_analytics: bool,
        allow_marketing: bool,
    ) -> Result<(), RepositoryError>;
    async fn confirmed_recipients(&self) -> Result<Vec<BroadcastRecipient>, RepositoryError>;
    /// GDPR erasure: removes the consent trail and the subscriber row in one
    /// transaction. Returns whether a subscriber row existed.
    async fn delete_with_consent_logs(&self, email: &str) -> Result<bool, RepositoryError>;
}

#[derive(Clone)]
pub struct PgSubscriberRepository {
    pool: PgPool,
}

impl PgSubscriberRepository {
    pub fn new(pool: PgPool) -> PgSubscriberRepository {
        PgSubscriberRepository { pool }
    }

    async fn find_by_column(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<Subscriber>, RepositoryError> {
        let query = format!(
            "SELECT {} FROM subscribers WHERE {} = $1",
            SUBSCRIBER_COLUMNS, column
        );
        let subscriber = sqlx::query(&query)
            .bind(value)
            .map(map_subscriber_row)
            .fetch_optional(&self.pool)
            .await?;

        Ok(subscriber)
    }
}

impl SubscriberRepository for PgSubscriberRepository {
    #[tracing::instrument(name = "Fetching a subscriber by email", skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Option<Subscriber>, RepositoryError> {
        self.find_by_column("email", email).await
    }

    #[tracing::instrument(name = "Fetching a subscriber by confirm token", skip(self, token))]
    async fn find_by_confirm_token(
        &self,
        token: &str,
    ) -> Result<Option<Subscriber>, RepositoryError> {
        self.find_by_column("confirm_token", token).await
    }

    #[tracing::instrument(name = "Fetching a subscriber by unsubscribe token", skip(self, token))]
    async fn find_by_unsubscribe_token(
        &self,
        token: &str,
    ) -> Result<Option<Subscriber>, RepositoryError> {
        self.find_by_column("unsubscribe_token", token).await
    }

    #[tracing::instrument(
        name = "Inserting a new subscriber",
        skip(self, subscriber),
        fields(subscriber_email = %subscriber.email)
    )]
    async fn insert(&self, subscriber: &Subscriber) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO subscribers (id, email, status, confirm_token, confirm_token_expires_at,
                unsubscribe_token, subscribed_at, confirmed_at, unsubscribed_at, ip_address,
                user_agent, allow_analytics, allow_marketing)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(subscriber.id)
        .bind(subscriber.email.as_ref())
        .bind(subscriber.status.as_ref())
        .bind(subscriber.confirm_token.as_deref())
        .bind(subscriber.confirm_token_expires_at)
        .bind(subscriber.unsubscribe_token.as_str())
        .bind(subscriber.subscribed_at)
        .bind(subscriber.confirmed_at)
        .bind(subscriber.unsubscribed_at)
        .bind(subscriber.ip_address.as_deref())
        .bind(subscriber.user_agent.as_deref())
        .bind(subscriber.allow_analytics)
        .bind(subscriber.allow_marketing)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Resetting a subscriber to pending", skip(self, confirm_token, audit))]
    async fn reset_to_pending(
        &self,
        email: &str,
        confirm_token: &str,
        expires_at: DateTime<Utc>,
        audit: &AuditMetadata,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE subscribers
            SET status = 'pending_confirmation',
                confirm_token = $2,
                confirm_token_expires_at = $3,
                unsubscribed_at = NULL,
                ip_address = $4,
                user_agent = $5
            WHERE email = $1
            "#,
        )
        .bind(email)
        .bind(confirm_token)
        .bind(expires_at)
        .bind(audit.ip_address.as_deref())
        .bind(audit.user_agent.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Marking a subscriber as confirmed", skip(self))]
    async fn mark_confirmed(
        &self,
        email: &str,
        confirmed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE subscribers
            SET status = 'confirmed',
                confirmed_at = $2,
                confirm_token = NULL,
                confirm_token_expires_at = NULL
            WHERE email = $1
            "#,
        )
        .bind(email)
        .bind(confirmed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Marking a subscriber as unsubscribed", skip(self))]
    async fn mark_unsubscribed(
        &self,
        email: &str,
        unsubscribed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE subscribers
            SET status = 'unsubscribed',
                unsubscribed_at = $2
            WHERE email = $1
            "#,
        )
        .bind(email)
        .bind(unsubscribed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Updating subscriber consent flags", skip(self))]
    async fn update_consent_flags(
        &self,
        email: &str,
        allow_analytics: bool,
        allow_marketing: bool,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE subscribers
            SET allow_analytics = $2,
                allow_marketing = $3
            WHERE email = $1
            "#,
        )
        .bind(email)
        .bind(allow_analytics)
        .bind(allow_marketing)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Fetching confirmed broadcast recipients", skip(self))]
    async fn confirmed_recipients(&self) -> Result<Vec<BroadcastRecipient>, RepositoryError> {
        let recipients = sqlx::query(
            r#"
            SELECT email, unsubscribe_token
            FROM subscribers
            WHERE status = 'confirmed'
            "#,
        )
        .map(|row: PgRow| BroadcastRecipient {
            email: SubscriberEmail::parse(row.get("email")).unwrap(),
            unsubscribe_token: row.get("unsubscribe_token"),
        })
        .fetch_all(&self.pool)
        .await?;

        Ok(recipients)
    }

    #[tracing::instrument(name = "Deleting a subscriber and its consent trail", skip(self))]
    async fn delete_with_consent_logs(&self, email: &str) -> Result<bool, RepositoryError> {
        let mut transaction = self.pool.begin().await?;

        sqlx::query("DELETE FROM consent_log WHERE email = $1")
            .bind(email)
            .execute(&mut transaction)
            .await?;

        let deleted = sqlx::query("DELETE FROM subscribers WHERE email = $1")
            .bind(email)
            .execute(&mut transaction)
            .await?;

        transaction.commit().await?;

        Ok(deleted.rows_affected() > 0)
    }
}

fn map_subscriber_row(row: PgRow) -> Subscriber {
    Subscriber {
        id: row.get("id"),
        email: SubscriberEmail::parse(row.get("email")).unwrap(),
        status: SubscriberStatus::parse(row.get("status")).unwrap(),
        confirm_token: row.get("confirm_token"),
        confirm_token_expires_at: row.get("confirm_token_expires_at"),
        unsubscribe_token: row.get("unsubscribe_token"),
        subscribed_at: row.get("subscribed_at"),
        confirmed_at: row.get("confirmed_at"),
        unsubscribed_at: row.get("unsubscribed_at"),
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        allow_analytics: row.get("allow_analytics"),
        allow_marketing: row.get("allow_marketing"),
    }
}
