use sqlx::{postgres::PgRow, PgPool, Row};

use crate::domain::consent::{ConsentEvent, ConsentType};
use crate::repository::RepositoryError;

pub trait ConsentLogRepository {
    async fn append(&self, event: &ConsentEvent) -> Result<(), RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Vec<ConsentEvent>, RepositoryError>;
}

#[derive(Clone)]
pub struct PgConsentLogRepository {
    pool: PgPool,
}

impl PgConsentLogRepository {
    pub fn new(pool: PgPool) -> PgConsentLogRepository {
        PgConsentLogRepository { pool }
    }
}

impl ConsentLogRepository for PgConsentLogRepository {
    #[tracing::instrument(
        name = "Appending a consent event",
        skip(self, event),
        fields(email = %event.email, consent_type = %event.consent_type.as_ref())
    )]
    async fn append(&self, event: &ConsentEvent) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO consent_log (id, email, consent_type, granted, policy_version,
                ip_address, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.id)
        .bind(event.email.as_str())
        .bind(event.consent_type.as_ref())
        .bind(event.granted)
        .bind(event.policy_version.as_str())
        .bind(event.ip_address.as_deref())
        .bind(event.user_agent.as_deref())
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Fetching the consent trail for an email", skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Vec<ConsentEvent>, RepositoryError> {
        let events = sqlx::query(
            r#"
            SELECT id, email, consent_type, granted, policy_version, ip_address, user_agent,
                created_at
            FROM consent_log
            WHERE email = $1
            ORDER BY created_at
            "#,
        )
        .bind(email)
        .map(|row: PgRow| ConsentEvent {
            id: row.get("id"),
            email: row.get("email"),
            consent_type: ConsentType::parse(row.get("consent_type")).unwrap(),
            granted: row.get("granted"),
            policy_version: row.get("policy_version"),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
            created_at: row.get("created_at"),
        })
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
