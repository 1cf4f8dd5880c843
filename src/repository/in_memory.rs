//! In-memory repository doubles for service-level tests. Same interface,
//! no database.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::domain::consent::ConsentEvent;
use crate::domain::subscriber::{AuditMetadata, Subscriber};
use crate::domain::subscriber_status::SubscriberStatus;
use crate::repository::consent_log::ConsentLogRepository;
use crate::repository::subscribers::{BroadcastRecipient, SubscriberRepository};
use crate::repository::RepositoryError;

#[derive(Default)]
pub struct InMemoryStore {
    subscribers: Mutex<HashMap<String, Subscriber>>,
    consent_events: Mutex<Vec<ConsentEvent>>,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore::default()
    }

    pub fn subscriber(&self, email: &str) -> Option<Subscriber> {
        self.subscribers.lock().unwrap().get(email).cloned()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    pub fn consent_events_for(&self, email: &str) -> Vec<ConsentEvent> {
        self.consent_events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.email == email)
            .cloned()
            .collect()
    }
}

impl SubscriberRepository for InMemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Subscriber>, RepositoryError> {
        Ok(self.subscribers.lock().unwrap().get(email).cloned())
    }

    async fn find_by_confirm_token(
        &self,
        token: &str,
    ) -> Result<Option<Subscriber>, RepositoryError> {
        Ok(self
            .subscribers
            .lock()
            .unwrap()
            .values()
            .find(|subscriber| subscriber.confirm_token.as_deref() == Some(token))
            .cloned())
    }

    async fn find_by_unsubscribe_token(
        &self,
        token: &str,
    ) -> Result<Option<Subscriber>, RepositoryError> {
        Ok(self
            .subscribers
            .lock()
            .unwrap()
            .values()
            .find(|subscriber| subscriber.unsubscribe_token == token)
            .cloned())
    }

    async fn insert(&self, subscriber: &Subscriber) -> Result<(), RepositoryError> {
        self.subscribers
            .lock()
            .unwrap()
            .insert(subscriber.email.as_ref().to_string(), subscriber.clone());

        Ok(())
    }

    async fn reset_to_pending(
        &self,
        email: &str,
        confirm_token: &str,
        expires_at: DateTime<Utc>,
        audit: &AuditMetadata,
    ) -> Result<(), RepositoryError> {
        let mut subscribers = self.subscribers.lock().unwrap();

        if let Some(subscriber) = subscribers.get_mut(email) {
            subscriber.status = SubscriberStatus::Pending;
            subscriber.confirm_token = Some(confirm_token.to_string());
            subscriber.confirm_token_expires_at = Some(expires_at);
            subscriber.unsubscribed_at = None;
            subscriber.ip_address = audit.ip_address.clone();
            subscriber.user_agent = audit.user_agent.clone();
        }

        Ok(())
    }

    async fn mark_confirmed(
        &self,
        email: &str,
        confirmed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut subscribers = self.subscribers.lock().unwrap();

        if let Some(subscriber) = subscribers.get_mut(email) {
            subscriber.status = SubscriberStatus::Confirmed;
            subscriber.confirmed_at = Some(confirmed_at);
            subscriber.confirm_token = None;
            subscriber.confirm_token_expires_at = None;
        }

        Ok(())
    }

    async fn mark_unsubscribed(
        &self,
        email: &str,
        unsubscribed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut subscribers = self.subscribers.lock().unwrap();

        if let Some(subscriber) = subscribers.get_mut(email) {
            subscriber.status = SubscriberStatus::Unsubscribed;
            subscriber.unsubscribed_at = Some(unsubscribed_at);
        }

        Ok(())
    }

    async fn update_consent_flags(
        &self,
        email: &str,
        allow_analytics: bool,
        allow_marketing: bool,
    ) -> Result<(), RepositoryError> {
        let mut subscribers = self.subscribers.lock().unwrap();

        if let Some(subscriber) = subscribers.get_mut(email) {
            subscriber.allow_analytics = allow_analytics;
            subscriber.allow_marketing = allow_marketing;
        }

        Ok(())
    }

    async fn confirmed_recipients(&self) -> Result<Vec<BroadcastRecipient>, RepositoryError> {
        Ok(self
            .subscribers
            .lock()
            .unwrap()
            .values()
            .filter(|subscriber| subscriber.status.is_confirmed())
            .map(|subscriber| BroadcastRecipient {
                email: subscriber.email.clone(),
                unsubscribe_token: subscriber.unsubscribe_token.clone(),
            })
            .collect())
    }

    async fn delete_with_consent_logs(&self, email: &str) -> Result<bool, RepositoryError> {
        let removed = self.subscribers.lock().unwrap().remove(email).is_some();

        self.consent_events
            .lock()
            .unwrap()
            .retain(|event| event.email != email);

        Ok(removed)
    }
}

impl ConsentLogRepository for InMemoryStore {
    async fn append(&self, event: &ConsentEvent) -> Result<(), RepositoryError> {
        self.consent_events.lock().unwrap().push(event.clone());

        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Vec<ConsentEvent>, RepositoryError> {
        Ok(self.consent_events_for(email))
    }
}
