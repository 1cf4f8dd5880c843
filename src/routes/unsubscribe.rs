use actix_web::{
    web::{self, Query},
    HttpResponse,
};
use serde::Deserialize;

use crate::repository::consent_log::PgConsentLogRepository;
use crate::repository::subscribers::PgSubscriberRepository;
use crate::routes::pages;
use crate::services::newsletter::{self, NewsletterError, UnsubscribeOutcome};

#[derive(Deserialize, Debug)]
pub struct Parameters {
    pub token: String,
}

#[tracing::instrument(
    name = "Unsubscribing from the newsletter handler",
    skip(subscribers, consent_log, parameters)
)]
pub async fn handle_unsubscribe(
    parameters: Query<Parameters>,
    subscribers: web::Data<PgSubscriberRepository>,
    consent_log: web::Data<PgConsentLogRepository>,
) -> HttpResponse {
    let outcome =
        newsletter::unsubscribe(&parameters.token, subscribers.get_ref(), consent_log.get_ref())
            .await;

    match outcome {
        Ok(UnsubscribeOutcome::Unsubscribed) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(pages::unsubscribed()),
        Ok(UnsubscribeOutcome::AlreadyUnsubscribed) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(pages::already_unsubscribed()),
        Err(NewsletterError::TokenNotFound) => HttpResponse::NotFound()
            .content_type("text/html; charset=utf-8")
            .body(pages::unsubscribe_link_invalid()),
        Err(err) => {
            tracing::error!("Failed to unsubscribe: {:?}", err);
            HttpResponse::InternalServerError()
                .content_type("text/html; charset=utf-8")
                .body(pages::something_went_wrong())
        }
    }
}
