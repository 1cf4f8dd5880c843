use actix_web::{
    web::{self, Query},
    HttpRequest, HttpResponse,
};
use serde::Deserialize;

use crate::email_client::EmailClient;
use crate::rate_limit::client_ip;
use crate::repository::consent_log::PgConsentLogRepository;
use crate::repository::subscribers::PgSubscriberRepository;
use crate::routes::pages;
use crate::services::newsletter::{self, NewsletterError};
use crate::startup::{ApplicationBaseUrl, RateLimiters};

#[derive(Deserialize, Debug)]
pub struct Parameters {
    pub token: String,
}

#[tracing::instrument(
    name = "Confirming a newsletter subscription handler",
    skip(request, subscribers, consent_log, email_client, base_url, limiters, parameters)
)]
pub async fn handle_confirm_subscription(
    request: HttpRequest,
    parameters: Query<Parameters>,
    subscribers: web::Data<PgSubscriberRepository>,
    consent_log: web::Data<PgConsentLogRepository>,
    email_client: web::Data<EmailClient>,
    base_url: web::Data<ApplicationBaseUrl>,
    limiters: web::Data<RateLimiters>,
) -> HttpResponse {
    let outcome = newsletter::confirm(
        &parameters.token,
        &client_ip(&request),
        subscribers.get_ref(),
        consent_log.get_ref(),
        &limiters.confirm,
        email_client.get_ref(),
        &base_url.0,
    )
    .await;

    match outcome {
        Ok(_) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(pages::subscription_confirmed()),
        Err(NewsletterError::TokenNotFound) => HttpResponse::NotFound()
            .content_type("text/html; charset=utf-8")
            .body(pages::confirm_link_invalid()),
        Err(NewsletterError::TokenExpired) => HttpResponse::Gone()
            .content_type("text/html; charset=utf-8")
            .body(pages::confirm_link_expired()),
        Err(NewsletterError::RateLimited) => HttpResponse::TooManyRequests()
            .content_type("text/html; charset=utf-8")
            .body(pages::too_many_requests()),
        Err(err) => {
            tracing::error!("Failed to confirm the subscription: {:?}", err);
            HttpResponse::InternalServerError()
                .content_type("text/html; charset=utf-8")
                .body(pages::something_went_wrong())
        }
    }
}
