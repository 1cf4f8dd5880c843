use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::domain::new_subscription::{NewSubscription, NewSubscriptionBody};
use crate::domain::subscriber::AuditMetadata;
use crate::email_client::EmailClient;
use crate::rate_limit::client_ip;
use crate::repository::consent_log::PgConsentLogRepository;
use crate::repository::subscribers::PgSubscriberRepository;
use crate::routes::{user_agent, ApiResponse, GENERIC_ERROR_MESSAGE};
use crate::services::newsletter::{self, NewsletterError, PreferencesUpdate};
use crate::startup::{ApplicationBaseUrl, RateLimiters};

#[tracing::instrument(
    name = "Creating a newsletter subscription handler",
    skip(request, body, subscribers, email_client, base_url, limiters),
    fields(subscriber_email = %body.email)
)]
pub async fn handle_create_subscription(
    request: HttpRequest,
    body: web::Json<NewSubscriptionBody>,
    subscribers: web::Data<PgSubscriberRepository>,
    email_client: web::Data<EmailClient>,
    base_url: web::Data<ApplicationBaseUrl>,
    limiters: web::Data<RateLimiters>,
) -> HttpResponse {
    let audit = AuditMetadata {
        ip_address: Some(client_ip(&request)),
        user_agent: user_agent(&request),
    };
    let new_subscription = match NewSubscription::parse(body.into_inner().email, audit) {
        Ok(new_subscription) => new_subscription,
        Err(err) => {
            tracing::warn!("Validation error: {:?}", err);
            return subscription_error_response(NewsletterError::Validation(err));
        }
    };

    match newsletter::subscribe(
        new_subscription,
        subscribers.get_ref(),
        &limiters.subscribe,
        email_client.get_ref(),
        &base_url.0,
    )
    .await
    {
        Ok(_) => HttpResponse::Ok().json(ApiResponse::success(
            "Almost there! Check your inbox to confirm your subscription.",
        )),
        Err(err) => subscription_error_response(err),
    }
}

#[derive(Deserialize)]
pub struct PreferencesBody {
    pub token: String,
    pub allow_analytics: bool,
    pub allow_marketing: bool,
}

#[tracing::instrument(
    name = "Updating subscriber preferences handler",
    skip(request, body, subscribers, consent_log)
)]
pub async fn handle_update_preferences(
    request: HttpRequest,
    body: web::Json<PreferencesBody>,
    subscribers: web::Data<PgSubscriberRepository>,
    consent_log: web::Data<PgConsentLogRepository>,
) -> HttpResponse {
    let body = body.into_inner();
    let update = PreferencesUpdate {
        token: body.token,
        allow_analytics: body.allow_analytics,
        allow_marketing: body.allow_marketing,
        audit: AuditMetadata {
            ip_address: Some(client_ip(&request)),
            user_agent: user_agent(&request),
        },
    };

    match newsletter::update_preferences(update, subscribers.get_ref(), consent_log.get_ref())
        .await
    {
        Ok(()) => HttpResponse::Ok().json(ApiResponse::success("Your preferences were updated.")),
        Err(err) => subscription_error_response(err),
    }
}

fn subscription_error_response(err: NewsletterError) -> HttpResponse {
    match err {
        NewsletterError::Validation(message) => {
            HttpResponse::BadRequest().json(ApiResponse::error(message))
        }
        NewsletterError::DisposableEmail => {
            HttpResponse::UnprocessableEntity().json(ApiResponse::error(err.to_string()))
        }
        NewsletterError::AlreadySubscribed => {
            HttpResponse::Conflict().json(ApiResponse::error(err.to_string()))
        }
        NewsletterError::RateLimited => {
            HttpResponse::TooManyRequests().json(ApiResponse::error(err.to_string()))
        }
        NewsletterError::TokenNotFound => {
            HttpResponse::NotFound().json(ApiResponse::error(err.to_string()))
        }
        NewsletterError::TokenExpired => {
            HttpResponse::Gone().json(ApiResponse::error(err.to_string()))
        }
        err => {
            tracing::error!("Failed to handle the subscription request: {:?}", err);
            HttpResponse::InternalServerError().json(ApiResponse::error(GENERIC_ERROR_MESSAGE))
        }
    }
}
