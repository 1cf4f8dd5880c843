use actix_web::{
    web::{self, Query},
    HttpRequest, HttpResponse,
};
use serde::Deserialize;

use crate::domain::subscriber::AuditMetadata;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::email_client::EmailClient;
use crate::rate_limit::client_ip;
use crate::repository::consent_log::PgConsentLogRepository;
use crate::repository::subscribers::PgSubscriberRepository;
use crate::routes::{pages, user_agent, ApiResponse, GENERIC_ERROR_MESSAGE};
use crate::services::gdpr::{self, DataAction, DataRequest, GdprError, VerifyOutcome};
use crate::startup::{ApplicationBaseUrl, RateLimiters};
use crate::tokens::RedisTokenStore;

#[derive(Deserialize)]
pub struct DataRequestBody {
    pub email: String,
    pub action: String,
}

#[tracing::instrument(
    name = "Data request handler",
    skip(request, body, subscribers, token_store, email_client, base_url, limiters),
    fields(email = %body.email, action = %body.action)
)]
pub async fn handle_privacy_request(
    request: HttpRequest,
    body: web::Json<DataRequestBody>,
    subscribers: web::Data<PgSubscriberRepository>,
    token_store: web::Data<RedisTokenStore>,
    email_client: web::Data<EmailClient>,
    base_url: web::Data<ApplicationBaseUrl>,
    limiters: web::Data<RateLimiters>,
) -> HttpResponse {
    let body = body.into_inner();
    let data_request = match parse_data_request(body, &request) {
        Ok(data_request) => data_request,
        Err(err) => {
            tracing::warn!("Validation error: {:?}", err);
            return request_error_response(GdprError::Validation(err));
        }
    };

    match gdpr::request_data_action(
        data_request,
        subscribers.get_ref(),
        &limiters.privacy_request,
        token_store.get_ref(),
        email_client.get_ref(),
        &base_url.0,
    )
    .await
    {
        Ok(()) => HttpResponse::Ok().json(ApiResponse::success(
            "Check your inbox for a verification link. It is valid for 15 minutes.",
        )),
        Err(err) => request_error_response(err),
    }
}

fn request_error_response(err: GdprError) -> HttpResponse {
    match err {
        GdprError::Validation(message) => {
            HttpResponse::BadRequest().json(ApiResponse::error(message))
        }
        GdprError::NotFound => HttpResponse::NotFound().json(ApiResponse::error(err.to_string())),
        GdprError::RateLimited => {
            HttpResponse::TooManyRequests().json(ApiResponse::error(err.to_string()))
        }
        err => {
            tracing::error!("Failed to handle the data request: {:?}", err);
            HttpResponse::InternalServerError().json(ApiResponse::error(GENERIC_ERROR_MESSAGE))
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct Parameters {
    pub token: String,
}

#[tracing::instrument(
    name = "Data request verification handler",
    skip(request, parameters, subscribers, consent_log, token_store, limiters)
)]
pub async fn handle_privacy_verify(
    request: HttpRequest,
    parameters: Query<Parameters>,
    subscribers: web::Data<PgSubscriberRepository>,
    consent_log: web::Data<PgConsentLogRepository>,
    token_store: web::Data<RedisTokenStore>,
    limiters: web::Data<RateLimiters>,
) -> HttpResponse {
    let outcome = gdpr::verify_data_action(
        &parameters.token,
        &client_ip(&request),
        subscribers.get_ref(),
        consent_log.get_ref(),
        &limiters.privacy_verify,
        token_store.get_ref(),
    )
    .await;

    match outcome {
        Ok(VerifyOutcome::Exported(document)) => HttpResponse::Ok().json(document),
        Ok(VerifyOutcome::Deleted) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(pages::data_deleted()),
        Err(GdprError::TokenNotFound) | Err(GdprError::NotFound) => HttpResponse::NotFound()
            .content_type("text/html; charset=utf-8")
            .body(pages::verification_link_invalid()),
        Err(GdprError::RateLimited) => HttpResponse::TooManyRequests()
            .content_type("text/html; charset=utf-8")
            .body(pages::too_many_requests()),
        Err(err) => {
            tracing::error!("Failed to verify the data request: {:?}", err);
            HttpResponse::InternalServerError()
                .content_type("text/html; charset=utf-8")
                .body(pages::something_went_wrong())
        }
    }
}

fn parse_data_request(
    body: DataRequestBody,
    request: &HttpRequest,
) -> Result<DataRequest, String> {
    let email = SubscriberEmail::parse(body.email)?;
    let action = DataAction::parse(body.action)?;

    Ok(DataRequest {
        email,
        action,
        audit: AuditMetadata {
            ip_address: Some(client_ip(request)),
            user_agent: user_agent(request),
        },
    })
}
