use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::auth::{authorize_admin, bearer_token, AuthError};
use crate::email_client::EmailClient;
use crate::repository::subscribers::PgSubscriberRepository;
use crate::routes::{ApiResponse, GENERIC_ERROR_MESSAGE};
use crate::services::broadcast;
use crate::startup::{AdminRecipient, AdminToken, ApplicationBaseUrl};

#[derive(Deserialize, Debug)]
pub struct NewNewsletterBody {
    pub subject: String,
    pub content_html: String,
}

impl NewNewsletterBody {
    fn validate(&self) -> Result<(), String> {
        if self.subject.trim().is_empty() {
            return Err("subject cannot be empty".to_string());
        }

        if self.content_html.trim().is_empty() {
            return Err("content_html cannot be empty".to_string());
        }

        Ok(())
    }
}

#[tracing::instrument(
    name = "Publishing a newsletter to all subscribers",
    skip(request, body, subscribers, email_client, base_url, admin_token),
    fields(subject = %body.subject)
)]
pub async fn handle_send_newsletter(
    request: HttpRequest,
    body: web::Json<NewNewsletterBody>,
    subscribers: web::Data<PgSubscriberRepository>,
    email_client: web::Data<EmailClient>,
    base_url: web::Data<ApplicationBaseUrl>,
    admin_token: web::Data<AdminToken>,
) -> HttpResponse {
    if let Some(response) = reject_unauthorized(&request, &admin_token) {
        return response;
    }

    if let Err(err) = body.validate() {
        return HttpResponse::BadRequest().json(ApiResponse::error(err));
    }

    match broadcast::send_broadcast(
        &body.subject,
        &body.content_html,
        subscribers.get_ref(),
        email_client.get_ref(),
        &base_url.0,
    )
    .await
    {
        Ok(summary) => HttpResponse::Ok().json(summary),
        Err(err) => {
            tracing::error!("Failed to broadcast the newsletter: {:?}", err);
            HttpResponse::InternalServerError().json(ApiResponse::error(GENERIC_ERROR_MESSAGE))
        }
    }
}

#[tracing::instrument(
    name = "Sending a test newsletter",
    skip(request, body, email_client, admin_token, admin_recipient),
    fields(subject = %body.subject)
)]
pub async fn handle_send_test_newsletter(
    request: HttpRequest,
    body: web::Json<NewNewsletterBody>,
    email_client: web::Data<EmailClient>,
    admin_token: web::Data<AdminToken>,
    admin_recipient: web::Data<AdminRecipient>,
) -> HttpResponse {
    if let Some(response) = reject_unauthorized(&request, &admin_token) {
        return response;
    }

    if let Err(err) = body.validate() {
        return HttpResponse::BadRequest().json(ApiResponse::error(err));
    }

    match broadcast::send_test(
        &body.subject,
        &body.content_html,
        admin_recipient.0.clone(),
        email_client.get_ref(),
    )
    .await
    {
        Ok(()) => {
            HttpResponse::Ok().json(ApiResponse::success("Test issue sent to the admin address."))
        }
        Err(err) => {
            tracing::error!("Failed to send the test newsletter: {:?}", err);
            HttpResponse::InternalServerError().json(ApiResponse::error(GENERIC_ERROR_MESSAGE))
        }
    }
}

fn reject_unauthorized(request: &HttpRequest, admin_token: &AdminToken) -> Option<HttpResponse> {
    match authorize_admin(bearer_token(request.headers()), &admin_token.0) {
        Ok(()) => None,
        Err(err @ AuthError::MissingCredentials) | Err(err @ AuthError::InvalidCredentials) => {
            tracing::warn!("Rejected admin request: {}", err);
            Some(HttpResponse::Unauthorized().json(ApiResponse::error(err.to_string())))
        }
    }
}
