use actix_web::{web, HttpRequest, HttpResponse};

use crate::domain::contact_message::{ContactMessage, ContactMessageBody};
use crate::domain::subscriber::AuditMetadata;
use crate::email_client::EmailClient;
use crate::rate_limit::client_ip;
use crate::routes::{user_agent, ApiResponse, GENERIC_ERROR_MESSAGE};
use crate::services::contact::{self, ContactError};
use crate::startup::{AdminRecipient, RateLimiters};

#[tracing::instrument(
    name = "Contact form handler",
    skip(request, body, email_client, limiters, admin_recipient),
    fields(sender_email = %body.email)
)]
pub async fn handle_contact_message(
    request: HttpRequest,
    body: web::Json<ContactMessageBody>,
    email_client: web::Data<EmailClient>,
    limiters: web::Data<RateLimiters>,
    admin_recipient: web::Data<AdminRecipient>,
) -> HttpResponse {
    let message = match ContactMessage::try_from(body.into_inner()) {
        Ok(message) => message,
        Err(err) => {
            tracing::warn!("Validation error: {:?}", err);
            return contact_error_response(ContactError::Validation(err));
        }
    };
    let audit = AuditMetadata {
        ip_address: Some(client_ip(&request)),
        user_agent: user_agent(&request),
    };

    match contact::send_contact_message(
        message,
        audit,
        &limiters.contact,
        email_client.get_ref(),
        &admin_recipient.0,
    )
    .await
    {
        Ok(()) => {
            HttpResponse::Ok().json(ApiResponse::success("Thanks! I will get back to you soon."))
        }
        Err(err) => contact_error_response(err),
    }
}

fn contact_error_response(err: ContactError) -> HttpResponse {
    match err {
        ContactError::Validation(message) => {
            HttpResponse::BadRequest().json(ApiResponse::error(message))
        }
        ContactError::DisposableEmail => {
            HttpResponse::UnprocessableEntity().json(ApiResponse::error(err.to_string()))
        }
        ContactError::RateLimited => {
            HttpResponse::TooManyRequests().json(ApiResponse::error(err.to_string()))
        }
        err => {
            tracing::error!("Failed to send the contact message: {:?}", err);
            HttpResponse::InternalServerError().json(ApiResponse::error(GENERIC_ERROR_MESSAGE))
        }
    }
}
