mod contact;
mod health_check;
mod newsletters;
mod pages;
mod privacy;
mod subscriptions;
mod subscriptions_confirm;
mod unsubscribe;

pub use contact::handle_contact_message;
pub use health_check::health_check;
pub use newsletters::{handle_send_newsletter, handle_send_test_newsletter};
pub use privacy::{handle_privacy_request, handle_privacy_verify};
pub use subscriptions::{handle_create_subscription, handle_update_preferences};
pub use subscriptions_confirm::handle_confirm_subscription;
pub use unsubscribe::handle_unsubscribe;

use actix_web::http::header;
use actix_web::HttpRequest;

/// The message infrastructure failures are reduced to; details stay in the
/// logs.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again later.";

/// Discriminated result shape shared by all JSON endpoints.
#[derive(serde::Serialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>) -> ApiResponse {
        ApiResponse {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> ApiResponse {
        ApiResponse {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

pub(crate) fn user_agent(request: &HttpRequest) -> Option<String> {
    request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(String::from)
}
