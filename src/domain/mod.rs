pub mod consent;
pub mod contact_message;
pub mod contact_name;
pub mod new_subscription;
pub mod subscriber;
pub mod subscriber_email;
pub mod subscriber_status;
