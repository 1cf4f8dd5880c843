use serde::Deserialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::domain::contact_name::ContactName;
use crate::domain::subscriber_email::SubscriberEmail;

const MAX_SUBJECT_CHARS: usize = 256;
const MAX_MESSAGE_CHARS: usize = 5000;

/// Validated contact-form submission.
#[derive(Debug)]
pub struct ContactMessage {
    pub name: ContactName,
    pub email: SubscriberEmail,
    pub subject: String,
    pub message: String,
}

#[derive(Deserialize)]
pub struct ContactMessageBody {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl TryFrom<ContactMessageBody> for ContactMessage {
    type Error = String;

    fn try_from(body: ContactMessageBody) -> Result<Self, Self::Error> {
        let name = ContactName::parse(body.name)?;
        let email = SubscriberEmail::parse(body.email)?;
        let subject = parse_bounded_text(body.subject, MAX_SUBJECT_CHARS, "subject")?;
        let message = parse_bounded_text(body.message, MAX_MESSAGE_CHARS, "message")?;

        Ok(ContactMessage {
            name,
            email,
            subject,
            message,
        })
    }
}

fn parse_bounded_text(value: String, max_chars: usize, field: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        return Err(format!("{} cannot be empty", field));
    }

    if value.graphemes(true).count() > max_chars {
        return Err(format!("{} is longer than {} characters", field, max_chars));
    }

    Ok(value)
}
