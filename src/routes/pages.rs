//! Minimal HTML pages for the token-link endpoints. These are terminal
//! states; each one tells the user what actually happened and what to do
//! next.

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head><meta charset="utf-8"><title>{}</title></head>
  <body>
    <h1>{}</h1>
    <p>{}</p>
  </body>
</html>"#,
        title, title, body
    )
}

pub fn subscription_confirmed() -> String {
    page(
        "Subscription confirmed",
        "You are on the list. A welcome email is on its way.",
    )
}

pub fn confirm_link_invalid() -> String {
    page(
        "Unknown confirmation link",
        "This confirmation link is not valid. It may already have been used.",
    )
}

pub fn confirm_link_expired() -> String {
    page(
        "Confirmation link expired",
        "This confirmation link has expired. Please subscribe again to receive a fresh one.",
    )
}

pub fn unsubscribed() -> String {
    page("Unsubscribed", "You will not receive further emails.")
}

pub fn already_unsubscribed() -> String {
    page(
        "Already unsubscribed",
        "This address was already unsubscribed. Nothing changed.",
    )
}

pub fn unsubscribe_link_invalid() -> String {
    page(
        "Unknown unsubscribe link",
        "This unsubscribe link is not valid.",
    )
}

pub fn data_deleted() -> String {
    page(
        "Data deleted",
        "All data held for this address has been permanently removed.",
    )
}

pub fn verification_link_invalid() -> String {
    page(
        "Unknown verification link",
        "This verification link is not valid. It may have expired or already been used; \
         please submit a new request.",
    )
}

pub fn too_many_requests() -> String {
    page("Too many requests", "Please try again later.")
}

pub fn something_went_wrong() -> String {
    page("Something went wrong", "Please try again later.")
}
