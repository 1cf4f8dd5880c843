use validator::validate_email;

// Throwaway inbox providers we refuse to deliver to. Small on purpose; abuse
// monitoring feeds additions.
const DISPOSABLE_DOMAINS: [&str; 6] = [
    "mailinator.com",
    "guerrillamail.com",
    "10minutemail.com",
    "tempmail.com",
    "throwawaymail.com",
    "yopmail.com",
];

/// A validated, case-normalized email address. One subscriber row exists per
/// normalized address, so normalization has to happen before any lookup.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    pub fn parse(email: String) -> Result<SubscriberEmail, String> {
        let normalized = email.trim().to_lowercase();
        let is_valid_email = validate_email(&normalized);

        if !is_valid_email {
            return Err(format!("{} email is not valid", email));
        }

        Ok(Self(normalized))
    }

    pub fn domain(&self) -> &str {
        // A validated address always contains '@'
        self.0.rsplit('@').next().unwrap_or("")
    }

    pub fn is_disposable(&self) -> bool {
        DISPOSABLE_DOMAINS.contains(&self.domain())
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriberEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
