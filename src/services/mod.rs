pub mod broadcast;
pub mod contact;
pub mod gdpr;
pub mod newsletter;
