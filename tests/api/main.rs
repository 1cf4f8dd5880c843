mod contact;
mod health_check;
mod newsletters;
mod subscriptions;
