use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Pool, Postgres};
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

use crate::config::{DatabaseSettings, RateLimitSettings, Settings};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::email_client::EmailClient;
use crate::rate_limit::RedisFixedWindowLimiter;
use crate::repository::consent_log::PgConsentLogRepository;
use crate::repository::subscribers::PgSubscriberRepository;
use crate::routes::{
    handle_confirm_subscription, handle_contact_message, handle_create_subscription,
    handle_privacy_request, handle_privacy_verify, handle_send_newsletter,
    handle_send_test_newsletter, handle_unsubscribe, handle_update_preferences, health_check,
};
use crate::tokens::RedisTokenStore;

pub struct ApplicationBaseUrl(pub String);

/// Admin token injected at startup; handlers check it explicitly instead of
/// relying on middleware state.
pub struct AdminToken(pub secrecy::Secret<String>);

/// Where contact messages and test issues are delivered.
pub struct AdminRecipient(pub SubscriberEmail);

/// One independently configured limiter per protected endpoint.
pub struct RateLimiters {
    pub subscribe: RedisFixedWindowLimiter,
    pub confirm: RedisFixedWindowLimiter,
    pub contact: RedisFixedWindowLimiter,
    pub privacy_request: RedisFixedWindowLimiter,
    pub privacy_verify: RedisFixedWindowLimiter,
}

impl RateLimiters {
    pub fn from_settings(client: &redis::Client, settings: &RateLimitSettings) -> RateLimiters {
        let namespace = settings.namespace.clone();
        let limiter = |name: &str, quota| {
            RedisFixedWindowLimiter::new(client.clone(), namespace.clone(), name, quota)
        };

        RateLimiters {
            subscribe: limiter("subscribe", settings.subscribe),
            confirm: limiter("confirm", settings.confirm),
            contact: limiter("contact", settings.contact),
            privacy_request: limiter("privacy_request", settings.privacy_request),
            privacy_verify: limiter("privacy_verify", settings.privacy_verify),
        }
    }
}

pub struct Application {
    pub port: u16,
    pub server: Server,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, std::io::Error> {
        let db_pool = get_connection_db_pool(&config.database);
        let sender_email = config
            .get_email_client_sender()
            .expect("Sender email is not valid");
        let email_client = EmailClient::new(
            config.get_email_client_base_url(),
            sender_email,
            config.get_email_client_api(),
            None,
        );
        let redis_client = redis::Client::open(config.get_redis_address())
            .expect("Failed to create the Redis client.");

        let listener =
            TcpListener::bind(config.get_address()).expect("Failed to bind the address.");
        let port = listener.local_addr().unwrap().port();
        let server = run(listener, db_pool, email_client, redis_client, config)?;

        Ok(Self { port, server })
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stop(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn run(
    listener: TcpListener,
    db_pool: PgPool,
    email_client: EmailClient,
    redis_client: redis::Client,
    config: Settings,
) -> Result<Server, std::io::Error> {
    let subscribers = web::Data::new(PgSubscriberRepository::new(db_pool.clone()));
    let consent_log = web::Data::new(PgConsentLogRepository::new(db_pool));
    let email_client = web::Data::new(email_client);
    let base_url = web::Data::new(ApplicationBaseUrl(config.get_app_base_url()));
    let limiters = web::Data::new(RateLimiters::from_settings(
        &redis_client,
        &config.rate_limits,
    ));
    let token_store = web::Data::new(RedisTokenStore::new(
        redis_client,
        config.rate_limits.namespace.clone(),
    ));
    let admin_token = web::Data::new(AdminToken(config.get_admin_token()));
    let admin_recipient = web::Data::new(AdminRecipient(
        SubscriberEmail::parse(config.get_admin_email()).expect("Admin email is not valid"),
    ));

    let server = HttpServer::new(move || {
        // App is where your application logic lives: routing, middlewares, request handler, etc
        App::new()
            // 'wrap' method adds a middleware to the App. This specific middleware provide incoming
            // request logger
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .route("/subscriptions", web::post().to(handle_create_subscription))
            .route(
                "/subscriptions/confirm",
                web::get().to(handle_confirm_subscription),
            )
            .route(
                "/subscriptions/unsubscribe",
                web::get().to(handle_unsubscribe),
            )
            .route(
                "/subscriptions/preferences",
                web::post().to(handle_update_preferences),
            )
            .route("/contact", web::post().to(handle_contact_message))
            .route("/privacy/requests", web::post().to(handle_privacy_request))
            .route("/privacy/verify", web::get().to(handle_privacy_verify))
            .route("/newsletters", web::post().to(handle_send_newsletter))
            .route(
                "/newsletters/test",
                web::post().to(handle_send_test_newsletter),
            )
            .app_data(subscribers.clone())
            .app_data(consent_log.clone())
            .app_data(email_client.clone())
            .app_data(base_url.clone())
            .app_data(limiters.clone())
            .app_data(token_store.clone())
            .app_data(admin_token.clone())
            .app_data(admin_recipient.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}

pub fn get_connection_db_pool(config: &DatabaseSettings) -> Pool<Postgres> {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(config.get_db_options())
}
