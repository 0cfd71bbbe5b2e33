use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::net::TcpListener;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_actix_web::TracingLogger;

use crate::config::{DatabaseSettings, Settings};
use crate::email_client::EmailClient;
use crate::lifecycle::RecipientLifecycle;
use crate::routes::{handle_confirm_enrollment, handle_request_enrollment, health_check};
use crate::scheduler::{DailyScheduler, SchedulerError};
use crate::store::PgRecipientStore;
use crate::templates::GreetingTemplates;

pub struct ApplicationBaseUrl(pub String);

/// How long a confirmed enrollment keeps receiving greetings.
pub struct EnrollmentWindow(pub chrono::Duration);

pub struct Application {
    port: u16,
    server: Server,
    scheduler: Option<DailyScheduler>,
    shutdown: CancellationToken,
}

#[derive(thiserror::Error, Debug)]
pub enum StartupError {
    #[error("Failed to bind the address.")]
    Bind(#[from] std::io::Error),
    #[error("Sender email is not valid: {0}")]
    InvalidSender(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Failed to build the email client.")]
    EmailClient(#[from] reqwest::Error),
    #[error("Failed to open the Redis client.")]
    Redis(#[from] redis::RedisError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, StartupError> {
        let db_pool = get_connection_db_pool(&config.database);
        let lifecycle = RecipientLifecycle::new(Arc::new(PgRecipientStore::new(db_pool)));
        let sender_email = config
            .get_email_client_sender()
            .map_err(StartupError::InvalidSender)?;
        let email_client = Arc::new(EmailClient::new(
            config.get_email_client_base_url(),
            sender_email,
            config.get_email_client_api(),
            Some(config.get_email_client_timeout()),
        )?);
        let redis_client = redis::Client::open(config.get_redis_address())?;
        // Enrollments use the window even when the daily job is disabled
        let window = config
            .get_expiry_window()
            .map_err(StartupError::InvalidConfiguration)?;

        // A bad schedule must stop the service before it starts listening
        let scheduler = if config.is_scheduler_enabled() {
            Some(DailyScheduler::new(
                &config.scheduler,
                lifecycle.clone(),
                email_client.clone(),
                Arc::new(GreetingTemplates),
            )?)
        } else {
            None
        };

        let listener = TcpListener::bind(config.get_address())?;
        let port = listener.local_addr()?.port();
        let server = run(
            listener,
            lifecycle,
            email_client,
            redis_client,
            ApplicationBaseUrl(config.get_app_base_url()),
            EnrollmentWindow(window),
        )?;

        Ok(Self {
            port,
            server,
            scheduler,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stop(self) -> Result<(), std::io::Error> {
        let scheduler = self.scheduler.map(|scheduler| {
            tracing::info!("Daily greeting job starts, firing at {}", scheduler.fire_at());
            tokio::spawn(scheduler.run(self.shutdown.clone()))
        });

        let outcome = self.server.await;

        self.shutdown.cancel();
        if let Some(handle) = scheduler {
            if let Err(err) = handle.await {
                tracing::error!("Daily greeting job stopped abnormally: {:?}", err);
            }
        }

        outcome
    }
}

pub fn run(
    listener: TcpListener,
    lifecycle: RecipientLifecycle,
    email_client: Arc<EmailClient>,
    redis_client: redis::Client,
    base_url: ApplicationBaseUrl,
    window: EnrollmentWindow,
) -> Result<Server, std::io::Error> {
    let lifecycle = web::Data::new(lifecycle);
    let email_client = web::Data::from(email_client);
    let redis_client = web::Data::new(redis_client);
    let base_url = web::Data::new(base_url);
    let window = web::Data::new(window);

    let server = HttpServer::new(move || {
        // App is where your application logic lives: routing, middlewares, request handler, etc
        App::new()
            // 'wrap' method adds a middleware to the App. This specific middleware provide incoming
            // request logger
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .route("/enrollments", web::post().to(handle_request_enrollment))
            .route(
                "/enrollments/confirm",
                web::get().to(handle_confirm_enrollment),
            )
            .app_data(lifecycle.clone())
            .app_data(email_client.clone())
            .app_data(redis_client.clone())
            .app_data(base_url.clone())
            .app_data(window.clone())
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
