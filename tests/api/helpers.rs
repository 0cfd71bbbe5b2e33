use reqwest::Response;
use sqlx::{migrate, Connection, Executor, PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;
use wiremock::MockServer;

use daily_greeting::{
    config::{get_configuration, DatabaseSettings, Settings},
    startup::{get_connection_db_pool, Application},
};

pub struct TestApp {
    pub config: Settings,
    pub address: String,
    pub db_pool: PgPool,
    pub email_server: MockServer,
}

pub struct ConfirmationLink {
    pub html: reqwest::Url,
}

impl TestApp {
    pub async fn spawn_app() -> TestApp {
        let mut config = get_configuration().expect("Missing configuration file.");
        let email_server = MockServer::start().await;

        // We are using port 0 as way to define a different port per each test. Port 0 is a special case that operating systems
        // take into account: when port is 0, the OS will search for the first available port
        config.set_app_port(0);
        config.set_email_client_base_url(email_server.uri());
        // The daily job is exercised by the scheduler unit tests
        config.set_scheduler_enabled(false);

        let db_pool = configure_db(&mut config.database).await;

        let application = Application::build(config.clone())
            .await
            .expect("Failed to build application.");

        let address = format!("http://127.0.0.1:{}", application.get_port());

        tokio::spawn(application.run_until_stop());

        TestApp {
            address,
            config,
            db_pool,
            email_server,
        }
    }

    pub async fn post_enrollment(&self, body: HashMap<&str, &str>) -> Response {
        reqwest::Client::new()
            .post(&format!("{}/enrollments", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Extracts the confirmation link from an email captured by the mock server,
    /// pointing it at the port the test application listens on.
    pub fn get_confirmation_link(&self, email_request: &wiremock::Request) -> ConfirmationLink {
        let body: serde_json::Value = serde_json::from_slice(&email_request.body).unwrap();
        let html = body["content"][0]["value"].as_str().unwrap();
        let links: Vec<_> = linkify::LinkFinder::new()
            .links(html)
            .filter(|link| *link.kind() == linkify::LinkKind::Url)
            .collect();

        // The same link is rendered as the anchor target and as its text
        assert!(!links.is_empty());
        assert!(links.iter().all(|link| link.as_str() == links[0].as_str()));

        let mut confirmation_link = reqwest::Url::parse(links[0].as_str()).unwrap();

        assert_eq!(confirmation_link.host_str().unwrap(), "127.0.0.1");
        confirmation_link
            .set_port(Some(self.address_port()))
            .unwrap();

        ConfirmationLink {
            html: confirmation_link,
        }
    }

    fn address_port(&self) -> u16 {
        reqwest::Url::parse(&self.address)
            .unwrap()
            .port()
            .unwrap()
    }
}

/// Creates an empty database with a random name and runs the migrations on it.
pub async fn configure_db(db_config: &mut DatabaseSettings) -> PgPool {
    let db_test_name = format!("db_{}", Uuid::new_v4().to_string().replace('-', "_"));
    let mut maintenance_config = db_config.clone();

    maintenance_config.set_name(String::from("postgres"));

    let mut connection = PgConnection::connect_with(&maintenance_config.get_db_options())
        .await
        .expect("Failed to connect to Postgres.");

    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, db_test_name))
        .await
        .expect("Failed to create database.");

    connection
        .close()
        .await
        .expect("Failed to close connection.");

    db_config.set_name(db_test_name);

    let db_pool = get_connection_db_pool(db_config);

    migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run migrations.");

    db_pool
}
