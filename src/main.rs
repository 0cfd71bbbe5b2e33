use daily_greeting::config::get_configuration;
use daily_greeting::startup::Application;
use daily_greeting::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let subscriber = get_subscriber(String::from("daily_greeting"), String::from("info"));

    init_subscriber(subscriber);

    let config = get_configuration().expect("Missing configuration file.");
    let address = config.get_address();
    let application = Application::build(config)
        .await
        .expect("Failed to build application.");

    tracing::info!("Server listening on {}", address);

    application.run_until_stop().await
}
