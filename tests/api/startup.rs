use daily_greeting::config::{get_configuration, Settings};
use daily_greeting::startup::{Application, StartupError};

fn config() -> Settings {
    let mut config = get_configuration().expect("Missing configuration file.");

    config.set_app_port(0);
    config
}

#[tokio::test]
async fn application_refuses_an_out_of_range_expiry_window() {
    for expiry_days in [-5, 0, 100_000_000] {
        let mut config = config();

        // Enrollments rely on the window even without the daily job
        config.set_scheduler_enabled(false);
        config.scheduler.expiry_days = expiry_days;

        let outcome = Application::build(config).await;

        assert!(
            matches!(outcome, Err(StartupError::InvalidConfiguration(_))),
            "expiry_days = {} was accepted",
            expiry_days
        );
    }
}

#[tokio::test]
async fn application_refuses_a_zero_send_timeout() {
    let mut config = config();

    config.set_scheduler_enabled(true);
    config.scheduler.send_timeout_milliseconds = 0;

    let outcome = Application::build(config).await;

    assert!(matches!(outcome, Err(StartupError::Scheduler(_))));
}
