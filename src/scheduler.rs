use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::SchedulerSettings;
use crate::domain::daily_time::DailyTime;
use crate::domain::recipient_email::RecipientEmail;
use crate::lifecycle::RecipientLifecycle;
use crate::notification::{NotificationSender, SendError};
use crate::store::StoreError;
use crate::templates::{render_greeting, TemplateSelector};

pub const CYCLE_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);
pub const GREETING_SUBJECT: &str = "This is your message of the day from the Daily Greeting team";

/// Next occurrence of `at` in `now`'s timezone: today if it has not passed
/// yet, otherwise exactly one day later.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let timezone = now.timezone();
    let naive = now.date_naive().and_time(at);
    // A wall time skipped by a DST jump has no local mapping: it resolves to
    // the wall time one hour later.
    let today = timezone
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            timezone
                .from_local_datetime(&(naive + chrono::Duration::hours(1)))
                .latest()
        })
        .unwrap_or_else(|| timezone.from_utc_datetime(&naive));

    if *now > today {
        today + chrono::Duration::days(1)
    } else {
        today
    }
}

/// Sends the daily greeting to every active recipient once a day, then
/// expires the recipients whose enrollment ran out.
pub struct DailyScheduler {
    lifecycle: RecipientLifecycle,
    sender: Arc<dyn NotificationSender>,
    templates: Arc<dyn TemplateSelector>,
    fire_at: DailyTime,
    template_pool: usize,
    send_timeout: Duration,
    rng: StdRng,
}

#[derive(Debug)]
pub struct Delivery {
    pub recipient_id: Uuid,
    pub email: RecipientEmail,
    pub template_index: usize,
    pub outcome: Result<(), SendError>,
}

/// Outcome of one cycle. Send failures are recorded per recipient and never
/// abort the cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub deliveries: Vec<Delivery>,
    pub expiry_sweep: Result<u64, StoreError>,
}

impl CycleReport {
    pub fn sent(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|delivery| delivery.outcome.is_ok())
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &Delivery> {
        self.deliveries
            .iter()
            .filter(|delivery| delivery.outcome.is_err())
    }
}

#[derive(thiserror::Error)]
pub enum CycleError {
    #[error("Failed to fetch the active recipients.")]
    ListActive(#[source] StoreError),
}

impl std::fmt::Debug for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleError::ListActive(err) => write!(f, "{}\n{:?}", self, err),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfiguration(String),
}

impl DailyScheduler {
    pub fn new(
        settings: &SchedulerSettings,
        lifecycle: RecipientLifecycle,
        sender: Arc<dyn NotificationSender>,
        templates: Arc<dyn TemplateSelector>,
    ) -> Result<Self, SchedulerError> {
        let fire_at = settings
            .get_daily_time()
            .map_err(SchedulerError::InvalidConfiguration)?;

        if settings.max_templates == 0 {
            return Err(SchedulerError::InvalidConfiguration(String::from(
                "max_templates must be greater than zero",
            )));
        }
        settings
            .get_expiry_window()
            .map_err(SchedulerError::InvalidConfiguration)?;
        let send_timeout = settings
            .get_send_timeout()
            .map_err(SchedulerError::InvalidConfiguration)?;

        Ok(Self {
            lifecycle,
            sender,
            templates,
            fire_at,
            template_pool: settings.max_templates,
            send_timeout,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn fire_at(&self) -> DailyTime {
        self.fire_at
    }

    /// Runs until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        self.run_from(Local::now(), shutdown).await
    }

    /// Same as [`DailyScheduler::run`], computing the first fire time from
    /// `now`. Later cycles follow a 24 h timer, so drift accumulated by long
    /// cycles is never corrected.
    pub async fn run_from<Tz>(mut self, now: DateTime<Tz>, shutdown: CancellationToken)
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let next_run = next_run_after(&now, self.fire_at.as_naive());
        let initial_delay = next_run
            .clone()
            .signed_duration_since(now)
            .to_std()
            .unwrap_or_default();

        tracing::info!(
            next_run = %next_run.to_rfc3339(),
            "Daily greeting job scheduled at {}",
            self.fire_at
        );

        let first_tick = Instant::now() + initial_delay;
        let mut ticker = tokio::time::interval_at(first_tick, CYCLE_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Daily greeting job cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&mut self) {
        tracing::info!("Daily greeting cycle starts at {}", Utc::now());

        match self.run_cycle().await {
            Ok(report) => tracing::info!(
                sent = report.sent(),
                failed = report.failed().count(),
                "Daily greeting cycle ends at {}",
                Utc::now()
            ),
            Err(err) => tracing::error!("Daily greeting cycle aborted: {:?}", err),
        }
    }

    /// One full cycle: greet every active recipient, then soft-delete the
    /// expired ones.
    #[tracing::instrument(name = "Run the daily greeting cycle", skip(self))]
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let recipients = self
            .lifecycle
            .active_recipients(Utc::now())
            .await
            .map_err(CycleError::ListActive)?;
        let mut deliveries = Vec::with_capacity(recipients.len());

        for recipient in recipients {
            let template_index = self.rng.gen_range(0..self.template_pool);
            let html_body = render_greeting(&self.templates.select(template_index));
            let outcome = self.deliver(&recipient.email, &html_body).await;

            if let Err(err) = &outcome {
                tracing::warn!(
                    recipient_id = %recipient.id,
                    "Failed to send the daily greeting: {:?}",
                    err
                );
            }

            deliveries.push(Delivery {
                recipient_id: recipient.id,
                email: recipient.email,
                template_index,
                outcome,
            });
        }

        let expiry_sweep = self.lifecycle.expire(Utc::now()).await;

        if let Err(err) = &expiry_sweep {
            tracing::error!("Failed to expire recipients: {:?}", err);
        }

        Ok(CycleReport {
            deliveries,
            expiry_sweep,
        })
    }

    async fn deliver(&self, email: &RecipientEmail, html_body: &str) -> Result<(), SendError> {
        tokio::time::timeout(
            self.send_timeout,
            self.sender.send(email, GREETING_SUBJECT, html_body),
        )
        .await
        .unwrap_or(Err(SendError::TimedOut(self.send_timeout)))
    }
}
