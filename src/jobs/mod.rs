/// Background job scheduler
///
/// Runs the nightly reaper sweep and the view-log pruning task. Jobs honor
/// the process shutdown signal: an in-flight batch finishes, then the loop
/// exits before the next one.
use crate::context::AppContext;
use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Duration};
use tracing::{error, info};

pub mod tasks;

/// How often the view log is pruned
const VIEW_PRUNE_INTERVAL: Duration = Duration::from_secs(6 * 3600);

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<AppContext>,
    shutdown: watch::Receiver<bool>,
}

impl JobScheduler {
    pub fn new(context: Arc<AppContext>, shutdown: watch::Receiver<bool>) -> Self {
        Self { context, shutdown }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::nightly_reaper_job(Arc::clone(&self)));
        tokio::spawn(Self::view_prune_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Nightly reaper sweep at the configured UTC hour
    async fn nightly_reaper_job(scheduler: Arc<Self>) {
        let hour = scheduler.context.config.reaper.hour_utc;
        let mut shutdown = scheduler.shutdown.clone();

        loop {
            let delay = delay_until_hour(Utc::now(), hour);
            info!(
                "Next reaper sweep in {}h{}m",
                delay.num_hours(),
                delay.num_minutes() % 60
            );

            tokio::select! {
                _ = sleep(Duration::from_secs(delay.num_seconds().max(0) as u64)) => {}
                _ = shutdown.changed() => {
                    info!("Reaper job shutting down");
                    return;
                }
            }

            match tasks::run_reaper(&scheduler.context, &mut shutdown).await {
                Ok(summary) => {
                    info!(
                        posts = summary.posts_expired,
                        comments = summary.comments_expired,
                        "Nightly reaper sweep complete"
                    );
                    if !summary.is_clean() {
                        error!("Reaper sweep recorded {} error(s)", summary.errors.len());
                    }
                }
                Err(e) => error!("Reaper sweep failed: {}", e),
            }
        }
    }

    /// Prune detailed view records past their retention window
    async fn view_prune_job(scheduler: Arc<Self>) {
        let mut ticker = interval(VIEW_PRUNE_INTERVAL);
        let mut shutdown = scheduler.shutdown.clone();

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    info!("View pruning job shutting down");
                    return;
                }
            }

            match tasks::prune_view_log(&scheduler.context).await {
                Ok(0) => {}
                Ok(count) => info!("Pruned {} view records past retention", count),
                Err(e) => error!("View pruning failed: {}", e),
            }
        }
    }
}

/// Time until the next occurrence of `hour:00` UTC, strictly in the future
fn delay_until_hour(now: DateTime<Utc>, hour: u32) -> ChronoDuration {
    let today_at_hour = now
        .with_hour(hour)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .expect("hour validated at config load");

    if today_at_hour > now {
        today_at_hour - now
    } else {
        today_at_hour + ChronoDuration::days(1) - now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn delay_targets_same_day_when_hour_is_ahead() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 1, 30, 0).unwrap();
        let delay = delay_until_hour(now, 3);
        assert_eq!(delay, ChronoDuration::minutes(90));
    }

    #[test]
    fn delay_rolls_to_next_day_when_hour_has_passed() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 4, 0, 0).unwrap();
        let delay = delay_until_hour(now, 3);
        assert_eq!(delay, ChronoDuration::hours(23));
    }

    #[test]
    fn delay_is_a_full_day_exactly_at_the_hour() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap();
        let delay = delay_until_hour(now, 3);
        assert_eq!(delay, ChronoDuration::days(1));
    }
}
