//! Daily backup timer

use chrono::{DateTime, Local, NaiveTime, TimeZone};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::AppState;
use crate::logger;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Next occurrence of `at` strictly after `now`, in `now`'s time zone
///
/// A time skipped by a DST jump on a given day moves the run to the next
/// day.
fn next_run<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();
    for _ in 0..3 {
        if let Some(candidate) = tz.from_local_datetime(&day.and_time(at)).earliest() {
            if candidate > *now {
                return candidate;
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    now.clone() + chrono::Duration::days(1)
}

/// Spawn the daily backup task; `None` if the configured time is invalid
pub fn spawn_daily(state: Arc<AppState>) -> Option<JoinHandle<()>> {
    let backup = &state.config.backup;
    let Some(at) = NaiveTime::from_hms_opt(backup.hour, backup.minute, 0) else {
        logger::log_error(&format!(
            "Invalid backup time {:02}:{:02}, scheduler not started",
            backup.hour, backup.minute
        ));
        return None;
    };

    Some(tokio::spawn(async move {
        let now = Local::now();
        let first = next_run(&now, at);
        logger::log_info(&format!("Next backup at {}", first.format("%Y-%m-%d %H:%M:%S")));
        tokio::time::sleep((first - now).to_std().unwrap_or_default()).await;

        let mut ticker = tokio::time::interval(DAY);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            run_backup(&state).await;
        }
    }))
}

async fn run_backup(state: &AppState) {
    let Some(mailer) = state.mailer.as_ref() else {
        logger::log_warning("Scheduled backup skipped: SMTP is not configured");
        return;
    };
    if let Err(e) = mailer.send_backup(state.users.as_ref()).await {
        logger::log_error(&format!("Scheduled backup failed: {e}"));
    }
}
