//! Local day boundaries.

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use mirror_engine::ControlCommand;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

const FALLBACK_DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Time from `now` to the next midnight in `now`'s timezone.
pub fn until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    let next = now
        .date_naive()
        .succ_opt()
        .map(|day| day.and_time(NaiveTime::MIN))
        .and_then(|midnight| midnight.and_local_timezone(now.timezone()).earliest());

    match next {
        Some(next) => next
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(FALLBACK_DAY),
        // Midnight skipped by a DST jump
        None => FALLBACK_DAY,
    }
}

/// Start of the current local day, in UTC.
pub fn start_of_today() -> DateTime<Utc> {
    let now = Local::now();
    now.date_naive()
        .and_time(NaiveTime::MIN)
        .and_local_timezone(Local)
        .earliest()
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc) - chrono::Duration::hours(24))
}

/// Send [`ControlCommand::ResetDailyCounters`] at every local midnight until
/// the supervisor goes away.
pub async fn run_day_rollover(commands: mpsc::Sender<ControlCommand>) {
    loop {
        let wait = until_next_midnight(&Local::now());
        debug!(wait_secs = wait.as_secs(), "Next daily reset scheduled");
        tokio::time::sleep(wait).await;

        if commands.send(ControlCommand::ResetDailyCounters).await.is_err() {
            debug!("Supervisor gone, day rollover exiting");
            return;
        }
        info!("New day, daily counters reset");
    }
}
