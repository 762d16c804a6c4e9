use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use cargolink_core::config::ReminderConfig;
use cargolink_workflow::{next_run_after, PaymentReminderJob};

/// Runs the payment reminder pass once a day at the configured local time.
pub fn spawn_reminders(job: PaymentReminderJob, config: ReminderConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let Some(next) = next_run_after(now, config.hour, config.minute, config.timezone)
            else {
                error!(
                    event_name = "system.reminders.unschedulable",
                    correlation_id = "reminders",
                    hour = config.hour,
                    minute = config.minute,
                    "reminder time of day is invalid; scheduler stopped"
                );
                return;
            };
            info!(
                event_name = "system.reminders.scheduled",
                correlation_id = "reminders",
                next_run = %next,
                "next payment reminder pass scheduled"
            );
            tokio::time::sleep(delay_until(now, next)).await;

            match job.run_once().await {
                Ok(report) => info!(
                    event_name = "system.reminders.finished",
                    correlation_id = "reminders",
                    sent = report.sent,
                    failed = report.failed,
                    "payment reminders sent"
                ),
                Err(failure) => warn!(
                    event_name = "system.reminders.failed",
                    correlation_id = "reminders",
                    error = %failure,
                    "payment reminder pass failed; retrying at the next slot"
                ),
            }
        }
    })
}

fn delay_until(now: DateTime<Utc>, next: DateTime<Utc>) -> Duration {
    (next - now).to_std().unwrap_or(Duration::ZERO)
}
