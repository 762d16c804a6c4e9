//! Daily resend of payment links for orders still awaiting payment.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use cargolink_core::domain::session::BotRole;
use cargolink_telegram::OutgoingMessage;

use crate::error::WorkflowError;
use crate::messages;
use crate::services::Services;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReminderReport {
    pub sent: usize,
    pub failed: usize,
}

pub struct PaymentReminderJob {
    services: Arc<Services>,
}

impl PaymentReminderJob {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    /// One pass over `awaiting_payment` orders that carry an invoice link.
    ///
    /// Orders whose reminder could not be delivered keep their previous stamp.
    pub async fn run_once(&self) -> Result<ReminderReport, WorkflowError> {
        let services = &self.services;
        let due = services.orders.list_awaiting_payment_with_invoice().await?;
        let mut report = ReminderReport::default();

        for mut order in due {
            let deal = order.crm_deal_id.clone();
            let (Some(deal), Some(url)) = (deal, order.payment.invoice_url.clone()) else {
                continue;
            };
            let text = messages::payment_reminder(&deal, &url);
            let message = OutgoingMessage::markdown(text).without_preview();
            let role = BotRole::for_deal_type(order.deal_type);
            if services.say(role, order.chat_id, &message).await.is_none() {
                report.failed += 1;
                continue;
            }

            let now = services.clock.now();
            order.payment.last_reminder_at = Some(now);
            order.updated_at = now;
            services.orders.save(&order).await?;
            report.sent += 1;
        }

        tracing::info!(
            event_name = "reminders.completed",
            sent = report.sent,
            failed = report.failed,
            "payment reminder pass finished"
        );
        Ok(report)
    }
}

/// Next instant strictly after `now` at which the local clock in `timezone` reads
/// `hour:minute`. Returns `None` for an invalid time of day.
pub fn next_run_after(
    now: DateTime<Utc>,
    hour: u32,
    minute: u32,
    timezone: Tz,
) -> Option<DateTime<Utc>> {
    let at = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let mut date = now.with_timezone(&timezone).date_naive();
    for _ in 0..3 {
        // DST gaps have no local instant; `earliest` picks the first of a repeated one.
        if let Some(candidate) = timezone.from_local_datetime(&date.and_time(at)).earliest() {
            let candidate = candidate.with_timezone(&Utc);
            if candidate > now {
                return Some(candidate);
            }
        }
        date = date.checked_add_days(Days::new(1))?;
    }
    None
}
