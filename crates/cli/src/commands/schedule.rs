use cargolink_core::ports::{Clock, SystemClock};
use cargolink_core::schedule::{self, format_date, parse_date, ScheduleError};
use cargolink_core::Warehouse;

use crate::commands::{load_config, CommandResult};

pub fn run(warehouse: &str, from: Option<&str>, horizon_days: u32) -> CommandResult {
    let warehouse = match warehouse.parse::<Warehouse>() {
        Ok(warehouse) => warehouse,
        Err(error) => {
            return CommandResult::failure("schedule", "invalid_input", error.to_string(), 2)
        }
    };

    let today = match from {
        Some(raw) => match parse_date(raw) {
            Some(date) => date,
            None => {
                return CommandResult::failure(
                    "schedule",
                    "invalid_input",
                    format!("`{raw}` is not a DD.MM.YYYY date"),
                    2,
                )
            }
        },
        None => match load_config("schedule") {
            Ok(config) => SystemClock::new(config.reminders.timezone).today(),
            Err(failure) => return failure,
        },
    };

    let slots = schedule::schedule(warehouse, today, horizon_days);
    if slots.is_empty() {
        let error = ScheduleError::Exhausted { warehouse, horizon_days };
        return CommandResult::failure("schedule", "schedule_exhausted", error.to_string(), 1);
    }

    let rendered: Vec<String> = slots
        .iter()
        .map(|slot| format!("{} -> {}", format_date(slot.pickup), format_date(slot.delivery)))
        .collect();
    CommandResult::success(
        "schedule",
        format!("{warehouse} from {}: {}", format_date(today), rendered.join("; ")),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::run;

    fn payload(output: &str) -> Value {
        serde_json::from_str(output).expect("schedule output should be JSON")
    }

    #[test]
    fn kazan_pickups_fall_on_the_friday_before() {
        // Monday 02.03.2026: the only Sunday within a week is 08.03.
        let result = run("Казань", Some("02.03.2026"), 7);

        assert_eq!(result.exit_code, 0);
        assert_eq!(
            payload(&result.output)["message"],
            "Казань from 02.03.2026: 06.03.2026 -> 08.03.2026"
        );
    }

    #[test]
    fn short_horizon_without_delivery_days_is_exhausted() {
        // Tuesday 03.03.2026; Kotovsk only delivers on Mondays.
        let result = run("Котовск", Some("03.03.2026"), 3);

        assert_eq!(result.exit_code, 1);
        assert_eq!(payload(&result.output)["error_class"], "schedule_exhausted");
    }

    #[test]
    fn loose_dates_are_rejected() {
        let result = run("Тула", Some("2026-03-02"), 7);

        assert_eq!(result.exit_code, 2);
        assert_eq!(payload(&result.output)["error_class"], "invalid_input");
    }
}
