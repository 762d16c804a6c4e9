use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::warehouse::{PickupRule, Warehouse};

pub const DEFAULT_HORIZON_DAYS: u32 = 14;
pub const MAX_DELIVERY_CHOICES: usize = 6;
pub const DATE_FORMAT: &str = "%d.%m.%Y";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("no delivery slots to {warehouse} within {horizon_days} days")]
    Exhausted { warehouse: Warehouse, horizon_days: u32 },
}

/// One feasible pickup/delivery pairing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub pickup: NaiveDate,
    pub delivery: NaiveDate,
}

fn last_on_or_before(date: NaiveDate, weekday: Weekday) -> NaiveDate {
    let back = (7 + date.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    date - Duration::days(i64::from(back))
}

fn last_strictly_before(date: NaiveDate, weekday: Weekday) -> NaiveDate {
    last_on_or_before(date - Duration::days(1), weekday)
}

/// Pickup dates allowed for a delivery on `delivery`, excluding anything not after `today`.
pub fn pickup_dates(warehouse: Warehouse, delivery: NaiveDate, today: NaiveDate) -> Vec<NaiveDate> {
    let candidates = match warehouse.pickup_rule() {
        PickupRule::SameDay => vec![delivery],
        PickupRule::PrecedingSundayOrSameDay => {
            let sunday = last_on_or_before(delivery, Weekday::Sun);
            if sunday == delivery {
                vec![delivery]
            } else {
                vec![sunday, delivery]
            }
        }
        PickupRule::PrecedingFriday => vec![last_strictly_before(delivery, Weekday::Fri)],
    };
    candidates.into_iter().filter(|date| *date > today).collect()
}

/// All feasible slots whose delivery falls in `today+1 ..= today+horizon_days`.
pub fn schedule(warehouse: Warehouse, today: NaiveDate, horizon_days: u32) -> Vec<Slot> {
    let weekdays = warehouse.delivery_weekdays();
    (1..=i64::from(horizon_days))
        .map(|offset| today + Duration::days(offset))
        .filter(|day| weekdays.contains(&day.weekday()))
        .flat_map(|delivery| {
            pickup_dates(warehouse, delivery, today)
                .into_iter()
                .map(move |pickup| Slot { pickup, delivery })
        })
        .collect()
}

/// Distinct delivery dates offered in the intake menu, earliest first.
pub fn delivery_choices(slots: &[Slot]) -> Vec<NaiveDate> {
    let mut choices: Vec<NaiveDate> = Vec::new();
    for slot in slots {
        if !choices.contains(&slot.delivery) {
            choices.push(slot.delivery);
        }
        if choices.len() == MAX_DELIVERY_CHOICES {
            break;
        }
    }
    choices
}

pub fn delivery_menu(
    warehouse: Warehouse,
    today: NaiveDate,
    horizon_days: u32,
) -> Result<Vec<NaiveDate>, ScheduleError> {
    let choices = delivery_choices(&schedule(warehouse, today, horizon_days));
    if choices.is_empty() {
        return Err(ScheduleError::Exhausted { warehouse, horizon_days });
    }
    Ok(choices)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses a `DD.MM.YYYY` date; anything looser is rejected.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    let bytes = trimmed.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[2] == b'.'
        && bytes[5] == b'.'
        && bytes.iter().enumerate().all(|(i, b)| i == 2 || i == 5 || b.is_ascii_digit());
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate, Weekday};

    use super::{
        delivery_choices, delivery_menu, format_date, parse_date, pickup_dates, schedule,
        DEFAULT_HORIZON_DAYS, MAX_DELIVERY_CHOICES,
    };
    use crate::domain::warehouse::Warehouse;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    // 2026-03-02 is a Monday.
    const MONDAY: (i32, u32, u32) = (2026, 3, 2);

    fn monday() -> NaiveDate {
        date(MONDAY.0, MONDAY.1, MONDAY.2)
    }

    #[test]
    fn ordinary_warehouse_picks_up_on_delivery_day() {
        let delivery = date(2026, 3, 5);
        assert_eq!(pickup_dates(Warehouse::Koledino, delivery, monday()), vec![delivery]);
    }

    #[test]
    fn kotovsk_offers_preceding_sunday_and_delivery_day() {
        let delivery = date(2026, 3, 16);
        assert_eq!(
            pickup_dates(Warehouse::Kotovsk, delivery, monday()),
            vec![date(2026, 3, 15), delivery]
        );
    }

    #[test]
    fn kotovsk_sunday_too_close_is_dropped() {
        let delivery = date(2026, 3, 9);
        let today = date(2026, 3, 8);
        assert_eq!(pickup_dates(Warehouse::Kotovsk, delivery, today), vec![delivery]);
    }

    #[test]
    fn kazan_picks_up_on_previous_friday() {
        let delivery = date(2026, 3, 15);
        assert_eq!(
            pickup_dates(Warehouse::Kazan, delivery, monday()),
            vec![date(2026, 3, 13)]
        );
    }

    #[test]
    fn pickups_never_fall_on_or_before_today() {
        for warehouse in Warehouse::ALL {
            for slot in schedule(warehouse, monday(), DEFAULT_HORIZON_DAYS) {
                assert!(slot.pickup > monday(), "{warehouse}: {slot:?}");
                assert!(slot.pickup <= slot.delivery);
            }
        }
    }

    #[test]
    fn schedule_respects_weekdays_and_horizon() {
        for warehouse in Warehouse::ALL {
            let slots = schedule(warehouse, monday(), DEFAULT_HORIZON_DAYS);
            assert!(!slots.is_empty(), "{warehouse} has no slots");
            for slot in slots {
                assert!(warehouse.delivery_weekdays().contains(&slot.delivery.weekday()));
                assert!(slot.delivery > monday());
                assert!(slot.delivery <= date(2026, 3, 16));
            }
        }
    }

    #[test]
    fn today_is_never_a_delivery_day() {
        let slots = schedule(Warehouse::Kotovsk, monday(), DEFAULT_HORIZON_DAYS);
        assert!(slots.iter().all(|slot| slot.delivery != monday()));
        assert_eq!(monday().weekday(), Weekday::Mon);
    }

    #[test]
    fn menu_is_capped_and_distinct() {
        let slots = schedule(Warehouse::Koledino, monday(), 30);
        let choices = delivery_choices(&slots);
        assert_eq!(choices.len(), MAX_DELIVERY_CHOICES);
        let mut deduped = choices.clone();
        deduped.dedup();
        assert_eq!(deduped, choices);
    }

    #[test]
    fn short_horizon_can_be_exhausted() {
        assert!(delivery_menu(Warehouse::Kazan, monday(), 2).is_err());
        assert!(delivery_menu(Warehouse::Kazan, monday(), DEFAULT_HORIZON_DAYS).is_ok());
    }

    #[test]
    fn date_format_is_strict() {
        assert_eq!(parse_date("05.03.2026"), Some(date(2026, 3, 5)));
        assert_eq!(parse_date("5.3.2026"), None);
        assert_eq!(parse_date("2026-03-05"), None);
        assert_eq!(parse_date("31.02.2026"), None);
        assert_eq!(format_date(date(2026, 3, 5)), "05.03.2026");
    }
}
