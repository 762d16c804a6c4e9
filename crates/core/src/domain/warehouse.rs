use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Marketplace fulfilment warehouses served by the delivery routes.
///
/// Variant order is the order warehouses are offered in chat menus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Warehouse {
    #[serde(rename = "Коледино")]
    Koledino,
    #[serde(rename = "Подольск")]
    Podolsk,
    #[serde(rename = "Подольск 4")]
    Podolsk4,
    #[serde(rename = "Тула")]
    Tula,
    #[serde(rename = "Электросталь")]
    Elektrostal,
    #[serde(rename = "Обухово")]
    Obukhovo,
    #[serde(rename = "Казань")]
    Kazan,
    #[serde(rename = "Владимир")]
    Vladimir,
    #[serde(rename = "Рязань")]
    Ryazan,
    #[serde(rename = "Котовск")]
    Kotovsk,
    #[serde(rename = "Новосемейкино")]
    Novosemeykino,
}

/// How pickup dates are derived from a chosen delivery date.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickupRule {
    /// Pickup on the delivery day itself.
    SameDay,
    /// Pickup on the Sunday at or before delivery, or on the delivery day.
    PrecedingSundayOrSameDay,
    /// Pickup on the Friday strictly before delivery.
    PrecedingFriday,
}

impl Warehouse {
    pub const ALL: [Warehouse; 11] = [
        Warehouse::Koledino,
        Warehouse::Podolsk,
        Warehouse::Podolsk4,
        Warehouse::Tula,
        Warehouse::Elektrostal,
        Warehouse::Obukhovo,
        Warehouse::Kazan,
        Warehouse::Vladimir,
        Warehouse::Ryazan,
        Warehouse::Kotovsk,
        Warehouse::Novosemeykino,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Koledino => "Коледино",
            Self::Podolsk => "Подольск",
            Self::Podolsk4 => "Подольск 4",
            Self::Tula => "Тула",
            Self::Elektrostal => "Электросталь",
            Self::Obukhovo => "Обухово",
            Self::Kazan => "Казань",
            Self::Vladimir => "Владимир",
            Self::Ryazan => "Рязань",
            Self::Kotovsk => "Котовск",
            Self::Novosemeykino => "Новосемейкино",
        }
    }

    /// CRM list-field value identifying the warehouse on a deal.
    pub fn crm_code(self) -> u32 {
        match self {
            Self::Koledino => 54,
            Self::Podolsk => 58,
            Self::Podolsk4 => 60,
            Self::Tula => 246,
            Self::Elektrostal => 62,
            Self::Obukhovo => 64,
            Self::Kazan => 66,
            Self::Vladimir => 253,
            Self::Ryazan => 244,
            Self::Kotovsk => 248,
            Self::Novosemeykino => 264,
        }
    }

    pub fn from_crm_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|warehouse| warehouse.crm_code() == code)
    }

    pub fn delivery_weekdays(self) -> &'static [Weekday] {
        match self {
            Self::Elektrostal | Self::Obukhovo | Self::Ryazan | Self::Vladimir => {
                &[Weekday::Mon, Weekday::Wed, Weekday::Fri]
            }
            Self::Kotovsk => &[Weekday::Mon],
            Self::Koledino | Self::Podolsk | Self::Podolsk4 | Self::Tula => {
                &[Weekday::Tue, Weekday::Thu, Weekday::Sat]
            }
            Self::Kazan | Self::Novosemeykino => &[Weekday::Sun],
        }
    }

    pub fn pickup_rule(self) -> PickupRule {
        match self {
            Self::Kotovsk => PickupRule::PrecedingSundayOrSameDay,
            Self::Kazan | Self::Novosemeykino => PickupRule::PrecedingFriday,
            _ => PickupRule::SameDay,
        }
    }
}

impl fmt::Display for Warehouse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Warehouse {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|warehouse| warehouse.name() == trimmed)
            .ok_or_else(|| DomainError::UnknownWarehouse(trimmed.to_owned()))
    }
}
