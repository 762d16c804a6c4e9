use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::CargoType;
use crate::domain::warehouse::Warehouse;
use crate::domain::ChatId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalculationId(pub String);

impl CalculationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for CalculationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub const DEFAULT_MARKETPLACE: &str = "Wildberries";

/// Throwaway quick-quote record; never becomes an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calculation {
    pub id: CalculationId,
    pub chat_id: ChatId,
    pub marketplace: String,
    pub warehouse: Option<Warehouse>,
    pub cargo_type: Option<CargoType>,
    pub quantity: Option<u32>,
    pub cost: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl Calculation {
    pub fn new(chat_id: ChatId, now: DateTime<Utc>) -> Self {
        Self {
            id: CalculationId::generate(),
            chat_id,
            marketplace: DEFAULT_MARKETPLACE.to_owned(),
            warehouse: None,
            cargo_type: None,
            quantity: None,
            cost: None,
            created_at: now,
        }
    }
}
