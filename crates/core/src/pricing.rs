use serde::{Deserialize, Serialize};

use crate::domain::order::{CargoType, DealType};
use crate::domain::warehouse::Warehouse;

/// Flat fee added to every box delivery.
pub const BOX_BASE_FEE: u64 = 500;

/// Distance band a warehouse falls into for pricing purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    Near,
    Regional,
    Remote,
    Distant,
}

impl Tier {
    pub fn of(warehouse: Warehouse) -> Self {
        match warehouse {
            Warehouse::Koledino
            | Warehouse::Elektrostal
            | Warehouse::Podolsk
            | Warehouse::Podolsk4
            | Warehouse::Obukhovo => Self::Near,
            Warehouse::Vladimir | Warehouse::Tula | Warehouse::Ryazan => Self::Regional,
            Warehouse::Kazan | Warehouse::Kotovsk => Self::Remote,
            Warehouse::Novosemeykino => Self::Distant,
        }
    }
}

/// Pallet cost shape for one tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PalletRate {
    /// First pallet at `first`, each additional pallet at `additional`.
    Stepped { first: u64, additional: u64 },
    /// Every pallet at the same price.
    Flat(u64),
}

impl PalletRate {
    fn cost(self, quantity: u64) -> u64 {
        match self {
            Self::Stepped { first, additional } => first + (quantity - 1) * additional,
            Self::Flat(each) => each * quantity,
        }
    }
}

/// Per-tier rates for one customer segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateTable {
    pub box_rates: [u64; 4],
    pub pallet_rates: [PalletRate; 4],
}

const PALLET_RATES: [PalletRate; 4] = [
    PalletRate::Stepped { first: 3_000, additional: 1_250 },
    PalletRate::Stepped { first: 4_000, additional: 2_000 },
    PalletRate::Flat(6_000),
    PalletRate::Flat(7_500),
];

pub const STANDARD_RATES: RateTable =
    RateTable { box_rates: [200, 300, 500, 600], pallet_rates: PALLET_RATES };

pub const DISCOUNTED_RATES: RateTable =
    RateTable { box_rates: [182, 245, 400, 500], pallet_rates: PALLET_RATES };

impl RateTable {
    /// Fulfilment customers get the discounted box table.
    pub fn for_deal_type(deal_type: DealType) -> &'static RateTable {
        match deal_type {
            DealType::Delivery => &STANDARD_RATES,
            DealType::Fulfilment => &DISCOUNTED_RATES,
        }
    }

    fn tier_index(tier: Tier) -> usize {
        match tier {
            Tier::Near => 0,
            Tier::Regional => 1,
            Tier::Remote => 2,
            Tier::Distant => 3,
        }
    }

    /// Delivery cost in whole roubles. Non-positive quantities cost nothing.
    pub fn price(&self, warehouse: Warehouse, cargo: CargoType, quantity: i64) -> u64 {
        let Ok(quantity) = u64::try_from(quantity) else {
            return 0;
        };
        if quantity == 0 {
            return 0;
        }

        let index = Self::tier_index(Tier::of(warehouse));
        match cargo {
            CargoType::Boxes => self.box_rates[index] * quantity + BOX_BASE_FEE,
            CargoType::Pallets => self.pallet_rates[index].cost(quantity),
        }
    }
}

pub trait PricingEngine: Send + Sync {
    fn price(&self, deal_type: DealType, warehouse: Warehouse, cargo: CargoType, quantity: i64)
        -> u64;
}

#[derive(Clone, Debug, Default)]
pub struct TariffPricingEngine;

impl PricingEngine for TariffPricingEngine {
    fn price(
        &self,
        deal_type: DealType,
        warehouse: Warehouse,
        cargo: CargoType,
        quantity: i64,
    ) -> u64 {
        RateTable::for_deal_type(deal_type).price(warehouse, cargo, quantity)
    }
}
