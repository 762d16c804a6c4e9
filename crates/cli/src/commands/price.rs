use cargolink_core::pricing::{PricingEngine, TariffPricingEngine, Tier};
use cargolink_core::{CargoType, DealType, Warehouse};

use crate::commands::CommandResult;

pub fn run(
    warehouse: &str,
    cargo: CargoType,
    quantity: i64,
    deal_type: DealType,
) -> CommandResult {
    let warehouse = match warehouse.parse::<Warehouse>() {
        Ok(warehouse) => warehouse,
        Err(error) => {
            return CommandResult::failure("price", "invalid_input", error.to_string(), 2)
        }
    };
    if quantity <= 0 {
        return CommandResult::failure(
            "price",
            "invalid_input",
            format!("quantity must be a positive integer, got {quantity}"),
            2,
        );
    }

    let cost = TariffPricingEngine.price(deal_type, warehouse, cargo, quantity);
    CommandResult::success(
        "price",
        format!(
            "{warehouse} ({:?} tier), {quantity} {}, {} tariff: {cost}",
            Tier::of(warehouse),
            cargo.unit(),
            deal_type.as_str()
        ),
    )
}
