use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::warehouse::Warehouse;
use crate::domain::{ChatId, MessageId};
use crate::errors::DomainError;
use crate::flows::{LifecycleEvent, OrderLifecycle, TransitionOutcome};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deal reference issued by the CRM when an order is submitted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DealId(pub String);

impl DealId {
    /// Parses a deal reference as the CRM sends it in hook parameters (`D_123` or `123`).
    pub fn from_hook_param(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix("D_").unwrap_or(trimmed);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(Self(digits.to_owned()))
    }
}

impl fmt::Display for DealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealType {
    Delivery,
    Fulfilment,
}

impl DealType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delivery => "delivery",
            Self::Fulfilment => "fulfilment",
        }
    }
}

impl FromStr for DealType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "delivery" => Ok(Self::Delivery),
            "fulfilment" => Ok(Self::Fulfilment),
            other => Err(DomainError::InvariantViolation(format!("unknown deal type `{other}`"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CargoType {
    Boxes,
    Pallets,
}

impl CargoType {
    pub const ALL: [CargoType; 2] = [CargoType::Boxes, CargoType::Pallets];

    /// Nominative label, as offered in the quick-calculation menu.
    pub fn label(self) -> &'static str {
        match self {
            Self::Boxes => "Короба",
            Self::Pallets => "Палеты",
        }
    }

    /// Menu button used in the order intake flow.
    pub fn button(self) -> &'static str {
        match self {
            Self::Boxes => "📦 Короба",
            Self::Pallets => "🧱 Палеты",
        }
    }

    /// Genitive plural used after "количество".
    pub fn unit(self) -> &'static str {
        match self {
            Self::Boxes => "коробов",
            Self::Pallets => "палет",
        }
    }

    pub fn crm_code(self) -> u32 {
        match self {
            Self::Boxes => 250,
            Self::Pallets => 252,
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        Self::ALL.into_iter().find(|cargo| cargo.label() == trimmed)
    }

    pub fn from_button(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        Self::ALL.into_iter().find(|cargo| cargo.button() == trimmed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    InProgress,
    Submitted,
    DriverAssigned,
    DriverConfirmed,
    Packing,
    InTransit,
    Delivered,
    AwaitingPayment,
    Paid,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Submitted => "submitted",
            Self::DriverAssigned => "driver_assigned",
            Self::DriverConfirmed => "driver_confirmed",
            Self::Packing => "packing",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Paid => "paid",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let status = match value {
            "in_progress" => Self::InProgress,
            "submitted" => Self::Submitted,
            "driver_assigned" => Self::DriverAssigned,
            "driver_confirmed" => Self::DriverConfirmed,
            "packing" => Self::Packing,
            "in_transit" => Self::InTransit,
            "delivered" => Self::Delivered,
            "awaiting_payment" => Self::AwaitingPayment,
            "paid" => Self::Paid,
            other => {
                return Err(DomainError::InvariantViolation(format!(
                    "unknown order status `{other}`"
                )))
            }
        };
        Ok(status)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Invoice,
    Sbp,
}

/// Legal identity of the shipper, reusable across orders once complete.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgIdentity {
    pub inn: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub bank_account: Option<String>,
    pub bank_code: Option<String>,
}

impl OrgIdentity {
    pub fn is_complete(&self) -> bool {
        [&self.inn, &self.name, &self.address, &self.bank_account, &self.bank_code]
            .iter()
            .all(|field| field.as_deref().is_some_and(|value| !value.trim().is_empty()))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRefs {
    /// Order summary shown to the client.
    pub summary: Option<MessageId>,
    /// New-order message in the driver chat.
    pub driver_order: Option<MessageId>,
    /// "Driver is on the way" notice in the client chat.
    pub client_driver_notice: Option<MessageId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverAssignment {
    pub chat_id: ChatId,
    pub username: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub method: Option<PaymentMethod>,
    pub invoice_url: Option<String>,
    pub service_name: Option<String>,
    pub last_reminder_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handover {
    pub gate_number: String,
    pub handed_over_at: NaiveDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub chat_id: ChatId,
    pub deal_type: DealType,
    pub status: OrderStatus,
    pub org: OrgIdentity,
    pub warehouse: Option<Warehouse>,
    pub delivery_date: Option<NaiveDate>,
    pub pickup_date: Option<NaiveDate>,
    pub cargo_type: Option<CargoType>,
    pub quantity: Option<u32>,
    pub pickup_address: Option<String>,
    pub phone: Option<String>,
    pub cost: Option<u64>,
    pub crm_deal_id: Option<DealId>,
    pub driver: Option<DriverAssignment>,
    pub messages: MessageRefs,
    pub payment: PaymentInfo,
    pub handover: Option<Handover>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new_draft(chat_id: ChatId, deal_type: DealType, now: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::generate(),
            chat_id,
            deal_type,
            status: OrderLifecycle.initial_state(),
            org: OrgIdentity::default(),
            warehouse: None,
            delivery_date: None,
            pickup_date: None,
            cargo_type: None,
            quantity: None,
            pickup_address: None,
            phone: None,
            cost: None,
            crm_deal_id: None,
            driver: None,
            messages: MessageRefs::default(),
            payment: PaymentInfo::default(),
            handover: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Starts a draft that reuses a previously completed legal identity.
    pub fn draft_with_org(
        chat_id: ChatId,
        deal_type: DealType,
        org: OrgIdentity,
        now: DateTime<Utc>,
    ) -> Self {
        Self { org, ..Self::new_draft(chat_id, deal_type, now) }
    }

    pub fn org_name(&self) -> &str {
        self.org.name.as_deref().unwrap_or("—")
    }

    pub fn warehouse_name(&self) -> &str {
        self.warehouse.map(Warehouse::name).unwrap_or("—")
    }

    pub fn cargo_unit(&self) -> &'static str {
        self.cargo_type.unwrap_or(CargoType::Boxes).unit()
    }

    pub fn deal_label(&self) -> String {
        self.crm_deal_id.as_ref().map(ToString::to_string).unwrap_or_else(|| "—".to_owned())
    }

    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.org.is_complete() {
            missing.push("org");
        }
        if self.warehouse.is_none() {
            missing.push("warehouse");
        }
        if self.delivery_date.is_none() {
            missing.push("delivery_date");
        }
        if self.pickup_date.is_none() {
            missing.push("pickup_date");
        }
        if self.cargo_type.is_none() {
            missing.push("cargo_type");
        }
        if !self.quantity.is_some_and(|quantity| quantity > 0) {
            missing.push("quantity");
        }
        if self.pickup_address.as_deref().map_or(true, |value| value.trim().is_empty()) {
            missing.push("pickup_address");
        }
        if self.phone.as_deref().map_or(true, |value| value.trim().is_empty()) {
            missing.push("phone");
        }
        if self.cost.is_none() {
            missing.push("cost");
        }
        missing
    }

    pub fn is_ready_for_submission(&self) -> bool {
        self.status == OrderStatus::InProgress && self.missing_required_fields().is_empty()
    }

    /// Applies a lifecycle event through the transition table and updates the status.
    pub fn advance(&mut self, event: LifecycleEvent) -> Result<TransitionOutcome, DomainError> {
        let outcome = OrderLifecycle.apply(self.status, event)?;
        self.status = outcome.to;
        Ok(outcome)
    }
}
