//! Outbound collaborator seams. Adapters live in the server crate; tests use fakes.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::order::{DealId, Order};
use crate::errors::ExternalServiceError;
use crate::flows::CrmStage;

/// Partial deal update pushed to the CRM. `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealUpdate {
    pub stage: Option<CrmStage>,
    pub quantity: Option<u32>,
    pub opportunity: Option<u64>,
    pub gate_number: Option<String>,
    pub handed_over_at: Option<NaiveDateTime>,
}

impl DealUpdate {
    pub fn stage(stage: CrmStage) -> Self {
        Self { stage: Some(stage), ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.stage.is_none()
            && self.quantity.is_none()
            && self.opportunity.is_none()
            && self.gate_number.is_none()
            && self.handed_over_at.is_none()
    }
}

#[async_trait]
pub trait CrmGateway: Send + Sync {
    /// Creates company, requisites, address, bank details and the deal; returns the deal id.
    async fn submit_order(
        &self,
        order: &Order,
        client_username: Option<&str>,
    ) -> Result<DealId, ExternalServiceError>;

    async fn update_deal(&self, deal: &DealId, update: &DealUpdate)
        -> Result<(), ExternalServiceError>;

    /// Writes the single billable product row and returns its service name.
    async fn set_service_row(&self, deal: &DealId) -> Result<String, ExternalServiceError>;

    /// Generates the invoice document and returns its public download URL.
    async fn generate_invoice(&self, deal: &DealId) -> Result<String, ExternalServiceError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub amount: u64,
    pub client_id: String,
    pub order_reference: String,
    pub service_name: String,
    pub client_phone: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn fetch_token(&self) -> Result<String, ExternalServiceError>;

    /// Creates an instant-payment invoice and returns the payer link.
    async fn create_invoice(
        &self,
        token: &str,
        request: &InvoiceRequest,
    ) -> Result<String, ExternalServiceError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    pub address: String,
}

#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Resolves a tax id to a registered company; `Ok(None)` when nothing matches.
    async fn find_by_inn(&self, inn: &str) -> Result<Option<CompanyProfile>, ExternalServiceError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Wall-clock time in the business timezone.
    fn local_now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.local_now().date()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    timezone: Tz,
}

impl SystemClock {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(chrono_tz::Europe::Moscow)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.timezone).naive_local()
    }
}

/// Clock pinned to one instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock {
    now: DateTime<Utc>,
    timezone: Tz,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, timezone: Tz) -> Self {
        Self { now, timezone }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn local_now(&self) -> NaiveDateTime {
        self.now.with_timezone(&self.timezone).naive_local()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{Clock, DealUpdate, FixedClock};
    use crate::flows::CrmStage;

    #[test]
    fn fixed_clock_reports_business_date() {
        let instant = Utc.with_ymd_and_hms(2026, 3, 1, 22, 30, 0).single().expect("instant");
        let clock = FixedClock::new(instant, chrono_tz::Europe::Moscow);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 2).expect("date"));
        assert_eq!(clock.now(), instant);
    }

    #[test]
    fn stage_only_update_is_not_empty() {
        assert!(DealUpdate::default().is_empty());
        assert!(!DealUpdate::stage(CrmStage::Won).is_empty());
    }
}
