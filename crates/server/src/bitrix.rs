//! Bitrix24 REST adapter over an inbound webhook URL.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use cargolink_core::domain::order::{CargoType, DealId, DealType, Order};
use cargolink_core::domain::warehouse::Warehouse;
use cargolink_core::errors::ExternalServiceError;
use cargolink_core::ports::{CrmGateway, DealUpdate};

const SERVICE: &str = "bitrix";

/// Sales pipeline the bots create deals in.
const DEAL_CATEGORY_ID: u32 = 2;
const ASSIGNED_BY_ID: u32 = 1;
const INVOICE_TEMPLATE_ID: u32 = 4;
const ENTITY_TYPE_DEAL: u32 = 2;
const ENTITY_TYPE_COMPANY: u32 = 4;
const ENTITY_TYPE_REQUISITE: u32 = 8;
const ADDRESS_TYPE_LEGAL: u32 = 6;

mod field {
    pub const SOURCE: &str = "UF_CRM_1729569844156";
    pub const PICKUP_ADDRESS: &str = "UF_CRM_1724923450176";
    pub const QUANTITY: &str = "UF_CRM_1724923582938";
    pub const CARGO_TYPE: &str = "UF_CRM_1751787406541";
    pub const DELIVERY_DATE: &str = "UF_CRM_1724923635379";
    pub const PICKUP_DATE: &str = "UF_CRM_1724923649863";
    pub const CHAT_ID: &str = "UF_CRM_1724923726538";
    pub const WAREHOUSE: &str = "UF_CRM_1724923553452";
    pub const FULFILMENT: &str = "UF_CRM_1751787327257";
    pub const GATE_NUMBER: &str = "UF_CRM_1724923710659";
    pub const HANDED_OVER_AT: &str = "UF_CRM_1724923678625";
    pub const CONTRACT_NUMBER: &str = "UF_CRM_1751973413773";
    pub const CONTRACT_DATE: &str = "UF_CRM_1752132156032";
}

/// Value of the deal "source" list field for bot-created deals.
const SOURCE_TELEGRAM_BOT: u32 = 114;

#[derive(Debug, Deserialize)]
struct BitrixResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Clone)]
pub struct BitrixCrm {
    client: Client,
    webhook_url: SecretString,
}

impl BitrixCrm {
    pub fn new(client: Client, webhook_url: SecretString) -> Self {
        Self { client, webhook_url }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.webhook_url.expose_secret().trim_end_matches('/'))
    }

    async fn call(&self, method: &'static str, body: Value) -> Result<Value, ExternalServiceError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                ExternalServiceError::new(SERVICE, method, error.without_url().to_string())
            })?;

        let status = response.status();
        let payload: BitrixResponse = response.json().await.map_err(|error| {
            ExternalServiceError::new(SERVICE, method, format!("HTTP {status}: {error}"))
        })?;

        if let Some(code) = payload.error {
            let description = payload.error_description.unwrap_or_default();
            let message = format!("{code}: {description}");
            return Err(ExternalServiceError::new(SERVICE, method, message));
        }
        if !status.is_success() {
            return Err(ExternalServiceError::new(SERVICE, method, format!("HTTP {status}")));
        }
        payload
            .result
            .ok_or_else(|| ExternalServiceError::new(SERVICE, method, "response has no result"))
    }

    async fn find_or_create_company(
        &self,
        order: &Order,
        client_username: Option<&str>,
    ) -> Result<String, ExternalServiceError> {
        let filter = json!({ "filter": { "TITLE": order.org_name() } });
        let found = self.call("crm.company.list", filter).await?;
        let existing =
            found.as_array().and_then(|items| items.first()).and_then(|item| id_of(&item["ID"]));
        if let Some(id) = existing {
            info!(event_name = "bitrix.company.found", company_id = %id, "company already in CRM");
            return Ok(id);
        }

        let created = self
            .call("crm.company.add", json!({ "fields": company_fields(order, client_username) }))
            .await?;
        let company_id = id_of(&created).ok_or_else(|| {
            ExternalServiceError::new(SERVICE, "crm.company.add", "no company id returned")
        })?;

        let requisite = self
            .call(
                "crm.requisite.add",
                json!({ "fields": {
                    "ENTITY_TYPE_ID": ENTITY_TYPE_COMPANY,
                    "ENTITY_ID": company_id,
                    "PRESET_ID": 1,
                    "NAME": "Основной реквизит",
                    "RQ_INN": order.org.inn,
                    "RQ_COMPANY_NAME": order.org_name(),
                    "RQ_COMPANY_FULL_NAME": order.org_name(),
                }}),
            )
            .await?;
        let requisite_id = id_of(&requisite).ok_or_else(|| {
            ExternalServiceError::new(SERVICE, "crm.requisite.add", "no requisite id returned")
        })?;

        self.call(
            "crm.address.add",
            json!({ "fields": {
                "TYPE_ID": ADDRESS_TYPE_LEGAL,
                "ENTITY_TYPE_ID": ENTITY_TYPE_REQUISITE,
                "ENTITY_ID": requisite_id,
                "COUNTRY": "RU",
                "ADDRESS_1": order.org.address,
            }}),
        )
        .await?;

        self.call(
            "crm.requisite.bankdetail.add",
            json!({ "fields": {
                "ENTITY_ID": requisite_id,
                "NAME": "Банк",
                "RQ_BIK": order.org.bank_code,
                "RQ_ACC_NUM": order.org.bank_account,
                "RQ_ACC_CURRENCY": "RUB",
            }}),
        )
        .await?;

        info!(event_name = "bitrix.company.created", company_id = %company_id, "company created");
        Ok(company_id)
    }
}

#[async_trait]
impl CrmGateway for BitrixCrm {
    async fn submit_order(
        &self,
        order: &Order,
        client_username: Option<&str>,
    ) -> Result<DealId, ExternalServiceError> {
        let company_id = self.find_or_create_company(order, client_username).await?;
        let created = self
            .call("crm.deal.add", json!({ "fields": deal_fields(order, &company_id) }))
            .await?;
        let deal = id_of(&created).map(DealId).ok_or_else(|| {
            ExternalServiceError::new(SERVICE, "crm.deal.add", "no deal id returned")
        })?;
        info!(
            event_name = "bitrix.deal.created",
            deal_id = %deal,
            order_id = %order.id,
            "deal created"
        );
        Ok(deal)
    }

    async fn update_deal(
        &self,
        deal: &DealId,
        update: &DealUpdate,
    ) -> Result<(), ExternalServiceError> {
        if update.is_empty() {
            return Ok(());
        }
        self.call("crm.deal.update", json!({ "id": deal.0, "fields": update_fields(update) }))
            .await?;
        Ok(())
    }

    async fn set_service_row(&self, deal: &DealId) -> Result<String, ExternalServiceError> {
        let fetched = self.call("crm.deal.get", json!({ "id": deal.0 })).await?;
        let name = service_name(&fetched);
        let rows = json!([{
            "PRODUCT_NAME": name,
            "PRICE": fetched.get("OPPORTUNITY").cloned().unwrap_or(json!(0)),
            "QUANTITY": 1,
        }]);
        // The name is still usable for the invoice even when the row write fails.
        if let Err(error) =
            self.call("crm.deal.productrows.set", json!({ "id": deal.0, "rows": rows })).await
        {
            warn!(
                event_name = "bitrix.productrows_failed",
                deal_id = %deal,
                error = %error,
                "product row was not written"
            );
        }
        Ok(name)
    }

    async fn generate_invoice(&self, deal: &DealId) -> Result<String, ExternalServiceError> {
        let created = self
            .call(
                "crm.documentgenerator.document.add",
                json!({
                    "templateId": INVOICE_TEMPLATE_ID,
                    "entityTypeId": ENTITY_TYPE_DEAL,
                    "entityId": deal.0,
                    "values": [],
                    "stampsEnabled": 0,
                }),
            )
            .await?;
        let document_id = id_of(&created["document"]["id"]).ok_or_else(|| {
            ExternalServiceError::new(
                SERVICE,
                "crm.documentgenerator.document.add",
                "no document id returned",
            )
        })?;

        self.call(
            "crm.documentgenerator.document.enablepublicurl",
            json!({ "id": document_id, "status": 1 }),
        )
        .await?;

        let document = self
            .call("crm.documentgenerator.document.get.json", json!({ "id": document_id }))
            .await?;
        let url = document["document"]["publicUrl"]
            .as_str()
            .filter(|url| !url.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| {
                ExternalServiceError::new(
                    SERVICE,
                    "crm.documentgenerator.document.get.json",
                    "no public url returned",
                )
            })?;
        info!(
            event_name = "bitrix.invoice.generated",
            deal_id = %deal,
            "invoice document published"
        );
        Ok(url)
    }
}

/// Bitrix returns ids as numbers or strings depending on the method.
fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn company_fields(order: &Order, client_username: Option<&str>) -> Value {
    let mut fields = Map::new();
    fields.insert("TITLE".to_owned(), json!(order.org_name()));
    if let Some(phone) = &order.phone {
        fields.insert("PHONE".to_owned(), json!([{ "VALUE": phone, "VALUE_TYPE": "WORK" }]));
    }
    if let Some(username) = client_username {
        fields.insert("IM".to_owned(), json!([{ "VALUE": username, "VALUE_TYPE": "TELEGRAM" }]));
    }
    Value::Object(fields)
}

fn deal_fields(order: &Order, company_id: &str) -> Value {
    let title = match order.deal_type {
        DealType::Delivery => {
            format!("Доставка → {}, {}", order.warehouse_name(), order.org_name())
        }
        DealType::Fulfilment => {
            format!("Фулфилмент → {}, {}", order.warehouse_name(), order.org_name())
        }
    };
    let mut fields = json!({
        "TITLE": title,
        "STAGE_ID": "NEW",
        "OPPORTUNITY": order.cost.unwrap_or_default(),
        "CURRENCY_ID": "RUB",
        "COMPANY_ID": company_id,
        "DATE_CREATE": Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        "ASSIGNED_BY_ID": ASSIGNED_BY_ID,
        "CATEGORY_ID": DEAL_CATEGORY_ID,
        (field::SOURCE): SOURCE_TELEGRAM_BOT,
        (field::PICKUP_ADDRESS): order.pickup_address,
        (field::QUANTITY): order.quantity,
        (field::CARGO_TYPE): order.cargo_type.unwrap_or(CargoType::Boxes).crm_code(),
        (field::DELIVERY_DATE): order.delivery_date.map(|date| date.to_string()),
        (field::PICKUP_DATE): order.pickup_date.map(|date| date.to_string()),
        (field::CHAT_ID): order.chat_id,
        (field::WAREHOUSE): order.warehouse.map(Warehouse::crm_code),
    });
    if order.deal_type == DealType::Fulfilment {
        fields[field::FULFILMENT] = json!(1);
    }
    fields
}

fn update_fields(update: &DealUpdate) -> Value {
    let mut fields = Map::new();
    if let Some(stage) = update.stage {
        fields.insert("STAGE_ID".to_owned(), json!(stage.as_str()));
    }
    if let Some(quantity) = update.quantity {
        fields.insert(field::QUANTITY.to_owned(), json!(quantity));
    }
    if let Some(opportunity) = update.opportunity {
        fields.insert("OPPORTUNITY".to_owned(), json!(opportunity));
    }
    if let Some(gate) = &update.gate_number {
        fields.insert(field::GATE_NUMBER.to_owned(), json!(gate));
    }
    if let Some(at) = update.handed_over_at {
        fields.insert(
            field::HANDED_OVER_AT.to_owned(),
            json!(at.format("%Y-%m-%dT%H:%M:%S").to_string()),
        );
    }
    Value::Object(fields)
}

/// Accepts `2026-03-05` as well as `2026-03-05T00:00:00+03:00`.
fn crm_date(value: &Value) -> Option<String> {
    let raw = value.as_str()?;
    let date = raw.get(..10).and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())?;
    Some(date.format("%d.%m.%Y").to_string())
}

/// Billable line name: contract reference when the deal carries one, then the route.
fn service_name(deal: &Value) -> String {
    let warehouse = match &deal[field::WAREHOUSE] {
        Value::String(code) => code
            .parse::<u32>()
            .ok()
            .and_then(Warehouse::from_crm_code)
            .map(|warehouse| warehouse.name().to_owned())
            .unwrap_or_else(|| code.clone()),
        Value::Number(code) => code
            .as_u64()
            .and_then(|code| u32::try_from(code).ok())
            .and_then(Warehouse::from_crm_code)
            .map(|warehouse| warehouse.name().to_owned())
            .unwrap_or_else(|| code.to_string()),
        _ => String::new(),
    };

    let contract = deal[field::CONTRACT_NUMBER].as_str().filter(|number| !number.trim().is_empty());
    let mut name = match contract {
        Some(number) => {
            let mut head = format!("Оплата по договору №{number}");
            if let Some(date) = crm_date(&deal[field::CONTRACT_DATE]) {
                head.push_str(&format!(" от {date}"));
            }
            head.push_str(", транспортировка ");
            head
        }
        None => "Транспортировка ".to_owned(),
    };
    if let Some(date) = crm_date(&deal[field::PICKUP_DATE]) {
        name.push_str(&format!("{date} "));
    }
    name.push_str(&warehouse);
    name
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    use cargolink_core::domain::order::{CargoType, DealType, Order};
    use cargolink_core::domain::warehouse::Warehouse;
    use cargolink_core::flows::CrmStage;
    use cargolink_core::ports::DealUpdate;

    use super::{deal_fields, field, id_of, service_name, update_fields};

    fn order(deal_type: DealType) -> Order {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).single().expect("instant");
        let mut order = Order::new_draft(42, deal_type, now);
        order.org.name = Some("ООО Ромашка".to_owned());
        order.warehouse = Some(Warehouse::Koledino);
        order.cargo_type = Some(CargoType::Pallets);
        order.quantity = Some(4);
        order.cost = Some(7_000);
        order.delivery_date = NaiveDate::from_ymd_opt(2026, 3, 5);
        order.pickup_date = NaiveDate::from_ymd_opt(2026, 3, 5);
        order
    }

    #[test]
    fn delivery_deal_carries_route_and_cargo_fields() {
        let fields = deal_fields(&order(DealType::Delivery), "17");

        assert_eq!(fields["TITLE"], "Доставка → Коледино, ООО Ромашка");
        assert_eq!(fields["STAGE_ID"], "NEW");
        assert_eq!(fields["OPPORTUNITY"], 7_000);
        assert_eq!(fields["COMPANY_ID"], "17");
        assert_eq!(fields[field::WAREHOUSE], Warehouse::Koledino.crm_code());
        assert_eq!(fields[field::CARGO_TYPE], CargoType::Pallets.crm_code());
        assert_eq!(fields[field::DELIVERY_DATE], "2026-03-05");
        assert_eq!(fields[field::CHAT_ID], 42);
        assert!(fields.get(field::FULFILMENT).is_none());
    }

    #[test]
    fn fulfilment_deal_is_flagged() {
        let fields = deal_fields(&order(DealType::Fulfilment), "17");
        assert_eq!(fields["TITLE"], "Фулфилмент → Коледино, ООО Ромашка");
        assert_eq!(fields[field::FULFILMENT], 1);
    }

    #[test]
    fn update_only_sends_present_fields() {
        let update = DealUpdate {
            quantity: Some(12),
            opportunity: Some(2_900),
            ..DealUpdate::stage(CrmStage::PrepaymentInvoice)
        };

        let fields = update_fields(&update);

        assert_eq!(
            fields,
            json!({
                "STAGE_ID": "C2:PREPAYMENT_INVOICE",
                (field::QUANTITY): 12,
                "OPPORTUNITY": 2_900,
            })
        );
    }

    #[test]
    fn service_name_mentions_contract_when_present() {
        let deal = json!({
            (field::WAREHOUSE): "54",
            (field::PICKUP_DATE): "2026-03-05T03:00:00+03:00",
            (field::CONTRACT_NUMBER): "12/26",
            (field::CONTRACT_DATE): "2026-01-15",
        });
        assert_eq!(
            service_name(&deal),
            "Оплата по договору №12/26 от 15.01.2026, транспортировка 05.03.2026 Коледино"
        );
    }

    #[test]
    fn service_name_without_contract_names_the_route() {
        let deal = json!({ (field::WAREHOUSE): 54, (field::PICKUP_DATE): "2026-03-05" });
        assert_eq!(service_name(&deal), "Транспортировка 05.03.2026 Коледино");
    }

    #[test]
    fn ids_come_as_numbers_or_strings() {
        assert_eq!(id_of(&json!(501)), Some("501".to_owned()));
        assert_eq!(id_of(&json!("501")), Some("501".to_owned()));
        assert_eq!(id_of(&json!(null)), None);
    }
}
