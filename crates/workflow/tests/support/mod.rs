#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use secrecy::SecretString;
use tokio::sync::Mutex;

use cargolink_core::domain::order::{
    CargoType, DealId, DealType, DriverAssignment, Order, OrderStatus,
};
use cargolink_core::domain::payment::PaymentNotice;
use cargolink_core::domain::session::{BotRole, ChatProfile, ChatSession, SessionKey};
use cargolink_core::domain::warehouse::Warehouse;
use cargolink_core::domain::ChatId;
use cargolink_core::errors::ExternalServiceError;
use cargolink_core::ports::{
    CompanyProfile, CrmGateway, DealUpdate, FixedClock, IdentityLookup, InvoiceRequest,
    PaymentGateway,
};
use cargolink_core::pricing::TariffPricingEngine;
use cargolink_db::{
    InMemoryCalculationRepository, InMemoryOrderRepository, InMemorySessionRepository,
    OrderRepository, SessionRepository,
};
use cargolink_telegram::notifier::recording::RecordingNotifier;
use cargolink_telegram::{CallbackIntent, ChatEvent, EventKind, Notifiers};
use cargolink_workflow::{
    ConversationDispatcher, DispatchOutcome, EventContext, LifecycleCoordinator, Services,
    WorkflowSettings,
};

pub const PAYMENT_SECRET: &str = "notice-secret";
pub const CLIENT_CHAT: ChatId = 42;
pub const DRIVER_CHAT: ChatId = 900;
pub const DRIVER_USERNAME: &str = "ivan_p";
pub const INVOICE_URL: &str = "https://crm.example/invoice/501.pdf";

/// Monday 2026-03-02, 10:00 in Moscow.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).single().expect("valid instant")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[derive(Default)]
pub struct FakeCrm {
    next_deal: AtomicU64,
    pub fail_submit: AtomicBool,
    pub fail_updates: AtomicBool,
    pub submitted: Mutex<Vec<(Order, Option<String>)>>,
    pub updates: Mutex<Vec<(DealId, DealUpdate)>>,
    pub service_rows: Mutex<Vec<DealId>>,
    pub invoices: Mutex<Vec<DealId>>,
}

impl FakeCrm {
    pub async fn updates(&self) -> Vec<(DealId, DealUpdate)> {
        self.updates.lock().await.clone()
    }
}

#[async_trait]
impl CrmGateway for FakeCrm {
    async fn submit_order(
        &self,
        order: &Order,
        client_username: Option<&str>,
    ) -> Result<DealId, ExternalServiceError> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(ExternalServiceError::new("bitrix", "crm.deal.add", "timeout"));
        }
        self.submitted.lock().await.push((order.clone(), client_username.map(str::to_owned)));
        let deal = 501 + self.next_deal.fetch_add(1, Ordering::SeqCst);
        Ok(DealId(deal.to_string()))
    }

    async fn update_deal(
        &self,
        deal: &DealId,
        update: &DealUpdate,
    ) -> Result<(), ExternalServiceError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(ExternalServiceError::new("bitrix", "crm.deal.update", "HTTP 503"));
        }
        self.updates.lock().await.push((deal.clone(), update.clone()));
        Ok(())
    }

    async fn set_service_row(&self, deal: &DealId) -> Result<String, ExternalServiceError> {
        self.service_rows.lock().await.push(deal.clone());
        Ok("Доставка груза".to_owned())
    }

    async fn generate_invoice(&self, deal: &DealId) -> Result<String, ExternalServiceError> {
        self.invoices.lock().await.push(deal.clone());
        Ok(INVOICE_URL.to_owned())
    }
}

#[derive(Default)]
pub struct FakePayments {
    pub requests: Mutex<Vec<InvoiceRequest>>,
    pub fail_token: AtomicBool,
}

#[async_trait]
impl PaymentGateway for FakePayments {
    async fn fetch_token(&self) -> Result<String, ExternalServiceError> {
        if self.fail_token.load(Ordering::SeqCst) {
            return Err(ExternalServiceError::new("paykeeper", "token", "unauthorized"));
        }
        Ok("token-1".to_owned())
    }

    async fn create_invoice(
        &self,
        _token: &str,
        request: &InvoiceRequest,
    ) -> Result<String, ExternalServiceError> {
        self.requests.lock().await.push(request.clone());
        Ok("https://pay.example/bill/77".to_owned())
    }
}

/// Every 10- or 12-digit tax id resolves, except the all-zero one.
pub struct FakeLookup;

#[async_trait]
impl IdentityLookup for FakeLookup {
    async fn find_by_inn(&self, inn: &str) -> Result<Option<CompanyProfile>, ExternalServiceError> {
        if inn.chars().all(|c| c == '0') {
            return Ok(None);
        }
        Ok(Some(CompanyProfile {
            name: "ООО Ромашка".to_owned(),
            address: "г. Москва, ул. Тверская, д. 1".to_owned(),
        }))
    }
}

pub struct Harness {
    pub services: Arc<Services>,
    pub dispatcher: ConversationDispatcher,
    pub crm: Arc<FakeCrm>,
    pub payments: Arc<FakePayments>,
    pub sessions: Arc<InMemorySessionRepository>,
    pub orders: Arc<InMemoryOrderRepository>,
    pub delivery: Arc<RecordingNotifier>,
    pub fulfilment: Arc<RecordingNotifier>,
    pub driver: Arc<RecordingNotifier>,
    update_id: AtomicI64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(WorkflowSettings::new(SecretString::from(PAYMENT_SECRET.to_owned())))
    }

    pub fn with_settings(settings: WorkflowSettings) -> Self {
        let crm = Arc::new(FakeCrm::default());
        let payments = Arc::new(FakePayments::default());
        let sessions = Arc::new(InMemorySessionRepository::default());
        let orders = Arc::new(InMemoryOrderRepository::default());
        let delivery = Arc::new(RecordingNotifier::default());
        let fulfilment = Arc::new(RecordingNotifier::default());
        let driver = Arc::new(RecordingNotifier::default());

        let services = Arc::new(Services {
            sessions: sessions.clone(),
            orders: orders.clone(),
            calculations: Arc::new(InMemoryCalculationRepository::default()),
            notifiers: Notifiers {
                delivery: delivery.clone(),
                fulfilment: fulfilment.clone(),
                driver: driver.clone(),
            },
            crm: crm.clone(),
            payments: payments.clone(),
            lookup: Arc::new(FakeLookup),
            pricing: Arc::new(TariffPricingEngine),
            clock: Arc::new(FixedClock::new(now(), chrono_tz::Europe::Moscow)),
            settings,
        });

        Self {
            dispatcher: ConversationDispatcher::new(Arc::clone(&services)),
            services,
            crm,
            payments,
            sessions,
            orders,
            delivery,
            fulfilment,
            driver,
            update_id: AtomicI64::new(1),
        }
    }

    pub fn coordinator(&self) -> &LifecycleCoordinator {
        self.dispatcher.coordinator()
    }

    pub fn notifier(&self, role: BotRole) -> &RecordingNotifier {
        match role {
            BotRole::ClientDelivery => &self.delivery,
            BotRole::ClientFulfilment => &self.fulfilment,
            BotRole::Driver => &self.driver,
        }
    }

    pub async fn send(&self, role: BotRole, chat_id: ChatId, kind: EventKind) -> DispatchOutcome {
        let username = match chat_id {
            DRIVER_CHAT => DRIVER_USERNAME.to_owned(),
            other => format!("user{other}"),
        };
        let event = ChatEvent {
            update_id: self.update_id.fetch_add(1, Ordering::SeqCst),
            bot_role: role,
            chat_id,
            sender: ChatProfile { username: Some(username), first_name: None, last_name: None },
            kind,
        };
        self.dispatcher
            .dispatch(&event, &EventContext::for_event(&event))
            .await
            .expect("event dispatched")
    }

    pub async fn text(&self, role: BotRole, chat_id: ChatId, text: &str) -> DispatchOutcome {
        self.send(role, chat_id, EventKind::Text(text.to_owned())).await
    }

    pub async fn tap(&self, chat_id: ChatId, intent: CallbackIntent) -> DispatchOutcome {
        let kind = EventKind::Callback { query_id: "q-1".to_owned(), message_id: None, intent };
        self.send(BotRole::Driver, chat_id, kind).await
    }

    pub async fn session(&self, role: BotRole, chat_id: ChatId) -> Option<ChatSession> {
        self.sessions.find(&SessionKey::new(chat_id, role)).await.expect("session lookup")
    }

    pub async fn order(&self, deal: &DealId) -> Order {
        self.orders.find_by_deal_id(deal).await.expect("order lookup").expect("order exists")
    }

    pub async fn seed(&self, order: &Order) {
        self.orders.save(order).await.expect("order saved");
    }

    /// Driver chat that has started the driver bot.
    pub async fn register_driver(&self) {
        self.text(BotRole::Driver, DRIVER_CHAT, "/start").await;
        self.driver.clear().await;
    }
}

/// A complete order already known to the CRM under `deal`.
pub fn submitted_order(deal_type: DealType, deal: &str, status: OrderStatus) -> Order {
    let mut order = Order::new_draft(CLIENT_CHAT, deal_type, now());
    order.org.inn = Some("7707083893".to_owned());
    order.org.name = Some("ООО Ромашка".to_owned());
    order.org.address = Some("г. Москва, ул. Тверская, д. 1".to_owned());
    order.org.bank_account = Some("40702810900000000001".to_owned());
    order.org.bank_code = Some("044525225".to_owned());
    order.warehouse = Some(Warehouse::Koledino);
    order.delivery_date = Some(date(2026, 3, 5));
    order.pickup_date = Some(date(2026, 3, 5));
    order.cargo_type = Some(CargoType::Boxes);
    order.quantity = Some(10);
    order.pickup_address = Some("Москва, Складская ул., 3".to_owned());
    order.phone = Some("+79991234567".to_owned());
    order.cost = Some(2_500);
    order.crm_deal_id = Some(DealId(deal.to_owned()));
    order.status = status;
    order
}

/// Delivery order on its way to the gate, carried by the registered driver.
pub fn in_transit_order(deal_type: DealType, deal: &str) -> Order {
    let mut order = submitted_order(deal_type, deal, OrderStatus::InTransit);
    order.driver =
        Some(DriverAssignment { chat_id: DRIVER_CHAT, username: DRIVER_USERNAME.to_owned() });
    order.messages.driver_order = Some(7);
    order
}

/// Provider form for `deal`, signed with the shared secret.
pub fn payment_form(deal: &str, sum: &str) -> HashMap<String, String> {
    let mut notice = PaymentNotice {
        id: "981".to_owned(),
        sum: sum.to_owned(),
        client_id: "ООО Ромашка".to_owned(),
        order_id: format!("Заказ №{deal}"),
        key: String::new(),
    };
    notice.key = notice.expected_key(PAYMENT_SECRET);
    [
        ("id", notice.id),
        ("sum", notice.sum),
        ("clientid", notice.client_id),
        ("orderid", notice.order_id),
        ("key", notice.key),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_owned(), value))
    .collect()
}
