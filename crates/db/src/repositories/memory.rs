use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use cargolink_core::domain::calculation::{Calculation, CalculationId};
use cargolink_core::domain::order::{DealId, DealType, Order, OrderId, OrderStatus};
use cargolink_core::domain::session::{
    BotRole, ChatProfile, ChatSession, SessionKey, SessionPatch, StateGuard,
};
use cargolink_core::domain::ChatId;

use super::{CalculationRepository, OrderRepository, RepositoryError, SessionRepository};

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<SessionKey, ChatSession>>,
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find(&self, key: &SessionKey) -> Result<Option<ChatSession>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(key).cloned())
    }

    async fn register(
        &self,
        key: &SessionKey,
        profile: &ChatProfile,
        now: DateTime<Utc>,
    ) -> Result<ChatSession, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(*key)
            .and_modify(|session| {
                if profile.username.is_some() {
                    session.profile.username.clone_from(&profile.username);
                }
                if profile.first_name.is_some() {
                    session.profile.first_name.clone_from(&profile.first_name);
                }
                if profile.last_name.is_some() {
                    session.profile.last_name.clone_from(&profile.last_name);
                }
                session.updated_at = now;
            })
            .or_insert_with(|| ChatSession::new(*key, profile.clone(), now));
        Ok(session.clone())
    }

    async fn update(
        &self,
        key: &SessionKey,
        guard: StateGuard,
        patch: &SessionPatch,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(key) {
            Some(session) if session.matches(&guard) => {
                session.apply(patch, now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_by_username(
        &self,
        role: BotRole,
        username: &str,
    ) -> Result<Option<ChatSession>, RepositoryError> {
        let wanted = username.trim_start_matches('@');
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|session| session.key.role == role)
            .filter(|session| {
                session.username().is_some_and(|stored| stored.eq_ignore_ascii_case(wanted))
            })
            .max_by_key(|session| session.updated_at)
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderRepository {
    async fn newest_where(&self, predicate: impl Fn(&Order) -> bool) -> Option<Order> {
        let orders = self.orders.read().await;
        orders
            .values()
            .filter(|order| predicate(order))
            .max_by_key(|order| order.created_at)
            .cloned()
    }
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        let downgrade = orders.get(&order.id.0).is_some_and(|stored| {
            stored.status == OrderStatus::Paid && order.status != OrderStatus::Paid
        });
        if !downgrade {
            orders.insert(order.id.0.clone(), order.clone());
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn find_by_deal_id(&self, deal_id: &DealId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.newest_where(|order| order.crm_deal_id.as_ref() == Some(deal_id)).await)
    }

    async fn list_for_chat(&self, chat_id: ChatId) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut found: Vec<Order> =
            orders.values().filter(|order| order.chat_id == chat_id).cloned().collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn latest_complete_org(
        &self,
        chat_id: ChatId,
        org_name: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .newest_where(|order| {
                order.chat_id == chat_id
                    && order.org.is_complete()
                    && order.org.name.as_deref() == Some(org_name)
            })
            .await)
    }

    async fn latest_unbilled(
        &self,
        chat_id: ChatId,
        deal_type: DealType,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .newest_where(|order| {
                order.chat_id == chat_id
                    && order.deal_type == deal_type
                    && order.status == OrderStatus::AwaitingPayment
                    && order.payment.invoice_url.is_none()
            })
            .await)
    }

    async fn list_awaiting_payment_with_invoice(&self) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut found: Vec<Order> = orders
            .values()
            .filter(|order| {
                order.status == OrderStatus::AwaitingPayment && order.payment.invoice_url.is_some()
            })
            .cloned()
            .collect();
        found.sort_by_key(|order| order.created_at);
        Ok(found)
    }

    async fn mark_paid(
        &self,
        deal_id: &DealId,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut orders = self.orders.write().await;
        let target = orders.values_mut().find(|order| {
            order.crm_deal_id.as_ref() == Some(deal_id)
                && !matches!(order.status, OrderStatus::Paid | OrderStatus::InProgress)
        });
        match target {
            Some(order) => {
                order.status = OrderStatus::Paid;
                order.payment.paid_at = Some(paid_at);
                order.updated_at = paid_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_stale_drafts(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut found: Vec<Order> = orders
            .values()
            .filter(|order| {
                order.status == OrderStatus::InProgress && order.created_at < created_before
            })
            .cloned()
            .collect();
        found.sort_by_key(|order| order.created_at);
        Ok(found)
    }
}

#[derive(Default)]
pub struct InMemoryCalculationRepository {
    calculations: RwLock<HashMap<String, Calculation>>,
}

#[async_trait::async_trait]
impl CalculationRepository for InMemoryCalculationRepository {
    async fn find_by_id(
        &self,
        id: &CalculationId,
    ) -> Result<Option<Calculation>, RepositoryError> {
        let calculations = self.calculations.read().await;
        Ok(calculations.get(&id.0).cloned())
    }

    async fn save(&self, calculation: &Calculation) -> Result<(), RepositoryError> {
        let mut calculations = self.calculations.write().await;
        calculations.insert(calculation.id.0.clone(), calculation.clone());
        Ok(())
    }
}
