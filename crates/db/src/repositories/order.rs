use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use cargolink_core::domain::order::{DealId, DealType, Order, OrderId, OrderStatus};
use cargolink_core::domain::ChatId;

use super::{timestamp, OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// The document carries the whole order; the `status` column wins when they disagree,
/// since `mark_paid` flips it in place.
fn row_to_order(row: &SqliteRow) -> Result<Order, RepositoryError> {
    let document: String =
        row.try_get("document").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let mut order: Order = serde_json::from_str(&document)
        .map_err(|e| RepositoryError::Decode(format!("order document: {e}")))?;
    order.status =
        status.parse::<OrderStatus>().map_err(|e| RepositoryError::Decode(e.to_string()))?;
    Ok(order)
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        let document = serde_json::to_string(order)
            .map_err(|e| RepositoryError::Decode(format!("order document: {e}")))?;

        sqlx::query(
            "INSERT INTO orders (id, chat_id, deal_type, status, crm_deal_id, org_name,
                                 org_complete, invoice_url, document, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 crm_deal_id = excluded.crm_deal_id,
                 org_name = excluded.org_name,
                 org_complete = excluded.org_complete,
                 invoice_url = excluded.invoice_url,
                 document = excluded.document,
                 updated_at = excluded.updated_at
             WHERE orders.status <> 'paid' OR excluded.status = 'paid'",
        )
        .bind(&order.id.0)
        .bind(order.chat_id)
        .bind(order.deal_type.as_str())
        .bind(order.status.as_str())
        .bind(order.crm_deal_id.as_ref().map(|id| id.0.as_str()))
        .bind(order.org.name.as_deref())
        .bind(order.org.is_complete())
        .bind(order.payment.invoice_url.as_deref())
        .bind(document)
        .bind(timestamp(order.created_at))
        .bind(timestamp(order.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query("SELECT status, document FROM orders WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn find_by_deal_id(&self, deal_id: &DealId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query("SELECT status, document FROM orders WHERE crm_deal_id = ?")
            .bind(&deal_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn list_for_chat(&self, chat_id: ChatId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT status, document FROM orders WHERE chat_id = ?
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_order).collect()
    }

    async fn latest_complete_org(
        &self,
        chat_id: ChatId,
        org_name: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            "SELECT status, document FROM orders
             WHERE chat_id = ? AND org_complete = 1 AND org_name = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT 1",
        )
        .bind(chat_id)
        .bind(org_name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn latest_unbilled(
        &self,
        chat_id: ChatId,
        deal_type: DealType,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            "SELECT status, document FROM orders
             WHERE chat_id = ? AND deal_type = ? AND status = 'awaiting_payment'
               AND invoice_url IS NULL
             ORDER BY created_at DESC, rowid DESC
             LIMIT 1",
        )
        .bind(chat_id)
        .bind(deal_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn list_awaiting_payment_with_invoice(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT status, document FROM orders
             WHERE status = 'awaiting_payment' AND invoice_url IS NOT NULL
             ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_order).collect()
    }

    async fn mark_paid(
        &self,
        deal_id: &DealId,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let paid_at = timestamp(paid_at);
        let result = sqlx::query(
            "UPDATE orders SET
                 status = 'paid',
                 document = json_set(document,
                                     '$.status', 'paid',
                                     '$.payment.paid_at', ?,
                                     '$.updated_at', ?),
                 updated_at = ?
             WHERE crm_deal_id = ? AND status NOT IN ('paid', 'in_progress')",
        )
        .bind(&paid_at)
        .bind(&paid_at)
        .bind(&paid_at)
        .bind(&deal_id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_stale_drafts(
        &self,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT status, document FROM orders
             WHERE status = 'in_progress' AND created_at < ?
             ORDER BY created_at",
        )
        .bind(timestamp(created_before))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_order).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use cargolink_core::domain::order::{
        DealId, DealType, Order, OrderStatus, OrgIdentity, PaymentMethod,
    };

    use super::SqlOrderRepository;
    use crate::repositories::OrderRepository;
    use crate::{connect_with_settings, migrations};

    async fn repo() -> SqlOrderRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlOrderRepository::new(pool)
    }

    fn org(name: &str) -> OrgIdentity {
        OrgIdentity {
            inn: Some("7707083893".to_owned()),
            name: Some(name.to_owned()),
            address: Some("Москва".to_owned()),
            bank_account: Some("40702810900000000001".to_owned()),
            bank_code: Some("044525225".to_owned()),
        }
    }

    fn submitted(chat_id: i64, deal: &str) -> Order {
        let mut order =
            Order::draft_with_org(chat_id, DealType::Delivery, org("ООО Ромашка"), Utc::now());
        order.status = OrderStatus::Submitted;
        order.crm_deal_id = Some(DealId(deal.to_owned()));
        order.cost = Some(1_100);
        order
    }

    #[tokio::test]
    async fn saved_order_is_found_by_id_and_deal() {
        let repo = repo().await;
        let order = submitted(1, "77");
        repo.save(&order).await.expect("save");

        let by_id = repo.find_by_id(&order.id).await.expect("find").expect("exists");
        assert_eq!(by_id, order);
        let by_deal =
            repo.find_by_deal_id(&DealId("77".to_owned())).await.expect("find").expect("exists");
        assert_eq!(by_deal.id, order.id);
    }

    #[tokio::test]
    async fn mark_paid_flips_once() {
        let repo = repo().await;
        let order = submitted(2, "88");
        repo.save(&order).await.expect("save");
        let deal = DealId("88".to_owned());

        assert!(repo.mark_paid(&deal, Utc::now()).await.expect("first"));
        assert!(!repo.mark_paid(&deal, Utc::now()).await.expect("replay"));

        let stored = repo.find_by_deal_id(&deal).await.expect("find").expect("exists");
        assert_eq!(stored.status, OrderStatus::Paid);
        assert!(stored.payment.paid_at.is_some());
    }

    #[tokio::test]
    async fn mark_paid_ignores_drafts_and_unknown_deals() {
        let repo = repo().await;
        let mut draft = submitted(3, "99");
        draft.status = OrderStatus::InProgress;
        repo.save(&draft).await.expect("save");

        assert!(!repo.mark_paid(&DealId("99".to_owned()), Utc::now()).await.expect("draft"));
        assert!(!repo.mark_paid(&DealId("100".to_owned()), Utc::now()).await.expect("unknown"));
    }

    #[tokio::test]
    async fn save_never_downgrades_paid_order() {
        let repo = repo().await;
        let order = submitted(4, "101");
        repo.save(&order).await.expect("save");
        repo.mark_paid(&DealId("101".to_owned()), Utc::now()).await.expect("paid");

        let mut stale = order.clone();
        stale.status = OrderStatus::AwaitingPayment;
        repo.save(&stale).await.expect("stale save is a no-op");

        let stored = repo.find_by_id(&order.id).await.expect("find").expect("exists");
        assert_eq!(stored.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn latest_complete_org_picks_newest_matching_name() {
        let repo = repo().await;
        let now = Utc::now();
        let two_days_ago = now - Duration::days(2);
        let older = Order::draft_with_org(5, DealType::Delivery, org("ООО Альфа"), two_days_ago);
        let newer = Order::draft_with_org(5, DealType::Fulfilment, org("ООО Альфа"), now);
        let mut incomplete = Order::new_draft(5, DealType::Delivery, now);
        incomplete.org.name = Some("ООО Альфа".to_owned());
        for order in [&older, &newer, &incomplete] {
            repo.save(order).await.expect("save");
        }

        let found = repo
            .latest_complete_org(5, "ООО Альфа")
            .await
            .expect("lookup")
            .expect("complete org exists");
        assert_eq!(found.id, newer.id);
        assert!(repo.latest_complete_org(5, "ООО Бета").await.expect("lookup").is_none());
        assert_eq!(repo.list_for_chat(5).await.expect("list").len(), 3);
    }

    #[tokio::test]
    async fn payment_queries_split_on_invoice_link() {
        let repo = repo().await;
        let mut unbilled = submitted(6, "201");
        unbilled.status = OrderStatus::AwaitingPayment;
        let mut billed = submitted(6, "202");
        billed.status = OrderStatus::AwaitingPayment;
        billed.payment.method = Some(PaymentMethod::Invoice);
        billed.payment.invoice_url = Some("https://crm.example/invoice/202".to_owned());
        repo.save(&unbilled).await.expect("save");
        repo.save(&billed).await.expect("save");

        let found =
            repo.latest_unbilled(6, DealType::Delivery).await.expect("lookup").expect("exists");
        assert_eq!(found.id, unbilled.id);
        assert!(repo.latest_unbilled(6, DealType::Fulfilment).await.expect("lookup").is_none());

        let reminders = repo.list_awaiting_payment_with_invoice().await.expect("list");
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].id, billed.id);
    }

    #[tokio::test]
    async fn stale_drafts_are_listed_by_age() {
        let repo = repo().await;
        let now = Utc::now();
        let old = Order::new_draft(7, DealType::Delivery, now - Duration::days(10));
        let fresh = Order::new_draft(7, DealType::Delivery, now);
        repo.save(&old).await.expect("save");
        repo.save(&fresh).await.expect("save");

        let stale = repo.list_stale_drafts(now - Duration::days(1)).await.expect("list");
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, old.id);
    }
}
