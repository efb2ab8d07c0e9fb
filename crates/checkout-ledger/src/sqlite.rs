use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use checkout_types::domain::order::{
    NewOrder, Order, OrderId, OrderItem, OrderPatch, OrderStatus, UserId,
};
use checkout_types::ports::order_ledger::{LedgerError, OrderLedger};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{FromRow, SqlitePool};

const MIGRATIONS: &[&str] = &[
    include_str!("../migrations/0001_create_orders.sql"),
    include_str!("../migrations/0002_create_order_items.sql"),
];

const ORDER_COLUMNS: &str = "id, user_id, total_cents, status, payment_ref, shipping_address, \
     tracking_number, inventory_adjusted, created_at, updated_at";

pub struct SqliteLedger {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct DbOrder {
    id: i64,
    user_id: i64,
    total_cents: i64,
    status: String,
    payment_ref: Option<String>,
    shipping_address: Option<String>,
    tracking_number: Option<String>,
    inventory_adjusted: bool,
    created_at: String,
    updated_at: String,
}

#[derive(FromRow)]
struct DbOrderItem {
    order_id: i64,
    product_id: i64,
    product_name: String,
    quantity: i64,
    price_cents: i64,
}

fn db_err(e: impl ToString) -> LedgerError {
    LedgerError::DbError(e.to_string())
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, LedgerError> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(db_err)?
        .with_timezone(&Utc))
}

// Fixed-width timestamps keep lexical ORDER BY equal to chronological order.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl DbOrderItem {
    fn into_item(self) -> Result<OrderItem, LedgerError> {
        Ok(OrderItem {
            order_id: self.order_id,
            product_id: self.product_id,
            product_name: self.product_name,
            quantity: u32::try_from(self.quantity).map_err(db_err)?,
            price_cents: self.price_cents,
        })
    }
}

impl DbOrder {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, LedgerError> {
        let status = OrderStatus::from_str(&self.status).map_err(db_err)?;
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            items,
            total_cents: self.total_cents,
            status,
            payment_ref: self.payment_ref,
            shipping_address: self.shipping_address,
            tracking_number: self.tracking_number,
            inventory_adjusted: self.inventory_adjusted,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

impl SqliteLedger {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options).await?;

        for ddl in MIGRATIONS {
            for stmt in ddl.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                sqlx::query(stmt).execute(&pool).await?;
            }
        }
        tracing::info!(database_url, "sqlite ledger ready");

        Ok(Self { pool })
    }

    async fn load_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, LedgerError> {
        let rows: Vec<DbOrderItem> = sqlx::query_as(
            "SELECT order_id, product_id, product_name, quantity, price_cents
             FROM order_items WHERE order_id = ? ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(DbOrderItem::into_item).collect()
    }

    async fn hydrate(&self, row: DbOrder) -> Result<Order, LedgerError> {
        let items = self.load_items(row.id).await?;
        row.into_order(items)
    }
}

#[async_trait]
impl OrderLedger for SqliteLedger {
    async fn create_order_with_items(&self, order: NewOrder) -> Result<Order, LedgerError> {
        let now = Utc::now().trunc_subsecs(6);
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let inserted = sqlx::query(
            "INSERT INTO orders (user_id, total_cents, status, payment_ref, shipping_address, inventory_adjusted, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(order.user_id)
        .bind(order.total_cents)
        .bind(OrderStatus::Pending.as_str())
        .bind(&order.payment_ref)
        .bind(&order.shipping_address)
        .bind(order.inventory_adjusted)
        .bind(format_ts(now))
        .bind(format_ts(now))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        let id = inserted.last_insert_rowid();

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, product_name, quantity, price_cents)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(i64::from(item.quantity))
            .bind(item.price_cents)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        // Dropping `tx` on any early return above rolls the whole order back.
        tx.commit().await.map_err(db_err)?;
        Ok(order.into_order(id, now))
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, LedgerError> {
        let row: Option<DbOrder> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, LedgerError> {
        let rows: Vec<DbOrder> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }

    async fn update(&self, id: OrderId, patch: OrderPatch) -> Result<Option<Order>, LedgerError> {
        let expected = patch.expected_status.map(OrderStatus::as_str);
        let updated = sqlx::query(
            "UPDATE orders SET
                status = COALESCE(?, status),
                tracking_number = COALESCE(?, tracking_number),
                payment_ref = COALESCE(?, payment_ref),
                inventory_adjusted = COALESCE(?, inventory_adjusted),
                updated_at = ?
             WHERE id = ? AND (? IS NULL OR status = ?)",
        )
        .bind(patch.status.map(OrderStatus::as_str))
        .bind(&patch.tracking_number)
        .bind(&patch.payment_ref)
        .bind(patch.inventory_adjusted)
        .bind(format_ts(Utc::now()))
        .bind(id)
        .bind(expected)
        .bind(expected)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            return match self.get(id).await? {
                None => Ok(None),
                Some(current) => Err(LedgerError::StatusConflict {
                    actual: current.status,
                }),
            };
        }
        self.get(id).await
    }
}
