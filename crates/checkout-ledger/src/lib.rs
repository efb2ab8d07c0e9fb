#[cfg(not(any(feature = "memory", feature = "sqlite")))]
compile_error!("Enable a ledger feature: `memory` or `sqlite`.");

use checkout_types::domain::order::*;
use checkout_types::ports::order_ledger::{LedgerError, OrderLedger};

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
const DEFAULT_DATABASE_URL: &str = "sqlite://orders.db";

/// Ledger backend selected at startup from the enabled features and the
/// configured database URL.
pub enum Ledger {
    #[cfg(feature = "memory")]
    Memory(memory::InMemoryLedger),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite::SqliteLedger),
}

pub async fn build_ledger(url: Option<&str>) -> anyhow::Result<Ledger> {
    Ledger::build(url).await
}

impl Ledger {
    #[cfg(all(feature = "memory", not(feature = "sqlite")))]
    pub async fn build(_: Option<&str>) -> anyhow::Result<Self> {
        tracing::info!("using in-memory ledger");
        Ok(Self::Memory(memory::InMemoryLedger::new()))
    }

    #[cfg(all(feature = "sqlite", not(feature = "memory")))]
    pub async fn build(database_url: Option<&str>) -> anyhow::Result<Self> {
        let url = database_url.unwrap_or(DEFAULT_DATABASE_URL);
        Ok(Self::Sqlite(sqlite::SqliteLedger::new(url).await?))
    }

    // With both features, an explicit URL selects sqlite.
    #[cfg(all(feature = "sqlite", feature = "memory"))]
    pub async fn build(database_url: Option<&str>) -> anyhow::Result<Self> {
        match database_url {
            Some(url) => Ok(Self::Sqlite(sqlite::SqliteLedger::new(url).await?)),
            None => {
                tracing::info!("no DATABASE_URL, using in-memory ledger");
                Ok(Self::Memory(memory::InMemoryLedger::new()))
            }
        }
    }
}

macro_rules! delegate {
    ($self:ident, $ledger:ident => $call:expr) => {
        match $self {
            #[cfg(feature = "memory")]
            Ledger::Memory($ledger) => $call,
            #[cfg(feature = "sqlite")]
            Ledger::Sqlite($ledger) => $call,
        }
    };
}

#[async_trait::async_trait]
impl OrderLedger for Ledger {
    async fn create_order_with_items(&self, order: NewOrder) -> Result<Order, LedgerError> {
        delegate!(self, l => l.create_order_with_items(order).await)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, LedgerError> {
        delegate!(self, l => l.get(id).await)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, LedgerError> {
        delegate!(self, l => l.list_for_user(user_id).await)
    }

    async fn update(&self, id: OrderId, patch: OrderPatch) -> Result<Option<Order>, LedgerError> {
        delegate!(self, l => l.update(id, patch).await)
    }
}
