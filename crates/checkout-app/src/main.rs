use std::sync::Arc;

use checkout_gateways::memory::InMemoryPaymentGateway;
use checkout_gateways::{
    GatewayClient, HttpCartStore, HttpInventoryGateway, HttpNotificationGateway,
    HttpPaymentGateway,
};
use checkout_hex::application::order_orchestrator::{
    Gateways, OrchestratorConfig, OrderOrchestrator,
};
use checkout_hex::config::Config;
use checkout_hex::inbound::http::{HttpServer, HttpServerConfig};
use checkout_hex::ports::gateways::PaymentGateway;
use checkout_ledger::{build_ledger, Ledger};

fn client(service: &'static str, base_url: &str, config: &Config) -> anyhow::Result<GatewayClient> {
    GatewayClient::builder(service, base_url)?
        .with_timeout(config.gateway_timeout)
        .build()
}

fn gateways(config: &Config) -> anyhow::Result<Gateways> {
    let payment: Arc<dyn PaymentGateway> = match config.payment_service_url.as_deref() {
        Some(url) => Arc::new(HttpPaymentGateway::new(client("payment", url, config)?)),
        None => {
            tracing::warn!("PAYMENT_SERVICE_URL not set, payments use the in-process mock");
            Arc::new(InMemoryPaymentGateway::new())
        }
    };

    Ok(Gateways {
        cart: Arc::new(HttpCartStore::new(client(
            "cart",
            &config.cart_service_url,
            config,
        )?)),
        inventory: Arc::new(HttpInventoryGateway::new(client(
            "product",
            &config.product_service_url,
            config,
        )?)),
        payment,
        notifier: Arc::new(HttpNotificationGateway::new(client(
            "notification",
            &config.notification_service_url,
            config,
        )?)),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for service URLs / DATABASE_URL / SERVER_PORT when present.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let config = Config::from_env()?;
    let ledger: Ledger = build_ledger(config.database_url.as_deref()).await?;
    let service = OrderOrchestrator::new(ledger, gateways(&config)?).with_config(
        OrchestratorConfig {
            currency: config.payment_currency.clone(),
            ..OrchestratorConfig::default()
        },
    );

    let server_cfg = HttpServerConfig {
        port: config.server_port.clone(),
    };

    let http = HttpServer::new(service, server_cfg).await?;
    http.run().await
}
