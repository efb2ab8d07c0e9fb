use async_trait::async_trait;
use checkout_types::domain::cart::Product;
use checkout_types::domain::money::major_to_cents;
use checkout_types::domain::order::ProductId;
use checkout_types::ports::gateways::{GatewayError, InventoryGateway};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::GatewayClient;

/// Product service adapter. The product service only stores absolute stock
/// levels, so a delta is applied as read-then-write, clamped at zero.
#[derive(Clone)]
pub struct HttpInventoryGateway {
    http: GatewayClient,
}

impl HttpInventoryGateway {
    pub fn new(http: GatewayClient) -> Self {
        Self { http }
    }
}

#[derive(Deserialize)]
struct ProductEnvelope {
    product: ProductDto,
}

#[derive(Deserialize)]
struct ProductDto {
    id: ProductId,
    name: String,
    price: Decimal,
    #[serde(default)]
    inventory: i64,
}

/// Postgres DECIMAL columns arrive as strings, computed values as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Decimal {
    Number(f64),
    Text(String),
}

impl Decimal {
    fn to_cents(&self) -> Result<i64, GatewayError> {
        match self {
            Decimal::Number(n) => Ok(major_to_cents(*n)),
            Decimal::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(major_to_cents)
                .map_err(|e| GatewayError::Unavailable(format!("product: bad price {s:?}: {e}"))),
        }
    }
}

#[derive(Serialize)]
struct SetInventoryRequest {
    quantity: i64,
}

#[async_trait]
impl InventoryGateway for HttpInventoryGateway {
    async fn get_product(&self, id: ProductId) -> Result<Product, GatewayError> {
        let req = self.http.request(Method::GET, &format!("products/{id}"))?;
        let res = self.http.send(req).await?;
        let envelope: ProductEnvelope = self.http.json(res).await?;
        let dto = envelope.product;
        Ok(Product {
            id: dto.id,
            name: dto.name,
            price_cents: dto.price.to_cents()?,
            inventory: dto.inventory,
        })
    }

    async fn adjust_inventory(&self, id: ProductId, delta: i64) -> Result<(), GatewayError> {
        let product = self.get_product(id).await?;
        let quantity = (product.inventory + delta).max(0);
        let req = self
            .http
            .request(Method::PUT, &format!("products/{id}/inventory"))?
            .json(&SetInventoryRequest { quantity });
        self.http.send(req).await?;
        tracing::debug!(product_id = id, delta, quantity, "inventory adjusted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn gateway(server: &MockServer) -> HttpInventoryGateway {
        HttpInventoryGateway::new(GatewayClient::new("product", &server.base_url()).unwrap())
    }

    #[tokio::test]
    async fn get_product_parses_decimal_string_price() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/products/7");
            then.status(200).json_body(json!({
                "product": { "id": 7, "name": "Widget", "price": "29.99", "inventory": 100 }
            }));
        });

        let product = gateway(&server).get_product(7).await.unwrap();
        assert_eq!(
            product,
            Product {
                id: 7,
                name: "Widget".into(),
                price_cents: 2999,
                inventory: 100,
            }
        );
    }

    #[tokio::test]
    async fn get_product_accepts_numeric_price() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/products/8");
            then.status(200).json_body(json!({
                "product": { "id": 8, "name": "Gadget", "price": 5.5, "inventory": 0 }
            }));
        });

        let product = gateway(&server).get_product(8).await.unwrap();
        assert_eq!(product.price_cents, 550);
    }

    #[tokio::test]
    async fn missing_product_is_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/products/404");
            then.status(404).json_body(json!({ "error": "Product not found" }));
        });

        let err = gateway(&server).get_product(404).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn adjust_writes_clamped_absolute_quantity() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/products/7");
            then.status(200).json_body(json!({
                "product": { "id": 7, "name": "Widget", "price": "29.99", "inventory": 3 }
            }));
        });
        let put_mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/products/7/inventory")
                .json_body(json!({ "quantity": 0 }));
            then.status(200).json_body(json!({ "message": "Inventory updated successfully" }));
        });

        gateway(&server).adjust_inventory(7, -5).await.unwrap();
        put_mock.assert();
    }

    #[tokio::test]
    async fn rejected_inventory_write_is_validation_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/products/7");
            then.status(200).json_body(json!({
                "product": { "id": 7, "name": "Widget", "price": "29.99", "inventory": 10 }
            }));
        });
        server.mock(|when, then| {
            when.method(PUT).path("/products/7/inventory");
            then.status(400).json_body(json!({ "error": "\"quantity\" is required" }));
        });

        let err = gateway(&server).adjust_inventory(7, -1).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }
}
