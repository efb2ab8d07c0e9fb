use async_trait::async_trait;
use checkout_types::domain::cart::CartLine;
use checkout_types::domain::order::{ProductId, UserId};
use checkout_types::ports::gateways::{CartStore, GatewayError};
use reqwest::Method;
use serde::Deserialize;

use crate::GatewayClient;

/// Cart service adapter: `GET cart/{user}` and `DELETE cart/{user}/clear`.
#[derive(Clone)]
pub struct HttpCartStore {
    http: GatewayClient,
}

impl HttpCartStore {
    pub fn new(http: GatewayClient) -> Self {
        Self { http }
    }
}

#[derive(Deserialize)]
struct CartResponse {
    #[serde(default)]
    items: Vec<CartItemDto>,
}

// The cart service also embeds a `product` view per line; prices are always
// re-read from the inventory gateway so it is ignored here.
#[derive(Deserialize)]
struct CartItemDto {
    product_id: ProductId,
    quantity: u32,
}

#[async_trait]
impl CartStore for HttpCartStore {
    async fn get_cart(&self, user_id: UserId) -> Result<Vec<CartLine>, GatewayError> {
        let req = self.http.request(Method::GET, &format!("cart/{user_id}"))?;
        let res = self.http.send(req).await?;
        let cart: CartResponse = self.http.json(res).await?;
        Ok(cart
            .items
            .into_iter()
            .map(|it| CartLine {
                product_id: it.product_id,
                quantity: it.quantity,
            })
            .collect())
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), GatewayError> {
        let req = self
            .http
            .request(Method::DELETE, &format!("cart/{user_id}/clear"))?;
        self.http.send(req).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_and_clear_cart() {
        let server = MockServer::start();
        let get_mock = server.mock(|when, then| {
            when.method(GET).path("/cart/5");
            then.status(200).json_body(json!({
                "cart_id": 1,
                "user_id": 5,
                "items": [
                    { "id": 10, "product_id": 7, "quantity": 2, "product": { "id": 7, "price": "29.99" } },
                    { "id": 11, "product_id": 9, "quantity": 1, "product": null }
                ]
            }));
        });
        let clear_mock = server.mock(|when, then| {
            when.method(DELETE).path("/cart/5/clear");
            then.status(200).json_body(json!({ "message": "Cart cleared" }));
        });

        let store = HttpCartStore::new(GatewayClient::new("cart", &server.base_url()).unwrap());
        let lines = store.get_cart(5).await.unwrap();
        assert_eq!(
            lines,
            vec![
                CartLine { product_id: 7, quantity: 2 },
                CartLine { product_id: 9, quantity: 1 },
            ]
        );
        store.clear_cart(5).await.unwrap();

        get_mock.assert();
        clear_mock.assert();
    }

    #[tokio::test]
    async fn clear_missing_cart_is_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/cart/5/clear");
            then.status(404).json_body(json!({ "error": "Cart not found" }));
        });

        let store = HttpCartStore::new(GatewayClient::new("cart", &server.base_url()).unwrap());
        let err = store.clear_cart(5).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/cart/5");
            then.status(500).json_body(json!({ "error": "Internal server error" }));
        });

        let store = HttpCartStore::new(GatewayClient::new("cart", &server.base_url()).unwrap());
        let err = store.get_cart(5).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));
    }
}
