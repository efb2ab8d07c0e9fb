use async_trait::async_trait;
use checkout_types::domain::notification::{Notification, Template};
use checkout_types::ports::gateways::{GatewayError, NotificationGateway};
use reqwest::Method;
use serde::Serialize;

use crate::GatewayClient;

#[derive(Clone)]
pub struct HttpNotificationGateway {
    http: GatewayClient,
}

impl HttpNotificationGateway {
    pub fn new(http: GatewayClient) -> Self {
        Self { http }
    }
}

#[derive(Serialize)]
struct NotifyRequest<'a> {
    to: &'a str,
    #[serde(rename = "type")]
    template: Template,
    data: &'a serde_json::Value,
}

#[async_trait]
impl NotificationGateway for HttpNotificationGateway {
    async fn notify(&self, notification: &Notification) -> Result<(), GatewayError> {
        let path = format!("notifications/{}", notification.channel.as_str());
        let req = self.http.request(Method::POST, &path)?.json(&NotifyRequest {
            to: &notification.target,
            template: notification.template,
            data: &notification.data,
        });
        self.http.send(req).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_types::domain::notification::Channel;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn posts_to_channel_endpoint() {
        let server = MockServer::start();
        let email = server.mock(|when, then| {
            when.method(POST).path("/notifications/email").json_body(json!({
                "to": "a@b.com",
                "type": "shipping_update",
                "data": { "orderId": 1, "status": "shipped" }
            }));
            then.status(200).json_body(json!({ "message": "Email notification sent" }));
        });
        let sms = server.mock(|when, then| {
            when.method(POST).path("/notifications/sms");
            then.status(200).json_body(json!({ "message": "SMS notification sent" }));
        });

        let gw = HttpNotificationGateway::new(
            GatewayClient::new("notification", &server.base_url()).unwrap(),
        );
        let data = json!({ "orderId": 1, "status": "shipped" });
        gw.notify(&Notification {
            channel: Channel::Email,
            target: "a@b.com".into(),
            template: Template::ShippingUpdate,
            data: data.clone(),
        })
        .await
        .unwrap();
        gw.notify(&Notification {
            channel: Channel::Sms,
            target: "+15550100".into(),
            template: Template::ShippingUpdate,
            data,
        })
        .await
        .unwrap();

        email.assert();
        sms.assert();
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let gw = HttpNotificationGateway::new(
            GatewayClient::new("notification", "http://127.0.0.1:1").unwrap(),
        );
        let err = gw
            .notify(&Notification {
                channel: Channel::Email,
                target: "a@b.com".into(),
                template: Template::OrderConfirmation,
                data: json!({}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));
    }
}
