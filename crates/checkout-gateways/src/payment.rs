use async_trait::async_trait;
use checkout_types::domain::money::{cents_to_major, major_to_cents};
use checkout_types::domain::order::{OrderId, UserId};
use checkout_types::domain::payment::{
    PaymentMetadata, PaymentOrder, PaymentProof, PaymentResult, RefundResult,
};
use checkout_types::ports::gateways::{GatewayError, PaymentGateway};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::GatewayClient;

/// Payment service adapter (`payments/intent`, `payments/confirm`,
/// `payments/refund`). Amounts travel in major units.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    http: GatewayClient,
}

impl HttpPaymentGateway {
    pub fn new(http: GatewayClient) -> Self {
        Self { http }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateIntentRequest<'a> {
    amount: f64,
    currency: &'a str,
    order_id: Option<OrderId>,
    user_id: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateIntentResponse {
    #[serde(rename = "orderId", alias = "paymentIntentId")]
    payment_ref: String,
    client_secret: Option<String>,
    key_id: Option<String>,
    amount: Option<f64>,
    currency: Option<String>,
    status: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmRequest<'a> {
    order_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmResponse {
    success: bool,
    status: Option<String>,
    payment_id: Option<String>,
    message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefundRequest<'a> {
    payment_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefundResponse {
    success: bool,
    refund_id: String,
    #[serde(default)]
    amount: f64,
    status: String,
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_payment_order(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: PaymentMetadata,
    ) -> Result<PaymentOrder, GatewayError> {
        let req = self
            .http
            .request(Method::POST, "payments/intent")?
            .json(&CreateIntentRequest {
                amount: cents_to_major(amount_cents),
                currency,
                order_id: metadata.order_id,
                user_id: metadata.user_id,
            });
        let res = self.http.send(req).await?;
        let body: CreateIntentResponse = self.http.json(res).await?;
        Ok(PaymentOrder {
            payment_ref: body.payment_ref,
            client_handle: body.client_secret,
            key_id: body.key_id,
            amount_cents: body.amount.map(major_to_cents).unwrap_or(amount_cents),
            currency: body.currency.unwrap_or_else(|| currency.to_string()),
            status: body.status.unwrap_or_else(|| "created".into()),
        })
    }

    async fn confirm_payment(
        &self,
        payment_ref: &str,
        proof: &PaymentProof,
    ) -> Result<PaymentResult, GatewayError> {
        let req = self
            .http
            .request(Method::POST, "payments/confirm")?
            .json(&ConfirmRequest {
                order_id: payment_ref,
                payment_id: proof.payment_id.as_deref(),
                signature: proof.signature.as_deref(),
            });
        let res = self.http.execute(req).await?;

        // A failed verification comes back as 400 with `success: false`; that
        // is a payment outcome, not a malformed request.
        if res.status() == StatusCode::BAD_REQUEST {
            let text = res.text().await.unwrap_or_default();
            return match serde_json::from_str::<ConfirmResponse>(&text) {
                Ok(body) => Ok(into_result(body)),
                Err(_) => Err(GatewayError::Validation(format!(
                    "payment responded 400: {text}"
                ))),
            };
        }
        let res = self.http.check(res).await?;
        let body: ConfirmResponse = self.http.json(res).await?;
        Ok(into_result(body))
    }

    async fn refund(
        &self,
        payment_ref: &str,
        amount_cents: Option<i64>,
    ) -> Result<RefundResult, GatewayError> {
        let req = self
            .http
            .request(Method::POST, "payments/refund")?
            .json(&RefundRequest {
                payment_id: payment_ref,
                amount: amount_cents.map(cents_to_major),
            });
        let res = self.http.send(req).await?;
        let body: RefundResponse = self.http.json(res).await?;
        Ok(RefundResult {
            success: body.success,
            refund_id: body.refund_id,
            amount_cents: major_to_cents(body.amount),
            status: body.status,
        })
    }
}

fn into_result(body: ConfirmResponse) -> PaymentResult {
    let status = body
        .status
        .or(body.message)
        .unwrap_or_else(|| if body.success { "captured" } else { "failed" }.into());
    PaymentResult {
        success: body.success,
        status,
        payment_id: body.payment_id,
    }
}
