use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout_types::domain::order::{OrderId, OrderStatus, ProductId};
use checkout_types::ports::order_ledger::LedgerError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("product {0} is unavailable")]
    ProductUnavailable(ProductId),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("order {order_id} is {status}, cannot {action}")]
    InvalidState {
        order_id: OrderId,
        status: OrderStatus,
        action: &'static str,
    },

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("payment for order {order_id} not confirmed: {status}")]
    PaymentNotConfirmed { order_id: OrderId, status: String },

    #[error("downstream service unavailable: {0}")]
    Unavailable(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl CheckoutError {
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutError::EmptyCart => "EmptyCart",
            CheckoutError::ProductUnavailable(_) => "ProductUnavailable",
            CheckoutError::OrderNotFound(_) => "OrderNotFound",
            CheckoutError::InvalidState { .. } => "InvalidState",
            CheckoutError::InvalidStatus(_) => "InvalidStatus",
            CheckoutError::PaymentGateway(_) => "PaymentGatewayError",
            CheckoutError::PaymentNotConfirmed { .. } => "PaymentNotConfirmed",
            CheckoutError::Unavailable(_) => "Unavailable",
            CheckoutError::BadRequest(_) => "BadRequest",
            CheckoutError::Internal(_) => "Internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            CheckoutError::EmptyCart
            | CheckoutError::ProductUnavailable(_)
            | CheckoutError::InvalidState { .. }
            | CheckoutError::InvalidStatus(_)
            | CheckoutError::BadRequest(_) => StatusCode::BAD_REQUEST,
            CheckoutError::PaymentNotConfirmed { .. } => StatusCode::PAYMENT_REQUIRED,
            CheckoutError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            CheckoutError::PaymentGateway(_) => StatusCode::BAD_GATEWAY,
            CheckoutError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CheckoutError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LedgerError> for CheckoutError {
    fn from(e: LedgerError) -> Self {
        CheckoutError::Internal(anyhow::anyhow!(e.to_string()))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for CheckoutError {
    fn into_response(self) -> Response {
        if let CheckoutError::Internal(e) = &self {
            tracing::error!(error = %e, "request failed");
        }
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        let body = serde_json::to_string(&body)
            .unwrap_or_else(|_| "{\"error\":\"internal serialization\"}".into());
        (self.status_code(), [("content-type", "application/json")], body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_and_terminal_errors_map_to_distinct_statuses() {
        assert_eq!(CheckoutError::EmptyCart.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            CheckoutError::PaymentNotConfirmed {
                order_id: 1,
                status: "failed".into()
            }
            .status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            CheckoutError::OrderNotFound(1).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            CheckoutError::Unavailable("cart".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = CheckoutError::Internal(anyhow::anyhow!("disk full at /var/lib"));
        assert_eq!(err.to_string(), "internal error");
        assert_eq!(err.kind(), "Internal");
    }
}
