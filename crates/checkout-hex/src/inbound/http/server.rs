use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    serve, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::application::order_orchestrator::OrderOrchestrator;
use crate::errors::CheckoutError;
use checkout_types::domain::order::{Order, OrderId, UserId};
use checkout_types::domain::payment::{PaymentHandle, PaymentProof};
use checkout_types::ports::order_ledger::OrderLedger;

#[derive(Clone)]
pub struct HttpServerConfig {
    pub port: String,
}

#[derive(Clone)]
pub struct HttpServer<L>
where
    L: OrderLedger,
{
    pub service: Arc<OrderOrchestrator<L>>,
    pub config: HttpServerConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub shipping_address: Option<String>,
    pub payment_intent_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOrderRequest {
    pub user_id: UserId,
    pub shipping_address: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub order_id: OrderId,
    pub payment_intent_id: Option<String>,
    pub payment_id: Option<String>,
    pub signature: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: String,
    pub tracking_number: Option<String>,
    pub user_email: Option<String>,
    pub user_phone: Option<String>,
}

#[derive(Serialize)]
struct OrderEnvelope {
    message: &'static str,
    order: Order,
}

#[derive(Serialize)]
struct ProcessOrderResponse {
    message: &'static str,
    order: Order,
    payment: PaymentHandle,
}

#[derive(Serialize)]
struct OrderList {
    orders: Vec<Order>,
}

impl<L> HttpServer<L>
where
    L: OrderLedger,
{
    pub async fn new(service: OrderOrchestrator<L>, config: HttpServerConfig) -> anyhow::Result<Self> {
        Ok(Self {
            service: Arc::new(service),
            config,
        })
    }

    pub fn router(&self) -> Router {
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                let request_id = Uuid::new_v4();
                tracing::info_span!(
                    "http_request",
                    %request_id,
                    method = %request.method(),
                    uri
                )
            })
            .on_request(
                |request: &axum::extract::Request<_>, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        method = %request.method(),
                        uri = %request.uri(),
                        "request"
                    );
                },
            )
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        status = %response.status(),
                        latency_ms = %latency.as_millis(),
                        "response"
                    );
                },
            );

        Router::new()
            .route("/health", get(health))
            .route("/orders", post(checkout::<L>))
            .route("/orders/process", post(process_order::<L>))
            .route("/orders/confirm-payment", post(confirm_payment::<L>))
            .route("/orders/user/{user_id}", get(list_user_orders::<L>))
            .route("/orders/{id}", get(get_order::<L>))
            .route("/orders/{id}/payment", post(initiate_payment::<L>))
            .route("/orders/{id}/status", put(update_status::<L>))
            .route("/orders/{id}/cancel", post(cancel_order::<L>))
            .layer(CorsLayer::permissive())
            .layer(trace_layer)
            .with_state(self.service.clone())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let app = self.router();
        let addr: SocketAddr = format!("0.0.0.0:{}", self.config.port).parse()?;
        tracing::info!("starting server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        serve(listener, app.into_make_service()).await?;
        Ok(())
    }
}

fn parse_id(raw: &str) -> Result<i64, CheckoutError> {
    raw.parse::<i64>()
        .map_err(|_| CheckoutError::BadRequest(format!("invalid id {raw:?}")))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, CheckoutError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| CheckoutError::BadRequest(e.body_text()))
}

async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn checkout<L>(
    State(service): State<Arc<OrderOrchestrator<L>>>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderEnvelope>), CheckoutError>
where
    L: OrderLedger,
{
    let req = body(payload)?;
    let order = service
        .checkout(req.user_id, req.shipping_address, req.payment_intent_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(OrderEnvelope {
            message: "Order created successfully",
            order,
        }),
    ))
}

async fn process_order<L>(
    State(service): State<Arc<OrderOrchestrator<L>>>,
    payload: Result<Json<ProcessOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProcessOrderResponse>), CheckoutError>
where
    L: OrderLedger,
{
    let req = body(payload)?;
    let started = service
        .checkout_with_payment(req.user_id, req.shipping_address)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ProcessOrderResponse {
            message: "Order created, awaiting payment",
            order: started.order,
            payment: started.payment,
        }),
    ))
}

async fn initiate_payment<L>(
    State(service): State<Arc<OrderOrchestrator<L>>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<PaymentHandle>), CheckoutError>
where
    L: OrderLedger,
{
    let handle = service.initiate_payment(parse_id(&id)?).await?;
    Ok((StatusCode::CREATED, Json(handle)))
}

async fn confirm_payment<L>(
    State(service): State<Arc<OrderOrchestrator<L>>>,
    payload: Result<Json<ConfirmPaymentRequest>, JsonRejection>,
) -> Result<Json<OrderEnvelope>, CheckoutError>
where
    L: OrderLedger,
{
    let req = body(payload)?;
    let proof = PaymentProof {
        payment_id: req.payment_id,
        signature: req.signature,
    };
    let order = service
        .confirm_payment(req.order_id, req.payment_intent_id, proof)
        .await?;
    Ok(Json(OrderEnvelope {
        message: "Payment confirmed successfully",
        order,
    }))
}

async fn update_status<L>(
    State(service): State<Arc<OrderOrchestrator<L>>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderEnvelope>, CheckoutError>
where
    L: OrderLedger,
{
    let id = parse_id(&id)?;
    let req = body(payload)?;
    if let Some(email) = req.user_email.as_deref() {
        if !email.contains('@') {
            return Err(CheckoutError::BadRequest(format!("invalid email {email:?}")));
        }
    }
    let order = service
        .update_status(
            id,
            &req.status,
            req.tracking_number,
            req.user_email,
            req.user_phone,
        )
        .await?;
    Ok(Json(OrderEnvelope {
        message: "Order status updated successfully",
        order,
    }))
}

async fn cancel_order<L>(
    State(service): State<Arc<OrderOrchestrator<L>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderEnvelope>, CheckoutError>
where
    L: OrderLedger,
{
    let order = service.cancel_order(parse_id(&id)?).await?;
    Ok(Json(OrderEnvelope {
        message: "Order cancelled successfully",
        order,
    }))
}

async fn get_order<L>(
    State(service): State<Arc<OrderOrchestrator<L>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, CheckoutError>
where
    L: OrderLedger,
{
    let order = service.get_order(parse_id(&id)?).await?;
    Ok(Json(order))
}

async fn list_user_orders<L>(
    State(service): State<Arc<OrderOrchestrator<L>>>,
    Path(user_id): Path<String>,
) -> Result<Json<OrderList>, CheckoutError>
where
    L: OrderLedger,
{
    let orders = service.list_orders_for_user(parse_id(&user_id)?).await?;
    Ok(Json(OrderList { orders }))
}
