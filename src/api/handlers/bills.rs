//! Bill lookup and hosted-checkout payment handlers.
//!
//! A payment is only recorded after the gateway's callback signature has been
//! checked against an order this server issued for the same bill.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::Json;
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::api::auth_helpers::ensure_citizen;
use crate::api::error::{validation_error, ApiError, ErrorCode};
use crate::api::types::{
    CreateOrderRequest, CreateOrderResponse, VerifyPaymentRequest, VerifyPaymentResponse,
};
use crate::api::utils::{bad_json, required};
use crate::auth::AuthContextExt;
use crate::domain::{Bill, BILL_CURRENCY};
use crate::infra::{BillOrder, DeskError, NewPayment};
use crate::server::AppState;

fn already_paid() -> ApiError {
    ApiError::new(ErrorCode::Conflict, "Bill already paid")
}

/// GET /api/citizens/bill/:bill_number - Look up a bill.
#[instrument(skip(state, auth))]
pub async fn get_bill(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    Path(bill_number): Path<String>,
) -> Result<Json<Bill>, ApiError> {
    ensure_citizen(&auth)?;
    Ok(Json(state.bills.require(bill_number.trim()).await?))
}

/// POST /api/citizens/bill/create_order - Open a gateway order for an unpaid bill.
#[instrument(skip_all)]
pub async fn create_order(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<CreateOrderResponse>, ApiError> {
    ensure_citizen(&auth)?;
    let Json(request) = payload.map_err(bad_json)?;
    let bill_number = required("bill_number", request.bill_number)?;

    let bill = state.bills.require(&bill_number).await?;
    if bill.is_paid() {
        return Err(already_paid());
    }

    let amount_minor = bill.amount_minor();
    let order = state
        .gateway
        .create_order(amount_minor, BILL_CURRENCY, &bill.bill_number)
        .await?;

    state
        .bills
        .record_order(&BillOrder {
            order_id: order.id.clone(),
            bill_number: bill.bill_number.clone(),
            amount_minor: order.amount,
            currency: order.currency.clone(),
        })
        .await?;

    info!(bill_number = %bill.bill_number, order_id = %order.id, amount_minor, "Payment order created");
    Ok(Json(CreateOrderResponse {
        order_id: order.id,
        key: state.gateway.key_id(),
        amount: order.amount,
        currency: order.currency,
    }))
}

/// POST /api/citizens/bill/verify - Check the checkout signature and mark the bill paid.
#[instrument(skip_all)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Extension(AuthContextExt(auth)): Extension<AuthContextExt>,
    payload: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Result<Json<VerifyPaymentResponse>, ApiError> {
    let user_id = ensure_citizen(&auth)?;
    let Json(request) = payload.map_err(bad_json)?;

    let payment_id = required("razorpay_payment_id", request.razorpay_payment_id)?;
    let order_id = required("razorpay_order_id", request.razorpay_order_id)?;
    let signature = required("razorpay_signature", request.razorpay_signature)?;
    let bill_number = required("bill_number", request.bill_number)?;

    let bill = state.bills.require(&bill_number).await?;
    if bill.is_paid() {
        return Err(already_paid());
    }

    let order = state.bills.order(&order_id).await?;
    if order.as_ref().map(|o| o.bill_number.as_str()) != Some(bill.bill_number.as_str()) {
        return Err(validation_error(
            "razorpay_order_id",
            "Order was not issued for this bill",
        ));
    }

    if !state
        .gateway
        .verify_signature(&order_id, &payment_id, &signature)
    {
        warn!(bill_number = %bill.bill_number, order_id = %order_id, "Payment signature mismatch");
        return Err(DeskError::SignatureMismatch.into());
    }

    let payer = state.accounts.citizen(user_id).await?;
    let payment = NewPayment {
        bill_number: bill.bill_number.clone(),
        payer_user_id: Some(user_id),
        payer_name: payer.as_ref().map(|c| c.name.clone()).or(auth.name.clone()),
        payer_email: payer.as_ref().map(|c| c.email.clone()).or(auth.email.clone()),
        payment_method: request
            .payment_method
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "razorpay".to_string()),
        payment_id,
        order_id,
    };
    let settled = state.bills.settle(&payment, Utc::now()).await?;

    info!(bill_number = %settled.bill_number, user_id = user_id.0, "Bill paid");
    Ok(Json(VerifyPaymentResponse {
        message: "Payment verified successfully".to_string(),
        bill_number: settled.bill_number,
        paid_at: settled.paid_at,
    }))
}
