//! Bill lookup and payment
//!
//! ```text
//! lookup ──► create_order ──► hosted checkout ──► verify ──► paid
//! ```
//!
//! Any failing step is reported inline and leaves the bill as it was.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::api::types::{CreateOrderResponse, VerifyPaymentRequest};
use crate::domain::{Bill, BillAction, BillStatus, Receipt};

use super::api::{CivicApi, ClientError};
use super::mutation::Mutation;

/// What the hosted checkout hands back once the payer completes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutCompletion {
    pub payment_id: String,
    pub order_id: String,
    pub signature: String,
}

/// The gateway's hosted checkout widget.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HostedCheckout: Send + Sync {
    /// Run the checkout for `order`. Cancellation is an error.
    async fn complete(&self, order: &CreateOrderResponse, bill: &Bill) -> Result<CheckoutCompletion, ClientError>;
}

/// The "Pay Bill" page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillPaymentView {
    bill: Option<Bill>,
    lookup_error: Option<String>,
    payment: Option<Mutation<BillStatus>>,
}

impl BillPaymentView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bill(&self) -> Option<&Bill> {
        self.bill.as_ref()
    }

    /// Exactly one action for a loaded bill.
    pub fn action(&self) -> Option<BillAction> {
        self.bill.as_ref().map(Bill::action)
    }

    pub fn receipt(&self) -> Option<Receipt> {
        self.bill.as_ref().and_then(Receipt::for_bill)
    }

    pub fn error_message(&self) -> Option<String> {
        self.payment
            .as_ref()
            .and_then(Mutation::error_message)
            .or_else(|| self.lookup_error.clone())
    }

    pub fn is_paying(&self) -> bool {
        self.payment.as_ref().is_some_and(Mutation::is_pending)
    }

    pub async fn lookup(&mut self, api: &dyn CivicApi, bill_number: &str) {
        if self.is_paying() {
            return;
        }
        let bill_number = bill_number.trim();
        if bill_number.is_empty() {
            self.lookup_error = Some("Please enter a bill number".into());
            return;
        }

        match api.bill(bill_number).await {
            Ok(bill) => {
                self.payment = Some(Mutation::new(bill.status));
                self.bill = Some(bill);
                self.lookup_error = None;
            }
            Err(err) => self.lookup_error = Some(err.user_message()),
        }
    }

    /// Pay the loaded bill through `checkout`.
    pub async fn pay(&mut self, api: &dyn CivicApi, checkout: &dyn HostedCheckout) {
        let Some(bill) = self.bill.clone() else {
            return;
        };
        if bill.action() != BillAction::ProceedToPayment {
            return;
        }
        let payment = self
            .payment
            .get_or_insert_with(|| Mutation::new(bill.status));
        if !payment.begin_unchanged() {
            return;
        }

        let outcome = Self::run_payment(api, checkout, &bill).await;
        let settled = outcome.as_ref().map(|_| BillStatus::Paid).map_err(Clone::clone);
        if let Some(payment) = self.payment.as_mut() {
            payment.settle(settled);
        }
        if let Ok(paid) = outcome {
            self.bill = Some(paid);
        }
    }

    async fn run_payment(
        api: &dyn CivicApi,
        checkout: &dyn HostedCheckout,
        bill: &Bill,
    ) -> Result<Bill, ClientError> {
        let order = api.create_order(&bill.bill_number).await?;
        let completion = checkout.complete(&order, bill).await?;
        let verified = api
            .verify_payment(VerifyPaymentRequest {
                razorpay_payment_id: Some(completion.payment_id),
                razorpay_order_id: Some(completion.order_id),
                razorpay_signature: Some(completion.signature),
                bill_number: Some(bill.bill_number.clone()),
                payment_method: None,
            })
            .await?;

        // The payment is settled server-side at this point; a failed reload
        // only costs the payer details on the receipt.
        match api.bill(&bill.bill_number).await {
            Ok(fresh) if fresh.is_paid() => Ok(fresh),
            _ => {
                let mut paid = bill.clone();
                paid.status = BillStatus::Paid;
                paid.paid_at = verified.paid_at;
                Ok(paid)
            }
        }
    }
}
