//! Municipal bills and their payments
//!
//! A bill starts `unpaid` and becomes `paid` exactly once, when a gateway
//! callback with a valid signature is recorded. There is no other transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Currency every bill is settled in.
pub const BILL_CURRENCY: &str = "INR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillType {
    Tax,
    Water,
}

impl BillType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillType::Tax => "tax",
            BillType::Water => "water",
        }
    }
}

impl fmt::Display for BillType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tax" => Ok(BillType::Tax),
            "water" => Ok(BillType::Water),
            other => Err(format!("unknown bill type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    Unpaid,
    Paid,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Unpaid => "unpaid",
            BillStatus::Paid => "paid",
        }
    }
}

impl FromStr for BillStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unpaid" => Ok(BillStatus::Unpaid),
            "paid" => Ok(BillStatus::Paid),
            other => Err(format!("unknown bill status: {other}")),
        }
    }
}

/// Payment recorded against a bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payer_name: Option<String>,
    pub payer_email: Option<String>,
    pub amount: f64,
    pub paid_at: DateTime<Utc>,
    pub payment_method: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub bill_number: String,
    pub bill_type: BillType,
    pub amount_due: f64,
    pub due_date: Option<DateTime<Utc>>,
    pub status: BillStatus,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment: Option<PaymentRecord>,
}

impl Bill {
    pub fn is_paid(&self) -> bool {
        self.status == BillStatus::Paid
    }

    /// Amount due in minor units (paise), as payment gateways expect.
    pub fn amount_minor(&self) -> i64 {
        to_minor_units(self.amount_due)
    }

    /// The single action a bill view offers.
    pub fn action(&self) -> BillAction {
        match self.status {
            BillStatus::Unpaid => BillAction::ProceedToPayment,
            BillStatus::Paid => BillAction::DownloadReceipt,
        }
    }
}

pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillAction {
    ProceedToPayment,
    DownloadReceipt,
}

impl BillAction {
    pub fn label(&self) -> &'static str {
        match self {
            BillAction::ProceedToPayment => "Proceed to Payment",
            BillAction::DownloadReceipt => "Download Receipt",
        }
    }
}

/// Receipt for a paid bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_id: String,
    pub bill_number: String,
    pub bill_type: BillType,
    pub amount_paid: f64,
    pub payer_name: Option<String>,
    pub payer_email: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Receipt {
    /// Build the receipt for a paid bill; unpaid bills have none.
    pub fn for_bill(bill: &Bill) -> Option<Self> {
        if !bill.is_paid() {
            return None;
        }
        let payment = bill.payment.as_ref();
        Some(Self {
            receipt_id: payment
                .and_then(|p| p.razorpay_payment_id.clone())
                .unwrap_or_else(|| format!("RCPT-{}", bill.bill_number)),
            bill_number: bill.bill_number.clone(),
            bill_type: bill.bill_type,
            amount_paid: payment.map(|p| p.amount).unwrap_or(bill.amount_due),
            payer_name: payment.and_then(|p| p.payer_name.clone()),
            payer_email: payment.and_then(|p| p.payer_email.clone()),
            paid_at: payment.map(|p| p.paid_at).or(bill.paid_at),
        })
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str("Municipal Corporation\nPayment Receipt\n\n");
        out.push_str(&format!("Receipt: {}\n", self.receipt_id));
        out.push_str(&format!("Bill Number: {}\n", self.bill_number));
        out.push_str(&format!("Bill Type: {}\n", self.bill_type));
        out.push_str(&format!("Amount Paid: {} {:.2}\n", BILL_CURRENCY, self.amount_paid));
        if let Some(name) = &self.payer_name {
            out.push_str(&format!("Paid By: {name}\n"));
        }
        if let Some(email) = &self.payer_email {
            out.push_str(&format!("Payer Email: {email}\n"));
        }
        if let Some(at) = self.paid_at {
            out.push_str(&format!("Paid At: {}\n", at.to_rfc3339()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bill(status: BillStatus) -> Bill {
        Bill {
            bill_number: "TAX1001".into(),
            bill_type: BillType::Tax,
            amount_due: 2750.5,
            due_date: None,
            status,
            paid_at: None,
            payment: None,
        }
    }

    #[test]
    fn exactly_one_action_per_status() {
        assert_eq!(bill(BillStatus::Unpaid).action(), BillAction::ProceedToPayment);
        assert_eq!(bill(BillStatus::Paid).action(), BillAction::DownloadReceipt);
    }

    #[test]
    fn minor_units_round() {
        assert_eq!(bill(BillStatus::Unpaid).amount_minor(), 275050);
        assert_eq!(to_minor_units(420.75), 42075);
        assert_eq!(to_minor_units(0.1 + 0.2), 30);
    }

    #[test]
    fn receipt_only_for_paid_bills() {
        assert!(Receipt::for_bill(&bill(BillStatus::Unpaid)).is_none());

        let receipt = Receipt::for_bill(&bill(BillStatus::Paid)).unwrap();
        assert_eq!(receipt.receipt_id, "RCPT-TAX1001");
        assert_eq!(receipt.amount_paid, 2750.5);
        assert!(receipt.render_text().contains("Bill Number: TAX1001"));
    }

    #[test]
    fn receipt_prefers_gateway_payment_id() {
        let mut paid = bill(BillStatus::Paid);
        paid.payment = Some(PaymentRecord {
            payer_name: Some("Asha".into()),
            payer_email: None,
            amount: 2750.5,
            paid_at: Utc::now(),
            payment_method: Some("razorpay".into()),
            razorpay_payment_id: Some("pay_123".into()),
            razorpay_order_id: Some("order_9".into()),
        });
        let receipt = Receipt::for_bill(&paid).unwrap();
        assert_eq!(receipt.receipt_id, "pay_123");
        assert!(receipt.render_text().contains("Paid By: Asha"));
    }
}
