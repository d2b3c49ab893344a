//! Municipal bills, gateway orders and recorded payments

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, FromRow};

use super::{fmt_ts, parse_enum, parse_opt_ts, parse_ts};
use crate::domain::{Bill, BillType, PaymentRecord, UserId};
use crate::infra::sqlite::accounts::unique_violation;
use crate::infra::{DeskError, Result};

/// A gateway order issued for a bill.
#[derive(Debug, Clone, PartialEq)]
pub struct BillOrder {
    pub order_id: String,
    pub bill_number: String,
    pub amount_minor: i64,
    pub currency: String,
}

/// Payment details captured when a signed callback is accepted.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub bill_number: String,
    pub payer_user_id: Option<UserId>,
    pub payer_name: Option<String>,
    pub payer_email: Option<String>,
    pub payment_method: String,
    pub payment_id: String,
    pub order_id: String,
}

pub struct SqliteBillStore {
    pool: SqlitePool,
}

impl SqliteBillStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace an unpaid bill. Paid bills are left untouched.
    pub async fn upsert_bill(
        &self,
        bill_number: &str,
        bill_type: BillType,
        amount_due: f64,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if !(amount_due.is_finite() && amount_due > 0.0) {
            return Err(DeskError::validation("amount_due must be positive"));
        }
        sqlx::query(
            r#"
            INSERT INTO bills (bill_number, bill_type, amount_due, due_date, status, created_at)
            VALUES (?, ?, ?, ?, 'unpaid', ?)
            ON CONFLICT(bill_number) DO UPDATE SET
                bill_type = excluded.bill_type,
                amount_due = excluded.amount_due,
                due_date = excluded.due_date
            WHERE bills.status = 'unpaid'
            "#,
        )
        .bind(bill_number)
        .bind(bill_type.as_str())
        .bind(amount_due)
        .bind(due_date.map(fmt_ts))
        .bind(fmt_ts(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a bill paid without a gateway payment (seeding historical data).
    pub async fn mark_paid_offline(&self, bill_number: &str, paid_at: DateTime<Utc>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let amount: Option<(f64,)> = sqlx::query_as("SELECT amount_due FROM bills WHERE bill_number = ?")
            .bind(bill_number)
            .fetch_optional(&mut *tx)
            .await?;
        let Some((amount,)) = amount else {
            return Err(DeskError::not_found("bill", bill_number));
        };

        sqlx::query("UPDATE bills SET status = 'paid', paid_at = ? WHERE bill_number = ? AND status = 'unpaid'")
            .bind(fmt_ts(paid_at))
            .bind(bill_number)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO bill_payments (bill_number, amount, payment_method, created_at)
            VALUES (?, ?, 'counter', ?)
            ON CONFLICT(bill_number) DO NOTHING
            "#,
        )
        .bind(bill_number)
        .bind(amount)
        .bind(fmt_ts(paid_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get(&self, bill_number: &str) -> Result<Option<Bill>> {
        let row = sqlx::query_as::<_, BillRow>(
            r#"
            SELECT b.bill_number, b.bill_type, b.amount_due, b.due_date, b.status, b.paid_at,
                   p.amount AS payment_amount, p.payer_name, p.payer_email, p.payment_method,
                   p.razorpay_payment_id, p.razorpay_order_id, p.created_at AS payment_created_at
            FROM bills b
            LEFT JOIN bill_payments p ON p.bill_number = b.bill_number
            WHERE b.bill_number = ?
            "#,
        )
        .bind(bill_number)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Bill::try_from).transpose()
    }

    pub async fn require(&self, bill_number: &str) -> Result<Bill> {
        self.get(bill_number)
            .await?
            .ok_or_else(|| DeskError::not_found("bill", bill_number))
    }

    pub async fn record_order(&self, order: &BillOrder) -> Result<()> {
        sqlx::query(
            "INSERT INTO bill_orders (order_id, bill_number, amount_minor, currency, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&order.order_id)
        .bind(&order.bill_number)
        .bind(order.amount_minor)
        .bind(&order.currency)
        .bind(fmt_ts(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "order id already recorded"))?;
        Ok(())
    }

    pub async fn order(&self, order_id: &str) -> Result<Option<BillOrder>> {
        let row: Option<(String, String, i64, String)> = sqlx::query_as(
            "SELECT order_id, bill_number, amount_minor, currency FROM bill_orders WHERE order_id = ?",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(order_id, bill_number, amount_minor, currency)| BillOrder {
            order_id,
            bill_number,
            amount_minor,
            currency,
        }))
    }

    /// Mark the bill paid and record the payment in one transaction.
    ///
    /// Fails with `Conflict` if the bill was paid concurrently.
    pub async fn settle(&self, payment: &NewPayment, paid_at: DateTime<Utc>) -> Result<Bill> {
        let mut tx = self.pool.begin().await?;

        let amount: Option<(f64,)> = sqlx::query_as("SELECT amount_due FROM bills WHERE bill_number = ?")
            .bind(&payment.bill_number)
            .fetch_optional(&mut *tx)
            .await?;
        let Some((amount,)) = amount else {
            return Err(DeskError::not_found("bill", &payment.bill_number));
        };

        let updated = sqlx::query(
            "UPDATE bills SET status = 'paid', paid_at = ? WHERE bill_number = ? AND status = 'unpaid'",
        )
        .bind(fmt_ts(paid_at))
        .bind(&payment.bill_number)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(DeskError::Conflict("bill already paid".into()));
        }

        sqlx::query(
            r#"
            INSERT INTO bill_payments (
                bill_number, amount, payer_user_id, payer_name, payer_email,
                payment_method, razorpay_payment_id, razorpay_order_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payment.bill_number)
        .bind(amount)
        .bind(payment.payer_user_id.map(|u| u.0))
        .bind(&payment.payer_name)
        .bind(&payment.payer_email)
        .bind(&payment.payment_method)
        .bind(&payment.payment_id)
        .bind(&payment.order_id)
        .bind(fmt_ts(paid_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, "bill already paid"))?;

        tx.commit().await?;
        self.require(&payment.bill_number).await
    }
}

#[derive(Debug, FromRow)]
struct BillRow {
    bill_number: String,
    bill_type: String,
    amount_due: f64,
    due_date: Option<String>,
    status: String,
    paid_at: Option<String>,
    payment_amount: Option<f64>,
    payer_name: Option<String>,
    payer_email: Option<String>,
    payment_method: Option<String>,
    razorpay_payment_id: Option<String>,
    razorpay_order_id: Option<String>,
    payment_created_at: Option<String>,
}

impl TryFrom<BillRow> for Bill {
    type Error = DeskError;

    fn try_from(row: BillRow) -> Result<Self> {
        let payment = match (row.payment_amount, row.payment_created_at) {
            (Some(amount), Some(created_at)) => Some(PaymentRecord {
                payer_name: row.payer_name,
                payer_email: row.payer_email,
                amount,
                paid_at: parse_ts("payment created_at", &created_at)?,
                payment_method: row.payment_method,
                razorpay_payment_id: row.razorpay_payment_id,
                razorpay_order_id: row.razorpay_order_id,
            }),
            _ => None,
        };

        Ok(Bill {
            bill_type: parse_enum(&row.bill_type)?,
            status: parse_enum(&row.status)?,
            due_date: parse_opt_ts("due_date", row.due_date)?,
            paid_at: parse_opt_ts("paid_at", row.paid_at)?,
            bill_number: row.bill_number,
            amount_due: row.amount_due,
            payment,
        })
    }
}
