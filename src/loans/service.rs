//! Installment processing service
//!
//! Collects scheduled payments on funded loans and fans them out to the
//! investors on record. One transaction covers the borrower withdrawal,
//! every investor deposit, and the balance update, so a payment either
//! happens in full or not at all. The installment whose principal
//! component retires the remaining balance archives the loan to the
//! paid-off stage in the same transaction.

use sqlx::PgPool;
use uuid::Uuid;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::amortization::{allocate_installment, retires_balance, split_installment};
use crate::error::{ApiError, ApiResult};
use crate::loans::model::{InstallmentReceipt, Investment, InvestorShare};
use crate::models::AppStage;
use crate::requests::model::LoanApplication;
use crate::requests::service::lock_application;
use crate::users;

/// Funded-loan service
pub struct LoanService {
    pool: PgPool,
}

impl LoanService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Collect one installment from the borrower and distribute it
    /// pro-rata to the loan's investors.
    pub async fn pay_installment(&self, loan_id: i64) -> ApiResult<InstallmentReceipt> {
        let mut tx = self.pool.begin().await?;

        let loan = lock_application(&mut tx, loan_id, AppStage::Funded).await?;

        let remaining = loan.remaining_balance.ok_or_else(|| {
            ApiError::DatabaseError(format!(
                "Funded loan {} has no remaining balance",
                loan_id
            ))
        })?;

        let split = split_installment(remaining, loan.interest_rate, loan.installment_amt);

        // The borrower pays the full installment on every payment, the
        // final one included.
        users::service::withdraw_in_tx(&mut tx, loan.borrower_id, loan.installment_amt).await?;

        let investments = sqlx::query_as::<_, (Uuid, Decimal)>(
            r#"
            SELECT investor_id, invested_amt FROM loan_investments
            WHERE loan_id = $1
            ORDER BY investor_id
            "#,
        )
        .bind(loan_id)
        .fetch_all(&mut *tx)
        .await?;

        let shares = allocate_installment(loan.installment_amt, loan.amt_funded, &investments)?;
        for (investor_id, amount) in &shares {
            users::service::deposit_in_tx(&mut tx, *investor_id, *amount).await?;
        }

        let paid_off = retires_balance(remaining, split);
        if paid_off {
            sqlx::query(
                r#"
                UPDATE loan_applications
                SET stage = 'paid_off', remaining_balance = 0, paidoff_date = $2
                WHERE id = $1
                "#,
            )
            .bind(loan_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE loan_applications
                SET remaining_balance = remaining_balance - $2
                WHERE id = $1
                "#,
            )
            .bind(loan_id)
            .bind(split.principal)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        // The returned loan carries the balance going into this payment;
        // callers see the pre-payoff state when the loan was retired.
        let mut result = loan;
        if !paid_off {
            result.remaining_balance = Some(remaining - split.principal);
        }

        Ok(InstallmentReceipt {
            loan: result,
            interest_paid: split.interest,
            principal_paid: split.principal,
            distributions: shares
                .into_iter()
                .map(|(investor_id, amount)| InvestorShare {
                    investor_id,
                    amount,
                })
                .collect(),
            paid_off,
        })
    }

    /// Archive a funded loan to the paid-off stage. A failed write rolls
    /// back and leaves the funded record in place.
    pub async fn payoff_loan(&self, loan_id: i64) -> ApiResult<LoanApplication> {
        let mut tx = self.pool.begin().await?;

        lock_application(&mut tx, loan_id, AppStage::Funded).await?;

        let archived = sqlx::query_as::<_, LoanApplication>(
            r#"
            UPDATE loan_applications
            SET stage = 'paid_off', remaining_balance = 0, paidoff_date = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(loan_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(archived)
    }

    pub async fn list_funded(&self) -> ApiResult<Vec<LoanApplication>> {
        let loans = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE stage = 'funded' ORDER BY funded_date",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    pub async fn get_funded(&self, loan_id: i64) -> ApiResult<LoanApplication> {
        sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE id = $1 AND stage = 'funded'",
        )
        .bind(loan_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No funded loan with id {}", loan_id)))
    }

    pub async fn list_paid_off(&self) -> ApiResult<Vec<LoanApplication>> {
        let loans = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE stage = 'paid_off' ORDER BY paidoff_date",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    pub async fn get_paid_off(&self, loan_id: i64) -> ApiResult<LoanApplication> {
        sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE id = $1 AND stage = 'paid_off'",
        )
        .bind(loan_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No paid-off loan with id {}", loan_id)))
    }

    /// Who funded this loan, and with how much.
    pub async fn investments_for_loan(&self, loan_id: i64) -> ApiResult<Vec<Investment>> {
        let investments = sqlx::query_as::<_, Investment>(
            "SELECT * FROM loan_investments WHERE loan_id = $1 ORDER BY investor_id",
        )
        .bind(loan_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(investments)
    }

    pub async fn funded_by_borrower(&self, borrower_id: Uuid) -> ApiResult<Vec<LoanApplication>> {
        let loans = sqlx::query_as::<_, LoanApplication>(
            r#"
            SELECT * FROM loan_applications
            WHERE borrower_id = $1 AND stage IN ('funded', 'paid_off')
            ORDER BY funded_date
            "#,
        )
        .bind(borrower_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    /// Loans an investor holds a share of.
    pub async fn funded_by_investor(&self, investor_id: Uuid) -> ApiResult<Vec<LoanApplication>> {
        let loans = sqlx::query_as::<_, LoanApplication>(
            r#"
            SELECT a.* FROM loan_applications a
            JOIN loan_investments i ON i.loan_id = a.id
            WHERE i.investor_id = $1
            ORDER BY a.funded_date
            "#,
        )
        .bind(investor_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }
}
