//! Funding allocation service
//!
//! Moves investor money into approved requests. Each `fund` call runs in
//! one transaction that locks the request row first, so the capacity
//! check, the `amt_funded` increment, the pledge upsert, and the investor
//! withdrawal are a single atomic unit; two investors racing for the
//! last dollar of capacity serialize on the row lock and the loser gets a
//! clean rejection. Reaching full funding converts the pledge set into
//! the loan's investment record and disburses the principal to the
//! borrower, still inside the same transaction.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::funding::model::{InvestorPosition, Pledge};
use crate::models::{AppStage, CancellationReason};
use crate::requests::model::LoanApplication;
use crate::requests::service::{cancel_approved_in_tx, lock_application};
use crate::users;

/// Funding allocation service
pub struct FundingService {
    pool: PgPool,
}

impl FundingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open an approved request to investors.
    pub async fn enable_funding(&self, id: i64) -> ApiResult<LoanApplication> {
        sqlx::query_as::<_, LoanApplication>(
            r#"
            UPDATE loan_applications
            SET available_for_funding = TRUE
            WHERE id = $1 AND stage = 'approved' AND is_funded = FALSE
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No approved application with id {}", id))
        })
    }

    /// Pledge `amount` from an investor toward an approved request.
    ///
    /// Partial funding leaves the request open for further pledges; the
    /// pledge that exactly reaches the approved amount triggers the
    /// conversion to a funded loan.
    pub async fn fund(
        &self,
        app_id: i64,
        investor_id: Uuid,
        amount: Decimal,
    ) -> ApiResult<LoanApplication> {
        if amount <= Decimal::ZERO {
            return Err(ApiError::InvalidArgument(
                "Funding amount must be greater than zero".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let request = lock_application(&mut tx, app_id, AppStage::Approved).await?;
        users::service::lock_user(&mut tx, investor_id).await?;

        if !request.available_for_funding {
            return Err(ApiError::Conflict(format!(
                "Application {} is not open for funding",
                app_id
            )));
        }

        // amt_approved is always set once a record reaches the approved
        // stage; a NULL here is stored-data corruption.
        let amt_approved = request.amt_approved.ok_or_else(|| {
            ApiError::DatabaseError(format!(
                "Approved application {} has no approved amount",
                app_id
            ))
        })?;

        let capacity = amt_approved - request.amt_funded;
        if amount > capacity {
            return Err(ApiError::InsufficientFunds(format!(
                "Pledge of {} exceeds the remaining capacity of {}",
                amount, capacity
            )));
        }

        // Locks the investor row, checks the balance, and debits it.
        users::service::withdraw_in_tx(&mut tx, investor_id, amount).await?;

        sqlx::query(
            r#"
            INSERT INTO request_pledges (request_id, investor_id, pledged_amt)
            VALUES ($1, $2, $3)
            ON CONFLICT (request_id, investor_id)
            DO UPDATE SET pledged_amt = request_pledges.pledged_amt + EXCLUDED.pledged_amt
            "#,
        )
        .bind(app_id)
        .bind(investor_id)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query_as::<_, LoanApplication>(
            r#"
            UPDATE loan_applications
            SET amt_funded = amt_funded + $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(app_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        let result = if updated.amt_funded == amt_approved {
            Self::convert_to_funded_loan(&mut tx, &updated).await?
        } else {
            updated
        };

        tx.commit().await?;
        Ok(result)
    }

    /// Full-funding conversion: the pledge set becomes the loan's
    /// immutable investment record, the borrower receives the principal,
    /// and the record moves to the funded stage. Runs inside the `fund`
    /// transaction.
    async fn convert_to_funded_loan(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        request: &LoanApplication,
    ) -> ApiResult<LoanApplication> {
        sqlx::query(
            r#"
            INSERT INTO loan_investments (loan_id, investor_id, invested_amt)
            SELECT request_id, investor_id, pledged_amt
            FROM request_pledges
            WHERE request_id = $1
            "#,
        )
        .bind(request.id)
        .execute(&mut **tx)
        .await?;

        sqlx::query("DELETE FROM request_pledges WHERE request_id = $1")
            .bind(request.id)
            .execute(&mut **tx)
            .await?;

        users::service::deposit_in_tx(&mut **tx, request.borrower_id, request.amt_funded).await?;

        let funded = sqlx::query_as::<_, LoanApplication>(
            r#"
            UPDATE loan_applications
            SET stage = 'funded', is_funded = TRUE, available_for_funding = FALSE,
                remaining_balance = amt_funded, funded_date = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(Utc::now())
        .fetch_one(&mut **tx)
        .await?;

        Ok(funded)
    }

    /// Cancel every approved request whose funding deadline has passed,
    /// refunding outstanding pledges. Each expiry runs in its own
    /// transaction so one failure does not hold up the rest.
    pub async fn expire_overdue(&self) -> ApiResult<Vec<i64>> {
        let overdue = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT id FROM loan_applications
            WHERE stage = 'approved' AND funding_deadline < $1
            ORDER BY id
            "#,
        )
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await?;

        let mut expired = Vec::with_capacity(overdue.len());
        for (id,) in overdue {
            let mut tx = self.pool.begin().await?;
            match cancel_approved_in_tx(&mut tx, id, CancellationReason::FundingExpired).await {
                Ok(_) => {
                    tx.commit().await?;
                    expired.push(id);
                }
                // Raced with a concurrent transition out of the approved
                // stage; nothing left to expire.
                Err(ApiError::NotFound(_)) => {
                    tx.rollback().await?;
                }
                Err(e) => {
                    tx.rollback().await?;
                    return Err(e);
                }
            }
        }

        Ok(expired)
    }

    pub async fn list_approved(&self) -> ApiResult<Vec<LoanApplication>> {
        let requests = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE stage = 'approved' ORDER BY app_approved_date",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    /// Requests investors can put money into right now.
    pub async fn list_available(&self) -> ApiResult<Vec<LoanApplication>> {
        let requests = sqlx::query_as::<_, LoanApplication>(
            r#"
            SELECT * FROM loan_applications
            WHERE stage = 'approved' AND available_for_funding = TRUE
            ORDER BY funding_deadline
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    pub async fn get_approved(&self, id: i64) -> ApiResult<LoanApplication> {
        sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE id = $1 AND stage = 'approved'",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No approved application with id {}", id))
        })
    }

    pub async fn pledges_for_request(&self, request_id: i64) -> ApiResult<Vec<Pledge>> {
        let pledges = sqlx::query_as::<_, Pledge>(
            "SELECT * FROM request_pledges WHERE request_id = $1 ORDER BY investor_id",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(pledges)
    }

    /// An investor's open pledges, with the state of each backing request.
    pub async fn positions_for_investor(
        &self,
        investor_id: Uuid,
    ) -> ApiResult<Vec<InvestorPosition>> {
        let positions = sqlx::query_as::<_, InvestorPosition>(
            r#"
            SELECT
                p.request_id, p.pledged_amt,
                a.amt_approved, a.amt_funded, a.interest_rate, a.term_months
            FROM request_pledges p
            JOIN loan_applications a ON a.id = p.request_id
            WHERE p.investor_id = $1
            ORDER BY p.request_id
            "#,
        )
        .bind(investor_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(positions)
    }
}

/// Background task that expires overdue approved requests on a fixed
/// interval. Spawned from `main` at startup.
pub async fn deadline_sweeper(funding_service: Arc<FundingService>, interval_seconds: u64) {
    tracing::info!("Starting funding-deadline sweeper");

    loop {
        tokio::time::sleep(Duration::from_secs(interval_seconds)).await;

        match funding_service.expire_overdue().await {
            Ok(expired) => {
                for id in expired {
                    tracing::info!("Funding window expired for application {}", id);
                }
            }
            Err(e) => {
                tracing::error!("Error expiring overdue applications: {}", e);
            }
        }
    }
}
