//! Application lifecycle service
//!
//! Owns the stage transitions out of underwriting: create, approve,
//! reject, cancel, update, delete. Every transition is a single-row
//! `UPDATE` of the canonical application record inside a transaction, so
//! an id is never in two stages at once and a failed step leaves the
//! source stage untouched.

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::amortization::{calculate_payment, funding_deadline};
use crate::config::ALLOWED_TERMS;
use crate::error::{ApiError, ApiResult};
use crate::models::{AppStage, CancellationReason, Purpose};
use crate::rates::RateProvider;
use crate::requests::model::{
    ApprovalData, CreateRequestPayload, LoanApplication, RequestDetail, UpdateRequestPayload,
};
use crate::users;

/// Annual percent from the rate feed to an annual fraction, 4 dp.
fn percent_to_fraction(percent: Decimal) -> Decimal {
    (percent / Decimal::ONE_HUNDRED).round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

/// Check an underwriting decision before any write happens. All three
/// fields must be present; the rate is an annual fraction in (0, 1], the
/// approved amount is at least 1, and the term must be one the
/// marketplace offers.
pub fn validate_approval_data(data: &ApprovalData) -> ApiResult<(Decimal, Decimal, i32)> {
    let interest_rate = data.interest_rate.ok_or_else(|| {
        ApiError::InvalidArgument("Approval data must include interest_rate".to_string())
    })?;
    let amt_approved = data.amt_approved.ok_or_else(|| {
        ApiError::InvalidArgument("Approval data must include amt_approved".to_string())
    })?;
    let term_months = data.term_months.ok_or_else(|| {
        ApiError::InvalidArgument("Approval data must include term_months".to_string())
    })?;

    if interest_rate <= Decimal::ZERO || interest_rate > Decimal::ONE {
        return Err(ApiError::InvalidArgument(
            "interest_rate must be a fraction in (0, 1]".to_string(),
        ));
    }
    if amt_approved < Decimal::ONE {
        return Err(ApiError::InvalidArgument(
            "amt_approved must be at least 1".to_string(),
        ));
    }
    if !ALLOWED_TERMS.contains(&term_months) {
        return Err(ApiError::InvalidArgument(format!(
            "term_months must be one of {:?}",
            ALLOWED_TERMS
        )));
    }

    Ok((interest_rate, amt_approved, term_months))
}

/// Fetch an application in the expected stage and take a row lock on it.
/// Callers must already be inside a transaction; concurrent transitions
/// and funding calls serialize on this lock.
pub async fn lock_application(
    conn: &mut PgConnection,
    id: i64,
    stage: AppStage,
) -> ApiResult<LoanApplication> {
    sqlx::query_as::<_, LoanApplication>(
        "SELECT * FROM loan_applications WHERE id = $1 AND stage = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(stage)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| {
        ApiError::NotFound(format!(
            "No {} application with id {}",
            stage.as_str(),
            id
        ))
    })
}

/// Cancel an approved request inside the caller's transaction: refund
/// every outstanding pledge to its investor, drop the pledge set, and
/// move the record to the cancelled stage.
pub async fn cancel_approved_in_tx(
    conn: &mut PgConnection,
    id: i64,
    reason: CancellationReason,
) -> ApiResult<LoanApplication> {
    lock_application(&mut *conn, id, AppStage::Approved).await?;

    let pledges = sqlx::query_as::<_, (Uuid, Decimal)>(
        "SELECT investor_id, pledged_amt FROM request_pledges WHERE request_id = $1 ORDER BY investor_id",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    for (investor_id, pledged_amt) in pledges {
        users::service::deposit_in_tx(&mut *conn, investor_id, pledged_amt).await?;
    }

    sqlx::query("DELETE FROM request_pledges WHERE request_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    let cancelled = sqlx::query_as::<_, LoanApplication>(
        r#"
        UPDATE loan_applications
        SET stage = 'cancelled', was_approved = TRUE, reason = $2,
            app_cancelled_date = $3, available_for_funding = FALSE
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(reason)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(cancelled)
}

/// Application lifecycle service
pub struct RequestService {
    pool: PgPool,
    rates: RateProvider,
    profit_margin: Decimal,
    funding_window_days: i64,
}

impl RequestService {
    pub fn new(
        pool: PgPool,
        rates: RateProvider,
        profit_margin: Decimal,
        funding_window_days: i64,
    ) -> Self {
        Self {
            pool,
            rates,
            profit_margin,
            funding_window_days,
        }
    }

    /// Submit a new application. The rate is the current market rate for
    /// the term plus the configured margin; the installment follows from
    /// amount, rate, and term.
    pub async fn create(
        &self,
        borrower_id: Uuid,
        payload: CreateRequestPayload,
    ) -> ApiResult<LoanApplication> {
        if payload.amt_requested <= Decimal::ZERO {
            return Err(ApiError::InvalidArgument(
                "amt_requested must be greater than zero".to_string(),
            ));
        }
        if !ALLOWED_TERMS.contains(&payload.term_months) {
            return Err(ApiError::InvalidArgument(format!(
                "term_months must be one of {:?}",
                ALLOWED_TERMS
            )));
        }

        // The borrower and purpose must resolve before any money math.
        sqlx::query_as::<_, (Uuid,)>("SELECT id FROM users WHERE id = $1")
            .bind(borrower_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("User {} does not exist", borrower_id))
            })?;

        sqlx::query_as::<_, (i32,)>("SELECT id FROM purposes WHERE id = $1")
            .bind(payload.purpose_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                ApiError::InvalidArgument(format!("Unknown purpose {}", payload.purpose_id))
            })?;

        let market_percent = self.rates.annual_rate_percent(payload.term_months).await?;
        let interest_rate = percent_to_fraction(market_percent) + self.profit_margin;

        let installment_amt = calculate_payment(
            payload.amt_requested,
            interest_rate / crate::amortization::PERIODS_PER_YEAR,
            payload.term_months as u32,
        )?;

        let request = sqlx::query_as::<_, LoanApplication>(
            r#"
            INSERT INTO loan_applications (
                stage, borrower_id, purpose_id, amt_requested,
                interest_rate, term_months, installment_amt, app_open_date
            )
            VALUES ('active', $1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(borrower_id)
        .bind(payload.purpose_id)
        .bind(payload.amt_requested)
        .bind(interest_rate)
        .bind(payload.term_months)
        .bind(installment_amt)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(request)
    }

    /// Underwrite an active application. On success the record moves to
    /// the approved stage with a fresh installment, a funding deadline,
    /// and zeroed funding state; on any failure it stays active.
    pub async fn approve(&self, id: i64, data: ApprovalData) -> ApiResult<LoanApplication> {
        let (interest_rate, amt_approved, term_months) = validate_approval_data(&data)?;

        let installment_amt = calculate_payment(
            amt_approved,
            interest_rate / crate::amortization::PERIODS_PER_YEAR,
            term_months as u32,
        )?;

        let mut tx = self.pool.begin().await?;

        lock_application(&mut tx, id, AppStage::Active).await?;

        let now = Utc::now();
        let deadline = funding_deadline(now, self.funding_window_days);

        let approved = sqlx::query_as::<_, LoanApplication>(
            r#"
            UPDATE loan_applications
            SET stage = 'approved', interest_rate = $2, amt_approved = $3,
                term_months = $4, installment_amt = $5, app_approved_date = $6,
                funding_deadline = $7, amt_funded = 0,
                available_for_funding = FALSE, is_funded = FALSE
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(interest_rate)
        .bind(amt_approved)
        .bind(term_months)
        .bind(installment_amt)
        .bind(now)
        .bind(deadline)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(approved)
    }

    /// Turn down an active application.
    pub async fn reject(&self, id: i64) -> ApiResult<LoanApplication> {
        let mut tx = self.pool.begin().await?;

        lock_application(&mut tx, id, AppStage::Active).await?;

        let rejected = sqlx::query_as::<_, LoanApplication>(
            r#"
            UPDATE loan_applications
            SET stage = 'cancelled', was_approved = FALSE,
                reason = 'unmet_criteria', app_cancelled_date = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rejected)
    }

    /// Cancel an approved request before full funding. Outstanding
    /// pledges are refunded in the same transaction.
    pub async fn cancel(
        &self,
        id: i64,
        reason: CancellationReason,
    ) -> ApiResult<LoanApplication> {
        let mut tx = self.pool.begin().await?;
        let cancelled = cancel_approved_in_tx(&mut tx, id, reason).await?;
        tx.commit().await?;
        Ok(cancelled)
    }

    /// Edit the mutable fields of an application. What may change depends
    /// on the stage; funded amounts and identity fields never do. The
    /// installment is recomputed from the resulting amount, rate, and
    /// term in the same transaction.
    pub async fn update(
        &self,
        id: i64,
        patch: UpdateRequestPayload,
    ) -> ApiResult<LoanApplication> {
        if patch.is_empty() {
            return Err(ApiError::InvalidArgument(
                "Update must change at least one field".to_string(),
            ));
        }

        if let Some(amt) = patch.amt_requested {
            if amt <= Decimal::ZERO {
                return Err(ApiError::InvalidArgument(
                    "amt_requested must be greater than zero".to_string(),
                ));
            }
        }
        if let Some(rate) = patch.interest_rate {
            if rate <= Decimal::ZERO || rate > Decimal::ONE {
                return Err(ApiError::InvalidArgument(
                    "interest_rate must be a fraction in (0, 1]".to_string(),
                ));
            }
        }
        if let Some(term) = patch.term_months {
            if !ALLOWED_TERMS.contains(&term) {
                return Err(ApiError::InvalidArgument(format!(
                    "term_months must be one of {:?}",
                    ALLOWED_TERMS
                )));
            }
        }

        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE id = $1 AND stage IN ('active', 'approved') FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No editable application with id {}", id))
        })?;

        // Approved requests are already priced for investors; only the
        // rate and term may still move.
        if current.stage == AppStage::Approved
            && (patch.amt_requested.is_some() || patch.purpose_id.is_some())
        {
            return Err(ApiError::InvalidArgument(
                "Only interest_rate and term_months can change after approval".to_string(),
            ));
        }

        if let Some(purpose_id) = patch.purpose_id {
            sqlx::query_as::<_, (i32,)>("SELECT id FROM purposes WHERE id = $1")
                .bind(purpose_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| {
                    ApiError::InvalidArgument(format!("Unknown purpose {}", purpose_id))
                })?;
        }

        let amt_requested = patch.amt_requested.unwrap_or(current.amt_requested);
        let purpose_id = patch.purpose_id.unwrap_or(current.purpose_id);
        let interest_rate = patch.interest_rate.unwrap_or(current.interest_rate);
        let term_months = patch.term_months.unwrap_or(current.term_months);

        // Installments amortize the approved amount once underwriting has
        // set one, and the requested amount before that.
        let principal = match current.stage {
            AppStage::Approved => current.amt_approved.unwrap_or(current.amt_requested),
            _ => amt_requested,
        };
        let installment_amt = calculate_payment(
            principal,
            interest_rate / crate::amortization::PERIODS_PER_YEAR,
            term_months as u32,
        )?;

        let updated = sqlx::query_as::<_, LoanApplication>(
            r#"
            UPDATE loan_applications
            SET amt_requested = $2, purpose_id = $3, interest_rate = $4,
                term_months = $5, installment_amt = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(amt_requested)
        .bind(purpose_id)
        .bind(interest_rate)
        .bind(term_months)
        .bind(installment_amt)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Remove an active application outright.
    pub async fn delete(&self, id: i64) -> ApiResult<()> {
        let result =
            sqlx::query("DELETE FROM loan_applications WHERE id = $1 AND stage = 'active'")
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!(
                "No active application with id {}",
                id
            )));
        }
        Ok(())
    }

    pub async fn list_active(&self) -> ApiResult<Vec<LoanApplication>> {
        let requests = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE stage = 'active' ORDER BY app_open_date",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    /// One application with the borrower's financial profile, for the
    /// underwriting view.
    pub async fn get_detail(&self, id: i64) -> ApiResult<RequestDetail> {
        sqlx::query_as::<_, RequestDetail>(
            r#"
            SELECT
                a.id, a.stage, a.borrower_id,
                u.username AS borrower_username,
                u.annual_income, u.other_monthly_debt,
                a.purpose_id, p.title AS purpose_title,
                a.amt_requested, a.amt_approved, a.amt_funded,
                a.interest_rate, a.term_months, a.installment_amt,
                a.app_open_date, a.funding_deadline
            FROM loan_applications a
            JOIN users u ON u.id = a.borrower_id
            JOIN purposes p ON p.id = a.purpose_id
            WHERE a.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No application with id {}", id)))
    }

    pub async fn list_by_borrower(&self, borrower_id: Uuid) -> ApiResult<Vec<LoanApplication>> {
        let requests = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE borrower_id = $1 ORDER BY app_open_date",
        )
        .bind(borrower_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    pub async fn list_cancelled(&self) -> ApiResult<Vec<LoanApplication>> {
        let requests = sqlx::query_as::<_, LoanApplication>(
            "SELECT * FROM loan_applications WHERE stage = 'cancelled' ORDER BY app_cancelled_date",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    pub async fn list_purposes(&self) -> ApiResult<Vec<Purpose>> {
        let purposes = sqlx::query_as::<_, Purpose>("SELECT * FROM purposes ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(purposes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn approval(
        rate: Option<Decimal>,
        amt: Option<Decimal>,
        term: Option<i32>,
    ) -> ApprovalData {
        ApprovalData {
            interest_rate: rate,
            amt_approved: amt,
            term_months: term,
        }
    }

    #[test]
    fn test_validate_approval_data_accepts_valid() {
        let data = approval(Some(dec!(0.085)), Some(dec!(9000)), Some(24));
        assert_eq!(
            validate_approval_data(&data).unwrap(),
            (dec!(0.085), dec!(9000), 24)
        );

        // Boundary values
        assert!(validate_approval_data(&approval(Some(dec!(1)), Some(dec!(1)), Some(6))).is_ok());
    }

    #[test]
    fn test_validate_approval_data_requires_all_fields() {
        assert!(validate_approval_data(&approval(None, Some(dec!(9000)), Some(24))).is_err());
        assert!(validate_approval_data(&approval(Some(dec!(0.08)), None, Some(24))).is_err());
        assert!(validate_approval_data(&approval(Some(dec!(0.08)), Some(dec!(9000)), None)).is_err());
    }

    #[test]
    fn test_validate_approval_data_rejects_out_of_domain() {
        // Rate outside (0, 1]
        assert!(validate_approval_data(&approval(Some(dec!(0)), Some(dec!(9000)), Some(24))).is_err());
        assert!(
            validate_approval_data(&approval(Some(dec!(-0.05)), Some(dec!(9000)), Some(24)))
                .is_err()
        );
        assert!(
            validate_approval_data(&approval(Some(dec!(1.01)), Some(dec!(9000)), Some(24)))
                .is_err()
        );

        // Amount below 1
        assert!(
            validate_approval_data(&approval(Some(dec!(0.08)), Some(dec!(0.99)), Some(24)))
                .is_err()
        );

        // Term outside the enumeration
        assert!(
            validate_approval_data(&approval(Some(dec!(0.08)), Some(dec!(9000)), Some(18)))
                .is_err()
        );
    }

    #[test]
    fn test_percent_to_fraction_rounds_to_four_places() {
        assert_eq!(percent_to_fraction(dec!(4.82)), dec!(0.0482));
        assert_eq!(percent_to_fraction(dec!(5.175)), dec!(0.0518));
    }

    #[test]
    fn test_update_payload_empty_detection() {
        assert!(UpdateRequestPayload::default().is_empty());
        let patch = UpdateRequestPayload {
            term_months: Some(36),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
