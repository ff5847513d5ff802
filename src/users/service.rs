//! User service: registration, credential checks, and the account ledger.
//!
//! The ledger primitives (`deposit_in_tx` / `withdraw_in_tx`) lock the user
//! row before touching the balance, so concurrent movements on one account
//! serialize instead of losing updates. The funding and loan services compose
//! them into their own transactions; the public `deposit_funds` /
//! `withdraw_funds` wrap them in a transaction of their own.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::auth::hash_password;
use crate::error::{ApiError, ApiResult};
use crate::models::{User, UserRole};
use crate::users::model::RegisterRequest;

/// Fetch a user row and take a row lock on it. Callers must already be
/// inside a transaction.
pub async fn lock_user(conn: &mut PgConnection, user_id: Uuid) -> ApiResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {} does not exist", user_id)))
}

/// Increase a user's balance inside the caller's transaction.
///
/// No dedup is built in: callers must not invoke this twice for the same
/// economic event.
pub async fn deposit_in_tx(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: Decimal,
) -> ApiResult<User> {
    if amount <= Decimal::ZERO {
        return Err(ApiError::InvalidArgument(
            "Deposit amount must be greater than zero".to_string(),
        ));
    }

    lock_user(&mut *conn, user_id).await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET account_balance = account_balance + $2, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_one(&mut *conn)
    .await?;

    Ok(user)
}

/// Decrease a user's balance inside the caller's transaction. The balance
/// may never go negative; the check happens here, under the row lock.
pub async fn withdraw_in_tx(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: Decimal,
) -> ApiResult<User> {
    if amount <= Decimal::ZERO {
        return Err(ApiError::InvalidArgument(
            "Withdrawal amount must be greater than zero".to_string(),
        ));
    }

    let user = lock_user(&mut *conn, user_id).await?;

    if user.account_balance < amount {
        return Err(ApiError::InsufficientFunds(format!(
            "Balance {} is less than the requested {}",
            user.account_balance, amount
        )));
    }

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET account_balance = account_balance - $2, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_one(&mut *conn)
    .await?;

    Ok(user)
}

/// User account service
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new account with a hashed password and the requested roles.
    pub async fn register(&self, request: RegisterRequest) -> ApiResult<User> {
        for role in &request.roles {
            if UserRole::from_str(role).is_none() {
                return Err(ApiError::InvalidArgument(format!(
                    "Unknown role '{}'",
                    role
                )));
            }
        }

        let opening_balance = request.account_balance.unwrap_or(Decimal::ZERO);
        if opening_balance < Decimal::ZERO {
            return Err(ApiError::InvalidArgument(
                "Opening balance must not be negative".to_string(),
            ));
        }

        let password_hash = hash_password(&request.password)?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                username, password_hash, first_name, last_name, email,
                account_balance, annual_income, other_monthly_debt, roles
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&request.username)
        .bind(&password_hash)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.email)
        .bind(opening_balance)
        .bind(request.annual_income)
        .bind(request.other_monthly_debt)
        .bind(&request.roles)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                ApiError::Conflict(format!("Username '{}' is already taken", request.username))
            }
            _ => e.into(),
        })?;

        Ok(user)
    }

    /// Look up a user by credentials, for token issuance.
    pub async fn authenticate(&self, username: &str, password: &str) -> ApiResult<User> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid username or password".to_string()))?;

        if !crate::auth::verify_password(password, &user.password_hash)? {
            return Err(ApiError::Unauthorized(
                "Invalid username or password".to_string(),
            ));
        }

        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> ApiResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("User {} does not exist", user_id)))
    }

    pub async fn list_users(&self) -> ApiResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Deposit into a user's account as a standalone operation.
    pub async fn deposit_funds(&self, user_id: Uuid, amount: Decimal) -> ApiResult<User> {
        let mut tx = self.pool.begin().await?;
        let user = deposit_in_tx(&mut tx, user_id, amount).await?;
        tx.commit().await?;
        Ok(user)
    }

    /// Withdraw from a user's account as a standalone operation.
    pub async fn withdraw_funds(&self, user_id: Uuid, amount: Decimal) -> ApiResult<User> {
        let mut tx = self.pool.begin().await?;
        let user = withdraw_in_tx(&mut tx, user_id, amount).await?;
        tx.commit().await?;
        Ok(user)
    }
}
