//! Shared data models for LendFlow

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// User model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub account_balance: Decimal,
    pub annual_income: Option<Decimal>,
    pub other_monthly_debt: Option<Decimal>,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.roles.iter().any(|r| r == role.as_str())
    }
}

/// Roles a user can hold. A user may hold several (e.g. both sides of
/// the marketplace).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Borrower,
    Investor,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Borrower => "borrower",
            UserRole::Investor => "investor",
            UserRole::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "borrower" => Some(UserRole::Borrower),
            "investor" => Some(UserRole::Investor),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

/// Public view of a user, without credentials
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub account_balance: Decimal,
    pub annual_income: Option<Decimal>,
    pub other_monthly_debt: Option<Decimal>,
    pub roles: Vec<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            account_balance: user.account_balance,
            annual_income: user.annual_income,
            other_monthly_debt: user.other_monthly_debt,
            roles: user.roles,
        }
    }
}

/// Loan purpose category
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Purpose {
    pub id: i32,
    pub title: String,
}

/// Application lifecycle stage
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "app_stage", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppStage {
    Active,
    Approved,
    Funded,
    PaidOff,
    Cancelled,
}

impl AppStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppStage::Active => "active",
            AppStage::Approved => "approved",
            AppStage::Funded => "funded",
            AppStage::PaidOff => "paid_off",
            AppStage::Cancelled => "cancelled",
        }
    }
}

/// Why an application left the pipeline
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "cancellation_reason", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    UnmetCriteria,
    BorrowerWithdrew,
    FundingExpired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [UserRole::Borrower, UserRole::Investor, UserRole::Admin] {
            assert_eq!(UserRole::from_str(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::from_str("lender"), None);
    }

    #[test]
    fn test_has_role() {
        let user = User {
            id: Uuid::new_v4(),
            username: "ada".to_string(),
            password_hash: String::new(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            account_balance: Decimal::ZERO,
            annual_income: None,
            other_monthly_debt: None,
            roles: vec!["borrower".to_string(), "investor".to_string()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(user.has_role(UserRole::Borrower));
        assert!(user.has_role(UserRole::Investor));
        assert!(!user.has_role(UserRole::Admin));
    }
}
