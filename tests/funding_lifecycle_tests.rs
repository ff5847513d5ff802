//! Lifecycle and money-conservation tests against a real database.
//!
//! Ignored by default; set TEST_DATABASE_URL to a migrated Postgres
//! instance and run with `cargo test -- --ignored`.

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use sqlx::PgPool;
    use uuid::Uuid;

    use lendflow_server::error::ApiError;
    use lendflow_server::funding::FundingService;
    use lendflow_server::loans::LoanService;
    use lendflow_server::models::CancellationReason;
    use lendflow_server::requests::model::ApprovalData;
    use lendflow_server::requests::{LoanApplication, RequestService};
    use lendflow_server::users::model::RegisterRequest;
    use lendflow_server::users::UserService;

    /// Helper to create a test database pool
    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/lendflow_test".to_string());

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn services(pool: &PgPool) -> (UserService, FundingService, LoanService) {
        (
            UserService::new(pool.clone()),
            FundingService::new(pool.clone()),
            LoanService::new(pool.clone()),
        )
    }

    /// Register a user with a unique username and an opening balance.
    async fn register_user(
        users: &UserService,
        roles: &[&str],
        balance: Decimal,
    ) -> lendflow_server::models::User {
        let suffix = Uuid::new_v4().simple().to_string();
        users
            .register(RegisterRequest {
                username: format!("user_{}", &suffix[..12]),
                password: "correct-horse-battery".to_string(),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                email: format!("{}@example.com", &suffix[..12]),
                account_balance: Some(balance),
                annual_income: Some(dec!(60000)),
                other_monthly_debt: None,
                roles: roles.iter().map(|r| r.to_string()).collect(),
            })
            .await
            .expect("Failed to register test user")
    }

    /// Insert an active application directly, skipping the market-rate
    /// lookup the create path performs.
    async fn insert_active_request(
        pool: &PgPool,
        borrower_id: Uuid,
        amt: Decimal,
        rate: Decimal,
        term: i32,
    ) -> i64 {
        let installment =
            lendflow_server::amortization::calculate_payment(amt, rate / dec!(12), term as u32)
                .unwrap();

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO loan_applications (
                stage, borrower_id, purpose_id, amt_requested,
                interest_rate, term_months, installment_amt, app_open_date
            )
            VALUES ('active', $1, 1, $2, $3, $4, $5, now())
            RETURNING id
            "#,
        )
        .bind(borrower_id)
        .bind(amt)
        .bind(rate)
        .bind(term)
        .bind(installment)
        .fetch_one(pool)
        .await
        .expect("Failed to insert active request");

        id
    }

    /// Approve an active request through the lifecycle service. The rate
    /// provider is never touched on this path.
    async fn approve(pool: &PgPool, id: i64, amt: Decimal, rate: Decimal, term: i32) -> LoanApplication {
        let requests = RequestService::new(
            pool.clone(),
            lendflow_server::rates::RateProvider::new(),
            dec!(0.02),
            30,
        );
        requests
            .approve(
                id,
                ApprovalData {
                    interest_rate: Some(rate),
                    amt_approved: Some(amt),
                    term_months: Some(term),
                },
            )
            .await
            .expect("Approval failed")
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_full_funding_lifecycle_conserves_money() {
        let pool = setup_test_db().await;
        let (users, funding, loans) = services(&pool);

        let borrower = register_user(&users, &["borrower"], dec!(500)).await;
        let investor_a = register_user(&users, &["investor"], dec!(6000)).await;
        let investor_b = register_user(&users, &["investor"], dec!(4000)).await;

        let id = insert_active_request(&pool, borrower.id, dec!(9000), dec!(0.05), 24).await;
        let approved = approve(&pool, id, dec!(9000), dec!(0.05), 24).await;
        assert_eq!(approved.amt_funded, Decimal::ZERO);
        assert!(!approved.available_for_funding);
        assert!(!approved.is_funded);

        funding.enable_funding(id).await.unwrap();

        // Partial funding leaves the request open and the pledge recorded.
        let partial = funding.fund(id, investor_a.id, dec!(5000)).await.unwrap();
        assert_eq!(partial.amt_funded, dec!(5000));
        assert!(!partial.is_funded);

        let pledges = funding.pledges_for_request(id).await.unwrap();
        let pledged_total: Decimal = pledges.iter().map(|p| p.pledged_amt).sum();
        assert_eq!(pledged_total, partial.amt_funded);
        assert_eq!(
            users.get_user(investor_a.id).await.unwrap().account_balance,
            dec!(1000)
        );

        // The pledge that reaches the approved amount converts the
        // request into a funded loan.
        let funded = funding.fund(id, investor_b.id, dec!(4000)).await.unwrap();
        assert!(funded.is_funded);
        assert!(!funded.available_for_funding);
        assert_eq!(funded.remaining_balance, Some(dec!(9000)));

        let investments = loans.investments_for_loan(id).await.unwrap();
        let invested_total: Decimal = investments.iter().map(|i| i.invested_amt).sum();
        assert_eq!(invested_total, dec!(9000));
        assert!(funding.pledges_for_request(id).await.unwrap().is_empty());
        assert!(matches!(
            funding.get_approved(id).await,
            Err(ApiError::NotFound(_))
        ));

        // Principal disbursed to the borrower at conversion.
        assert_eq!(
            users.get_user(borrower.id).await.unwrap().account_balance,
            dec!(9500)
        );

        // One installment: the borrower pays it in full and the investors
        // receive exactly that amount between them.
        let receipt = loans.pay_installment(id).await.unwrap();
        assert!(!receipt.paid_off);
        assert_eq!(receipt.interest_paid, dec!(37.50));

        let installment = funded.installment_amt;
        assert_eq!(
            users.get_user(borrower.id).await.unwrap().account_balance,
            dec!(9500) - installment
        );

        let distributed: Decimal = receipt.distributions.iter().map(|d| d.amount).sum();
        assert_eq!(distributed, installment);

        let after = loans.get_funded(id).await.unwrap();
        assert_eq!(
            after.remaining_balance,
            Some(dec!(9000) - receipt.principal_paid)
        );
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_overfunding_rejected_without_mutation() {
        let pool = setup_test_db().await;
        let (users, funding, _loans) = services(&pool);

        let borrower = register_user(&users, &["borrower"], Decimal::ZERO).await;
        let investor = register_user(&users, &["investor"], dec!(10000)).await;

        let id = insert_active_request(&pool, borrower.id, dec!(5000), dec!(0.06), 12).await;
        approve(&pool, id, dec!(5000), dec!(0.06), 12).await;
        funding.enable_funding(id).await.unwrap();

        funding.fund(id, investor.id, dec!(3000)).await.unwrap();

        // 2,500 exceeds the 2,000 of remaining capacity.
        let result = funding.fund(id, investor.id, dec!(2500)).await;
        assert!(matches!(result, Err(ApiError::InsufficientFunds(_))));

        let request = funding.get_approved(id).await.unwrap();
        assert_eq!(request.amt_funded, dec!(3000));
        assert_eq!(
            users.get_user(investor.id).await.unwrap().account_balance,
            dec!(7000)
        );
        let pledged: Decimal = funding
            .pledges_for_request(id)
            .await
            .unwrap()
            .iter()
            .map(|p| p.pledged_amt)
            .sum();
        assert_eq!(pledged, dec!(3000));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_insufficient_balance_rejected_without_mutation() {
        let pool = setup_test_db().await;
        let (users, funding, _loans) = services(&pool);

        let borrower = register_user(&users, &["borrower"], Decimal::ZERO).await;
        let investor = register_user(&users, &["investor"], dec!(100)).await;

        let id = insert_active_request(&pool, borrower.id, dec!(5000), dec!(0.06), 12).await;
        approve(&pool, id, dec!(5000), dec!(0.06), 12).await;
        funding.enable_funding(id).await.unwrap();

        let result = funding.fund(id, investor.id, dec!(500)).await;
        assert!(matches!(result, Err(ApiError::InsufficientFunds(_))));

        let request = funding.get_approved(id).await.unwrap();
        assert_eq!(request.amt_funded, Decimal::ZERO);
        assert!(funding.pledges_for_request(id).await.unwrap().is_empty());
        assert_eq!(
            users.get_user(investor.id).await.unwrap().account_balance,
            dec!(100)
        );
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_funding_requires_enablement() {
        let pool = setup_test_db().await;
        let (users, funding, _loans) = services(&pool);

        let borrower = register_user(&users, &["borrower"], Decimal::ZERO).await;
        let investor = register_user(&users, &["investor"], dec!(1000)).await;

        let id = insert_active_request(&pool, borrower.id, dec!(1000), dec!(0.06), 12).await;
        approve(&pool, id, dec!(1000), dec!(0.06), 12).await;

        let result = funding.fund(id, investor.id, dec!(500)).await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_cancellation_refunds_pledges() {
        let pool = setup_test_db().await;
        let (users, funding, _loans) = services(&pool);

        let borrower = register_user(&users, &["borrower"], Decimal::ZERO).await;
        let investor = register_user(&users, &["investor"], dec!(2000)).await;

        let id = insert_active_request(&pool, borrower.id, dec!(5000), dec!(0.06), 12).await;
        approve(&pool, id, dec!(5000), dec!(0.06), 12).await;
        funding.enable_funding(id).await.unwrap();
        funding.fund(id, investor.id, dec!(1500)).await.unwrap();

        let requests = RequestService::new(
            pool.clone(),
            lendflow_server::rates::RateProvider::new(),
            dec!(0.02),
            30,
        );
        let cancelled = requests
            .cancel(id, CancellationReason::BorrowerWithdrew)
            .await
            .unwrap();
        assert_eq!(cancelled.was_approved, Some(true));
        assert_eq!(cancelled.reason, Some(CancellationReason::BorrowerWithdrew));

        // The investor got their pledge back, and nothing remains open.
        assert_eq!(
            users.get_user(investor.id).await.unwrap().account_balance,
            dec!(2000)
        );
        assert!(funding.pledges_for_request(id).await.unwrap().is_empty());
        assert!(matches!(
            funding.get_approved(id).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_stage_transitions_are_exclusive() {
        let pool = setup_test_db().await;
        let (users, funding, loans) = services(&pool);

        let borrower = register_user(&users, &["borrower"], Decimal::ZERO).await;
        let investor = register_user(&users, &["investor"], dec!(1000)).await;

        let id = insert_active_request(&pool, borrower.id, dec!(1000), dec!(0.06), 12).await;
        approve(&pool, id, dec!(1000), dec!(0.06), 12).await;

        // The id is gone from the active stage once approved.
        let requests = RequestService::new(
            pool.clone(),
            lendflow_server::rates::RateProvider::new(),
            dec!(0.02),
            30,
        );
        assert!(matches!(
            requests.delete(id).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            requests.reject(id).await,
            Err(ApiError::NotFound(_))
        ));

        funding.enable_funding(id).await.unwrap();
        funding.fund(id, investor.id, dec!(1000)).await.unwrap();

        // And gone from the approved stage once funded.
        assert!(matches!(
            funding.get_approved(id).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(loans.get_funded(id).await.is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_repeated_installments_reach_payoff() {
        let pool = setup_test_db().await;
        let (users, funding, loans) = services(&pool);

        let borrower = register_user(&users, &["borrower"], dec!(2000)).await;
        let investor = register_user(&users, &["investor"], dec!(1200)).await;

        let id = insert_active_request(&pool, borrower.id, dec!(1200), dec!(0.05), 6).await;
        approve(&pool, id, dec!(1200), dec!(0.05), 6).await;
        funding.enable_funding(id).await.unwrap();
        funding.fund(id, investor.id, dec!(1200)).await.unwrap();

        let mut periods = 0;
        loop {
            let receipt = loans.pay_installment(id).await.unwrap();
            periods += 1;
            if receipt.paid_off {
                break;
            }
            assert!(periods < 12, "schedule failed to converge");
        }

        // Six monthly payments retire a six-month loan.
        assert_eq!(periods, 6);
        assert!(matches!(
            loans.get_funded(id).await,
            Err(ApiError::NotFound(_))
        ));
        let archived = loans.get_paid_off(id).await.unwrap();
        assert_eq!(archived.remaining_balance, Some(Decimal::ZERO));
        assert!(archived.paidoff_date.is_some());

        // Further installments on a retired loan are rejected.
        assert!(matches!(
            loans.pay_installment(id).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_installment_rejected_when_borrower_is_broke() {
        let pool = setup_test_db().await;
        let (users, funding, loans) = services(&pool);

        let borrower = register_user(&users, &["borrower"], Decimal::ZERO).await;
        let investor = register_user(&users, &["investor"], dec!(1000)).await;

        let id = insert_active_request(&pool, borrower.id, dec!(1000), dec!(0.06), 12).await;
        approve(&pool, id, dec!(1000), dec!(0.06), 12).await;
        funding.enable_funding(id).await.unwrap();
        funding.fund(id, investor.id, dec!(1000)).await.unwrap();

        // Drain the disbursed principal so the installment bounces.
        users.withdraw_funds(borrower.id, dec!(1000)).await.unwrap();

        let result = loans.pay_installment(id).await;
        assert!(matches!(result, Err(ApiError::InsufficientFunds(_))));

        // Nothing moved.
        let loan = loans.get_funded(id).await.unwrap();
        assert_eq!(loan.remaining_balance, Some(dec!(1000)));
        assert_eq!(
            users.get_user(investor.id).await.unwrap().account_balance,
            Decimal::ZERO
        );
    }
}
