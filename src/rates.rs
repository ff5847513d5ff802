//! Market interest-rate lookup for LendFlow
//!
//! Pulls benchmark yields from the Bank of Canada valet API and maps them
//! onto the marketplace's loan terms. Bond yields cover the 24/36/60
//! month terms (48 is interpolated from its neighbours), treasury-bill
//! yields cover 6 and 12 months. Rates come back as annualized percents,
//! before the configured profit margin.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde_json::Value;

use crate::amortization::round_currency;
use crate::error::{ApiError, ApiResult};

const BASE_URL_BONDS: &str =
    "https://www.bankofcanada.ca/valet/observations/group/bond_yields_benchmark/json";
const BASE_URL_BILLS: &str = "https://www.bankofcanada.ca/valet/observations/group/tbill_all/json";

/// Treasury-bill series ids, keyed by term length in months.
const BILL_SERIES: [(i32, &str); 2] = [(6, "V80691345"), (12, "V80691346")];

/// Client for the external rate supplier
#[derive(Clone)]
pub struct RateProvider {
    http: reqwest::Client,
    bonds_url: String,
    bills_url: String,
}

impl Default for RateProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RateProvider {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            bonds_url: BASE_URL_BONDS.to_string(),
            bills_url: BASE_URL_BILLS.to_string(),
        }
    }

    /// Fetch the current term-to-rate table (annualized percents).
    pub async fn get_rates(&self) -> ApiResult<HashMap<i32, Decimal>> {
        let bonds: Value = self.http.get(&self.bonds_url).send().await?.json().await?;
        let bills: Value = self.http.get(&self.bills_url).send().await?.json().await?;

        let mut rates = parse_bond_yields(&bonds)?;
        rates.extend(parse_bill_yields(&bills)?);
        Ok(rates)
    }

    /// Market rate for one term, in percent per annum.
    pub async fn annual_rate_percent(&self, term_months: i32) -> ApiResult<Decimal> {
        let rates = self.get_rates().await?;
        rates.get(&term_months).copied().ok_or_else(|| {
            ApiError::ExternalServiceError(format!(
                "No market rate published for a {}-month term",
                term_months
            ))
        })
    }
}

/// Last published observation in a valet response.
fn latest_observation(body: &Value) -> ApiResult<&Value> {
    body.get("observations")
        .and_then(Value::as_array)
        .and_then(|obs| obs.last())
        .ok_or_else(|| {
            ApiError::ExternalServiceError("Rate feed returned no observations".to_string())
        })
}

fn parse_yield(observation: &Value, series: &str) -> ApiResult<Decimal> {
    observation
        .get(series)
        .and_then(|entry| entry.get("v"))
        .and_then(Value::as_str)
        .and_then(|v| v.parse::<Decimal>().ok())
        .ok_or_else(|| {
            ApiError::ExternalServiceError(format!("Rate feed is missing series {}", series))
        })
}

/// Benchmark bond yields, keyed by term in months. The feed publishes
/// 2/3/5-year benchmarks; the 48-month point is the midpoint of its
/// neighbours, as the marketplace has always quoted it.
pub fn parse_bond_yields(body: &Value) -> ApiResult<HashMap<i32, Decimal>> {
    let last = latest_observation(body)?;

    let mut yields = HashMap::new();
    for (years, label) in [(2, "2YR"), (3, "3YR"), (5, "5YR")] {
        let series = format!("BD.CDN.{}.DQ.YLD", label);
        yields.insert(years * 12, parse_yield(last, &series)?);
    }

    let midpoint = round_currency((yields[&36] + yields[&60]) / Decimal::TWO);
    yields.insert(48, midpoint);

    Ok(yields)
}

/// Treasury-bill yields for the short terms, keyed by term in months.
pub fn parse_bill_yields(body: &Value) -> ApiResult<HashMap<i32, Decimal>> {
    let last = latest_observation(body)?;

    let mut yields = HashMap::new();
    for (months, series) in BILL_SERIES {
        yields.insert(months, parse_yield(last, series)?);
    }

    Ok(yields)
}
