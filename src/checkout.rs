use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::PortalError;

/// Placeholder the payment provider substitutes with the real session id.
pub const CHECKOUT_SESSION_ID_TEMPLATE: &str = "{CHECKOUT_SESSION_ID}";

pub const STRIPE_NOT_CONFIGURED: &str =
    "Stripe not configured. Please set STRIPE_SECRET_KEY environment variable.";

const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(20);

/// BillingPeriod
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingPeriod {
    Monthly,
    Yearly,
}

impl BillingPeriod {
    pub fn from_yearly(is_yearly: bool) -> Self {
        if is_yearly { Self::Yearly } else { Self::Monthly }
    }

    pub fn is_yearly(self) -> bool {
        self == Self::Yearly
    }
}

/// Plan
///
/// One subscription tier on the pricing page. Display prices are per month;
/// the yearly price is the monthly equivalent when billed annually.
#[derive(Debug)]
pub struct Plan {
    pub name: &'static str,
    pub monthly_price: &'static str,
    pub yearly_price: &'static str,
    pub description: &'static str,
    pub features: &'static [&'static str],
    pub popular: bool,
    monthly_price_id: &'static str,
    yearly_price_id: &'static str,
}

impl Plan {
    pub fn display_price(&self, period: BillingPeriod) -> &'static str {
        match period {
            BillingPeriod::Monthly => self.monthly_price,
            BillingPeriod::Yearly => self.yearly_price,
        }
    }

    /// Payment-provider price id billed for `period`.
    pub fn price_id(&self, period: BillingPeriod) -> &'static str {
        match period {
            BillingPeriod::Monthly => self.monthly_price_id,
            BillingPeriod::Yearly => self.yearly_price_id,
        }
    }
}

pub const PRICE_PERIOD_LABEL: &str = "USD/month";

/// The full pricing catalog, in display order.
pub static PLANS: [Plan; 3] = [
    Plan {
        name: "Unlimited",
        monthly_price: "$15",
        yearly_price: "$12",
        description: "Best for everyday analysis, reports, and smaller data tasks.",
        features: &[
            "Unlimited chat messages",
            "Unlimited access to Formula Generator (web & add-ons)",
            "Unlimited file uploads",
            "50MB file upload limit",
            "Access to all tools (add-ons, data sources, enrichments)",
            "Increased speed & power (4CPU, 2RAM)",
            "5 uploaded files / chat",
            "Unlimited PDF to Excel conversions",
            "15 enrichments",
            "1 scheduled report",
        ],
        popular: false,
        monthly_price_id: "price_1S9Z703dx6mP9HgKVilhhZvy",
        yearly_price_id: "price_1S9Z703dx6mP9HgKVilhhZvy",
    },
    Plan {
        name: "Unlimited Plus",
        monthly_price: "$25",
        yearly_price: "$20",
        description: "Great for machine learning, large files & qualitative analysis",
        features: &[
            "Everything in Unlimited",
            "5,000 enrichments / month",
            "100MB file upload limit",
            "Higher speed & performance for complex work (6CPU, 3RAM)",
            "20 uploaded files / chat",
            "Use on multiple devices at once",
            "10 scheduled reports",
        ],
        popular: true,
        monthly_price_id: "price_1S9Z703dx6mP9HgKVilhhZvy",
        yearly_price_id: "price_1S9Z703dx6mP9HgKVilhhZvy",
    },
    Plan {
        name: "Unlimited Ultra",
        monthly_price: "$35",
        yearly_price: "$28",
        description: "Great for big data, machine learning, and qualitative analysis",
        features: &[
            "Everything in Unlimited Plus",
            "20,000 enrichments / month",
            "500MB file upload limit",
            "Highest speed & performance to handle big data analysis (8CPU, 4RAM)",
            "20 scheduled reports",
        ],
        popular: false,
        monthly_price_id: "price_1S9Z703dx6mP9HgKVilhhZvy",
        yearly_price_id: "price_1S9Z703dx6mP9HgKVilhhZvy",
    },
];

/// Exact, case-sensitive lookup by display name.
pub fn find_plan(name: &str) -> Option<&'static Plan> {
    PLANS.iter().find(|plan| plan.name == name)
}

/// CheckoutParams
///
/// Everything the payment provider needs to open a subscription checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutParams {
    pub price_id: String,
    pub plan_name: String,
    pub is_yearly: bool,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutParams {
    /// for_plan
    ///
    /// Builds the params for `plan`, with return URLs rooted at `origin`.
    pub fn for_plan(plan: &Plan, period: BillingPeriod, origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        Self {
            price_id: plan.price_id(period).to_string(),
            plan_name: plan.name.to_string(),
            is_yearly: period.is_yearly(),
            success_url: format!("{origin}/success?session_id={CHECKOUT_SESSION_ID_TEMPLATE}"),
            cancel_url: format!("{origin}/pricing?canceled=true"),
        }
    }

    fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", self.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", self.success_url.clone()),
            ("cancel_url", self.cancel_url.clone()),
            ("metadata[planName]", self.plan_name.clone()),
            ("metadata[isYearly]", self.is_yearly.to_string()),
        ]
    }
}

/// CheckoutSession
///
/// The hosted checkout page the browser is sent to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

// 1. CheckoutService Contract
/// CheckoutService
///
/// The external payment collaborator. The portal only opens checkout
/// sessions; fulfilment happens on the provider's side.
#[async_trait]
pub trait CheckoutService: Send + Sync {
    async fn create_session(&self, params: &CheckoutParams) -> Result<CheckoutSession, PortalError>;
}

#[derive(Deserialize)]
struct StripeErrorEnvelope {
    error: StripeError,
}

#[derive(Deserialize)]
struct StripeError {
    message: Option<String>,
}

// 2. The Real Implementation (Stripe)
/// StripeCheckoutClient
///
/// Form-encoded `POST /v1/checkout/sessions` against the Stripe API. Built
/// without a secret key, every call fails with a configuration error instead
/// of reaching the network.
#[derive(Clone)]
pub struct StripeCheckoutClient {
    client: reqwest::Client,
    api_base: String,
    secret_key: Option<String>,
}

impl StripeCheckoutClient {
    pub fn new(api_base: &str, secret_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(CHECKOUT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
        }
    }
}

#[async_trait]
impl CheckoutService for StripeCheckoutClient {
    async fn create_session(&self, params: &CheckoutParams) -> Result<CheckoutSession, PortalError> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or_else(|| PortalError::ConfigMissing(STRIPE_NOT_CONFIGURED.to_string()))?;

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(secret_key)
            .form(&params.form_fields())
            .send()
            .await
            .map_err(|e| PortalError::NetworkUnreachable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PortalError::NetworkUnreachable(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<StripeErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or_else(|| status.to_string());
            tracing::error!(status = status.as_u16(), %message, "checkout session rejected");
            return Err(PortalError::PaymentProvider {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str::<CheckoutSession>(&body).map_err(|e| PortalError::PaymentProvider {
            status: 502,
            message: format!("unexpected checkout response: {e}"),
        })
    }
}

// 3. The Mock Implementation (For Unit Tests)
/// MockCheckoutService
///
/// Records every request and answers with a deterministic hosted-page URL.
#[derive(Default)]
pub struct MockCheckoutService {
    pub should_fail: bool,
    requests: Mutex<Vec<CheckoutParams>>,
}

impl MockCheckoutService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<CheckoutParams> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CheckoutService for MockCheckoutService {
    async fn create_session(&self, params: &CheckoutParams) -> Result<CheckoutSession, PortalError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(params.clone());
        }
        if self.should_fail {
            return Err(PortalError::PaymentProvider {
                status: 500,
                message: "Mock Checkout Error: Simulation requested".to_string(),
            });
        }
        Ok(CheckoutSession {
            id: "cs_test_mock".to_string(),
            url: "https://checkout.stripe.com/c/pay/cs_test_mock".to_string(),
        })
    }
}

/// CheckoutState
///
/// The shared handle to the payment collaborator stored in the application state.
pub type CheckoutState = Arc<dyn CheckoutService>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plans_are_found_by_exact_name() {
        assert_eq!(find_plan("Unlimited Plus").map(|p| p.popular), Some(true));
        assert!(find_plan("unlimited").is_none());
        assert!(find_plan("Enterprise").is_none());
    }

    #[test]
    fn yearly_prices_are_discounted() {
        let prices: Vec<_> = PLANS
            .iter()
            .map(|plan| {
                (
                    plan.display_price(BillingPeriod::Monthly),
                    plan.display_price(BillingPeriod::Yearly),
                )
            })
            .collect();
        assert_eq!(prices, vec![("$15", "$12"), ("$25", "$20"), ("$35", "$28")]);
    }

    #[test]
    fn return_urls_are_rooted_at_origin() {
        let plan = find_plan("Unlimited").unwrap();
        let params = CheckoutParams::for_plan(plan, BillingPeriod::Yearly, "https://app.example.com/");
        assert_eq!(
            params.success_url,
            "https://app.example.com/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(params.cancel_url, "https://app.example.com/pricing?canceled=true");
        assert!(params.is_yearly);
        assert!(
            params
                .form_fields()
                .contains(&("metadata[isYearly]", "true".to_string()))
        );
    }

    #[tokio::test]
    async fn missing_secret_key_is_a_config_error() {
        let client = StripeCheckoutClient::new("https://api.stripe.com", None);
        let params = CheckoutParams::for_plan(&PLANS[0], BillingPeriod::Monthly, "http://localhost:3000");
        assert_eq!(
            client.create_session(&params).await,
            Err(PortalError::ConfigMissing(STRIPE_NOT_CONFIGURED.to_string()))
        );
    }
}
