use axum::{
    extract::Query,
    http::StatusCode,
    response::{Html, IntoResponse},
};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::checkout::{BillingPeriod, PLANS, PRICE_PERIOD_LABEL};

/// Product name shown in titles and the navigation bar.
pub const APP_NAME: &str = "MacroPilot";

/// Session ids are only echoed back when they look like provider tokens.
static SESSION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,255}$").expect("session id pattern is valid"));

/// Minimal document frame. Styling and client behaviour live in the front-end bundle.
fn shell(title: &str, page: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title} | {APP_NAME}</title>\n</head>\n\
         <body data-page=\"{page}\">\n<nav><a href=\"/\">{APP_NAME}</a> \
         <a href=\"/pricing\">Pricing</a> <a href=\"/auth/login\">Log in</a> \
         <a href=\"/auth/signup\">Sign up</a></nav>\n<main id=\"app\">\n{body}\n</main>\n</body>\n</html>\n"
    )
}

pub async fn landing() -> Html<String> {
    Html(shell(
        "Home",
        "landing",
        "<h1>Your data co-pilot</h1>\n<p><a href=\"/auth/signup\">Get started</a></p>",
    ))
}

pub async fn login() -> Html<String> {
    Html(shell(
        "Log in",
        "login",
        "<form id=\"login-form\" method=\"post\" action=\"/api/auth/login\">\n\
         <input name=\"deployment_url\" type=\"url\" placeholder=\"Deployment URL\">\n\
         <input name=\"email\" type=\"email\" autocomplete=\"username\">\n\
         <input name=\"password\" type=\"password\" autocomplete=\"current-password\">\n\
         <button type=\"submit\">Log in</button>\n</form>",
    ))
}

pub async fn signup() -> Html<String> {
    Html(shell(
        "Sign up",
        "signup",
        "<form id=\"signup-form\" method=\"post\" action=\"/api/auth/signup\">\n\
         <input name=\"deployment_url\" type=\"url\" placeholder=\"Deployment URL\">\n\
         <input name=\"email\" type=\"email\" autocomplete=\"email\">\n\
         <input name=\"password\" type=\"password\" autocomplete=\"new-password\">\n\
         <input name=\"confirm_password\" type=\"password\" autocomplete=\"new-password\">\n\
         <button type=\"submit\">Create account</button>\n</form>",
    ))
}

#[derive(Deserialize)]
pub struct PricingQuery {
    #[serde(default)]
    pub yearly: bool,
    #[serde(default)]
    pub canceled: bool,
}

/// pricing
///
/// Renders the catalog server-side so the page works before the bundle loads.
pub async fn pricing(Query(query): Query<PricingQuery>) -> Html<String> {
    let period = BillingPeriod::from_yearly(query.yearly);
    let mut body = String::from("<h1>Choose the plan that's right for you</h1>\n");
    if query.canceled {
        body.push_str("<p class=\"notice\">Checkout was canceled.</p>\n");
    }
    for plan in PLANS.iter() {
        let badge = if plan.popular { " <em>Most popular</em>" } else { "" };
        let features: String = plan
            .features
            .iter()
            .map(|feature| format!("<li>{feature}</li>"))
            .collect();
        body.push_str(&format!(
            "<section class=\"plan\" data-plan=\"{name}\">\n<h2>{name}{badge}</h2>\n\
             <p>{price} {PRICE_PERIOD_LABEL}</p>\n<p>{description}</p>\n<ul>{features}</ul>\n</section>\n",
            name = plan.name,
            price = plan.display_price(period),
            description = plan.description,
        ));
    }
    Html(shell("Pricing", "pricing", &body))
}

#[derive(Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

/// success
///
/// Post-payment confirmation. The session id is shown only when it is a plain
/// token, so nothing user-controlled is ever reflected into the markup.
pub async fn success(Query(query): Query<SuccessQuery>) -> Html<String> {
    let session_line = query
        .session_id
        .filter(|id| SESSION_ID.is_match(id))
        .map(|id| format!("<p class=\"session\">Session ID: {id}</p>\n"))
        .unwrap_or_default();
    let body = format!(
        "<h1>Payment Successful!</h1>\n\
         <p>Thank you for your subscription! You now have access to all premium features.</p>\n\
         {session_line}<p><a href=\"/\">Go to Dashboard</a> <a href=\"/pricing\">Back to Pricing</a></p>"
    );
    Html(shell("Payment successful", "success", &body))
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Html(shell("Not found", "not-found", "<h1>Page not found</h1>")),
    )
}
