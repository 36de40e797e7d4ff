use axum::Router;

pub mod admin;
pub mod fees;
pub mod ledger;
pub mod payouts;
pub mod refunds;
pub mod sales;
pub mod summaries;
pub mod system;

/// Router for all ledger endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/fees", fees::router())
        .nest("/sales", sales::router())
        .nest("/refunds", refunds::router())
        .nest("/payouts", payouts::router())
        .nest("/ledger", ledger::router())
        .nest("/summaries", summaries::router())
        .nest("/admin", admin::router())
}
