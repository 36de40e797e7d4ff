use std::str::FromStr;
use std::sync::Arc;

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use feeledger_core::{OrganizerId, PayeeId, SaleId};
use feeledger_infra::LedgerConfig;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let services = feeledger_api::app::services::build_services(&LedgerConfig::default())
            .expect("failed to build services");
        let app = feeledger_api::app::build_app(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let srv = Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        };
        srv.seed_countries().await;
        srv
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.post(self.url(path)).json(&body).send().await.unwrap()
    }

    async fn put(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.put(self.url(path)).json(&body).send().await.unwrap()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    async fn seed_countries(&self) {
        let res = self
            .put(
                "/admin/countries/NG",
                json!({
                    "country_code": "NG",
                    "currency": "NGN",
                    "service_fee_percentage": "5",
                    "service_fee_fixed_per_ticket": "0",
                    "providers": { "paystack": { "percentage": "1.5", "fixed": "100" } },
                }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = self
            .put(
                "/admin/countries/US",
                json!({
                    "country_code": "US",
                    "currency": "USD",
                    "service_fee_percentage": "3.7",
                    "service_fee_fixed_per_ticket": "1.79",
                    "providers": { "stripe": { "percentage": "2.9", "fixed": "0.30" } },
                }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    async fn register_payee(&self, rate: &str) -> PayeeId {
        let payee_id = PayeeId::new();
        let res = self
            .put(
                &format!("/admin/payees/{payee_id}"),
                json!({ "display_name": "Promoter", "default_commission_rate": rate }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        payee_id
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Decimals travel as strings; compare numerically so scale does not matter.
fn dec(value: &Value, key: &str) -> Decimal {
    match &value[key] {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).unwrap(),
        other => panic!("{key} is not a decimal: {other}"),
    }
}

fn ng_sale(sale_id: SaleId, payee_id: Option<PayeeId>, subtotal: &str) -> Value {
    json!({
        "sale_id": sale_id,
        "currency": "NGN",
        "subtotal": subtotal,
        "quantity": 2,
        "country_code": "NG",
        "provider_id": "paystack",
        "organizer_id": OrganizerId::new(),
        "payee_id": payee_id,
    })
}

async fn get_summary_eventually(srv: &TestServer, path: &str, currencies: usize) -> Value {
    // Summaries are fed by the projection worker; poll briefly until it catches up.
    for _ in 0..50 {
        let res = srv.get(path).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        if body["per_currency"].as_object().map(|m| m.len()) == Some(currencies) {
            return body;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("summary did not catch up within timeout");
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    assert_eq!(srv.get("/health").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn preview_and_recorded_sale_agree() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post(
            "/fees/preview",
            json!({ "subtotal": "10000", "quantity": 2, "country_code": "NG", "provider_id": "paystack" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let preview: Value = res.json().await.unwrap();
    assert_eq!(dec(&preview, "service_fee"), Decimal::from(500));
    assert_eq!(dec(&preview, "processing_fee"), Decimal::from_str("257.5").unwrap());
    assert_eq!(dec(&preview, "total_fee"), Decimal::from_str("757.5").unwrap());
    assert_eq!(dec(&preview, "grand_total"), Decimal::from_str("10757.5").unwrap());

    let sale_id = SaleId::new();
    let res = srv.post("/sales", ng_sale(sale_id, None, "10000")).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let recorded: Value = res.json().await.unwrap();
    for key in ["service_fee", "processing_fee", "total_fee", "grand_total"] {
        assert_eq!(dec(&recorded["fees"], key), dec(&preview, key));
    }
    assert!(recorded["commission"].is_null());

    let res = srv.get(&format!("/sales/{sale_id}/fees")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let stored: Value = res.json().await.unwrap();
    for key in ["service_fee", "processing_fee", "total_fee", "grand_total"] {
        assert_eq!(dec(&stored, key), dec(&preview, key));
    }
}

#[tokio::test]
async fn promoter_commission_is_reversed_by_refund() {
    let srv = TestServer::spawn().await;
    let payee_id = srv.register_payee("10").await;
    let sale_id = SaleId::new();

    let res = srv.post("/sales", ng_sale(sale_id, Some(payee_id), "5000")).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let recorded: Value = res.json().await.unwrap();
    assert_eq!(dec(&recorded["commission"], "commission_amount"), Decimal::from(500));
    assert_eq!(recorded["commission"]["status"], "pending");

    let ledger: Value = srv
        .get(&format!("/ledger/{payee_id}/NGN"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(dec(&ledger, "earned"), Decimal::from(500));
    assert_eq!(ledger["pending_count"], 1);

    let res = srv
        .post("/refunds", json!({ "sale_id": sale_id, "refunded_fraction": "1" }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let outcome: Value = res.json().await.unwrap();
    assert_eq!(outcome["commission"]["status"], "reversed");
    assert_eq!(outcome["changed"], true);

    let ledger: Value = srv
        .get(&format!("/ledger/{payee_id}/NGN"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(dec(&ledger, "earned"), Decimal::ZERO);
    assert_eq!(dec(&ledger, "unpaid"), Decimal::ZERO);
}

#[tokio::test]
async fn overpay_is_rejected_with_payable_balance() {
    let srv = TestServer::spawn().await;
    let payee_id = srv.register_payee("10").await;
    let settled = SaleId::new();
    srv.post("/sales", ng_sale(settled, Some(payee_id), "10000")).await;
    srv.post("/sales", ng_sale(SaleId::new(), Some(payee_id), "5000")).await;
    srv.post(&format!("/sales/{settled}/settlement"), json!({})).await;

    // 1500 is unpaid but only the settled 1000 can be paid out.
    let res = srv
        .post(
            "/payouts",
            json!({ "payee_id": payee_id, "currency": "NGN", "amount": "1500", "requested_by": "ops" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "overpay");
    assert_eq!(dec(&body["unpaid"], "amount"), Decimal::from(1000));
    assert_eq!(body["unpaid"]["currency"], "NGN");

    let ledger: Value = srv
        .get(&format!("/ledger/{payee_id}/NGN"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(dec(&ledger, "paid"), Decimal::ZERO);
    assert_eq!(dec(&ledger, "unpaid"), Decimal::from(1500));
    assert_eq!(dec(&ledger, "payable"), Decimal::from(1000));
}

#[tokio::test]
async fn settled_commission_is_paid_out_and_failure_restores_it() {
    let srv = TestServer::spawn().await;
    let payee_id = srv.register_payee("10").await;
    let sale_id = SaleId::new();
    srv.post("/sales", ng_sale(sale_id, Some(payee_id), "10000")).await;

    let res = srv.post(&format!("/sales/{sale_id}/settlement"), json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let entry: Value = res.json().await.unwrap();
    assert_eq!(entry["status"], "available");

    let res = srv
        .post(
            "/payouts",
            json!({ "payee_id": payee_id, "currency": "NGN", "amount": "1000", "requested_by": "ops" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let payout: Value = res.json().await.unwrap();
    let payout_id = payout["payout_id"].as_str().unwrap().to_string();

    // Paid commission cannot be reversed without a clawback decision.
    let res = srv
        .post("/refunds", json!({ "sale_id": sale_id, "refunded_fraction": "1" }))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "reversal_requires_clawback");

    let res = srv
        .post(
            &format!("/payouts/{payout_id}/failure"),
            json!({ "payee_id": payee_id, "currency": "NGN" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let failed: Value = res.json().await.unwrap();
    assert_eq!(failed["status"], "failed");

    let ledger: Value = srv
        .get(&format!("/ledger/{payee_id}/NGN"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(dec(&ledger, "unpaid"), Decimal::from(1000));
}

#[tokio::test]
async fn duplicate_and_unknown_references_map_to_http_errors() {
    let srv = TestServer::spawn().await;
    let payee_id = srv.register_payee("10").await;
    let sale_id = SaleId::new();

    assert_eq!(
        srv.post("/sales", ng_sale(sale_id, Some(payee_id), "100")).await.status(),
        StatusCode::CREATED
    );
    let res = srv.post("/sales", ng_sale(sale_id, Some(payee_id), "100")).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "duplicate_sale");

    let stranger = PayeeId::new();
    assert_eq!(
        srv.get(&format!("/ledger/{stranger}/NGN")).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        srv.get(&format!("/sales/{}/fees", SaleId::new())).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(srv.get("/ledger/not-a-uuid/NGN").await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        srv.get(&format!("/ledger/{payee_id}/naira")).await.status(),
        StatusCode::BAD_REQUEST
    );

    let res = srv
        .post("/refunds", json!({ "sale_id": sale_id, "refunded_fraction": "1.5" }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cap_below_single_ticket_fee_is_rejected_at_save() {
    let srv = TestServer::spawn().await;

    let res = srv
        .put(
            "/admin/countries/GH",
            json!({
                "country_code": "GH",
                "currency": "GHS",
                "service_fee_percentage": "4",
                "service_fee_fixed_per_ticket": "10",
                "service_fee_cap": "5",
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "cap_misconfigured");

    assert_eq!(srv.get("/admin/countries/GH").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn summaries_report_each_currency_separately() {
    let srv = TestServer::spawn().await;
    let payee_id = srv.register_payee("10").await;
    let organizer_id = OrganizerId::new();

    let mut ng = ng_sale(SaleId::new(), Some(payee_id), "10000");
    ng["organizer_id"] = json!(organizer_id);
    assert_eq!(srv.post("/sales", ng).await.status(), StatusCode::CREATED);

    let res = srv
        .post(
            "/sales",
            json!({
                "sale_id": SaleId::new(),
                "currency": "USD",
                "subtotal": "500",
                "quantity": 1,
                "country_code": "US",
                "provider_id": "stripe",
                "organizer_id": organizer_id,
                "payee_id": payee_id,
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let payee = get_summary_eventually(&srv, &format!("/summaries/payees/{payee_id}"), 2).await;
    assert_eq!(dec(&payee["per_currency"]["NGN"], "unpaid"), Decimal::from(1000));
    assert_eq!(dec(&payee["per_currency"]["USD"], "unpaid"), Decimal::from(50));

    let org = get_summary_eventually(&srv, &format!("/summaries/organizers/{organizer_id}"), 2).await;
    assert_eq!(dec(&org["per_currency"]["NGN"], "gross_revenue"), Decimal::from(10000));
    assert_eq!(dec(&org["per_currency"]["USD"], "gross_revenue"), Decimal::from(500));
    assert_eq!(dec(&org["per_currency"]["USD"], "commissions_unpaid"), Decimal::from(50));
}
