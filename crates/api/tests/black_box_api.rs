use std::str::FromStr;
use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};

use tallyerp_api::app::{build_app, AppServices};
use tallyerp_core::Decimal;
use tallyerp_infra::Settings;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over a fresh in-memory store, bound to an ephemeral port.
        let services = Arc::new(AppServices::in_memory(&Settings::default()));
        let app = build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Amounts serialize as strings; accept numbers too.
fn dec(v: &Value) -> Decimal {
    match v {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).unwrap(),
        other => panic!("not an amount: {other}"),
    }
}

fn disbursement(source_id: &str) -> Value {
    json!({
        "kind": "cash_disbursement",
        "source_id": source_id,
        "date": "2024-01-15",
        "description": "Bayar listrik",
        "expense_account": "6-1200",
        "amount": "250000"
    })
}

fn expense(source_id: &str) -> Value {
    json!({
        "kind": "expense",
        "source_id": source_id,
        "date": "2024-01-12",
        "expense_account": "6-1000",
        "amount": "100000",
        "tax_amount": "11000",
        "cash_account": "1-1100"
    })
}

fn goods_sale(source_id: &str) -> Value {
    json!({
        "kind": "sales_of_goods",
        "source_id": source_id,
        "date": "2024-01-10",
        "payment_method": "Tunai",
        "subtotal": "50000",
        "tax_amount": "5500",
        "total": "55500",
        "quantity": "10",
        "unit_price": "6000",
        "cogs_account": "5-1000"
    })
}

#[tokio::test]
async fn health_is_ok() {
    let srv = TestServer::spawn().await;
    let res = srv
        .client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn compose_is_a_dry_run() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.post("/journal/compose", &expense("exp-1")).await;
    assert_eq!(status, StatusCode::OK);
    let lines = body["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1]["account_code"], "1-1700");
    assert_eq!(dec(&body["total_debit"]), Decimal::from(111_000));
    assert_eq!(dec(&body["total_credit"]), Decimal::from(111_000));

    let (status, _) = srv
        .get("/journal/sources/expense/exp-1")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn payment_labels_pick_the_debit_account() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.post("/journal/compose", &goods_sale("sale-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lines"][0]["account_code"], "1-1100");

    let mut credit_sale = goods_sale("sale-2");
    credit_sale["payment_method"] = json!("Piutang");
    let (status, body) = srv.post("/journal/compose", &credit_sale).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lines"][0]["account_code"], "1-1200");

    let mut transfer = goods_sale("sale-3");
    transfer["payment_method"] = json!("Transfer");
    let (status, body) = srv.post("/journal/compose", &transfer).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lines"][0]["account_code"], "1-1100");
}

#[tokio::test]
async fn posting_is_idempotent_per_source() {
    let srv = TestServer::spawn().await;

    let (status, entry) = srv.post("/journal/post", &disbursement("ab12cd34-0001")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(entry["reference"].as_str().unwrap().starts_with("CD-20240115-ab12cd34"));
    assert_eq!(entry["status"], "posted");
    assert_eq!(entry["ledger_rows"].as_array().unwrap().len(), 2);
    assert_eq!(entry["lines"][1]["account_code"], "1-1001");

    let (status, body) = srv.post("/journal/post", &disbursement("ab12cd34-0001")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_posted");

    let (status, source) = srv.get("/journal/sources/cash_disbursement/ab12cd34-0001").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(source["status"], "posted");
    assert_eq!(source["journal_entry_id"], entry["id"]);
}

#[tokio::test]
async fn rejected_events_persist_nothing() {
    let srv = TestServer::spawn().await;

    let mut unknown_account = expense("exp-1");
    unknown_account["expense_account"] = json!("6-9999");
    let (status, body) = srv.post("/journal/post", &unknown_account).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "unresolved_account");

    let mut inconsistent = goods_sale("sale-1");
    inconsistent["total"] = json!("60000");
    let (status, body) = srv.post("/journal/post", &inconsistent).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "unbalanced_journal");

    let mut negative = expense("exp-2");
    negative["amount"] = json!("-5");
    let (status, body) = srv.post("/journal/post", &negative).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = srv.post("/journal/post", &json!({ "kind": "barter" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    let (_, balances) = srv.get("/ledger/balances").await;
    assert!(balances["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn void_frees_the_source_for_reposting() {
    let srv = TestServer::spawn().await;

    let (_, entry) = srv.post("/journal/post", &expense("exp-1")).await;
    let id = entry["id"].as_str().unwrap().to_string();

    let (status, voided) = srv
        .post(&format!("/journal/{id}/void"), &json!({ "reason": "wrong tax" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(voided["status"], "voided");
    assert_eq!(voided["void_reason"], "wrong tax");

    let (status, body) = srv
        .post(&format!("/journal/{id}/void"), &json!({ "reason": "again" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");

    let (_, source) = srv.get("/journal/sources/expense/exp-1").await;
    assert_eq!(source["status"], "voided");

    let (_, balances) = srv.get("/ledger/balances").await;
    assert!(balances["items"].as_array().unwrap().is_empty());

    let (status, reposted) = srv.post("/journal/post", &expense("exp-1")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(reposted["id"], entry["id"]);

    let (status, fetched) = srv.get(&format!("/journal/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], "voided");
    assert!(fetched["ledger_rows"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn reports_over_a_mixed_history() {
    let srv = TestServer::spawn().await;
    for event in [goods_sale("sale-1"), expense("exp-1"), disbursement("cd-1")] {
        let (status, _) = srv.post("/journal/post", &event).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, tb) = srv.get("/reports/trial-balance").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tb["is_balanced"], true);
    assert_eq!(dec(&tb["total_debit"]), dec(&tb["total_credit"]));

    let (_, pl) = srv.get("/reports/profit-loss").await;
    assert_eq!(dec(&pl["gross_profit"]), Decimal::from(40_000));
    assert_eq!(dec(&pl["net_income"]), Decimal::from(-310_000));

    let (_, bs) = srv.get("/reports/balance-sheet").await;
    assert_eq!(bs["check"]["is_balanced"], true);
    assert_eq!(dec(&bs["assets"]["total"]), Decimal::from(-304_500));
    assert!(bs["warnings"].as_array().unwrap().is_empty());

    // Only the sale falls inside this window.
    let (_, pl) = srv.get("/reports/profit-loss?from=2024-01-01&to=2024-01-10").await;
    assert_eq!(dec(&pl["net_income"]), Decimal::from(40_000));

    let (status, gl) = srv.get("/ledger/1-1100?from=2024-01-11").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dec(&gl["opening_balance"]), Decimal::from(55_500));
    assert_eq!(dec(&gl["closing_balance"]), Decimal::from(-55_500));
}

#[tokio::test]
async fn bad_queries_and_ids_are_client_errors() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.get("/reports/balance-sheet?from=2024-02-01&to=2024-01-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = srv.get("/ledger/balances?from=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_query");

    let (status, body) = srv.get("/ledger/9-9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = srv.get("/journal/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let (status, body) = srv.get("/journal/sources/barter/x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = srv.get("/journal/sources/sales/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "source_not_found");
}

#[tokio::test]
async fn accounts_list_active_codes_by_prefix() {
    let srv = TestServer::spawn().await;
    let (status, body) = srv.get("/accounts?prefix=1-1").await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["code"].as_str().unwrap())
        .collect();
    assert!(codes.contains(&"1-1001"));
    assert!(codes.iter().all(|c| c.starts_with("1-1")));
}
