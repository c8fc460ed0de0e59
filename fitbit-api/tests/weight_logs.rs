use chrono::NaiveDate;
use fitbit_api::{Client, Request, endpoints::Period};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 10, 10).unwrap()
}

#[tokio::test]
async fn fetches_weight_logs_with_bearer_token() {
    let server = MockServer::start().await;
    let body = serde_json::json!({"weight": [
        {"bmi": 21.21, "date": "2018-10-04", "fat": 18.981, "logId": 1538664676000u64,
         "source": "Aria", "time": "14:51:16", "weight": 66.6}
    ]});

    Mock::given(method("GET"))
        .and(path("/1/user/U1/body/log/weight/date/2018-10-10/7d.json"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::with_base_url(&server.uri(), "tok");
    let request = Request::weight()
        .with_user("U1")
        .logs(base_date(), Period::SevenDays);

    let response = client.send(request).await.expect("weight logs");
    assert_eq!(response.weight.len(), 1);
    assert_eq!(response.weight[0].fat, Some(18.981));
}

#[tokio::test]
async fn expired_token_is_reported_as_unauthorized() {
    let server = MockServer::start().await;
    let body = serde_json::json!({
        "errors": [{"errorType": "expired_token", "message": "Access token expired"}],
        "success": false
    });

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(&body))
        .mount(&server)
        .await;

    let client = Client::with_base_url(&server.uri(), "stale");
    let err = client
        .send(Request::weight().logs(base_date(), Period::OneDay))
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert!(err.to_string().contains("expired_token"));
}

#[tokio::test]
async fn server_errors_are_not_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let client = Client::with_base_url(&server.uri(), "tok");
    let err = client
        .send(Request::weight().logs(base_date(), Period::OneDay))
        .await
        .unwrap_err();

    assert!(!err.is_unauthorized());
    assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"weight": []}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = Client::with_base_url(&server.uri(), "tok").timeout(Duration::from_millis(100));
    let err = client
        .send(Request::weight().logs(base_date(), Period::OneDay))
        .await
        .unwrap_err();

    assert!(matches!(err, fitbit_api::FitbitApiError::Timeout(_)));
}
