use chrono::{Datelike, Utc};
use ppp_price::core::cache::Cache;
use ppp_price::{Client, ClientBuilder, ClientConfig, ErrorCode, ReferencePoint, quick};
use serde_json::json;
use std::fs;
use std::time::Duration;
use tracing::info;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod test_utils {
    use super::*;

    /// A World Bank style `[metadata, records]` body for one country.
    pub fn series_body(country: &str, name: &str, values: &[(i32, Option<f64>)]) -> String {
        let records: Vec<_> = values
            .iter()
            .map(|(year, value)| {
                json!({
                    "indicator": {"id": "PA.NUS.PPP", "value": "PPP conversion factor, GDP (LCU per international $)"},
                    "country": {"id": country, "value": name},
                    "countryiso3code": "",
                    "date": year.to_string(),
                    "value": value,
                    "unit": "",
                    "obs_status": "",
                    "decimal": 0
                })
            })
            .collect();
        json!([{"page": 1, "pages": 1, "per_page": 50, "total": records.len()}, records]).to_string()
    }

    pub async fn mount_series(
        server: &MockServer,
        country: &str,
        name: &str,
        values: &[(i32, Option<f64>)],
    ) {
        Mock::given(method("GET"))
            .and(path(format!("/country/{country}/indicator/PA.NUS.PPP")))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(series_body(country, name, values)),
            )
            .mount(server)
            .await;
    }

    pub async fn mount_rates(server: &MockServer, base: &str, rates: serde_json::Value) {
        let base = base.to_lowercase();
        let mut body = serde_json::Map::new();
        body.insert("date".to_string(), json!("2024-05-01"));
        body.insert(base.clone(), rates);
        Mock::given(method("GET"))
            .and(path(format!("/currencies/{base}.json")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(serde_json::Value::Object(body).to_string()),
            )
            .mount(server)
            .await;
    }

    pub async fn mount_countries(server: &MockServer) {
        let country = |iso2: &str, name: &str, capital: &str| {
            json!({
                "id": "", "iso2Code": iso2, "name": name,
                "region": {"id": "", "iso2code": "", "value": ""},
                "adminregion": {"id": "", "iso2code": "", "value": ""},
                "incomeLevel": {"id": "", "iso2code": "", "value": ""},
                "lendingType": {"id": "", "iso2code": "", "value": ""},
                "capitalCity": capital, "longitude": "", "latitude": ""
            })
        };
        let body = json!([
            {"page": 1, "pages": 1, "per_page": 300, "total": 4},
            [
                country("TR", "Turkiye", "Ankara"),
                country("BR", "Brazil", "Brasilia"),
                country("US", "United States", "Washington D.C."),
                country("1A", "Arab World", "")
            ]
        ]);
        Mock::given(method("GET"))
            .and(path("/country"))
            .and(query_param("per_page", "300"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
            .mount(server)
            .await;
    }

    pub fn client_for(world_bank: &MockServer, currency: &MockServer) -> Client {
        Client::builder()
            .world_bank_url(&world_bank.uri())
            .currency_url(&currency.uri())
            .build()
            .expect("Failed to build client")
    }
}

#[test_log::test(tokio::test)]
async fn test_recommend_from_yaml_config() {
    let world_bank = MockServer::start().await;
    let currency = MockServer::start().await;
    let year = Utc::now().year();

    Mock::given(method("GET"))
        .and(path("/country/TR/indicator/PA.NUS.PPP"))
        .and(query_param("format", "json"))
        .and(query_param("per_page", "50"))
        .and(query_param("date", format!("{}:{}", year - 10, year)))
        .respond_with(ResponseTemplate::new(200).set_body_string(test_utils::series_body(
            "TR",
            "Turkiye",
            &[(2024, None), (2023, Some(11.55)), (2022, Some(7.9))],
        )))
        .expect(1)
        .mount(&world_bank)
        .await;
    Mock::given(method("GET"))
        .and(path("/currencies/usd.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"date": "2024-05-01", "usd": {"try": 40.47, "eur": 0.93}}"#,
        ))
        .expect(1)
        .mount(&currency)
        .await;

    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_content = format!(
        r#"
        cache_duration: 3600
        request_timeout: 5
        providers:
          world_bank:
            base_url: {}
          currency:
            base_url: {}
    "#,
        world_bank.uri(),
        currency.uri()
    );
    fs::write(config_file.path(), &config_content).expect("Failed to write config file");

    let config = ClientConfig::load_from_path(config_file.path()).expect("Failed to load config");
    assert_eq!(config.reference, ReferencePoint::Factor(1.0));
    let client = ClientBuilder::from_config(config)
        .build()
        .expect("Failed to build client");

    let rec = client
        .recommend(100.0, "USD", "TR")
        .await
        .expect("Recommendation failed");
    info!(?rec, "Received recommendation");

    assert_eq!(rec.target_currency, "TRY");
    assert!((rec.recommended_amount - 1155.0).abs() < 1e-9);
    assert!(rec.discount_percentage > 0.0);

    // Served from cache; the mocks above expect exactly one hit each.
    let again = client.recommend(100.0, "USD", "TR").await.unwrap();
    assert_eq!(again.recommended_amount, rec.recommended_amount);
    assert_eq!(again.exchange_rate, rec.exchange_rate);
}

#[test_log::test(tokio::test)]
async fn test_recommend_is_linear() {
    let world_bank = MockServer::start().await;
    let currency = MockServer::start().await;
    test_utils::mount_series(&world_bank, "BR", "Brazil", &[(2023, Some(2.45))]).await;
    test_utils::mount_rates(&currency, "EUR", json!({"brl": 5.8})).await;

    let client = test_utils::client_for(&world_bank, &currency);
    for amount in [1.0, 19.99, 1234.5] {
        let single = client.recommend(amount, "EUR", "BR").await.unwrap();
        let double = client.recommend(2.0 * amount, "EUR", "BR").await.unwrap();
        assert_eq!(double.recommended_amount, 2.0 * single.recommended_amount);
    }
}

#[test_log::test(tokio::test)]
async fn test_compare_countries_drops_failures() {
    let world_bank = MockServer::start().await;
    let currency = MockServer::start().await;
    test_utils::mount_series(&world_bank, "TR", "Turkiye", &[(2023, Some(11.55))]).await;
    test_utils::mount_series(&world_bank, "BR", "Brazil", &[(2023, Some(2.45))]).await;
    test_utils::mount_series(&world_bank, "SS", "South Sudan", &[(2023, None)]).await;

    let client = test_utils::client_for(&world_bank, &currency);
    let ranking = client
        .compare_countries(&["TR", "BR", "INVALID", "SS"])
        .await
        .expect("Comparison should tolerate failures");

    assert_eq!(ranking.len(), 2);
    assert_eq!((ranking[0].country.as_str(), ranking[0].rank), ("BR", 1));
    assert_eq!((ranking[1].country.as_str(), ranking[1].rank), ("TR", 2));
    assert_eq!(ranking[0].country_name, "Brazil");
}

#[test_log::test(tokio::test)]
async fn test_slow_provider_times_out() {
    let world_bank = MockServer::start().await;
    let currency = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/country/TR/indicator/PA.NUS.PPP"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(test_utils::series_body("TR", "Turkiye", &[(2023, Some(11.55))]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&world_bank)
        .await;

    let client = Client::builder()
        .world_bank_url(&world_bank.uri())
        .currency_url(&currency.uri())
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();

    let err = client.get_indicator("TR").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Timeout);
    assert!(client.cache().unwrap().is_empty().await);
}

#[test_log::test(tokio::test)]
async fn test_rate_limit_surfaces_through_recommend() {
    let world_bank = MockServer::start().await;
    let currency = MockServer::start().await;
    test_utils::mount_series(&world_bank, "TR", "Turkiye", &[(2023, Some(11.55))]).await;
    Mock::given(method("GET"))
        .and(path("/currencies/usd.json"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&currency)
        .await;

    let client = test_utils::client_for(&world_bank, &currency);
    let err = client.recommend(100.0, "USD", "TR").await.unwrap_err();

    assert_eq!(err.code(), ErrorCode::RateLimit);
    assert_eq!(err.message, "failed to get exchange rate");
    assert_eq!(err.root_code(), ErrorCode::RateLimit);
}

#[test_log::test(tokio::test)]
async fn test_cache_snapshot_survives_restart() {
    let world_bank = MockServer::start().await;
    let currency = MockServer::start().await;
    test_utils::mount_series(&world_bank, "IN", "India", &[(2023, Some(22.4))]).await;
    test_utils::mount_rates(&currency, "USD", json!({"inr": 83.1})).await;
    test_utils::mount_countries(&world_bank).await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let snapshot = dir.path().join("nested").join("snapshot.json");

    let first = test_utils::client_for(&world_bank, &currency);
    let before = first.recommend(10.0, "USD", "IN").await.unwrap();
    let countries = first.countries().await.unwrap();
    assert_eq!(countries.len(), 3);
    first.export_cache(&snapshot).await.expect("Export failed");

    // A fresh client pointed at nothing must answer from the snapshot alone.
    let offline = Client::builder()
        .world_bank_url("http://127.0.0.1:9")
        .currency_url("http://127.0.0.1:9")
        .build()
        .unwrap();
    let imported = offline.import_cache(&snapshot).await.expect("Import failed");
    assert_eq!(imported, 3);

    let after = offline.recommend(10.0, "USD", "IN").await.unwrap();
    assert_eq!(after, before);
    assert_eq!(offline.countries().await.unwrap(), countries);
}

#[test_log::test(tokio::test)]
async fn test_quick_helpers_use_default_client() {
    let world_bank = MockServer::start().await;
    let currency = MockServer::start().await;
    test_utils::mount_series(&world_bank, "TR", "Turkiye", &[(2023, Some(11.55))]).await;
    test_utils::mount_series(&world_bank, "BR", "Brazil", &[(2023, Some(2.45))]).await;
    test_utils::mount_rates(&currency, "USD", json!({"try": 40.0, "brl": 5.0})).await;
    test_utils::mount_countries(&world_bank).await;
    Mock::given(method("GET"))
        .and(path("/country/XK/indicator/PA.NUS.PPP"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&world_bank)
        .await;

    quick::set_default_client(test_utils::client_for(&world_bank, &currency));

    let price = quick::recommend_price(10.0, "USD", "TR").await.unwrap();
    assert!((price - 115.5).abs() < 1e-9);
    assert_eq!(quick::get_factor("BR").await.unwrap(), 2.45);
    assert_eq!(quick::get_rate("USD", "BRL").await.unwrap(), 5.0);
    assert_eq!(quick::get_country_code("turkiye").await.unwrap(), "TR");

    let prices = quick::batch_recommend(10.0, "USD", &["TR", "BR", "XK"])
        .await
        .unwrap();
    assert_eq!(prices["XK"], 0.0);
    assert!((prices["BR"] - 24.5).abs() < 1e-9);

    let err = quick::batch_recommend(10.0, "USD", &["XK"]).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ApiError);
    assert_eq!(err.message, "failed to get recommendations for all countries");

    let strategy = quick::pricing_strategy("BR", 10.0, "USD").await.unwrap();
    assert_eq!(strategy.target_currency, "BRL");
}
