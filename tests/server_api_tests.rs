use attack_odds::config::AppConfig;
use attack_odds::server::routes::route_request;
use attack_odds::server::ServerState;

fn state() -> ServerState {
    ServerState::new(AppConfig {
        max_iterations: 50_000,
        default_iterations: 2_000,
        seed: Some(7),
        ..AppConfig::default()
    })
    .expect("server state should start")
}

#[test]
fn health_endpoint_returns_ok_json() {
    let response = route_request(&state(), "GET", "/api/health", "");
    assert_eq!(response.status_code, 200);
    assert_eq!(response.content_type, "application/json");
    assert!(response.body.contains("\"status\": \"ok\""));
}

#[test]
fn simulate_endpoint_returns_histogram() {
    let body = r#"{"itersRequested":4000,"seed":11,"setup":{"attack":"1d20+5","damage":"1d8+3","versus":14,"numAttacks":"2","cost":"1"}}"#;
    let response = route_request(&state(), "POST", "/api/simulate", body);
    assert_eq!(response.status_code, 200, "{}", response.body);

    let payload: serde_json::Value =
        serde_json::from_str(&response.body).expect("response should be valid json");
    assert_eq!(payload["numTrials"], 4000);
    assert_eq!(payload["numAttacks"], 8000);
    assert!(payload["nonce"].as_u64().is_some());

    let buckets = payload["buckets"].as_array().expect("buckets should be an array");
    let mut total = 0;
    let mut previous: Option<u64> = None;
    for bucket in buckets {
        let damage = bucket[0].as_u64().expect("damage key");
        if let Some(prev) = previous {
            assert!(prev < damage, "buckets should ascend");
        }
        previous = Some(damage);
        total += bucket[1]["damageObservations"].as_u64().expect("count");
        assert!(bucket[1]["costTotal"].as_f64().is_some());
        assert!(bucket[1]["atks"].as_u64().is_some());
    }
    assert_eq!(total, 4000);
}

#[test]
fn simulate_endpoint_uses_default_iterations() {
    let body = r#"{"setup":{"attack":"1d20","damage":"1d6","versus":"10"}}"#;
    let response = route_request(&state(), "POST", "/api/simulate", body);
    assert_eq!(response.status_code, 200, "{}", response.body);
    let payload: serde_json::Value = serde_json::from_str(&response.body).expect("json");
    assert_eq!(payload["numTrials"], 2000);
}

#[test]
fn simulate_endpoint_rejects_invalid_json() {
    let response = route_request(&state(), "POST", "/api/simulate", "{not json");
    assert_eq!(response.status_code, 400);
    assert!(response.body.contains("Invalid request body"));
}

#[test]
fn simulate_endpoint_reports_validation_errors() {
    let body = r#"{"itersRequested":0,"setup":{"attack":"","damage":"1d6","versus":"10"}}"#;
    let response = route_request(&state(), "POST", "/api/simulate", body);
    assert_eq!(response.status_code, 400);

    let payload: serde_json::Value = serde_json::from_str(&response.body).expect("json");
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["message"], "Validation failed");
    let fields: Vec<&str> = payload["errors"]
        .as_array()
        .expect("errors array")
        .iter()
        .filter_map(|issue| issue["field"].as_str())
        .collect();
    assert_eq!(fields, vec!["setup.attack", "itersRequested"]);
}

#[test]
fn simulate_endpoint_rejects_too_many_iterations() {
    let body = r#"{"itersRequested":50001,"setup":{"attack":"1d20","damage":"1d6","versus":"10"}}"#;
    let response = route_request(&state(), "POST", "/api/simulate", body);
    assert_eq!(response.status_code, 400);
    assert!(response.body.contains("itersRequested"));
}

#[test]
fn simulate_endpoint_surfaces_expression_errors() {
    let body = r#"{"itersRequested":10,"setup":{"attack":"1d20%%X=Y","damage":"1d6","versus":"10"}}"#;
    let response = route_request(&state(), "POST", "/api/simulate", body);
    assert_eq!(response.status_code, 422);
    assert!(response.body.contains("unknown variable"), "{}", response.body);
}

#[test]
fn exact_endpoint_returns_probabilities() {
    let body = r#"{"dice":{"n":2,"s":6,"modifier":0},"numAttacks":2,"pHit":0.5}"#;
    let response = route_request(&state(), "POST", "/api/exact", body);
    assert_eq!(response.status_code, 200, "{}", response.body);

    let payload: serde_json::Value = serde_json::from_str(&response.body).expect("json");
    let probabilities = payload["probabilities"].as_array().expect("array");
    let total: f64 = probabilities
        .iter()
        .map(|pair| pair[1].as_f64().expect("probability"))
        .sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert_eq!(probabilities[0][0], 0);
    assert!((probabilities[0][1].as_f64().expect("p") - 0.25).abs() < 1e-12);
    assert!((payload["mean"].as_f64().expect("mean") - 7.0).abs() < 1e-9);
}

#[test]
fn exact_endpoint_derives_hit_chance_from_check() {
    let body = r#"{"dice":{"n":1,"s":8,"modifier":2},"check":{"bonus":5,"armorClass":15,"advantage":"advantage"}}"#;
    let response = route_request(&state(), "POST", "/api/exact", body);
    assert_eq!(response.status_code, 200, "{}", response.body);
    let payload: serde_json::Value = serde_json::from_str(&response.body).expect("json");
    assert!((payload["pHit"].as_f64().expect("pHit") - 0.75).abs() < 1e-12);
    assert!(payload["hitChance"]["critical"].as_f64().is_some());
}

#[test]
fn exact_endpoint_rejects_zero_sided_dice() {
    let body = r#"{"dice":{"n":2,"s":0},"pHit":0.5}"#;
    let response = route_request(&state(), "POST", "/api/exact", body);
    assert_eq!(response.status_code, 400);
}

#[test]
fn unknown_routes_and_methods() {
    let state = state();
    assert_eq!(route_request(&state, "GET", "/nope", "").status_code, 404);
    assert_eq!(route_request(&state, "GET", "/api/simulate", "").status_code, 405);
}
