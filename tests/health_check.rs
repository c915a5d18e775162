//! Integration tests for the server shell: health check and fallback routes

use std::sync::Arc;

use movie_api::configuration::{
    ApplicationSettings, Environment, JwtSettings, RevocationSettings, Settings,
};
use movie_api::startup::Application;
use movie_api::store::InMemoryUserStore;

async fn spawn_app() -> String {
    let settings = Settings {
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: Environment::Development,
        },
        jwt: JwtSettings {
            secret: "health-check-secret-at-least-32-characters".to_string(),
            issuer: "movie-api".to_string(),
            bearer_token_expiry: 600,
            refresh_token_expiry: 86400,
            long_expiry: 31_536_000,
        },
        revocation: RevocationSettings::default(),
        database: None,
    };

    let application = Application::build(settings, Arc::new(InMemoryUserStore::new()))
        .await
        .expect("Failed to build application");
    let port = application.port();
    let _ = tokio::spawn(application.run_until_stopped());

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app().await;

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "");
}

#[tokio::test]
async fn unknown_route_returns_404_in_error_shape() {
    let addr = spawn_app().await;

    let response = reqwest::Client::new()
        .get(&format!("{}/movies/42", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], true);
    assert_eq!(body["message"], "Not found");
}

#[tokio::test]
async fn non_json_body_returns_400_in_error_shape() {
    let addr = spawn_app().await;

    let response = reqwest::Client::new()
        .post(&format!("{}/user/register", addr))
        .header("Content-Type", "application/json")
        .body("email=m@x.com&password=pw")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(400, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], true);
    assert!(body["message"].is_string());
}
