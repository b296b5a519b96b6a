//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const USER_JSON: &str = r#"{"id":1,"usuario":"admin","nombres":"Ada María","apellidos":"Lovelace Byron","correo":"ada@example.com","rol":"Administrador"}"#;

/// The binary with isolated state and the given API base URL.
pub fn libradmin(home: &Path, api_url: &str) -> Command {
    let mut cmd = cargo_bin_cmd!("libradmin");
    cmd.env("LIBRADMIN_HOME", home)
        .env("LIBRADMIN_API_URL", api_url)
        .env_remove("LIBRADMIN_LOG")
        .env_remove("LIBRADMIN_PASSWORD");
    cmd
}

/// Writes a signed-in session straight into the cookie jar.
pub fn seed_session(home: &Path) {
    let jar = json!({
        "token": {"value": "tok-1", "same_site": "Strict"},
        "userData": {"value": USER_JSON, "same_site": "Strict"}
    });
    fs::write(home.join("cookies.json"), jar.to_string()).unwrap();
}

pub fn cookies(home: &Path) -> Value {
    let raw = fs::read_to_string(home.join("cookies.json")).unwrap_or_default();
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(&raw).unwrap()
}

pub fn login_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "message": "Bienvenido admin",
        "data": {
            "token": "tok-1",
            "user": serde_json::from_str::<Value>(USER_JSON).unwrap()
        }
    }))
}

pub fn overdue_record(student_id: i64) -> Value {
    json!({
        "idEstudiante": student_id,
        "idLibro": 100 + student_id,
        "nombresEstudiante": format!("Estudiante{student_id} Segundo"),
        "apellidosEstudiante": "Pérez Gómez",
        "correoEstudiante": format!("s{student_id}@example.com"),
        "fechaPrestamo": "2026-09-01",
        "fechaDevolucion": "2026-09-15"
    })
}

/// Answers the overdue-loan fetch every protected command makes on entry.
pub async fn serve_overdue(server: &MockServer, records: Value) {
    Mock::given(method("GET"))
        .and(path("/library/loan/overdue"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(records))
        .mount(server)
        .await;
}
