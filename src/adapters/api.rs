use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpResponse, Responder, get, web};
use chrono::Utc;
use serde::Deserialize;

use crate::app::services::{ServiceError, SessionQueryHandler, SqliteSessionService};
use crate::domain::aggregation::AttributionPolicy;
use crate::domain::report::{SessionAggregator, SessionReport};

pub const CSV_FILE_NAME: &str = "openeo_session_data.csv";

#[derive(Clone)]
pub struct ApiState {
    pub session_queries: SqliteSessionService,
    pub aggregator: SessionAggregator,
}

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    pub policy: Option<AttributionPolicy>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(get_session_data_endpoint)
        .service(list_sessions_endpoint)
        .service(session_chart_endpoint)
        .service(export_sessions_csv_endpoint);
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[get("/getsessiondata")]
async fn get_session_data_endpoint(state: web::Data<ApiState>) -> impl Responder {
    match state.session_queries.list_session_rows(Utc::now()) {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(error) => service_error_response(error),
    }
}

#[get("/sessions")]
async fn list_sessions_endpoint(state: web::Data<ApiState>) -> impl Responder {
    match build_report(&state, state.aggregator) {
        Ok(report) => HttpResponse::Ok().json(report.table_rows()),
        Err(error) => service_error_response(error),
    }
}

#[get("/sessions/chart")]
async fn session_chart_endpoint(
    state: web::Data<ApiState>,
    query: web::Query<ChartQuery>,
) -> impl Responder {
    let aggregator = query
        .policy
        .map(SessionAggregator::new)
        .unwrap_or(state.aggregator);

    match build_report(&state, aggregator) {
        Ok(report) => HttpResponse::Ok().json(report.charts),
        Err(error) => service_error_response(error),
    }
}

#[get("/sessions/export.csv")]
async fn export_sessions_csv_endpoint(state: web::Data<ApiState>) -> impl Responder {
    match build_report(&state, state.aggregator) {
        Ok(report) => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .insert_header(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(CSV_FILE_NAME.to_string())],
            })
            .body(report.to_csv()),
        Err(error) => service_error_response(error),
    }
}

fn build_report(
    state: &ApiState,
    aggregator: SessionAggregator,
) -> Result<SessionReport, ServiceError> {
    let now = Utc::now();
    let rows = state.session_queries.list_session_rows(now)?;
    Ok(aggregator.build(rows, now))
}

fn service_error_response(error: ServiceError) -> HttpResponse {
    tracing::warn!(error = %error, "session query failed");
    match error {
        ServiceError::DbLockPoisoned => {
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "database lock poisoned"
            }))
        }
        ServiceError::Database(error) => {
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("database query failed: {error}")
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use actix_web::{App, body::to_bytes, http::StatusCode, test, web};
    use chrono::Utc;
    use rusqlite::Connection;
    use tempfile::TempDir;

    use crate::adapters::db::upsert_session_row;
    use crate::app::services::{SessionLogFilter, SqliteSessionService};
    use crate::domain::report::SessionAggregator;
    use crate::domain::session_log::RawSessionRecord;
    use crate::test_support::open_test_connection;

    use super::{ApiState, configure_routes};

    const DAY: i64 = 86_400;

    fn build_state_with_migrated_db(
        name: &str,
    ) -> (TempDir, ApiState, Arc<Mutex<Connection>>) {
        let (dir, connection) = open_test_connection(name);
        let shared_connection = Arc::new(Mutex::new(connection));

        (
            dir,
            ApiState {
                session_queries: SqliteSessionService::new(
                    Arc::clone(&shared_connection),
                    SessionLogFilter::default(),
                ),
                aggregator: SessionAggregator::default(),
            },
            shared_connection,
        )
    }

    /// A two-day session that started yesterday 22:00 UTC and delivered 3 kWh, 1 kWh
    /// of it before midnight.
    fn seed_overnight_session(connection: &Arc<Mutex<Connection>>) -> i64 {
        let today = Utc::now().timestamp().div_euclid(DAY) * DAY;
        let first = today - 2 * 3_600;
        let db = connection.lock().expect("lock should be available");
        upsert_session_row(
            &db,
            &RawSessionRecord {
                first_timestamp: first,
                day_timestamp: today - DAY,
                last_timestamp: today,
                joules: 3_600_000.0,
                seconds_charged: 7_200.0,
            },
        )
        .expect("insert should succeed");
        upsert_session_row(
            &db,
            &RawSessionRecord {
                first_timestamp: first,
                day_timestamp: today,
                last_timestamp: today + 3_600,
                joules: 10_800_000.0,
                seconds_charged: 10_800.0,
            },
        )
        .expect("insert should succeed");
        first
    }

    async fn get_json(state: ApiState, uri: &str) -> (StatusCode, serde_json::Value) {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        let body = to_bytes(resp.into_body())
            .await
            .expect("body should be readable");
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[actix_web::test]
    async fn health_endpoint_returns_ok() {
        let (_dir, state, _) = build_state_with_migrated_db("health.sqlite");

        let (status, json) = get_json(state, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[actix_web::test]
    async fn session_data_returns_stored_raw_rows() {
        let (_dir, state, connection) = build_state_with_migrated_db("raw-rows-api.sqlite");
        let first = seed_overnight_session(&connection);

        let (status, json) = get_json(state, "/getsessiondata").await;

        assert_eq!(status, StatusCode::OK);
        let items = json.as_array().expect("response should be an array");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["first_timestamp"], first);
        assert_eq!(items[1]["joules"], 10_800_000.0);
    }

    #[actix_web::test]
    async fn sessions_endpoint_returns_merged_table_rows() {
        let (_dir, state, connection) = build_state_with_migrated_db("sessions-api.sqlite");
        let first = seed_overnight_session(&connection);

        let (status, json) = get_json(state, "/sessions").await;

        assert_eq!(status, StatusCode::OK);
        let items = json.as_array().expect("response should be an array");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["firstTimestamp"], first);
        assert_eq!(items[0]["kwh"], "3 kWh");
        assert_eq!(items[0]["duration"], 180);
        assert_eq!(items[0]["averagePowerKw"], 1.0);
    }

    #[actix_web::test]
    async fn chart_endpoint_returns_zero_filled_windows_when_empty() {
        let (_dir, state, _) = build_state_with_migrated_db("chart-empty-api.sqlite");

        let (status, json) = get_json(state, "/sessions/chart").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["daily"]["labels"].as_array().map(Vec::len), Some(7));
        assert_eq!(json["weekly"]["values"].as_array().map(Vec::len), Some(4));
        assert_eq!(json["monthly"]["values"][3], 0.0);
    }

    #[actix_web::test]
    async fn chart_endpoint_honours_policy_query() {
        let (_dir, state, connection) = build_state_with_migrated_db("chart-policy-api.sqlite");
        seed_overnight_session(&connection);

        let (status, json) = get_json(state, "/sessions/chart?policy=start").await;

        assert_eq!(status, StatusCode::OK);
        let daily = json["daily"]["values"]
            .as_array()
            .expect("daily values should be an array");
        let total: f64 = daily.iter().filter_map(serde_json::Value::as_f64).sum();
        assert!((total - 3.0).abs() < 1e-9);
    }

    #[actix_web::test]
    async fn chart_endpoint_rejects_unknown_policy() {
        let (_dir, state, _) = build_state_with_migrated_db("chart-bad-policy-api.sqlite");

        let (status, _) = get_json(state, "/sessions/chart?policy=guess").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn csv_export_is_an_attachment() {
        let (_dir, state, connection) = build_state_with_migrated_db("csv-api.sqlite");
        seed_overnight_session(&connection);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/sessions/export.csv")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let disposition = resp
            .headers()
            .get("content-disposition")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(disposition.contains("openeo_session_data.csv"));

        let body = to_bytes(resp.into_body())
            .await
            .expect("body should be readable");
        let text = String::from_utf8(body.to_vec()).expect("csv should be utf-8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("From,To,Connected Duration (Minutes)"));
        assert!(lines[1].ends_with(",180,3,180,1"));
    }
}
