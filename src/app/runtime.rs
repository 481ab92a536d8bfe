use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};

use crate::adapters::api::{ApiState, configure_routes};
use crate::adapters::db::{open_connection, run_migrations};
use crate::adapters::device::HttpDeviceClient;
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::recorder::{SessionRecorder, SystemClock, start_recorder};
use crate::app::services::{SessionLogFilter, SqliteSessionService};
use crate::domain::report::SessionAggregator;

pub fn run(config: AppConfig) -> Result<(), AppError> {
    let mut connection = open_connection(&config.db_path).map_err(AppError::database_init)?;
    run_migrations(&mut connection).map_err(AppError::database_init)?;

    let session_service = SqliteSessionService::new(
        Arc::new(Mutex::new(connection)),
        SessionLogFilter {
            min_joules: config.session_min_joules,
            history_days: config.session_history_days,
        },
    );
    let api_state = ApiState {
        session_queries: session_service.clone(),
        aggregator: SessionAggregator::new(config.attribution),
    };

    let device = HttpDeviceClient::new(
        &config.device_url,
        Duration::from_millis(config.device_timeout_ms),
    )
    .map_err(AppError::runtime)?;
    let recorder = SessionRecorder::new(device, SystemClock, session_service);
    let stop_flag = Arc::new(AtomicBool::new(false));
    let recorder_handle = start_recorder(
        recorder,
        Duration::from_millis(config.poll_interval_ms),
        Arc::clone(&stop_flag),
    );

    tracing::info!(bind = %config.http_bind, "http server starting");

    let server_result = actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            App::new()
                .wrap(Cors::permissive())
                .app_data(web::Data::new(api_state.clone()))
                .configure(configure_routes)
        })
        .bind(&config.http_bind)?
        .run()
        .await
    });

    stop_flag.store(true, Ordering::Relaxed);
    if recorder_handle.join().is_err() {
        return Err(AppError::runtime("recorder thread panicked"));
    }

    server_result.map_err(AppError::runtime)
}
