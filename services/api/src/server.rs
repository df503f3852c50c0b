use crate::cli::ServeArgs;
use crate::infra::{in_memory_service, load_engine, AppState};
use crate::routes::with_engagement_routes;
use crate::scheduler::spawn_decay_scheduler;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use outreach_engine::config::AppConfig;
use outreach_engine::engagement::CancellationToken;
use outreach_engine::error::AppError;
use outreach_engine::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let engine = load_engine(&config.engine)?;
    info!(
        policy_version = %engine.policy().version,
        decay_after_days = engine.policy().decay_after_days,
        "scoring engine initialised"
    );
    let engagement_service = Arc::new(in_memory_service(
        engine,
        config.engine.max_write_attempts,
    ));

    let cancel = CancellationToken::new();
    let scheduler = spawn_decay_scheduler(
        engagement_service.clone(),
        config.engine.sweep_interval,
        cancel.clone(),
    );

    let app = with_engagement_routes(engagement_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "outreach engagement engine ready");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    readiness_flag.store(false, Ordering::Release);
    cancel.cancel();
    scheduler.abort();
    info!("outreach engagement engine stopped");

    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
