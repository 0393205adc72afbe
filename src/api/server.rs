use axum::{
    routing::{get, post},
    Router,
};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    trace::{Sampler, SdkTracerProvider},
    Resource,
};
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::api::handlers::{health_check, register_beneficiary_handler};
use crate::config::AppConfig;
use crate::crypto::{FieldEncryptor, KmsEncryptor};
use crate::db::connection::{create_pool, run_migrations, with_sslmode};
use crate::db::postgres::PgRegistrationStore;
use crate::db::store::RegistrationStore;
use crate::domain::Registrar;

const SERVICE_NAME: &str = "youth-card-registry";

/// Shared handler state. Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub registrar: Registrar,
    pub expose_error_details: bool,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        encryptor: Arc<dyn FieldEncryptor>,
        config: &AppConfig,
    ) -> Self {
        Self {
            registrar: Registrar::new(store, encryptor)
                .with_max_attempts(config.registration_max_attempts),
            expose_error_details: config.expose_error_details,
        }
    }
}

pub fn init_tracing() {
    let is_lambda = env::var("AWS_LAMBDA_FUNCTION_NAME").is_ok();

    let enable_otel = env::var("OTEL_ENABLED")
        .unwrap_or_else(|_| if is_lambda { "true" } else { "false" }.to_string())
        == "true";

    let otel_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT").unwrap_or_else(|_| {
        if is_lambda {
            "http://127.0.0.1:4318/v1/traces".to_string()
        } else {
            "http://localhost:4318/v1/traces".to_string()
        }
    });

    // JSON for CloudWatch; span close events only when not exporting spans
    let fmt_layer = fmt::layer()
        .json()
        .with_target(false)
        .with_span_events(if enable_otel {
            fmt::format::FmtSpan::NONE
        } else {
            fmt::format::FmtSpan::CLOSE
        });

    let subscriber = tracing_subscriber::registry().with(fmt_layer).with(
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn,tower=warn,h2=error")),
    );

    if !enable_otel {
        subscriber.init();
        return;
    }

    match init_opentelemetry(&otel_endpoint) {
        Ok(provider) => {
            opentelemetry::global::set_tracer_provider(provider.clone());
            let tracer = provider.tracer(SERVICE_NAME);

            subscriber.with(OpenTelemetryLayer::new(tracer)).init();
            info!("OpenTelemetry enabled: {}", otel_endpoint);
        }
        Err(e) => {
            subscriber.init();
            tracing::error!("Failed to initialize OpenTelemetry: {}. Continuing with logs only.", e);
        }
    }
}

fn init_opentelemetry(endpoint: &str) -> Result<SdkTracerProvider, Box<dyn std::error::Error>> {
    let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
    let service_name = env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| SERVICE_NAME.to_string());

    let sampling_rate = env::var("OTEL_TRACE_SAMPLING_RATE")
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.05)
        .clamp(0.0, 1.0);

    let resource = Resource::builder()
        .with_attribute(KeyValue::new("service.name", service_name))
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .with_attribute(KeyValue::new("deployment.environment", environment))
        .build();

    let exporter = SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(Sampler::TraceIdRatioBased(sampling_rate))
        .with_batch_exporter(exporter)
        .build();

    info!("OpenTelemetry sampling rate: {}%", sampling_rate * 100.0);
    Ok(provider)
}

/// Routes over an already-built state
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/registro", post(register_beneficiary_handler))
        .route("/v1/beneficiaries", post(register_beneficiary_handler))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Build the app from the environment: database credentials, pool, KMS client
pub async fn create_app() -> Result<Router, Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::from_env()?;
    create_app_from_config(&config).await
}

pub async fn create_app_from_config(
    config: &AppConfig,
) -> Result<Router, Box<dyn std::error::Error + Send + Sync>> {
    let database_url = crate::secrets::resolve_database_url(config).await?;
    let pool = create_pool(&with_sslmode(&database_url, &config.db_sslmode)).await?;

    if config.run_migrations {
        run_migrations(&pool).await?;
    }

    let store: Arc<dyn RegistrationStore> = Arc::new(PgRegistrationStore::new(pool));
    let encryptor: Arc<dyn FieldEncryptor> = Arc::new(KmsEncryptor::from_env(config.kms_key_id.clone()).await);

    Ok(build_router(AppState::new(store, encryptor, config)))
}

pub async fn run_server() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting youth card registry server");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutting down gracefully...");
    };

    let config = AppConfig::from_env()?;
    let app = create_app_from_config(&config)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
