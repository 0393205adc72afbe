use youth_card_registry::api::server;

#[cfg(not(feature = "lambda"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    server::run_server().await
}

#[cfg(feature = "lambda")]
#[tokio::main]
async fn main() -> Result<(), lambda_http::Error> {
    server::init_tracing();

    let app = server::create_app()
        .await
        .map_err(|e| lambda_http::Error::from(e.to_string()))?;

    lambda_http::run(app).await
}
