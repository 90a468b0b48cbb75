#[tokio::main]
async fn main() -> linegpt::error::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("linegpt=info,tower_http=warn"),
    )
    .init();

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        log::debug!("A rustls crypto provider was already installed");
    }

    log::info!("Starting linegpt webhook relay");

    match linegpt::run().await {
        Ok(()) => {
            log::info!("Relay shut down successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Relay encountered an error: {}", e);
            Err(e)
        }
    }
}
