use anyhow::Result;
use channel_digest::config::{init_logger, load_environment, Config};
use channel_digest::{build_rocket, create_app_state};
use log::error;

#[rocket::main]
async fn main() -> Result<()> {
    load_environment();
    init_logger();

    let config = Config::from_env()?;
    config.validate()?;

    let state = create_app_state(config).await?;
    if let Err(e) = build_rocket(state)?.launch().await {
        error!("Server stopped with an error: {e}");
        anyhow::bail!("failed to launch server: {e}");
    }
    Ok(())
}
