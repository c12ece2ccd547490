use artistos_lib::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    artistos_lib::init_tracing(config.log_dir.as_deref())?;
    artistos_lib::run(config).await?;
    Ok(())
}
