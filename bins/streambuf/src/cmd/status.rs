use crate::error::CliError;

pub async fn run(config_path: &str) -> Result<(), CliError> {
    let engine = super::bootstrap(config_path)?;
    let client = engine.client();
    let limits = engine.config().limits();

    let count = client.count().await?;
    let size = client.cache_size().await?;
    println!("records:    {count}");
    println!("cache size: {size} / {} bytes", limits.max_bytes);
    Ok(())
}
