use crate::error::CliError;

pub async fn run(config_path: &str) -> Result<(), CliError> {
    let engine = super::bootstrap(config_path)?;
    let outcome = engine.client().flush().await?;
    println!("flushed {} records", outcome.records_flushed);
    Ok(())
}
