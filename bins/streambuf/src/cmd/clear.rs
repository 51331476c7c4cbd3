use crate::error::CliError;

pub async fn run(config_path: &str) -> Result<(), CliError> {
    let engine = super::bootstrap(config_path)?;
    let outcome = engine.client().clear_cache().await?;
    println!("cleared {} records", outcome.records_cleared);
    Ok(())
}
