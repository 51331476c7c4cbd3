use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "streambuf", about = "Durable record buffer in front of a stream ingestion API")]
pub struct Cli {
    /// Path to TOML configuration file.
    #[arg(long, global = true, default_value = "streambuf.toml", env = "STREAMBUF_CONFIG")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Buffer NDJSON records from stdin and flush them on a timer.
    Run,
    /// Flush buffered records once.
    Flush,
    /// Delete every buffered record.
    Clear,
    /// Print the number of buffered records and their size.
    Status,
}
