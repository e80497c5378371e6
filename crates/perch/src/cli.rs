use clap::Parser;

/// Perch — reconciled REST view over an Ergo-style mempool.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Indexer backend base URL.
    #[arg(long, default_value = "http://127.0.0.1:9053", env = "PERCH_BACKEND_URL")]
    pub backend_url: String,

    /// Address to bind the API server to.
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,

    /// Port to listen on.
    #[arg(long, default_value = "3090")]
    pub port: u16,

    /// Per-request timeout towards the backend, in seconds.
    #[arg(long, default_value = "30")]
    pub request_timeout_secs: u64,

    /// Address network: "mainnet" or "testnet".
    #[arg(long, default_value = "mainnet", env = "PERCH_NETWORK")]
    pub network: String,
}
