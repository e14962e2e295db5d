//! Decodes a transaction envelope and prints it as JSON.
//!
//!   decode_tx <base64-or-hex envelope>
//!   decode_tx --hash <tx hash> [mainnet|testnet]

use babylon_indexer::{
    blockchain::client::{ChainClient, CometClient},
    config::Config,
    decoder,
    models::Network,
    validation::{parse_envelope_input, validate_network, validate_tx_hash},
};
use tracing::{error, info, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let result = match args.first().map(String::as_str) {
        Some("--hash") => {
            let hash = validate_tx_hash(args.get(1).map(String::as_str).unwrap_or_default())?;
            let network = match args.get(2) {
                Some(n) => validate_network(n)?,
                None => Network::Mainnet,
            };

            let config = Config::from_env()?;
            let network_config = config
                .network(network)
                .ok_or_else(|| format!("{} is not configured", network))?;
            let client = CometClient::new(&network_config.rpc_url, &config.rpc)?;

            info!("Fetching {} from {}", hash, network);
            let tx = client.raw_transaction(&hash).await?;
            info!("✅ Found at height {} (code {:?})", tx.height, tx.code);
            decoder::decode_base64(&tx.tx)
        }
        Some(input) => decoder::decode(&parse_envelope_input(input)?),
        None => {
            error!("usage: decode_tx <envelope> | decode_tx --hash <hash> [network]");
            std::process::exit(2);
        }
    };

    if let Some(err) = &result.error {
        error!("❌ {}", err);
    } else {
        info!("✅ Decoded {} message(s)", result.messages.len());
    }
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
