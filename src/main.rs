use ledis::config::Config;
use ledis::server;
use ledis::store::Store;
use tracing::info;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::from_args(&args);
    info!(
        "starting with {} shards, sample rate {}, rest period {:?}",
        config.shards.next_power_of_two(),
        config.evict_sample_rate,
        config.sweep_rest_period
    );

    let store = Store::new(&config);
    server::run_server(store, config).await
}
