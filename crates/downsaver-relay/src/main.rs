use downsaver_core::Config;

// Use mimalloc as the global allocator for lower fragmentation under large request bodies,
// especially when running on musl-based systems inside containers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    downsaver_relay::telemetry::init_tracing();

    let router = downsaver_relay::setup::initialize_app(config.clone())?;

    downsaver_relay::setup::server::start_server(&config, router).await?;

    Ok(())
}
