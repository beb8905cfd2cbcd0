pub mod collector;
pub mod config;
pub mod fetcher;
pub mod pagination;
pub mod proto;
pub mod query;
pub mod source;

use {
    collector::JsonlSink,
    config::Config,
    std::path::Path,
};

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let assets = config::load_assets(&config.assets_path)?;

    let source = source::build_source(
        &config.source,
        &config.rpc,
        config.source_params(assets.assets.clone()),
    )?;

    let height = collector::resolve_height(source.as_ref(), config.height).await?;
    let sink = JsonlSink::new(Path::new(&config.out_path), height)?;

    collector::collect(source.as_ref(), height, &assets.multipliers, &sink).await?;

    Ok(())
}
