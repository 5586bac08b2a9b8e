use glitchrealm::backend::{
    start,
    utils::{config::GlitchConfig, error::BackendResult},
};
use log::LevelFilter;

#[tokio::main]
pub async fn main() -> BackendResult<()> {
    if std::env::args().collect::<Vec<_>>().get(1) == Some(&"--print-config".to_string()) {
        println!("{}", doku::to_toml::<GlitchConfig>());
        std::process::exit(0);
    }

    env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .filter_module("glitchrealm", LevelFilter::Debug)
        .init();

    let config = GlitchConfig::read()?;
    start(config, None, None).await?;
    Ok(())
}
