use anyhow::Result;
use examify_core::{logger, App, Config};
use std::path::Path;

const CONFIG_FILE: &str = "examify.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置：存在配置文件时优先使用
    let config = if Path::new(CONFIG_FILE).exists() {
        Config::from_toml_file(Path::new(CONFIG_FILE)).await?
    } else {
        Config::from_env()
    };

    // 初始化日志
    logger::init_with(config.verbose_logging);

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
