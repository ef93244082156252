//! 日志初始化
//!
//! 过滤规则优先读取环境变量 `EXAMIFY_LOG`，否则按 verbose 选择 debug / info。

use tracing_subscriber::EnvFilter;

/// 初始化全局日志（默认 info 级别）
pub fn init() {
    init_with(false);
}

/// 初始化全局日志
///
/// 重复调用不会报错（测试中会多次调用）。
pub fn init_with(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("EXAMIFY_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
