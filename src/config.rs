use crate::error::{AppError, AppResult, ConfigError};
use crate::services::exporter::DEFAULT_EXPORT_FILE_NAME;
use crate::services::repository::DEFAULT_EVENT_CAPACITY;
use crate::services::serializer::TextFormat;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// 程序配置文件
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 同时处理的文件数量
    pub max_concurrent_files: usize,
    /// 待处理 JSON 文件所在目录
    pub input_folder: String,
    /// 规范化后的 JSON 输出目录
    pub output_folder: String,
    /// 输出是否缩进
    pub pretty_json: bool,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 被拒绝文件的警告报告
    pub warn_file: String,
    /// 默认导出文件名
    pub export_file_name: String,
    /// 仓库事件通道容量
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_files: 8,
            input_folder: "input_json".to_string(),
            output_folder: "output_json".to_string(),
            pretty_json: true,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            warn_file: "warn.txt".to_string(),
            export_file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 读取 TOML 配置文件（缺省字段取默认值），再叠加环境变量
    pub async fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            AppError::Config(ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                source: e,
            })
        })?;
        Ok(config.with_env_overrides())
    }

    /// 输出格式
    pub fn text_format(&self) -> TextFormat {
        TextFormat::from_pretty(self.pretty_json)
    }

    fn with_env_overrides(self) -> Self {
        Self {
            max_concurrent_files: env_parse("MAX_CONCURRENT_FILES", "usize").unwrap_or(self.max_concurrent_files),
            input_folder: std::env::var("INPUT_FOLDER").unwrap_or(self.input_folder),
            output_folder: std::env::var("OUTPUT_FOLDER").unwrap_or(self.output_folder),
            pretty_json: env_parse("PRETTY_JSON", "bool").unwrap_or(self.pretty_json),
            verbose_logging: env_parse("VERBOSE_LOGGING", "bool").unwrap_or(self.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
            warn_file: std::env::var("WARN_FILE").unwrap_or(self.warn_file),
            export_file_name: std::env::var("EXPORT_FILE_NAME").unwrap_or(self.export_file_name),
            event_capacity: env_parse("EVENT_CAPACITY", "usize").unwrap_or(self.event_capacity),
        }
    }
}

// 解析失败时记录警告并回退到原值
fn env_parse<T: FromStr>(var_name: &str, expected_type: &str) -> Option<T> {
    let value = std::env::var(var_name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(
                "{}",
                ConfigError::EnvVarParseFailed {
                    var_name: var_name.to_string(),
                    value,
                    expected_type: expected_type.to_string(),
                }
            );
            None
        }
    }
}
