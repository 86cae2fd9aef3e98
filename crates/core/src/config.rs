//! 应用配置
//!
//! 配置从TOML文件加载，环境变量（前缀 CRONJOBD，分隔符 __）可以覆盖
//! 文件中的任意字段，全部字段都有默认值。

use serde::{Deserialize, Serialize};

use crate::errors::{SchedulerError, SchedulerResult};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub executor: ExecutorConfig,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 连接串，postgres:// 或 sqlite:// 开头
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_seconds: u64,
}

/// HTTP服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub cors_enabled: bool,
}

/// 任务执行配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// 单次执行的墙钟时间上限（秒）
    pub timeout_seconds: u64,
    /// stdout+stderr合计捕获上限（字节）
    pub max_output_bytes: u64,
    /// 上一次执行未结束时是否跳过本次触发
    pub skip_if_running: bool,
    /// 关闭时是否等待仍在执行中的任务
    pub wait_for_running: bool,
    /// 等待执行中任务的最长时间（秒）
    pub shutdown_grace_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://cronjobd.db".to_string(),
            max_connections: 20,
            connect_timeout_seconds: 10,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            cors_enabled: true,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 300,
            max_output_bytes: 10 * 1024 * 1024,
            skip_if_running: false,
            wait_for_running: false,
            shutdown_grace_seconds: 30,
        }
    }
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 配置文件缺失时使用默认值，环境变量示例：
    /// `CRONJOBD_DATABASE__URL=postgres://...`
    pub fn load(config_path: Option<&str>) -> SchedulerResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("CRONJOBD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| SchedulerError::Configuration(format!("加载配置失败: {e}")))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| SchedulerError::Configuration(format!("解析配置失败: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// 校验配置的合法性
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.database.url.is_empty() {
            return Err(SchedulerError::Configuration(
                "database.url 不能为空".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(SchedulerError::Configuration(
                "database.max_connections 必须大于0".to_string(),
            ));
        }
        if self.executor.timeout_seconds == 0 {
            return Err(SchedulerError::Configuration(
                "executor.timeout_seconds 必须大于0".to_string(),
            ));
        }
        if self.executor.max_output_bytes == 0 {
            return Err(SchedulerError::Configuration(
                "executor.max_output_bytes 必须大于0".to_string(),
            ));
        }
        self.server
            .bind_address
            .parse::<std::net::SocketAddr>()
            .map_err(|e| {
                SchedulerError::Configuration(format!(
                    "server.bind_address 无效: {} - {e}",
                    self.server.bind_address
                ))
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.executor.timeout_seconds, 300);
        assert_eq!(config.executor.max_output_bytes, 10 * 1024 * 1024);
        assert!(!config.executor.skip_if_running);
        assert!(!config.executor.wait_for_running);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load(Some("config/definitely-not-there.toml")).unwrap();
        assert_eq!(config.database.max_connections, 20);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.executor.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.bind_address = "not-an-address".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.database.url = String::new();
        assert!(config.validate().is_err());
    }
}
