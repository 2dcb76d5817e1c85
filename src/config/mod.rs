// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 协作文件夹配置
    #[serde(default)]
    pub folders: FoldersConfig,
    /// 已登记的 OAuth2 issuer 列表
    #[serde(default)]
    pub issuers: Vec<IssuerConfig>,
    /// 持久化配置
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// 🔥 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 单个日志文件最大大小（字节，默认 20MB）
    #[serde(default = "default_log_max_file_size")]
    pub max_file_size: u64,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_file_size() -> u64 {
    20 * 1024 * 1024 // 20MB
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
            max_file_size: default_log_max_file_size(),
        }
    }
}

/// 协作文件夹配置
///
/// 对应插件设置页中的 issuer 选择，以及访问远端时的网络参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldersConfig {
    /// 选中的 issuer ID（为空表示尚未配置）
    #[serde(default)]
    pub issuer_id: Option<String>,
    /// HTTP 请求超时（秒）
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for FoldersConfig {
    fn default() -> Self {
        Self {
            issuer_id: None,
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// OAuth2 issuer 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerConfig {
    /// issuer 唯一标识
    pub id: String,
    /// 显示名称
    pub name: String,
    /// 远端服务根地址（如 https://cloud.example.com/）
    pub base_url: String,
    /// OAuth2 client id
    pub client_id: String,
    /// OAuth2 client secret
    #[serde(default)]
    pub client_secret: String,
    /// 各类端点地址
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    /// 系统账号（未连接时为空）
    #[serde(default)]
    pub system_account: Option<SystemAccountConfig>,
}

/// issuer 端点配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// OAuth2 token 端点
    #[serde(default)]
    pub token: Option<String>,
    /// WebDAV 端点（如 https://cloud.example.com/remote.php/webdav/）
    #[serde(default)]
    pub webdav: Option<String>,
    /// OCS 分享 API 端点（如 https://cloud.example.com/ocs/v1.php/apps/files_sharing/api/v1）
    #[serde(default)]
    pub ocs: Option<String>,
    /// 用户信息端点
    #[serde(default)]
    pub userinfo: Option<String>,
}

/// 系统账号配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemAccountConfig {
    /// 远端用户名
    pub username: String,
    /// 授权后保存的 refresh token
    pub refresh_token: String,
}

/// 持久化配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// 访问记录数据库路径
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/collaborativefolders.db")
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            folders: FoldersConfig::default(),
            issuers: Vec::new(),
            persistence: PersistenceConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("✓ 配置已保存: {}", path);
        Ok(())
    }

    /// 加载或创建默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {}", e);
                let default_config = Self::default();

                // 尝试保存默认配置，方便管理员补全 issuer 信息
                if let Err(e) = default_config.save_to_file(path).await {
                    tracing::error!("保存默认配置失败: {}", e);
                }

                default_config
            }
        }
    }

    /// 按 ID 查找 issuer 配置
    pub fn find_issuer(&self, id: &str) -> Option<&IssuerConfig> {
        self.issuers.iter().find(|issuer| issuer.id == id)
    }
}
