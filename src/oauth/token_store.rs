// 把轮换后的系统账号 refresh token 写回配置文件

use crate::config::AppConfig;
use crate::oauth::RefreshTokenStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// 基于 `config/app.toml` 的 refresh token 存储
pub struct ConfigFileTokenStore {
    path: String,
    /// 串行化配置文件的读-改-写
    write_lock: Mutex<()>,
}

impl ConfigFileTokenStore {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl RefreshTokenStore for ConfigFileTokenStore {
    async fn save_refresh_token(&self, issuer_id: &str, refresh_token: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut config = AppConfig::load_from_file(&self.path).await?;
        let account = config
            .issuers
            .iter_mut()
            .find(|issuer| issuer.id == issuer_id)
            .with_context(|| format!("配置中不存在 issuer: {}", issuer_id))?
            .system_account
            .as_mut()
            .with_context(|| format!("issuer 未连接系统账号: {}", issuer_id))?;

        account.refresh_token = refresh_token.to_string();
        config.save_to_file(&self.path).await
    }
}
