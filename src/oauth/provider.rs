// issuer 提供方

use crate::config::IssuerConfig;
use crate::oauth::{Issuer, OAuthSystemClient, RefreshTokenStore, TokenSource};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// issuer 查询与系统账号授权
#[async_trait]
pub trait IssuerProvider: Send + Sync {
    /// 按 ID 查找 issuer，不存在时返回 Ok(None)
    async fn get_issuer(&self, id: &str) -> Result<Option<Issuer>>;

    /// 获取系统账号的令牌来源
    ///
    /// 返回 Ok(None) 表示没有可用的客户端，Err 表示换取令牌时出错
    async fn system_client(&self, issuer: &Issuer) -> Result<Option<Arc<dyn TokenSource>>>;
}

/// 基于配置文件登记的 issuer 列表
pub struct ConfiguredIssuers {
    issuers: Vec<IssuerConfig>,
    http_timeout: Duration,
    /// 轮换后的 refresh token 写回位置
    token_store: Option<Arc<dyn RefreshTokenStore>>,
}

impl ConfiguredIssuers {
    pub fn new(issuers: Vec<IssuerConfig>, http_timeout: Duration) -> Self {
        Self {
            issuers,
            http_timeout,
            token_store: None,
        }
    }

    pub fn with_token_store(mut self, store: Arc<dyn RefreshTokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// 满足必需端点的 issuer 名称（供配置页提示）
    pub fn usable_issuer_names(&self) -> Vec<String> {
        self.issuers
            .iter()
            .map(Issuer::from_config)
            .filter(|issuer| issuer.missing_endpoints().is_empty())
            .map(|issuer| issuer.name)
            .collect()
    }
}

#[async_trait]
impl IssuerProvider for ConfiguredIssuers {
    async fn get_issuer(&self, id: &str) -> Result<Option<Issuer>> {
        Ok(self
            .issuers
            .iter()
            .find(|config| config.id == id)
            .map(Issuer::from_config))
    }

    async fn system_client(&self, issuer: &Issuer) -> Result<Option<Arc<dyn TokenSource>>> {
        let client =
            OAuthSystemClient::connect(issuer, self.http_timeout, self.token_store.clone()).await?;
        Ok(client.map(|c| Arc::new(c) as Arc<dyn TokenSource>))
    }
}
