// 系统账号 OAuth2 客户端

use crate::oauth::{AccessToken, EndpointKind, Issuer, TokenResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// bearer token 来源
///
/// WebDAV / OCS 客户端在每次建立连接时向它索取令牌
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn bearer_token(&self) -> Result<String>;
}

/// refresh token 持久化
///
/// 远端在每次刷新时都可能轮换 refresh token，旧的随即失效，必须写回
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn save_refresh_token(&self, issuer_id: &str, refresh_token: &str) -> Result<()>;
}

/// 令牌缓存状态
struct TokenState {
    /// 当前 refresh token（远端可能在每次刷新时轮换）
    refresh_token: String,
    cached: Option<AccessToken>,
}

/// 系统账号客户端
///
/// 使用 refresh_token 授权方式换取访问令牌，并缓存到过期前
pub struct OAuthSystemClient {
    http: Client,
    issuer_id: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    state: Mutex<TokenState>,
    token_store: Option<Arc<dyn RefreshTokenStore>>,
}

impl OAuthSystemClient {
    /// 连接 issuer 的系统账号
    ///
    /// - 未连接系统账号：返回 Ok(None)
    /// - 首次换取令牌失败：返回 Err
    ///
    /// 远端轮换的 refresh token 通过 `token_store` 写回
    pub async fn connect(
        issuer: &Issuer,
        timeout: Duration,
        token_store: Option<Arc<dyn RefreshTokenStore>>,
    ) -> Result<Option<Self>> {
        let Some(account) = issuer.system_account() else {
            return Ok(None);
        };
        if account.refresh_token.is_empty() {
            return Ok(None);
        }

        let token_url = issuer
            .endpoint_url(EndpointKind::Token)
            .context("issuer 未配置 token 端点")?
            .to_string();

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let client = Self {
            http,
            issuer_id: issuer.id.clone(),
            token_url,
            client_id: issuer.client_id.clone(),
            client_secret: issuer.client_secret.clone(),
            state: Mutex::new(TokenState {
                refresh_token: account.refresh_token.clone(),
                cached: None,
            }),
            token_store,
        };

        // 立即换取一次令牌，失败即视为系统账号未授权
        client.bearer_token().await?;
        info!(
            "系统账号已连接: issuer={}, username={}",
            issuer.id, account.username
        );

        Ok(Some(client))
    }

    /// 当前使用的 refresh token
    pub async fn current_refresh_token(&self) -> String {
        self.state.lock().await.refresh_token.clone()
    }

    /// 使用 refresh token 换取新的访问令牌
    async fn exchange(&self, refresh_token: &str) -> Result<TokenResponse> {
        debug!("刷新系统账号令牌: url={}", self.token_url);

        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await
            .context("token 请求失败")?;

        let status = response.status();
        let body = response.text().await.context("读取 token 响应失败")?;

        if !status.is_success() {
            anyhow::bail!("token 端点返回错误: status={}, body={}", status, body);
        }

        serde_json::from_str(&body).context("解析 token 响应失败")
    }

    /// 写回轮换后的 refresh token；失败只记录日志，本进程继续使用新令牌
    async fn persist_rotated(&self, rotated: &str) {
        let Some(store) = &self.token_store else {
            warn!(
                "远端轮换了系统账号的 refresh token，但没有配置写回位置: issuer={}",
                self.issuer_id
            );
            return;
        };

        match store.save_refresh_token(&self.issuer_id, rotated).await {
            Ok(()) => info!("已写回轮换后的 refresh token: issuer={}", self.issuer_id),
            Err(e) => error!(
                "写回 refresh token 失败，下次启动将无法换取令牌: issuer={}, 错误: {:#}",
                self.issuer_id, e
            ),
        }
    }
}

#[async_trait]
impl TokenSource for OAuthSystemClient {
    async fn bearer_token(&self) -> Result<String> {
        let mut state = self.state.lock().await;

        if let Some(token) = state.cached.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.token.clone());
        }

        let response = self.exchange(&state.refresh_token).await?;
        if let Some(rotated) = response.refresh_token.clone() {
            if !rotated.is_empty() && rotated != state.refresh_token {
                self.persist_rotated(&rotated).await;
                state.refresh_token = rotated;
            }
        }

        let token = response.into_access_token();
        let bearer = token.token.clone();
        state.cached = Some(token);
        Ok(bearer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointsConfig, IssuerConfig, SystemAccountConfig};
    use crate::http_stub::HttpStub;
    use parking_lot::Mutex as SyncMutex;

    /// 记录写回的 refresh token
    #[derive(Default)]
    struct RecordingStore {
        saved: SyncMutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl RefreshTokenStore for RecordingStore {
        async fn save_refresh_token(&self, issuer_id: &str, refresh_token: &str) -> Result<()> {
            self.saved
                .lock()
                .push((issuer_id.to_string(), refresh_token.to_string()));
            Ok(())
        }
    }

    fn account(refresh_token: &str) -> SystemAccountConfig {
        SystemAccountConfig {
            username: "system".to_string(),
            refresh_token: refresh_token.to_string(),
        }
    }

    fn token_body(access: &str, expires_in: i64, refresh: &str) -> String {
        serde_json::json!({
            "access_token": access,
            "token_type": "Bearer",
            "expires_in": expires_in,
            "refresh_token": refresh,
            "user_id": "system"
        })
        .to_string()
    }

    fn issuer(system_account: Option<SystemAccountConfig>, token: Option<&str>) -> Issuer {
        Issuer::from_config(&IssuerConfig {
            id: "owncloud".to_string(),
            name: "ownCloud".to_string(),
            base_url: "https://cloud.example.com/".to_string(),
            client_id: "moodle".to_string(),
            client_secret: "secret".to_string(),
            endpoints: EndpointsConfig {
                token: token.map(str::to_string),
                ..Default::default()
            },
            system_account,
        })
    }

    #[tokio::test]
    async fn test_connect_without_system_account() {
        let issuer = issuer(None, Some("https://cloud.example.com/token"));
        let client = OAuthSystemClient::connect(&issuer, Duration::from_secs(1), None)
            .await
            .unwrap();
        assert!(client.is_none());
    }

    #[tokio::test]
    async fn test_connect_requires_token_endpoint() {
        let account = SystemAccountConfig {
            username: "system".to_string(),
            refresh_token: "refresh".to_string(),
        };
        let issuer = issuer(Some(account), None);
        let result = OAuthSystemClient::connect(&issuer, Duration::from_secs(1), None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_is_written_back() {
        // 第一个令牌立即过期，迫使第二次调用重新换取
        let stub = HttpStub::start(vec![
            (200, token_body("access-1", 0, "refresh-2")),
            (200, token_body("access-2", 3600, "refresh-3")),
        ])
        .await;
        let token_url = format!("{}/index.php/apps/oauth2/api/v1/token", stub.base_url());
        let issuer = issuer(Some(account("refresh-1")), Some(&token_url));
        let store = Arc::new(RecordingStore::default());

        let client = OAuthSystemClient::connect(
            &issuer,
            Duration::from_secs(5),
            Some(Arc::clone(&store) as Arc<dyn RefreshTokenStore>),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(client.current_refresh_token().await, "refresh-2");

        assert_eq!(client.bearer_token().await.unwrap(), "access-2");
        assert_eq!(client.current_refresh_token().await, "refresh-3");

        // 每次交换都使用上一次轮换得到的 refresh token
        let requests = stub.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].form()["grant_type"], "refresh_token");
        assert_eq!(requests[0].form()["refresh_token"], "refresh-1");
        assert_eq!(requests[1].form()["refresh_token"], "refresh-2");
        assert!(requests[0]
            .header("authorization")
            .unwrap()
            .starts_with("Basic "));

        assert_eq!(
            *store.saved.lock(),
            vec![
                ("owncloud".to_string(), "refresh-2".to_string()),
                ("owncloud".to_string(), "refresh-3".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_cached_token_skips_exchange() {
        let stub = HttpStub::start(vec![(200, token_body("access-1", 3600, "refresh-1"))]).await;
        let token_url = format!("{}/token", stub.base_url());
        let issuer = issuer(Some(account("refresh-1")), Some(&token_url));
        let store = Arc::new(RecordingStore::default());

        let client = OAuthSystemClient::connect(
            &issuer,
            Duration::from_secs(5),
            Some(Arc::clone(&store) as Arc<dyn RefreshTokenStore>),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(client.bearer_token().await.unwrap(), "access-1");
        assert_eq!(stub.requests().len(), 1);
        // 未轮换时不写回
        assert!(store.saved.lock().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_refresh_token_fails_connect() {
        let stub = HttpStub::start(vec![(400, r#"{"error":"invalid_grant"}"#.to_string())]).await;
        let token_url = format!("{}/token", stub.base_url());
        let issuer = issuer(Some(account("used-up")), Some(&token_url));

        let err = OAuthSystemClient::connect(&issuer, Duration::from_secs(5), None)
            .await
            .err()
            .unwrap();
        assert!(format!("{:#}", err).contains("invalid_grant"));
    }
}
