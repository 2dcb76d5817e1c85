// OAuth2 模块数据类型定义

use crate::config::{EndpointsConfig, IssuerConfig, SystemAccountConfig};
use serde::{Deserialize, Serialize};

/// token 提前过期的余量（秒），避免请求途中失效
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// issuer 端点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    Token,
    Webdav,
    Ocs,
    Userinfo,
}

impl EndpointKind {
    /// 协作文件夹必须具备的端点
    pub const REQUIRED: [EndpointKind; 2] = [EndpointKind::Webdav, EndpointKind::Ocs];

    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Token => "token",
            EndpointKind::Webdav => "webdav",
            EndpointKind::Ocs => "ocs",
            EndpointKind::Userinfo => "userinfo",
        }
    }
}

impl std::fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth2 issuer（远端服务的身份提供方 + 端点集合）
#[derive(Debug, Clone)]
pub struct Issuer {
    pub id: String,
    pub name: String,
    /// 远端服务根地址，保证以 / 结尾
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    endpoints: EndpointsConfig,
    system_account: Option<SystemAccountConfig>,
}

impl Issuer {
    pub fn from_config(config: &IssuerConfig) -> Self {
        let base_url = if config.base_url.ends_with('/') {
            config.base_url.clone()
        } else {
            format!("{}/", config.base_url)
        };

        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            base_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            endpoints: config.endpoints.clone(),
            system_account: config.system_account.clone(),
        }
    }

    /// 获取端点地址，未配置或为空时返回 None
    pub fn endpoint_url(&self, kind: EndpointKind) -> Option<&str> {
        let url = match kind {
            EndpointKind::Token => &self.endpoints.token,
            EndpointKind::Webdav => &self.endpoints.webdav,
            EndpointKind::Ocs => &self.endpoints.ocs,
            EndpointKind::Userinfo => &self.endpoints.userinfo,
        };
        url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    /// 缺失的必需端点
    pub fn missing_endpoints(&self) -> Vec<EndpointKind> {
        EndpointKind::REQUIRED
            .into_iter()
            .filter(|kind| self.endpoint_url(*kind).is_none())
            .collect()
    }

    /// 系统账号是否已连接（已保存 refresh token）
    pub fn system_account_connected(&self) -> bool {
        self.system_account
            .as_ref()
            .map(|account| !account.refresh_token.is_empty())
            .unwrap_or(false)
    }

    pub fn system_account(&self) -> Option<&SystemAccountConfig> {
        self.system_account.as_ref()
    }
}

/// 访问令牌
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// bearer token
    pub token: String,
    /// 过期时间戳（秒）
    pub expires_at: i64,
    /// token 声明中的远端账号 ID
    #[serde(default)]
    pub user_id: Option<String>,
}

impl AccessToken {
    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() + EXPIRY_LEEWAY_SECS >= self.expires_at
    }
}

/// token 端点响应
///
/// ownCloud 的 oauth2 应用会在响应中附带 user_id
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl TokenResponse {
    /// 转换为带绝对过期时间的令牌（缺省有效期 1 小时）
    pub fn into_access_token(self) -> AccessToken {
        let expires_in = self.expires_in.unwrap_or(3600);
        AccessToken {
            token: self.access_token,
            expires_at: chrono::Utc::now().timestamp() + expires_in,
            user_id: self.user_id,
        }
    }
}

/// 当前发起请求的终端用户
#[derive(Debug, Clone)]
pub struct UserSession {
    /// 本地用户 ID
    pub user_id: String,
    /// 用户自己在远端的访问令牌（未登录远端时为空）
    pub token: Option<AccessToken>,
}

impl UserSession {
    pub fn new(user_id: impl Into<String>, token: Option<AccessToken>) -> Self {
        Self {
            user_id: user_id.into(),
            token,
        }
    }

    /// 是否已登录远端（持有未过期的令牌）
    pub fn is_logged_in(&self) -> bool {
        self.token
            .as_ref()
            .map(|token| !token.is_expired())
            .unwrap_or(false)
    }

    /// 从令牌声明中解析远端账号 ID
    pub fn remote_user_id(&self) -> Option<&str> {
        if !self.is_logged_in() {
            return None;
        }
        self.token
            .as_ref()
            .and_then(|token| token.user_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}
