// 远端会话管理
//
// 为可信的系统账号建立唯一的已认证会话，所有特权远端调用共用

use crate::config::FoldersConfig;
use crate::oauth::{EndpointKind, Issuer, IssuerProvider, TokenSource};
use crate::remote::{
    ConfigurationError, OcsClient, SharingAdapter, WebdavClient, WebdavEndpoint, WebdavTransport,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// 文件浏览页路径模板
const FILES_BROWSER_PATH: &str = "index.php/apps/files/?dir=";

/// 已认证的远端会话（构建后不可变）
pub struct RemoteSession {
    issuer: Issuer,
    tokens: Arc<dyn TokenSource>,
    webdav_endpoint: WebdavEndpoint,
    webdav: Arc<dyn WebdavTransport>,
    sharing: Arc<dyn SharingAdapter>,
}

impl RemoteSession {
    /// 由已构建好的各部分组装会话
    pub fn from_parts(
        issuer: Issuer,
        tokens: Arc<dyn TokenSource>,
        webdav_endpoint: WebdavEndpoint,
        webdav: Arc<dyn WebdavTransport>,
        sharing: Arc<dyn SharingAdapter>,
    ) -> Self {
        Self {
            issuer,
            tokens,
            webdav_endpoint,
            webdav,
            sharing,
        }
    }

    pub fn issuer(&self) -> &Issuer {
        &self.issuer
    }

    pub fn tokens(&self) -> &Arc<dyn TokenSource> {
        &self.tokens
    }

    pub fn webdav_endpoint(&self) -> &WebdavEndpoint {
        &self.webdav_endpoint
    }

    pub fn webdav(&self) -> &dyn WebdavTransport {
        self.webdav.as_ref()
    }

    pub fn sharing(&self) -> &dyn SharingAdapter {
        self.sharing.as_ref()
    }

    /// 远端服务根地址（以 / 结尾）
    pub fn base_url(&self) -> &str {
        &self.issuer.base_url
    }

    /// 生成用户可直接打开的文件夹链接
    pub fn files_link(&self, folder_name: &str) -> String {
        format!(
            "{}{}{}",
            self.base_url(),
            FILES_BROWSER_PATH,
            urlencoding::encode(folder_name.trim_matches('/'))
        )
    }
}

/// issuer 可用性检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuerStatus {
    /// 尚未选择 issuer
    Unconfigured,
    /// 可用
    Valid,
    /// 缺少必需端点
    MissingEndpoints(Vec<EndpointKind>),
    /// 端点齐全但未连接系统账号
    NotConnected,
}

impl IssuerStatus {
    /// 面向管理员的提示
    pub fn message(&self, issuer_name: &str) -> String {
        match self {
            IssuerStatus::Unconfigured => {
                "You have not selected an ownCloud server as the OAuth 2 issuer yet.".to_string()
            }
            IssuerStatus::Valid => {
                format!("Currently the {} issuer is valid and active.", issuer_name)
            }
            IssuerStatus::MissingEndpoints(_) => format!(
                "Currently the {} issuer is active, however it does not implement all necessary endpoints. \
                 The repository will not work. Please choose a valid issuer.",
                issuer_name
            ),
            IssuerStatus::NotConnected => format!(
                "Currently the valid {} issuer is active, but no system account is connected. \
                 The repository will not work. Please connect a system account.",
                issuer_name
            ),
        }
    }
}

/// 会话管理器
pub struct SessionManager<'a> {
    config: &'a FoldersConfig,
    provider: &'a dyn IssuerProvider,
}

impl<'a> SessionManager<'a> {
    pub fn new(config: &'a FoldersConfig, provider: &'a dyn IssuerProvider) -> Self {
        Self { config, provider }
    }

    /// 检查 issuer 是否满足协作文件夹的要求
    pub fn validate_issuer(issuer: Option<&Issuer>) -> IssuerStatus {
        let Some(issuer) = issuer else {
            return IssuerStatus::Unconfigured;
        };

        let missing = issuer.missing_endpoints();
        if !missing.is_empty() {
            return IssuerStatus::MissingEndpoints(missing);
        }

        if !issuer.system_account_connected() {
            return IssuerStatus::NotConnected;
        }

        IssuerStatus::Valid
    }

    /// 解析选中的 issuer（不换取令牌）
    pub async fn selected_issuer(&self) -> Result<Issuer, ConfigurationError> {
        let issuer_id = self
            .config
            .issuer_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ConfigurationError::NoIssuer)?;

        match self.provider.get_issuer(issuer_id).await {
            Ok(Some(issuer)) => Ok(issuer),
            Ok(None) => {
                warn!("issuer 已不存在: {}", issuer_id);
                Err(ConfigurationError::IssuerNotFound(issuer_id.to_string()))
            }
            Err(e) => {
                warn!("查询 issuer 失败: {}, 错误: {:#}", issuer_id, e);
                Err(ConfigurationError::IssuerNotFound(issuer_id.to_string()))
            }
        }
    }

    /// 建立系统会话
    ///
    /// 任何一步配置不完整都会立即失败，不做远端文件或分享操作
    pub async fn acquire(&self) -> Result<RemoteSession, ConfigurationError> {
        let issuer = self.selected_issuer().await?;

        if !issuer.system_account_connected() {
            return Err(ConfigurationError::SystemAccountNotConnected(
                issuer.id.clone(),
            ));
        }

        let tokens = match self.provider.system_client(&issuer).await {
            Ok(Some(tokens)) => tokens,
            Ok(None) => return Err(ConfigurationError::NoSystemClient),
            Err(e) => {
                error!("系统账号换取令牌失败: issuer={}, 错误: {:#}", issuer.id, e);
                return Err(ConfigurationError::TokenExchange(format!("{:#}", e)));
            }
        };

        let webdav_url = issuer
            .endpoint_url(EndpointKind::Webdav)
            .ok_or(ConfigurationError::MissingEndpoint(EndpointKind::Webdav))?;
        let webdav_endpoint = WebdavEndpoint::parse(webdav_url)?;

        let ocs_url = issuer
            .endpoint_url(EndpointKind::Ocs)
            .ok_or(ConfigurationError::MissingEndpoint(EndpointKind::Ocs))?
            .to_string();

        let http = Client::builder()
            .timeout(Duration::from_secs(self.config.http_timeout_secs))
            .build()
            .map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;

        let webdav = WebdavClient::new(http.clone(), webdav_endpoint.clone(), Arc::clone(&tokens));
        let sharing = OcsClient::new(http, &ocs_url, Arc::clone(&tokens));

        info!(
            "远端会话已建立: issuer={}, webdav={}{}:{}{}",
            issuer.id,
            webdav_endpoint.transport.marker(),
            webdav_endpoint.host,
            webdav_endpoint.port,
            webdav_endpoint.base_path
        );

        Ok(RemoteSession::from_parts(
            issuer,
            tokens,
            webdav_endpoint,
            Arc::new(webdav),
            Arc::new(sharing),
        ))
    }
}
