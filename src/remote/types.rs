// 远端访问模块类型定义

use crate::oauth::EndpointKind;
use reqwest::Url;
use thiserror::Error;

/// 配置错误
///
/// 只在建立系统会话时产生，调用方应中止当前流程并提示管理员
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("An error in the configuration of the OAuth 2 client occurred: no OAuth 2 issuer is selected")]
    NoIssuer,
    #[error("An error in the configuration of the OAuth 2 client occurred: issuer {0} does not exist anymore")]
    IssuerNotFound(String),
    #[error("An error in the configuration of the OAuth 2 client occurred: no system account is connected to issuer {0}")]
    SystemAccountNotConnected(String),
    #[error("An error in the configuration of the OAuth 2 client occurred: system account token exchange failed: {0}")]
    TokenExchange(String),
    #[error("The system account is not logged in or does not have authorisation in the remote system.")]
    NoSystemClient,
    #[error("An error in the configuration of the OAuth 2 client occurred: endpoint {0} not defined")]
    MissingEndpoint(EndpointKind),
    #[error("An error in the configuration of the OAuth 2 client occurred: endpoint {kind} is invalid ({url}): {reason}")]
    InvalidEndpoint {
        kind: EndpointKind,
        url: String,
        reason: String,
    },
    #[error("An error in the configuration of the OAuth 2 client occurred: {0}")]
    HttpClient(String),
}

/// 传输方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// 明文 HTTP
    Plain,
    /// TLS 加密
    Tls,
}

impl Transport {
    /// 套接字前缀标记（加密为 ssl://，明文为空）
    pub fn marker(&self) -> &'static str {
        match self {
            Transport::Plain => "",
            Transport::Tls => "ssl://",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Transport::Plain => 80,
            Transport::Tls => 443,
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Transport::Plain => "http",
            Transport::Tls => "https",
        }
    }
}

/// 解析后的 WebDAV 端点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebdavEndpoint {
    pub host: String,
    pub transport: Transport,
    pub port: u16,
    /// 服务端 WebDAV 根路径（不带结尾 /，根目录为空串）
    pub base_path: String,
}

impl WebdavEndpoint {
    /// 解析 WebDAV 端点地址
    ///
    /// 根据 scheme 推导传输方式和默认端口，URL 中显式指定的端口优先
    pub fn parse(url: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: &str| ConfigurationError::InvalidEndpoint {
            kind: EndpointKind::Webdav,
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;

        let transport = match parsed.scheme() {
            "https" => Transport::Tls,
            "http" => Transport::Plain,
            other => return Err(invalid(&format!("unsupported scheme {}", other))),
        };

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?
            .to_string();

        let port = parsed.port().unwrap_or_else(|| transport.default_port());
        let base_path = parsed.path().trim_end_matches('/').to_string();

        Ok(Self {
            host,
            transport,
            port,
            base_path,
        })
    }

    /// 服务端根地址（scheme://host:port）
    pub fn origin(&self) -> String {
        format!("{}://{}:{}", self.transport.scheme(), self.host, self.port)
    }

    /// 远端相对路径对应的完整 URL，路径各段会做百分号编码
    pub fn url_for(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();

        let mut url = format!("{}{}/{}", self.origin(), self.base_path, encoded.join("/"));
        if path.ends_with('/') && !encoded.is_empty() {
            url.push('/');
        }
        url
    }
}
