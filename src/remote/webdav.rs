// WebDAV 适配器
//
// 只实现协作文件夹需要的两个操作：MKCOL 和 MOVE

use crate::oauth::TokenSource;
use crate::remote::WebdavEndpoint;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// WebDAV 传输层：负责建立连接
#[async_trait]
pub trait WebdavTransport: Send + Sync {
    /// 打开连接，失败表示套接字层面不可用
    async fn open(&self) -> Result<Box<dyn WebdavConnection>>;
}

/// 一次打开的 WebDAV 连接
///
/// 调用方在用完后必须调用 `close`
#[async_trait]
pub trait WebdavConnection: Send {
    /// 创建目录，返回远端状态码
    async fn mkcol(&mut self, path: &str) -> Result<u16>;

    /// 移动/重命名，返回远端状态码
    async fn move_to(&mut self, source: &str, destination: &str, overwrite: bool) -> Result<u16>;

    async fn close(&mut self);
}

/// 基于 reqwest 的 WebDAV 客户端（bearer 认证）
pub struct WebdavClient {
    http: Client,
    endpoint: WebdavEndpoint,
    tokens: Arc<dyn TokenSource>,
}

impl WebdavClient {
    pub fn new(http: Client, endpoint: WebdavEndpoint, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http,
            endpoint,
            tokens,
        }
    }

    pub fn endpoint(&self) -> &WebdavEndpoint {
        &self.endpoint
    }
}

#[async_trait]
impl WebdavTransport for WebdavClient {
    async fn open(&self) -> Result<Box<dyn WebdavConnection>> {
        let token = self
            .tokens
            .bearer_token()
            .await
            .context("获取 WebDAV 令牌失败")?;

        // OPTIONS 探测：只要能拿到响应就认为连接可用
        let url = self.endpoint.url_for("/");
        let response = self
            .http
            .request(Method::OPTIONS, &url)
            .bearer_auth(&token)
            .send()
            .await
            .with_context(|| format!("无法连接 WebDAV 服务: {}", self.endpoint.origin()))?;

        debug!(
            "WebDAV 连接已打开: {}{} (status={})",
            self.endpoint.transport.marker(),
            self.endpoint.host,
            response.status()
        );

        Ok(Box::new(WebdavSession {
            http: self.http.clone(),
            endpoint: self.endpoint.clone(),
            token,
            open: true,
        }))
    }
}

/// 已打开的 WebDAV 会话
struct WebdavSession {
    http: Client,
    endpoint: WebdavEndpoint,
    token: String,
    open: bool,
}

impl WebdavSession {
    fn ensure_open(&self) -> Result<()> {
        if !self.open {
            anyhow::bail!("WebDAV 连接已关闭");
        }
        Ok(())
    }

    fn method(name: &str) -> Result<Method> {
        Method::from_bytes(name.as_bytes()).with_context(|| format!("无效的 HTTP 方法: {}", name))
    }
}

#[async_trait]
impl WebdavConnection for WebdavSession {
    async fn mkcol(&mut self, path: &str) -> Result<u16> {
        self.ensure_open()?;
        let url = self.endpoint.url_for(path);
        info!("MKCOL {}", url);

        let response = self
            .http
            .request(Self::method("MKCOL")?, &url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("MKCOL 请求失败")?;

        Ok(response.status().as_u16())
    }

    async fn move_to(&mut self, source: &str, destination: &str, overwrite: bool) -> Result<u16> {
        self.ensure_open()?;
        let url = self.endpoint.url_for(source);
        let destination_url = self.endpoint.url_for(destination);
        info!("MOVE {} -> {}", url, destination_url);

        let response = self
            .http
            .request(Self::method("MOVE")?, &url)
            .bearer_auth(&self.token)
            .header("Destination", destination_url)
            .header("Overwrite", if overwrite { "T" } else { "F" })
            .send()
            .await
            .context("MOVE 请求失败")?;

        let status = response.status().as_u16();
        if status >= 400 {
            warn!("MOVE 失败: {} status={}", source, status);
        }
        Ok(status)
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            debug!("WebDAV 连接已关闭: {}", self.endpoint.host);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_stub::HttpStub;

    struct StaticToken;

    #[async_trait]
    impl TokenSource for StaticToken {
        async fn bearer_token(&self) -> Result<String> {
            Ok("token".to_string())
        }
    }

    struct BrokenToken;

    #[async_trait]
    impl TokenSource for BrokenToken {
        async fn bearer_token(&self) -> Result<String> {
            anyhow::bail!("refresh token revoked")
        }
    }

    #[tokio::test]
    async fn test_open_fails_without_token() {
        let endpoint = WebdavEndpoint::parse("https://cloud.example.com/remote.php/webdav/").unwrap();
        let client = WebdavClient::new(Client::new(), endpoint, Arc::new(BrokenToken));
        assert!(client.open().await.is_err());
    }

    #[tokio::test]
    async fn test_closed_session_rejects_requests() {
        let endpoint = WebdavEndpoint::parse("http://127.0.0.1:9/webdav").unwrap();
        let mut session = WebdavSession {
            http: Client::new(),
            endpoint,
            token: "token".to_string(),
            open: true,
        };
        session.close().await;
        assert!(session.mkcol("/1").await.is_err());
        assert!(session.move_to("/1", "/2", false).await.is_err());
    }

    #[test]
    fn test_client_keeps_endpoint() {
        let endpoint = WebdavEndpoint::parse("https://cloud.example.com:8443/dav").unwrap();
        let client = WebdavClient::new(Client::new(), endpoint.clone(), Arc::new(StaticToken));
        assert_eq!(client.endpoint(), &endpoint);
        assert_eq!(client.endpoint().port, 8443);
    }

    #[tokio::test]
    async fn test_move_request_shape() {
        let stub = HttpStub::start(vec![(200, String::new()), (201, String::new())]).await;
        let endpoint =
            WebdavEndpoint::parse(&format!("{}/remote.php/webdav/", stub.base_url())).unwrap();
        let client = WebdavClient::new(Client::new(), endpoint, Arc::new(StaticToken));

        let mut conn = client.open().await.unwrap();
        let status = conn.move_to("/12/3", "/12/Group A", false).await.unwrap();
        conn.close().await;
        assert_eq!(status, 201);

        let requests = stub.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, "OPTIONS");
        assert_eq!(requests[0].path, "/remote.php/webdav/");

        let moved = &requests[1];
        assert_eq!(moved.method, "MOVE");
        assert_eq!(moved.path, "/remote.php/webdav/12/3");
        assert_eq!(
            moved.header("destination"),
            Some(format!("{}/remote.php/webdav/12/Group%20A", stub.base_url()).as_str())
        );
        assert_eq!(moved.header("overwrite"), Some("F"));
        assert_eq!(moved.header("authorization"), Some("Bearer token"));
    }

    #[tokio::test]
    async fn test_mkcol_request_shape() {
        let stub = HttpStub::start(vec![(200, String::new()), (405, String::new())]).await;
        let endpoint = WebdavEndpoint::parse(&format!("{}/dav", stub.base_url())).unwrap();
        let client = WebdavClient::new(Client::new(), endpoint, Arc::new(StaticToken));

        let mut conn = client.open().await.unwrap();
        assert_eq!(conn.mkcol("/12").await.unwrap(), 405);
        conn.close().await;

        let requests = stub.requests();
        assert_eq!(requests[1].method, "MKCOL");
        assert_eq!(requests[1].path, "/dav/12");
        assert_eq!(requests[1].header("authorization"), Some("Bearer token"));
    }
}
