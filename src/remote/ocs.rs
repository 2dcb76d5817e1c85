// OCS 分享 API 适配器

use crate::oauth::TokenSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// 分享类型：单个用户
pub const SHARE_TYPE_USER: u8 = 0;

/// OCS 调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcsCall {
    /// 创建分享
    CreateShare {
        path: String,
        share_type: u8,
        share_with: String,
    },
}

impl OcsCall {
    /// 私有分享给指定用户
    pub fn share_with_user(path: &str, user: &str) -> Self {
        OcsCall::CreateShare {
            path: path.to_string(),
            share_type: SHARE_TYPE_USER,
            share_with: user.to_string(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OcsCall::CreateShare { .. } => "create_share",
        }
    }
}

/// OCS 分享适配器
#[async_trait]
pub trait SharingAdapter: Send + Sync {
    /// 执行调用，返回原始响应体
    async fn call(&self, call: &OcsCall) -> Result<String>;
}

/// OCS 响应头信息
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OcsMeta {
    pub status: String,
    #[serde(alias = "code")]
    pub statuscode: i64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OcsEnvelope {
    ocs: OcsBody,
}

#[derive(Debug, Deserialize)]
struct OcsBody {
    meta: OcsMeta,
}

impl OcsMeta {
    /// 解析 JSON 格式的 OCS 响应，无法解析时返回 None
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str::<OcsEnvelope>(body)
            .ok()
            .map(|envelope| envelope.ocs.meta)
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// 基于 reqwest 的 OCS 客户端
pub struct OcsClient {
    http: Client,
    /// files_sharing API 根地址
    endpoint: String,
    tokens: Arc<dyn TokenSource>,
}

impl OcsClient {
    pub fn new(http: Client, endpoint: &str, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn shares_url(&self) -> String {
        format!("{}/shares?format=json", self.endpoint)
    }
}

#[async_trait]
impl SharingAdapter for OcsClient {
    async fn call(&self, call: &OcsCall) -> Result<String> {
        let token = self
            .tokens
            .bearer_token()
            .await
            .context("获取 OCS 令牌失败")?;

        let request = match call {
            OcsCall::CreateShare {
                path,
                share_type,
                share_with,
            } => {
                info!("创建分享: path={}, share_with={}", path, share_with);
                let share_type = share_type.to_string();
                self.http.post(self.shares_url()).form(&[
                    ("path", path.as_str()),
                    ("shareType", share_type.as_str()),
                    ("shareWith", share_with.as_str()),
                ])
            }
        };

        let response = request
            .bearer_auth(&token)
            .header("OCS-APIRequest", "true")
            .send()
            .await
            .with_context(|| format!("OCS {} 请求失败", call.name()))?;

        let status = response.status();
        let body = response.text().await.context("读取 OCS 响应失败")?;
        debug!("OCS {} 响应: status={}, body={}", call.name(), status, body);

        Ok(body)
    }
}
