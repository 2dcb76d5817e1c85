// 测试用的远端替身：记录调用次数，按预设返回结果

use crate::config::{EndpointsConfig, IssuerConfig, SystemAccountConfig};
use crate::oauth::{AccessToken, Issuer, TokenSource, UserSession};
use crate::remote::{
    OcsCall, RemoteSession, SharingAdapter, WebdavConnection, WebdavEndpoint, WebdavTransport,
};
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const BASE_URL: &str = "https://cloud.example.com/";
pub const WEBDAV_URL: &str = "https://cloud.example.com/remote.php/webdav/";

struct StaticToken;

#[async_trait]
impl TokenSource for StaticToken {
    async fn bearer_token(&self) -> Result<String> {
        Ok("system-token".to_string())
    }
}

/// WebDAV 替身的预设行为与调用记录
pub struct WebdavScript {
    pub refuse_open: bool,
    pub fail_requests: bool,
    /// 按路径指定 MKCOL 状态码，未指定的返回 201
    pub mkcol_status: HashMap<String, u16>,
    pub move_status: u16,
    pub(crate) opens: AtomicUsize,
    pub(crate) closes: AtomicUsize,
    pub(crate) mkcols: Mutex<Vec<String>>,
    pub(crate) moves: Mutex<Vec<(String, String, bool)>>,
}

impl Default for WebdavScript {
    fn default() -> Self {
        Self {
            refuse_open: false,
            fail_requests: false,
            mkcol_status: HashMap::new(),
            move_status: 201,
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            mkcols: Mutex::new(Vec::new()),
            moves: Mutex::new(Vec::new()),
        }
    }
}

pub struct FakeWebdav {
    script: Arc<WebdavScript>,
}

impl FakeWebdav {
    pub fn new(script: WebdavScript) -> Arc<Self> {
        Arc::new(Self {
            script: Arc::new(script),
        })
    }

    pub fn moving_with(status: u16) -> Arc<Self> {
        Self::new(WebdavScript {
            move_status: status,
            ..Default::default()
        })
    }

    pub fn opens(&self) -> usize {
        self.script.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.script.closes.load(Ordering::SeqCst)
    }

    pub fn mkcols(&self) -> Vec<String> {
        self.script.mkcols.lock().clone()
    }

    pub fn moves(&self) -> Vec<(String, String, bool)> {
        self.script.moves.lock().clone()
    }
}

#[async_trait]
impl WebdavTransport for FakeWebdav {
    async fn open(&self) -> Result<Box<dyn WebdavConnection>> {
        self.script.opens.fetch_add(1, Ordering::SeqCst);
        if self.script.refuse_open {
            anyhow::bail!("connection refused");
        }
        Ok(Box::new(FakeConnection {
            script: Arc::clone(&self.script),
        }))
    }
}

struct FakeConnection {
    script: Arc<WebdavScript>,
}

#[async_trait]
impl WebdavConnection for FakeConnection {
    async fn mkcol(&mut self, path: &str) -> Result<u16> {
        self.script.mkcols.lock().push(path.to_string());
        if self.script.fail_requests {
            anyhow::bail!("connection reset");
        }
        Ok(self.script.mkcol_status.get(path).copied().unwrap_or(201))
    }

    async fn move_to(&mut self, source: &str, destination: &str, overwrite: bool) -> Result<u16> {
        self.script
            .moves
            .lock()
            .push((source.to_string(), destination.to_string(), overwrite));
        if self.script.fail_requests {
            anyhow::bail!("connection reset");
        }
        Ok(self.script.move_status)
    }

    async fn close(&mut self) {
        self.script.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// OCS 替身：按顺序返回预设响应，用完后返回错误
pub struct FakeSharing {
    responses: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<OcsCall>>,
}

impl FakeSharing {
    pub fn new(responses: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// 连续返回同一个 OCS 响应
    pub fn replying(status: &str, code: i64, times: usize) -> Arc<Self> {
        Self::new(vec![Ok(ocs_body(status, code)); times])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<OcsCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SharingAdapter for FakeSharing {
    async fn call(&self, call: &OcsCall) -> Result<String> {
        self.calls.lock().push(call.clone());
        match self.responses.lock().pop_front() {
            Some(Ok(body)) => Ok(body),
            Some(Err(e)) => Err(anyhow::anyhow!(e)),
            None => anyhow::bail!("no scripted OCS response"),
        }
    }
}

pub fn ocs_body(status: &str, code: i64) -> String {
    serde_json::json!({
        "ocs": {
            "meta": {"status": status, "statuscode": code, "message": null},
            "data": []
        }
    })
    .to_string()
}

pub fn issuer() -> Issuer {
    Issuer::from_config(&IssuerConfig {
        id: "owncloud".to_string(),
        name: "ownCloud".to_string(),
        base_url: BASE_URL.to_string(),
        client_id: "moodle".to_string(),
        client_secret: String::new(),
        endpoints: EndpointsConfig {
            token: Some(format!("{}index.php/apps/oauth2/api/v1/token", BASE_URL)),
            webdav: Some(WEBDAV_URL.to_string()),
            ocs: Some(format!("{}ocs/v1.php/apps/files_sharing/api/v1", BASE_URL)),
            userinfo: None,
        },
        system_account: Some(SystemAccountConfig {
            username: "system".to_string(),
            refresh_token: "refresh".to_string(),
        }),
    })
}

pub fn fake_session(webdav: &Arc<FakeWebdav>, sharing: &Arc<FakeSharing>) -> Arc<RemoteSession> {
    let endpoint = WebdavEndpoint::parse(WEBDAV_URL).expect("valid test endpoint");
    Arc::new(RemoteSession::from_parts(
        issuer(),
        Arc::new(StaticToken),
        endpoint,
        Arc::clone(webdav) as Arc<dyn WebdavTransport>,
        Arc::clone(sharing) as Arc<dyn SharingAdapter>,
    ))
}

pub fn logged_in_user(local_id: &str, remote_id: &str) -> UserSession {
    UserSession::new(
        local_id,
        Some(AccessToken {
            token: "user-token".to_string(),
            expires_at: chrono::Utc::now().timestamp() + 3600,
            user_id: Some(remote_id.to_string()),
        }),
    )
}
