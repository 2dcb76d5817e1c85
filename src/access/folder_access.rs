// 文件夹访问编排
//
// 创建远端文件夹 → 私有分享给用户 → 按用户选择的名称重命名 → 保存链接

use crate::access::provision::folder_path;
use crate::access::types::{
    webdav_error_message, AccessResult, FailurePhase, FolderAccessError, FolderAvailability,
    RenameOutcome, SharedFolder, ShareOutcome, MSG_ILLEGAL_PATH, MSG_OCS_ERROR, MSG_SOCKET_ERROR,
    MSG_USER_NOT_LOGGED_IN,
};
use crate::oauth::UserSession;
use crate::persistence::{
    AccessContext, AccessField, AccessRecordStore, ActivitySettings, CreationStatus,
};
use crate::remote::{OcsCall, OcsMeta, RemoteSession};
use regex::Regex;
use std::sync::Arc;
use tracing::{error, info, warn};

/// MOVE 成功的状态码
const STATUS_CREATED: u16 = 201;
/// OCS：已经分享给该用户
const OCS_ALREADY_SHARED: i64 = 403;

/// 文件夹访问编排器
///
/// 每个请求构建一个实例；远端会话与记录存储在实例之间共享
pub struct FolderAccess {
    session: Arc<RemoteSession>,
    store: Arc<AccessRecordStore>,
    /// 发起请求的终端用户（后台任务为空）
    user: Option<UserSession>,
}

impl FolderAccess {
    pub fn new(session: Arc<RemoteSession>, store: Arc<AccessRecordStore>) -> Self {
        Self {
            session,
            store,
            user: None,
        }
    }

    /// 绑定发起请求的终端用户
    pub fn for_user(mut self, user: UserSession) -> Self {
        self.user = Some(user);
        self
    }

    pub fn session(&self) -> &RemoteSession {
        &self.session
    }

    fn user_logged_in(&self) -> bool {
        self.user
            .as_ref()
            .map(UserSession::is_logged_in)
            .unwrap_or(false)
    }

    /// 创建远端文件夹，原样返回远端状态码
    ///
    /// "已存在"等状态由调用方决定是否容忍；连接失败返回 `FolderAccessError::Socket`
    pub async fn create_folder(&self, path: &str) -> Result<u16, FolderAccessError> {
        let mut conn = self.session.webdav().open().await.map_err(|e| {
            warn!("打开 WebDAV 连接失败: {:#}", e);
            FolderAccessError::Socket(format!("{:#}", e))
        })?;

        let result = conn.mkcol(path).await;
        conn.close().await;

        match result {
            Ok(status) => {
                info!("创建文件夹: path={}, status={}", path, status);
                Ok(status)
            }
            Err(e) => {
                warn!("MKCOL 请求失败: path={}, 错误: {:#}", path, e);
                Err(FolderAccessError::Socket(format!("{:#}", e)))
            }
        }
    }

    /// 私有分享给指定远端用户，返回详细结果
    pub async fn share_outcome(&self, path: &str, user: &str) -> ShareOutcome {
        let call = OcsCall::share_with_user(path, user);

        let body = match self.session.sharing().call(&call).await {
            Ok(body) => body,
            Err(e) => {
                warn!("OCS 分享请求失败: path={}, user={}, 错误: {:#}", path, user, e);
                return ShareOutcome::default();
            }
        };

        match OcsMeta::parse(&body) {
            Some(meta) if meta.is_ok() => {
                info!("分享成功: path={}, user={}", path, user);
                ShareOutcome {
                    success: true,
                    already_existed: false,
                }
            }
            Some(meta) if meta.statuscode == OCS_ALREADY_SHARED => {
                info!("文件夹已分享给该用户: path={}, user={}", path, user);
                ShareOutcome {
                    success: true,
                    already_existed: true,
                }
            }
            Some(meta) => {
                warn!(
                    "分享被拒绝: path={}, user={}, status={}, code={}, message={:?}",
                    path, user, meta.status, meta.statuscode, meta.message
                );
                ShareOutcome::default()
            }
            None => {
                warn!("无法解析 OCS 响应: path={}, body={}", path, body);
                ShareOutcome::default()
            }
        }
    }

    /// 私有分享给指定远端用户
    pub async fn share(&self, path: &str, user: &str) -> bool {
        self.share_outcome(path, user).await.success
    }

    /// 将已分享的文件夹重命名为用户选择的名称，并保存生成的链接
    ///
    /// 该上下文已保存过链接时直接返回已有链接，不再访问远端
    pub async fn rename(
        &self,
        old_path: &str,
        new_name: &str,
        context: &AccessContext,
    ) -> RenameOutcome {
        // 移动目标、链接和保存的文件夹名都使用同一个去掉首尾空白的名称
        let new_name = new_name.trim();

        if !self.user_logged_in() {
            return RenameOutcome::failure(MSG_USER_NOT_LOGGED_IN);
        }

        match self.store.get_entry(AccessField::Link, context) {
            Ok(Some(link)) => {
                info!("文件夹已重命名过，返回已有链接: {}", context);
                return RenameOutcome::success(link);
            }
            Ok(None) => {}
            Err(e) => {
                error!("读取访问记录失败: {}, 错误: {:#}", context, e);
                return RenameOutcome::failure(format!("{:#}", e));
            }
        }

        if !is_valid_folder_name(new_name) {
            return RenameOutcome::failure(MSG_ILLEGAL_PATH);
        }

        let mut conn = match self.session.webdav().open().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("打开 WebDAV 连接失败: {:#}", e);
                return RenameOutcome::failure(MSG_SOCKET_ERROR);
            }
        };

        let destination = sibling_path(old_path, new_name);
        let moved = conn.move_to(old_path, &destination, false).await;
        conn.close().await;

        let status = match moved {
            Ok(status) => status,
            Err(e) => {
                warn!("MOVE 请求失败: {} -> {}, 错误: {:#}", old_path, destination, e);
                return RenameOutcome::failure(MSG_SOCKET_ERROR);
            }
        };

        if status != STATUS_CREATED {
            warn!(
                "重命名失败: {} -> {}, status={}",
                old_path, destination, status
            );
            return RenameOutcome::failure(webdav_error_message(status));
        }

        let link = self.session.files_link(new_name);
        if let Err(e) = self.store.set_entries(
            context,
            &[
                (AccessField::Link, link.as_str()),
                (AccessField::FolderName, new_name),
            ],
        ) {
            // 远端已经重命名成功，链接仍然有效；未保存时再次调用会重新 MOVE
            error!(
                "保存文件夹链接失败，链接仅返回给本次调用: {}, link={}, 错误: {:#}",
                context, link, e
            );
        }

        info!("重命名成功: {} -> {}, link={}", old_path, destination, link);
        RenameOutcome::success(link)
    }

    /// 分享给当前用户后再重命名
    ///
    /// 分享失败时不会尝试重命名；重命名失败不会撤销分享
    pub async fn share_and_rename(
        &self,
        share_path: &str,
        rename_path: &str,
        new_name: &str,
        context: &AccessContext,
    ) -> AccessResult {
        // 远端账号 ID 来自当前用户令牌中的声明
        let Some(remote_user) = self.user.as_ref().and_then(UserSession::remote_user_id) else {
            warn!("无法确定远端账号，用户未登录: {}", context);
            return AccessResult::failure(FailurePhase::Share, MSG_USER_NOT_LOGGED_IN);
        };

        if !self.share(share_path, remote_user).await {
            return AccessResult::failure(FailurePhase::Share, MSG_OCS_ERROR);
        }

        let renamed = self.rename(rename_path, new_name, context).await;
        if renamed.status {
            AccessResult::success(renamed.content)
        } else {
            AccessResult::failure(FailurePhase::Rename, renamed.content)
        }
    }

    /// 已分享文件夹的名称和链接
    pub fn shared_folder(
        &self,
        context: &AccessContext,
    ) -> Result<Option<SharedFolder>, FolderAccessError> {
        let record = self.store.get_record(context)?;
        Ok(record.and_then(|record| {
            record.link.map(|link| SharedFolder {
                name: record.folder_name,
                link,
            })
        }))
    }

    /// 重置分享：删除本地记录，用户可以重新申请访问
    pub fn reset_share(&self, context: &AccessContext) -> Result<bool, FolderAccessError> {
        let removed = self.store.delete_record(context)?;
        if removed {
            info!("分享已重置: {}", context);
        }
        Ok(removed)
    }

    /// 登记活动实例，已登记时保留原设置
    pub fn register_activity(
        &self,
        cmid: i64,
        group_mode: bool,
        teacher_access: bool,
    ) -> Result<ActivitySettings, FolderAccessError> {
        Ok(self
            .store
            .register_activity(cmid, group_mode, teacher_access)?)
    }

    pub fn activity(&self, cmid: i64) -> Result<Option<ActivitySettings>, FolderAccessError> {
        Ok(self.store.get_activity(cmid)?)
    }

    /// 文件夹创建状态，活动未登记时返回 None
    pub fn creation_status(&self, cmid: i64) -> Result<Option<CreationStatus>, FolderAccessError> {
        Ok(self
            .store
            .get_activity(cmid)?
            .map(|settings| settings.creation_status))
    }

    /// 标记活动的文件夹已全部建好，活动未登记时返回 false
    pub fn mark_folders_created(&self, cmid: i64) -> Result<bool, FolderAccessError> {
        Ok(self
            .store
            .set_creation_status(cmid, CreationStatus::Created)?)
    }

    /// 用户能否申请访问该活动的文件夹，可以时给出要分享的路径
    pub fn availability(
        &self,
        cmid: i64,
        group: Option<i64>,
        is_teacher: bool,
    ) -> Result<FolderAvailability, FolderAccessError> {
        let Some(settings) = self.store.get_activity(cmid)? else {
            return Ok(FolderAvailability::UnknownActivity);
        };

        if is_teacher && !settings.teacher_access {
            return Ok(FolderAvailability::TeachersNotAllowed);
        }

        if !settings.folders_created() {
            return Ok(FolderAvailability::NotCreatedYet);
        }

        let path = if settings.group_mode {
            match group {
                Some(group) => folder_path(cmid, Some(group)),
                None => return Ok(FolderAvailability::NoGroup),
            }
        } else {
            folder_path(cmid, None)
        };

        Ok(FolderAvailability::Ready { path })
    }
}

/// 文件夹名是否合法
///
/// 允许用 / 分隔多级目录，但不允许空段以外的 . / ..、反斜杠和控制字符
pub fn is_valid_folder_name(name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() {
        return false;
    }

    let allowed = match Regex::new(r"^[^\\\x00-\x1f\x7f]+$") {
        Ok(re) => re.is_match(name),
        Err(_) => false,
    };
    if !allowed {
        return false;
    }

    let mut segments = name.split('/').filter(|s| !s.is_empty()).peekable();
    segments.peek().is_some() && segments.all(|s| s != "." && s != "..")
}

/// 与 `path` 同级、名为 `name` 的路径
fn sibling_path(path: &str, name: &str) -> String {
    let parent = path
        .trim_end_matches('/')
        .rsplit_once('/')
        .map(|(parent, _)| parent)
        .unwrap_or("");
    format!("{}/{}", parent, name.trim_matches('/'))
}
