// 文件夹访问模块类型定义

use crate::remote::ConfigurationError;
use serde::Serialize;
use thiserror::Error;

/// 用户未登录远端
pub const MSG_USER_NOT_LOGGED_IN: &str = "You are currently not logged in at ownCloud.";
/// WebDAV 连接无法打开
pub const MSG_SOCKET_ERROR: &str = "The WebDAV socket could not be opened.";
/// OCS 分享失败
pub const MSG_OCS_ERROR: &str = "An error with the OCS sharing API occurred.";
/// 文件夹名非法
pub const MSG_ILLEGAL_PATH: &str =
    "A valid folder or path name must be entered. Use '/' (slash) to delimit directories of a path.";

/// 文件夹还没有建好
pub const MSG_FOLDER_NOT_CREATED_YET: &str = "The folder has not been created in ownCloud, yet. Please contact the administrator if this message persists more than a few hours.";
/// 教师无权访问
pub const MSG_TEACHERS_NOT_ALLOWED: &str = "Sorry, teachers are not allowed to view this content.";
/// 小组模式下用户不属于任何小组
pub const MSG_NO_GROUP: &str = "You are not a member of any group of this activity.";
/// 活动尚未登记
pub const MSG_UNKNOWN_ACTIVITY: &str = "This collaborative folders activity does not exist.";

/// WebDAV 返回非预期状态码
pub fn webdav_error_message(code: u16) -> String {
    format!("WebDAV error code {}", code)
}

/// 建目录返回非预期状态码
pub fn unexpected_code_message(code: u16) -> String {
    format!("An unexpected response status code ({}) was received.", code)
}

/// 文件夹访问错误
///
/// 只有配置错误和套接字错误会以 Err 形式抛出，其余失败通过结果结构返回
#[derive(Debug, Error)]
pub enum FolderAccessError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("The WebDAV socket could not be opened: {0}")]
    Socket(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// 分享结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShareOutcome {
    pub success: bool,
    /// 远端报告已分享过（403）
    pub already_existed: bool,
}

/// 重命名结果：成功时 content 为链接，失败时为错误信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameOutcome {
    pub status: bool,
    pub content: String,
}

impl RenameOutcome {
    pub fn success(link: impl Into<String>) -> Self {
        Self {
            status: true,
            content: link.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            content: message.into(),
        }
    }
}

/// 组合流程中失败的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePhase {
    Share,
    Rename,
}

impl FailurePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePhase::Share => "share",
            FailurePhase::Rename => "rename",
        }
    }
}

/// 分享并重命名的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessResult {
    pub status: bool,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub phase: Option<FailurePhase>,
    pub content: String,
}

impl AccessResult {
    pub fn success(link: impl Into<String>) -> Self {
        Self {
            status: true,
            phase: None,
            content: link.into(),
        }
    }

    pub fn failure(phase: FailurePhase, message: impl Into<String>) -> Self {
        Self {
            status: false,
            phase: Some(phase),
            content: message.into(),
        }
    }
}

/// 用户能否申请访问某个活动的文件夹
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderAvailability {
    UnknownActivity,
    /// 活动设置不允许教师访问
    TeachersNotAllowed,
    /// 预建任务还没有完成
    NotCreatedYet,
    /// 小组模式但没有指定小组
    NoGroup,
    /// 可以申请访问，`path` 为要分享的远端文件夹
    Ready { path: String },
}

impl FolderAvailability {
    pub fn is_ready(&self) -> bool {
        matches!(self, FolderAvailability::Ready { .. })
    }

    /// 不可访问时的提示
    pub fn message(&self) -> Option<&'static str> {
        match self {
            FolderAvailability::UnknownActivity => Some(MSG_UNKNOWN_ACTIVITY),
            FolderAvailability::TeachersNotAllowed => Some(MSG_TEACHERS_NOT_ALLOWED),
            FolderAvailability::NotCreatedYet => Some(MSG_FOLDER_NOT_CREATED_YET),
            FolderAvailability::NoGroup => Some(MSG_NO_GROUP),
            FolderAvailability::Ready { .. } => None,
        }
    }
}

/// 已分享文件夹的展示信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedFolder {
    pub name: Option<String>,
    pub link: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_result_serialization() {
        let success = serde_json::to_value(AccessResult::success("https://x")).unwrap();
        assert_eq!(success, serde_json::json!({"status": true, "content": "https://x"}));

        let failure =
            serde_json::to_value(AccessResult::failure(FailurePhase::Share, MSG_OCS_ERROR)).unwrap();
        assert_eq!(failure["type"], "share");
        assert_eq!(failure["status"], false);
    }

    #[test]
    fn test_availability_messages() {
        assert_eq!(
            FolderAvailability::NotCreatedYet.message(),
            Some(MSG_FOLDER_NOT_CREATED_YET)
        );
        let ready = FolderAvailability::Ready {
            path: "/12".to_string(),
        };
        assert!(ready.is_ready());
        assert_eq!(ready.message(), None);
    }

    #[test]
    fn test_messages_embed_codes() {
        assert_eq!(webdav_error_message(404), "WebDAV error code 404");
        assert!(unexpected_code_message(507).contains("(507)"));
    }

    #[test]
    fn test_error_display() {
        let err = FolderAccessError::from(ConfigurationError::NoSystemClient);
        assert!(err.to_string().contains("system account is not logged in"));

        let err = FolderAccessError::Socket("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }
}
