// 文件夹访问模块
//
// 创建、分享、重命名远端文件夹，并记录每个用户/小组的进度

pub mod folder_access;
pub mod provision;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use folder_access::{is_valid_folder_name, FolderAccess};
pub use provision::{folder_path, provision, ProvisionReport};
pub use types::{
    unexpected_code_message, webdav_error_message, AccessResult, FailurePhase, FolderAccessError,
    FolderAvailability, RenameOutcome, SharedFolder, ShareOutcome, MSG_FOLDER_NOT_CREATED_YET,
    MSG_ILLEGAL_PATH, MSG_NO_GROUP, MSG_OCS_ERROR, MSG_SOCKET_ERROR, MSG_TEACHERS_NOT_ALLOWED,
    MSG_UNKNOWN_ACTIVITY, MSG_USER_NOT_LOGGED_IN,
};
