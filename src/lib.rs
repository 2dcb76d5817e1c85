// Collaborative Folders Library
// 协作文件夹核心库：在 ownCloud 类远端为用户/小组创建、分享并重命名文件夹

// 文件夹访问编排模块
pub mod access;

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// OAuth2 身份模块
pub mod oauth;

// 访问记录持久化模块
pub mod persistence;

// 远端 WebDAV / OCS 模块
pub mod remote;

#[cfg(test)]
pub(crate) mod http_stub;

// 导出常用类型
pub use access::{
    provision, AccessResult, FailurePhase, FolderAccess, FolderAccessError, FolderAvailability,
    ProvisionReport, RenameOutcome, SharedFolder, ShareOutcome,
};
pub use config::AppConfig;
pub use oauth::{ConfiguredIssuers, IssuerProvider, UserSession};
pub use persistence::{
    AccessContext, AccessField, AccessRecordStore, ActivitySettings, CreationStatus,
};
pub use remote::{ConfigurationError, RemoteSession, SessionManager};
