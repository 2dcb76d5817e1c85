// 远端访问模块
//
// 系统会话 + WebDAV / OCS 适配器

pub mod ocs;
pub mod session;
pub mod types;
pub mod webdav;

pub use ocs::{OcsCall, OcsClient, OcsMeta, SharingAdapter, SHARE_TYPE_USER};
pub use session::{IssuerStatus, RemoteSession, SessionManager};
pub use types::{ConfigurationError, Transport, WebdavEndpoint};
pub use webdav::{WebdavClient, WebdavConnection, WebdavTransport};
