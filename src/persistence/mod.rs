//! 访问记录持久化模块
//!
//! 以 (活动实例, 用户/小组) 为键，记录编排流程走到的结果：
//! - link: 重命名成功后生成的文件夹链接
//! - foldername: 用户选择的文件夹名称
//!
//! 另有每个活动实例一条的设置记录：小组模式、教师访问、文件夹创建状态
//!
//! ## 设计原则
//!
//! 1. **每个键至多一条记录**: 表上有唯一约束，写入走 upsert
//! 2. **字段独立**: 只更新被写入的字段，其余字段保持不变
//! 3. **写入串行**: 读-改-写在同一把连接锁内完成
//!
//! ## 使用示例
//!
//! ```ignore
//! use crate::persistence::{AccessContext, AccessField, AccessRecordStore};
//!
//! let store = AccessRecordStore::new(&config.persistence.db_path)?;
//! let context = AccessContext::user(12, "42");
//!
//! store.set_entry(AccessField::FolderName, &context, "Project A")?;
//! let name = store.get_entry(AccessField::FolderName, &context)?;
//! ```

pub mod access_db;
pub mod types;

pub use access_db::AccessRecordStore;
pub use types::{
    AccessContext, AccessField, AccessRecord, ActivitySettings, CreationStatus, Subject,
};
