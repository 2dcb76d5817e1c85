//! 访问记录数据类型

use serde::{Deserialize, Serialize};

/// 记录归属对象
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Subject {
    /// 单个用户
    User(String),
    /// 小组
    Group(i64),
}

impl Subject {
    /// 存储用的类型标识
    pub fn kind(&self) -> &'static str {
        match self {
            Subject::User(_) => "user",
            Subject::Group(_) => "group",
        }
    }

    /// 存储用的 ID
    pub fn id(&self) -> String {
        match self {
            Subject::User(id) => id.clone(),
            Subject::Group(id) => id.to_string(),
        }
    }

    /// 从存储的两列还原
    pub fn from_parts(kind: &str, id: &str) -> Option<Self> {
        match kind {
            "user" => Some(Subject::User(id.to_string())),
            "group" => id.parse().ok().map(Subject::Group),
            _ => None,
        }
    }
}

/// 访问上下文：活动实例 + 归属对象
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessContext {
    /// 活动实例 ID（course module id）
    pub cmid: i64,
    pub subject: Subject,
}

impl AccessContext {
    pub fn user(cmid: i64, user_id: impl Into<String>) -> Self {
        Self {
            cmid,
            subject: Subject::User(user_id.into()),
        }
    }

    pub fn group(cmid: i64, group_id: i64) -> Self {
        Self {
            cmid,
            subject: Subject::Group(group_id),
        }
    }
}

impl std::fmt::Display for AccessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cmid={} {}={}", self.cmid, self.subject.kind(), self.subject.id())
    }
}

/// 可写入的记录字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessField {
    /// 文件夹链接
    Link,
    /// 用户选择的文件夹名
    FolderName,
}

impl AccessField {
    /// 对应的数据库列名
    pub fn column(&self) -> &'static str {
        match self {
            AccessField::Link => "link",
            AccessField::FolderName => "foldername",
        }
    }
}

/// 一条访问记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRecord {
    pub id: i64,
    pub context: AccessContext,
    pub link: Option<String>,
    pub folder_name: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl AccessRecord {
    pub fn get(&self, field: AccessField) -> Option<&str> {
        match field {
            AccessField::Link => self.link.as_deref(),
            AccessField::FolderName => self.folder_name.as_deref(),
        }
    }
}

/// 活动实例的文件夹创建状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreationStatus {
    /// 等待预建任务
    Pending,
    /// 全部文件夹已建好
    Created,
}

impl CreationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreationStatus::Pending => "pending",
            CreationStatus::Created => "created",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(CreationStatus::Pending),
            "created" => Some(CreationStatus::Created),
            _ => None,
        }
    }

    /// 面向用户的状态说明
    pub fn label(&self) -> &'static str {
        match self {
            CreationStatus::Pending => "Folder(s) will be created soon",
            CreationStatus::Created => "Folder(s) created",
        }
    }
}

/// 活动实例设置
///
/// 小组模式和教师访问在活动创建后不可更改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySettings {
    pub cmid: i64,
    /// 每个小组一个文件夹；否则整个课程一个文件夹
    pub group_mode: bool,
    /// 教师是否可以访问文件夹
    pub teacher_access: bool,
    pub creation_status: CreationStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ActivitySettings {
    pub fn folders_created(&self) -> bool {
        self.creation_status == CreationStatus::Created
    }
}
