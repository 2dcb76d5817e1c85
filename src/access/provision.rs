// 文件夹预建任务
//
// 活动创建后提前在远端建好 /<cmid> 以及每个小组的 /<cmid>/<group id>

use crate::access::folder_access::FolderAccess;
use crate::access::types::{unexpected_code_message, FolderAccessError};
use tracing::{info, warn};

const STATUS_CREATED: u16 = 201;
const STATUS_ALREADY_EXISTS: u16 = 405;

/// 访问上下文对应的远端文件夹路径
///
/// 课程模式为 `/<cmid>`，小组模式为 `/<cmid>/<group id>`
pub fn folder_path(cmid: i64, group: Option<i64>) -> String {
    match group {
        Some(group) => format!("/{}/{}", cmid, group),
        None => format!("/{}", cmid),
    }
}

/// 预建任务报告
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub created: Vec<String>,
    /// 远端已存在（405）
    pub existing: Vec<String>,
    /// 返回非预期状态码的路径
    pub failed: Vec<(String, u16)>,
}

impl ProvisionReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// 失败路径对应的提示信息
    pub fn failure_messages(&self) -> Vec<String> {
        self.failed
            .iter()
            .map(|(path, code)| format!("{}: {}", path, unexpected_code_message(*code)))
            .collect()
    }

    fn record(&mut self, path: String, status: u16) {
        match status {
            STATUS_CREATED => self.created.push(path),
            STATUS_ALREADY_EXISTS => self.existing.push(path),
            code => self.failed.push((path, code)),
        }
    }
}

/// 建立一个活动的文件夹树
///
/// 根文件夹非预期状态码只记入报告，小组文件夹仍会尝试；连接错误立即中止。
/// 课程模式的活动忽略 `groups`；全部成功后把活动标记为已创建
pub async fn provision(
    access: &FolderAccess,
    cmid: i64,
    groups: &[i64],
) -> Result<ProvisionReport, FolderAccessError> {
    let groups = match access.activity(cmid)? {
        Some(settings) if !settings.group_mode => {
            if !groups.is_empty() {
                warn!("活动为课程模式，忽略 {} 个小组: cmid={}", groups.len(), cmid);
            }
            &[][..]
        }
        Some(_) => groups,
        None => {
            warn!("活动未登记，不记录创建状态: cmid={}", cmid);
            groups
        }
    };

    let mut report = ProvisionReport::default();

    let root = folder_path(cmid, None);
    let status = access.create_folder(&root).await?;
    report.record(root, status);

    for group in groups {
        let path = folder_path(cmid, Some(*group));
        let status = access.create_folder(&path).await?;
        report.record(path, status);
    }

    if report.is_complete() {
        access.mark_folders_created(cmid)?;
        info!(
            "🔥 文件夹预建完成: cmid={}, 新建 {} 个, 已存在 {} 个",
            cmid,
            report.created.len(),
            report.existing.len()
        );
    } else {
        for message in report.failure_messages() {
            warn!("文件夹预建失败: cmid={}, {}", cmid, message);
        }
    }

    Ok(report)
}
