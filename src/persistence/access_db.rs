//! 访问记录 SQLite 数据库模块
//!
//! - collaborativefolders：每个活动实例一条设置（小组模式、教师访问、创建状态）
//! - collaborativefolders_link：每个 (cmid, 归属对象) 至多一条记录

use std::path::Path;

use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use super::types::{
    AccessContext, AccessField, AccessRecord, ActivitySettings, CreationStatus, Subject,
};

/// 访问记录存储
pub struct AccessRecordStore {
    /// SQLite 连接（锁同时串行化 upsert 的读-改-写）
    conn: Mutex<Connection>,
}

/// 查询行（列顺序与 SELECT_COLUMNS 一致）
struct AccessRow {
    id: i64,
    cmid: i64,
    subject_kind: String,
    subject_id: String,
    link: Option<String>,
    foldername: Option<String>,
    created_at: i64,
    updated_at: i64,
}

const SELECT_COLUMNS: &str =
    "id, cmid, subject_kind, subject_id, link, foldername, created_at, updated_at";

const ACTIVITY_COLUMNS: &str =
    "cmid, group_mode, teacher_access, creation_status, created_at, updated_at";

impl AccessRecordStore {
    /// 打开（或创建）数据库文件
    pub fn new(db_path: &Path) -> Result<Self> {
        // 确保父目录存在
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    /// 内存数据库（测试和一次性任务使用）
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        Ok(store)
    }

    /// 初始化数据库表
    fn init_tables(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS collaborativefolders_link (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cmid INTEGER NOT NULL,
                subject_kind TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                link TEXT,
                foldername TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (cmid, subject_kind, subject_id)
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_link_cmid ON collaborativefolders_link(cmid)",
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS collaborativefolders (
                cmid INTEGER PRIMARY KEY,
                group_mode INTEGER NOT NULL,
                teacher_access INTEGER NOT NULL,
                creation_status TEXT NOT NULL DEFAULT 'pending',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        info!("访问记录表初始化完成");
        Ok(())
    }

    /// 读取某个上下文的完整记录
    pub fn get_record(&self, context: &AccessContext) -> Result<Option<AccessRecord>> {
        let conn = self.conn.lock();
        let row = Self::query_row(&conn, context)?;
        Ok(row.and_then(Self::row_to_record))
    }

    /// 读取单个字段，记录不存在或字段为空时返回 None
    pub fn get_entry(&self, field: AccessField, context: &AccessContext) -> Result<Option<String>> {
        Ok(self
            .get_record(context)?
            .and_then(|record| record.get(field).map(str::to_string)))
    }

    /// 写入单个字段（upsert）
    pub fn set_entry(&self, field: AccessField, context: &AccessContext, value: &str) -> Result<()> {
        self.set_entries(context, &[(field, value)])
    }

    /// 一次写入多个字段（upsert）
    ///
    /// 记录不存在时插入只包含这些字段的新记录；存在时只更新这些字段
    pub fn set_entries(&self, context: &AccessContext, fields: &[(AccessField, &str)]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().timestamp();

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM collaborativefolders_link WHERE cmid = ?1 AND subject_kind = ?2 AND subject_id = ?3",
                params![context.cmid, context.subject.kind(), context.subject.id()],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            None => {
                let mut columns = vec!["cmid", "subject_kind", "subject_id", "created_at", "updated_at"];
                let mut values = vec![
                    Value::Integer(context.cmid),
                    Value::Text(context.subject.kind().to_string()),
                    Value::Text(context.subject.id()),
                    Value::Integer(now),
                    Value::Integer(now),
                ];
                for (field, value) in fields {
                    columns.push(field.column());
                    values.push(Value::Text(value.to_string()));
                }

                let placeholders: Vec<String> =
                    (1..=values.len()).map(|i| format!("?{}", i)).collect();
                let sql = format!(
                    "INSERT INTO collaborativefolders_link ({}) VALUES ({})",
                    columns.join(", "),
                    placeholders.join(", ")
                );
                tx.execute(&sql, params_from_iter(values))?;
                debug!("新增访问记录: {}", context);
            }
            Some(id) => {
                let mut assignments = vec!["updated_at = ?1".to_string()];
                let mut values = vec![Value::Integer(now)];
                for (field, value) in fields {
                    values.push(Value::Text(value.to_string()));
                    assignments.push(format!("{} = ?{}", field.column(), values.len()));
                }
                values.push(Value::Integer(id));

                let sql = format!(
                    "UPDATE collaborativefolders_link SET {} WHERE id = ?{}",
                    assignments.join(", "),
                    values.len()
                );
                tx.execute(&sql, params_from_iter(values))?;
                debug!("更新访问记录: {} (id={})", context, id);
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// 删除某个上下文的记录（重置分享），返回是否删除了记录
    pub fn delete_record(&self, context: &AccessContext) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM collaborativefolders_link WHERE cmid = ?1 AND subject_kind = ?2 AND subject_id = ?3",
            params![context.cmid, context.subject.kind(), context.subject.id()],
        )?;

        if deleted > 0 {
            info!("已删除访问记录: {}", context);
        }
        Ok(deleted > 0)
    }

    /// 某个活动实例下的全部记录
    pub fn records_for_activity(&self, cmid: i64) -> Result<Vec<AccessRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM collaborativefolders_link WHERE cmid = ?1 ORDER BY id",
            SELECT_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![cmid], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows.into_iter().filter_map(Self::row_to_record).collect())
    }

    /// 登记活动实例，初始状态为 pending
    ///
    /// 已登记的活动保持原有设置不变并原样返回
    pub fn register_activity(
        &self,
        cmid: i64,
        group_mode: bool,
        teacher_access: bool,
    ) -> Result<ActivitySettings> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO collaborativefolders (cmid, group_mode, teacher_access, creation_status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![cmid, group_mode, teacher_access, CreationStatus::Pending.as_str(), now],
        )?;

        let settings = Self::query_activity(&conn, cmid)?
            .ok_or_else(|| anyhow::anyhow!("活动登记后读取失败: cmid={}", cmid))?;

        if inserted > 0 {
            info!(
                "已登记活动: cmid={}, group_mode={}, teacher_access={}",
                cmid, group_mode, teacher_access
            );
        } else if settings.group_mode != group_mode || settings.teacher_access != teacher_access {
            warn!("活动设置创建后不可更改，保留原设置: cmid={}", cmid);
        }
        Ok(settings)
    }

    /// 读取活动实例设置
    pub fn get_activity(&self, cmid: i64) -> Result<Option<ActivitySettings>> {
        let conn = self.conn.lock();
        Self::query_activity(&conn, cmid)
    }

    /// 更新文件夹创建状态，活动未登记时返回 false
    pub fn set_creation_status(&self, cmid: i64, status: CreationStatus) -> Result<bool> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE collaborativefolders SET creation_status = ?1, updated_at = ?2 WHERE cmid = ?3",
            params![status.as_str(), chrono::Utc::now().timestamp(), cmid],
        )?;

        if updated > 0 {
            debug!("活动创建状态已更新: cmid={}, status={}", cmid, status.as_str());
        }
        Ok(updated > 0)
    }

    fn query_activity(conn: &Connection, cmid: i64) -> Result<Option<ActivitySettings>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM collaborativefolders WHERE cmid = ?1",
                    ACTIVITY_COLUMNS
                ),
                params![cmid],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, bool>(1)?,
                        row.get::<_, bool>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((cmid, group_mode, teacher_access, status, created_at, updated_at)) = row else {
            return Ok(None);
        };

        let creation_status = CreationStatus::parse(&status)
            .ok_or_else(|| anyhow::anyhow!("未知的创建状态: cmid={}, status={}", cmid, status))?;

        Ok(Some(ActivitySettings {
            cmid,
            group_mode,
            teacher_access,
            creation_status,
            created_at,
            updated_at,
        }))
    }

    fn query_row(conn: &Connection, context: &AccessContext) -> Result<Option<AccessRow>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM collaborativefolders_link WHERE cmid = ?1 AND subject_kind = ?2 AND subject_id = ?3",
                    SELECT_COLUMNS
                ),
                params![context.cmid, context.subject.kind(), context.subject.id()],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AccessRow> {
        Ok(AccessRow {
            id: row.get(0)?,
            cmid: row.get(1)?,
            subject_kind: row.get(2)?,
            subject_id: row.get(3)?,
            link: row.get(4)?,
            foldername: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn row_to_record(row: AccessRow) -> Option<AccessRecord> {
        let subject = Subject::from_parts(&row.subject_kind, &row.subject_id)?;
        Some(AccessRecord {
            id: row.id,
            context: AccessContext {
                cmid: row.cmid,
                subject,
            },
            link: row.link,
            folder_name: row.foldername,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
impl AccessRecordStore {
    /// 让之后的写入全部失败（读取不受影响）
    pub(crate) fn reject_writes(&self) {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TRIGGER reject_insert BEFORE INSERT ON collaborativefolders_link
            BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END;
            CREATE TRIGGER reject_update BEFORE UPDATE ON collaborativefolders_link
            BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END;
            "#,
        )
        .unwrap();
    }
}
