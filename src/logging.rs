//! 日志系统配置
//!
//! 控制台输出 + 按大小滚动的日志文件，启动时清理过期日志

use crate::config::LogConfig;
use chrono::Local;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// 日志文件名前缀
const LOG_FILE_PREFIX: &str = "collab-folders.";

/// 时间戳格式
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// 滚动日志文件（内部状态）
struct RollingFile {
    /// 启动时间戳（YYYY-MM-DD-HHMMSS），同一次启动的文件共用
    start_timestamp: String,
    log_dir: PathBuf,
    current_file: Option<File>,
    /// 0 表示基础文件，1、2、3... 表示滚动文件
    current_index: u32,
    max_file_size: u64,
    current_size: u64,
}

impl RollingFile {
    fn open(log_dir: PathBuf, max_file_size: u64) -> io::Result<Self> {
        let mut rolling = Self {
            start_timestamp: Local::now().format("%Y-%m-%d-%H%M%S").to_string(),
            log_dir,
            current_file: None,
            current_index: 0,
            max_file_size,
            current_size: 0,
        };
        rolling.open_current()?;
        Ok(rolling)
    }

    fn file_path(&self, index: u32) -> PathBuf {
        let filename = if index == 0 {
            format!("{}{}.log", LOG_FILE_PREFIX, self.start_timestamp)
        } else {
            format!("{}{}_{}.log", LOG_FILE_PREFIX, self.start_timestamp, index)
        };
        self.log_dir.join(filename)
    }

    fn open_current(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_path(self.current_index))?;
        self.current_file = Some(file);
        self.current_size = 0;
        Ok(())
    }

    fn write_data(&mut self, buf: &[u8]) -> io::Result<usize> {
        // 写入后超出上限则先滚动到下一个文件
        if self.current_size + buf.len() as u64 > self.max_file_size {
            if let Some(mut file) = self.current_file.take() {
                file.flush()?;
            }
            self.current_index += 1;
            self.open_current()?;
        }

        let file = self
            .current_file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "日志文件未打开"))?;
        let written = file.write(buf)?;
        self.current_size += written as u64;
        Ok(written)
    }

    fn flush_file(&mut self) -> io::Result<()> {
        match self.current_file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// 日志文件写入器（线程安全包装），作为 tracing-appender 的输出目标
#[derive(Clone)]
pub struct LogFileWriter {
    inner: Arc<Mutex<RollingFile>>,
}

impl LogFileWriter {
    pub fn new(log_dir: PathBuf, max_file_size: u64) -> io::Result<Self> {
        Ok(Self {
            inner: Arc::new(Mutex::new(RollingFile::open(log_dir, max_file_size)?)),
        })
    }
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write_data(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush_file()
    }
}

/// 日志系统守卫
/// 必须保持存活，否则日志写入线程会终止
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// 初始化日志系统
///
/// 返回的 `LogGuard` 需要保持存活直到程序结束
pub fn init_logging(config: &LogConfig) -> LogGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_ansi(true);

    if !config.enabled {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();
        info!("日志系统初始化完成（仅控制台输出）");
        return LogGuard { _file_guard: None };
    }

    let writer = fs::create_dir_all(&config.log_dir)
        .and_then(|_| LogFileWriter::new(config.log_dir.clone(), config.max_file_size));

    let writer = match writer {
        Ok(writer) => writer,
        Err(e) => {
            eprintln!(
                "创建日志文件失败: {:?}, 错误: {}, 回退到仅控制台输出",
                config.log_dir, e
            );
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .init();
            return LogGuard { _file_guard: None };
        }
    };

    let (non_blocking, file_guard) = tracing_appender::non_blocking(writer);

    // 文件输出层（不带 ANSI 颜色）
    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_ansi(false)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!(
        "日志系统初始化完成: 目录={:?}, 保留天数={}, 级别={}, 单文件最大={:.1}MB",
        config.log_dir,
        config.retention_days,
        config.level,
        config.max_file_size as f64 / 1024.0 / 1024.0
    );

    cleanup_old_logs(&config.log_dir, config.retention_days);

    LogGuard {
        _file_guard: Some(file_guard),
    }
}

/// 清理过期日志文件，返回删除的文件数
fn cleanup_old_logs(log_dir: &Path, retention_days: u32) -> usize {
    let today = Local::now().date_naive();
    let retention = chrono::Duration::days(retention_days as i64);

    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("读取日志目录失败: {:?}, 错误: {}", log_dir, e);
            return 0;
        }
    };

    let mut deleted_count = 0;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(date) = path
            .file_name()
            .and_then(|s| s.to_str())
            .and_then(extract_date_from_filename)
        else {
            continue;
        };

        if today.signed_duration_since(date) <= retention {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                deleted_count += 1;
                tracing::debug!("已删除过期日志文件: {:?}", path);
            }
            Err(e) => tracing::warn!("删除过期日志文件失败: {:?}, 错误: {}", path, e),
        }
    }

    if deleted_count > 0 {
        info!("已清理 {} 个过期日志文件", deleted_count);
    }
    deleted_count
}

/// 从日志文件名中提取日期
///
/// - collab-folders.YYYY-MM-DD-HHMMSS.log
/// - collab-folders.YYYY-MM-DD-HHMMSS_N.log
fn extract_date_from_filename(filename: &str) -> Option<chrono::NaiveDate> {
    let name = filename
        .strip_prefix(LOG_FILE_PREFIX)?
        .strip_suffix(".log")?;
    let date_part = name.get(..10)?;
    chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extract_date_from_filename() {
        let expected = chrono::NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            extract_date_from_filename("collab-folders.2024-03-09-101500.log"),
            Some(expected)
        );
        assert_eq!(
            extract_date_from_filename("collab-folders.2024-03-09-101500_3.log"),
            Some(expected)
        );
        assert_eq!(extract_date_from_filename("other.2024-03-09.log"), None);
        assert_eq!(extract_date_from_filename("collab-folders.garbage.log"), None);
    }

    #[test]
    fn test_rolling_file_rotates_on_size() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = LogFileWriter::new(temp_dir.path().to_path_buf(), 16).unwrap();

        writer.write_all(b"0123456789").unwrap();
        writer.write_all(b"0123456789").unwrap();
        writer.flush().unwrap();

        let count = fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_cleanup_old_logs() {
        let temp_dir = TempDir::new().unwrap();
        let old = temp_dir.path().join("collab-folders.2000-01-01-000000.log");
        let fresh_name = format!(
            "collab-folders.{}.log",
            Local::now().format("%Y-%m-%d-%H%M%S")
        );
        let fresh = temp_dir.path().join(fresh_name);
        let unrelated = temp_dir.path().join("notes.txt");
        for path in [&old, &fresh, &unrelated] {
            fs::write(path, b"x").unwrap();
        }

        assert_eq!(cleanup_old_logs(temp_dir.path(), 7), 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(unrelated.exists());
    }
}
