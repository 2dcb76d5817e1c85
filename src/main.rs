use anyhow::{bail, Context, Result};
use collaborative_folders::{
    access::folder_path,
    config::{AppConfig, LogConfig, DEFAULT_CONFIG_PATH},
    logging,
    oauth::ConfigFileTokenStore,
    provision, AccessContext, AccessRecordStore, ConfiguredIssuers, FolderAccess, SessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const USAGE: &str = "用法:
  collab-folders check                         检查 issuer 配置并建立系统会话
  collab-folders register <cmid> [--groups] [--teacher-access]
                                               登记活动（创建后不可更改）
  collab-folders provision <cmid> [group ...]  预建活动的文件夹树
  collab-folders status <cmid>                 查看活动的文件夹创建状态
  collab-folders reset <cmid> <user id>        重置用户的分享记录";

/// 加载日志配置
///
/// 日志系统初始化之前读取，失败时返回默认配置
async fn load_log_config() -> LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(DEFAULT_CONFIG_PATH).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into::<LogConfig>() {
                    return log_config;
                }
            }
        }
    }

    LogConfig::default()
}

fn parse_id(value: &str, what: &str) -> Result<i64> {
    value
        .trim()
        .parse()
        .with_context(|| format!("无效的{}: {}", what, value))
}

fn issuers_of(config: &AppConfig) -> ConfiguredIssuers {
    // 远端每次刷新都会轮换 refresh token，写回配置供下次启动使用
    ConfiguredIssuers::new(
        config.issuers.clone(),
        Duration::from_secs(config.folders.http_timeout_secs),
    )
    .with_token_store(Arc::new(ConfigFileTokenStore::new(DEFAULT_CONFIG_PATH)))
}

/// 检查 issuer 并尝试建立系统会话
async fn run_check(config: &AppConfig) -> Result<()> {
    let issuers = issuers_of(config);
    let manager = SessionManager::new(&config.folders, &issuers);

    let issuer = manager.selected_issuer().await.ok();
    let status = SessionManager::validate_issuer(issuer.as_ref());
    let issuer_name = issuer.as_ref().map(|i| i.name.as_str()).unwrap_or("");
    println!("{}", status.message(issuer_name));

    let usable = issuers.usable_issuer_names();
    if !usable.is_empty() {
        println!("可用的 issuer: {}", usable.join(", "));
    }

    let session = manager.acquire().await?;
    println!("系统会话建立成功: {}", session.base_url());
    Ok(())
}

async fn run_provision(config: &AppConfig, args: &[String]) -> Result<()> {
    let Some(cmid) = args.first() else {
        bail!("{}", USAGE);
    };
    let cmid = parse_id(cmid, "活动 ID")?;
    let groups = args[1..]
        .iter()
        .map(|g| parse_id(g, "小组 ID"))
        .collect::<Result<Vec<_>>>()?;

    let issuers = issuers_of(config);
    let session = SessionManager::new(&config.folders, &issuers)
        .acquire()
        .await?;
    let store = AccessRecordStore::new(&config.persistence.db_path)?;
    if store.get_activity(cmid)?.is_none() {
        let settings = store.register_activity(cmid, !groups.is_empty(), false)?;
        warn!(
            "活动未登记，按参数自动登记: cmid={}, group_mode={}",
            cmid, settings.group_mode
        );
    }
    let access = FolderAccess::new(Arc::new(session), Arc::new(store));

    let report = provision(&access, cmid, &groups).await?;
    for path in &report.created {
        println!("已创建: {}", path);
    }
    for path in &report.existing {
        println!("已存在: {}", path);
    }
    for message in report.failure_messages() {
        println!("失败: {}", message);
    }

    if !report.is_complete() {
        bail!("文件夹预建未全部完成: {}", folder_path(cmid, None));
    }
    Ok(())
}

async fn run_register(config: &AppConfig, args: &[String]) -> Result<()> {
    let Some((cmid, flags)) = args.split_first() else {
        bail!("{}", USAGE);
    };
    let cmid = parse_id(cmid, "活动 ID")?;

    let mut group_mode = false;
    let mut teacher_access = false;
    for flag in flags {
        match flag.as_str() {
            "--groups" => group_mode = true,
            "--teacher-access" => teacher_access = true,
            other => bail!("未知参数: {}\n{}", other, USAGE),
        }
    }

    let store = AccessRecordStore::new(&config.persistence.db_path)?;
    let settings = store.register_activity(cmid, group_mode, teacher_access)?;
    println!(
        "活动 {}: {}, {}",
        settings.cmid,
        if settings.group_mode {
            "One folder per group"
        } else {
            "One folder for the entire course"
        },
        if settings.teacher_access {
            "Teachers have access to all folders"
        } else {
            "Folders remain private from teachers"
        }
    );
    Ok(())
}

async fn run_status(config: &AppConfig, args: &[String]) -> Result<()> {
    let [cmid] = args else {
        bail!("{}", USAGE);
    };
    let cmid = parse_id(cmid, "活动 ID")?;

    let store = AccessRecordStore::new(&config.persistence.db_path)?;
    let Some(settings) = store.get_activity(cmid)? else {
        bail!("活动未登记: cmid={}", cmid);
    };

    println!("Folder status: {}", settings.creation_status.label());
    let records = store.records_for_activity(cmid)?;
    let linked = records.iter().filter(|r| r.link.is_some()).count();
    println!("已生成链接: {} / {}", linked, records.len());
    Ok(())
}

async fn run_reset(config: &AppConfig, args: &[String]) -> Result<()> {
    let [cmid, user_id] = args else {
        bail!("{}", USAGE);
    };
    let context = AccessContext::user(parse_id(cmid, "活动 ID")?, user_id.trim());

    // 只删除本地记录，不需要远端会话
    let store = AccessRecordStore::new(&config.persistence.db_path)?;
    if store.delete_record(&context)? {
        info!("分享记录已重置: {}", context);
        println!("已重置: {}", context);
    } else {
        warn!("没有可重置的分享记录: {}", context);
        println!("没有记录: {}", context);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 🔥 先加载日志配置，日志守卫必须保持存活
    let log_config = load_log_config().await;
    let _log_guard = logging::init_logging(&log_config);

    info!("Collaborative Folders v{} 启动中...", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = AppConfig::load_or_default(DEFAULT_CONFIG_PATH).await;

    let result = match command.as_str() {
        "check" => run_check(&config).await,
        "register" => run_register(&config, &args[1..]).await,
        "provision" => run_provision(&config, &args[1..]).await,
        "status" => run_status(&config, &args[1..]).await,
        "reset" => run_reset(&config, &args[1..]).await,
        other => {
            println!("{}", USAGE);
            Err(anyhow::anyhow!("未知命令: {}", other))
        }
    };

    if let Err(e) = &result {
        error!("命令执行失败: {:#}", e);
    }
    result
}
