//! 日志初始化
//! stdout 始终开启；配置了日志路径时额外写入按天轮转的文件

use std::path::{Path, PathBuf};

use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::LoggingConfig;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

const LOG_FILE_PREFIX: &str = "bridgecore.log";

/// `RUST_LOG` 优先；否则使用配置级别，并压低 HTTP 栈的噪音
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},hyper=warn,reqwest=warn,rustls=warn", level))
    })
}

fn fmt_layer<W>(json: bool, ansi: bool, writer: W) -> BoxedLayer
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339());
    if json {
        layer.json().boxed()
    } else {
        layer.with_ansi(ansi).boxed()
    }
}

fn log_dir(config: &LoggingConfig) -> PathBuf {
    config
        .log_file_path
        .as_deref()
        .map(Path::new)
        .and_then(Path::parent)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("./logs"))
}

/// 安装全局 subscriber
///
/// 文件日志开启时返回 [`WorkerGuard`]，丢弃后缓冲中的日志不再落盘。
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let json = config.format == "json";
    let mut layers: Vec<BoxedLayer> = vec![fmt_layer(json, true, std::io::stdout)];

    let guard = if config.enable_file_logging {
        let dir = log_dir(config);
        std::fs::create_dir_all(&dir)?;
        let (writer, guard) = tracing_appender::non_blocking(rolling::daily(&dir, LOG_FILE_PREFIX));
        layers.push(fmt_layer(json, false, writer));
        Some(guard)
    } else {
        None
    };

    Registry::default()
        .with(layers)
        .with(build_filter(&config.level))
        .try_init()?;

    Ok(guard)
}

/// 按默认配置初始化；失败时退回最简 fmt subscriber
pub fn init_default_logging() -> Option<WorkerGuard> {
    match init_logging(&LoggingConfig::default()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            let _ = tracing_subscriber::fmt().try_init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_defaults_when_path_has_no_parent() {
        let mut config = LoggingConfig::default();
        config.log_file_path = Some("bridgecore.log".into());
        assert_eq!(log_dir(&config), PathBuf::from("./logs"));

        config.log_file_path = Some("/var/log/bridgecore/app.log".into());
        assert_eq!(log_dir(&config), PathBuf::from("/var/log/bridgecore"));
    }

    #[test]
    fn test_second_init_is_rejected() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: "json".to_string(),
            enable_file_logging: false,
            log_file_path: None,
        };

        let _ = init_logging(&config);
        // 全局 subscriber 只能设置一次
        assert!(init_logging(&config).is_err());
    }
}
