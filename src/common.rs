use std::future::Future;

use anyhow::{Context, Result};
use swarm_config::{AppConfig, LogLevel, ObservabilityConfig, OutputFormat};
use swarm_infrastructure::install_prometheus_exporter;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::shutdown::ShutdownManager;

/// 初始化日志系统
///
/// `RUST_LOG` 环境变量优先于传入的日志级别。
pub fn init_logging(log_level: LogLevel, log_format: OutputFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        OutputFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        OutputFormat::Pretty => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
    }

    Ok(())
}

/// 加载应用配置
///
/// 指定的配置文件必须存在；未指定时按默认路径查找，找不到则使用内置默认值。
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    AppConfig::load(config_path).with_context(|| match config_path {
        Some(path) => format!("加载配置文件失败: {path}"),
        None => "加载默认配置失败".to_string(),
    })
}

/// 按配置启动 Prometheus 导出器
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if !config.metrics_enabled {
        return Ok(());
    }
    let Some(address) = &config.metrics_bind_address else {
        return Ok(());
    };

    let addr = address
        .parse()
        .with_context(|| format!("无效的指标导出地址: {address}"))?;
    install_prometheus_exporter(addr)?;
    info!("Prometheus 指标导出地址: http://{}/metrics", address);
    Ok(())
}

/// 运行任务直到其自行结束，或在收到 Ctrl+C / SIGTERM 后通知其退出
///
/// 收到信号后最多等待 `shutdown_manager` 的超时时间。
pub async fn run_until_signal<T, F, Fut>(
    service_name: &str,
    shutdown_manager: ShutdownManager,
    run: F,
) -> Result<Option<T>>
where
    F: FnOnce(broadcast::Receiver<()>) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let mut handle = tokio::spawn(run(shutdown_manager.subscribe().await));

    tokio::select! {
        joined = &mut handle => {
            let value = joined.with_context(|| format!("{service_name} 任务异常退出"))??;
            return Ok(Some(value));
        }
        _ = wait_for_shutdown_signal() => {}
    }

    info!("收到关闭信号，开始优雅关闭 {}", service_name);

    let mut outcome = None;
    let completed = shutdown_manager
        .graceful_shutdown(async {
            outcome = Some(handle.await);
        })
        .await;

    match outcome {
        Some(Ok(result)) => Ok(Some(result?)),
        Some(Err(e)) => {
            error!("{} 任务异常退出: {}", service_name, e);
            Ok(None)
        }
        None => {
            if !completed {
                warn!("{} 关闭超时，强制退出", service_name);
            }
            Ok(None)
        }
    }
}

/// 等待关闭信号
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}
