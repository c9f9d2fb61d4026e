use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use swarm_config::{ConfigValidator, LogLevel, OutputFormat};
use swarm_infrastructure::UdpTransport;
use swarm_search::common::{init_logging, load_config, run_until_signal};
use swarm_search::shutdown::ShutdownManager;
use swarm_worker::{WorkerExit, WorkerService};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("worker")
        .version("1.0.0")
        .about("扇区搜索蜂群")
        .long_about("连接协调器，循环领取扇区、模拟搜索并上报结果，直到目标被找到或协调器关闭")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，默认查找 config/swarm.toml"),
        )
        .arg(
            Arg::new("worker-id")
                .short('w')
                .long("worker-id")
                .value_name("ID")
                .help("蜂群唯一标识")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("coordinator")
                .short('a')
                .long("coordinator")
                .value_name("ADDR")
                .help("协调器蜂群通道地址"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("以JSON格式输出日志")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let mut config = load_config(matches.get_one::<String>("config").map(String::as_str))?;

    if let Some(worker_id) = matches.get_one::<u32>("worker-id") {
        config.worker.worker_id = *worker_id;
    }
    if let Some(address) = matches.get_one::<String>("coordinator") {
        config.worker.coordinator_address = address.clone();
    }
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.observability.log_level = level
            .parse::<LogLevel>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    if matches.get_flag("json") {
        config.observability.log_format = OutputFormat::Json;
    }
    config.validate().context("配置校验失败")?;

    init_logging(config.observability.log_level, config.observability.log_format)?;

    let worker_config = config.worker;
    info!(
        "启动蜂群 #{}，协调器地址: {}",
        worker_config.worker_id, worker_config.coordinator_address
    );

    let bind_address = worker_config
        .bind_address
        .parse()
        .with_context(|| format!("无效的本地地址: {}", worker_config.bind_address))?;
    let transport = Arc::new(
        UdpTransport::bind(bind_address)
            .await
            .with_context(|| format!("绑定本地地址失败: {}", worker_config.bind_address))?,
    );
    let service = WorkerService::from_config(worker_config, transport)?;

    let exit = run_until_signal("蜂群", ShutdownManager::new(), |shutdown_rx| async move {
        Ok::<_, anyhow::Error>(service.run(shutdown_rx).await?)
    })
    .await?;

    match exit {
        Some(WorkerExit::FoundTarget) => info!("本蜂群找到了目标"),
        Some(WorkerExit::TargetFoundElsewhere) => info!("目标已被其他蜂群找到"),
        Some(WorkerExit::CoordinatorShutdown) => info!("协调器已关闭"),
        Some(WorkerExit::Interrupted) | None => info!("蜂群已退出"),
    }
    Ok(())
}
