use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use swarm_config::{ConfigValidator, LogLevel, OutputFormat};
use swarm_dispatcher::DispatcherExit;
use swarm_search::app::Application;
use swarm_search::common::{init_logging, init_metrics, load_config, run_until_signal};
use swarm_search::shutdown::ShutdownManager;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("coordinator")
        .version("1.0.0")
        .about("扇区搜索协调器")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，默认查找 config/swarm.toml"),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("ADDR")
                .help("蜂群通道监听地址"),
        )
        .arg(
            Arg::new("items")
                .short('n')
                .long("items")
                .value_name("COUNT")
                .help("扇区总数")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("target")
                .short('t')
                .long("target")
                .value_name("ID")
                .help("目标所在扇区，默认随机")
                .value_parser(clap::value_parser!(u32)),
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

    // 命令行参数覆盖配置文件
    if let Some(bind) = matches.get_one::<String>("bind") {
        config.coordinator.bind_address = bind.clone();
    }
    if let Some(items) = matches.get_one::<usize>("items") {
        config.coordinator.total_items = *items;
    }
    if let Some(target) = matches.get_one::<u32>("target") {
        config.coordinator.target_item = Some(*target);
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
    init_metrics(&config.observability)?;

    info!("启动扇区搜索协调器");

    let shutdown_manager = ShutdownManager::with_timeout(config.coordinator.shutdown_timeout());
    let app = Application::new(config).await?;

    let exit = run_until_signal("协调器", shutdown_manager, |shutdown_rx| async move {
        app.run(shutdown_rx).await
    })
    .await?;

    match exit {
        Some(DispatcherExit::Concluded(conclusion)) => info!("协调器退出，结论: {:?}", conclusion),
        Some(DispatcherExit::Shutdown) | None => info!("协调器已退出"),
    }
    Ok(())
}
