use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use swarm_config::{ConfigValidator, LogLevel, OutputFormat};
use swarm_core::{ObserverEvent, StatusSnapshot};
use swarm_infrastructure::UdpTransport;
use swarm_search::common::{init_logging, load_config, run_until_signal};
use swarm_search::shutdown::ShutdownManager;
use swarm_worker::{ObserverClient, ObserverExit};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("observer")
        .version("1.0.0")
        .about("扇区搜索观察者")
        .long_about("订阅协调器的事件流，打印历史回放、实时事件和周期性状态快照")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，默认查找 config/swarm.toml"),
        )
        .arg(
            Arg::new("coordinator")
                .short('a')
                .long("coordinator")
                .value_name("ADDR")
                .help("协调器观察者通道地址"),
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

    if let Some(address) = matches.get_one::<String>("coordinator") {
        config.observer.coordinator_address = address.clone();
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

    let observer_config = config.observer;
    info!("连接协调器观察者通道: {}", observer_config.coordinator_address);

    let bind_address = observer_config
        .bind_address
        .parse()
        .with_context(|| format!("无效的本地地址: {}", observer_config.bind_address))?;
    let transport = Arc::new(
        UdpTransport::bind(bind_address)
            .await
            .with_context(|| format!("绑定本地地址失败: {}", observer_config.bind_address))?,
    );
    let client = ObserverClient::from_config(&observer_config, transport)?;

    let exit = run_until_signal("观察者", ShutdownManager::new(), |shutdown_rx| async move {
        Ok::<_, anyhow::Error>(client.run(shutdown_rx, print_event).await?)
    })
    .await?;

    match exit {
        Some(ObserverExit::Concluded { .. }) => info!("搜索已结束"),
        Some(ObserverExit::CoordinatorShutdown) => info!("协调器已关闭"),
        Some(ObserverExit::Interrupted) | None => info!("观察者已退出"),
    }
    Ok(())
}

fn print_event(event: &ObserverEvent) {
    match event {
        ObserverEvent::Init { total_items } => {
            println!("已连接协调器，共 {} 个扇区", total_items);
        }
        ObserverEvent::Event { entry } => {
            println!("[{}] {}", entry.timestamp.format("%H:%M:%S%.3f"), entry.event);
        }
        ObserverEvent::Status { snapshot } => print_status(snapshot),
        ObserverEvent::SearchConcluded {
            target_found: true,
            item_id,
            worker_id,
        } => {
            println!(
                "搜索结束: 蜂群 #{} 在扇区 {} 找到目标",
                worker_id.map_or_else(|| "?".to_string(), |id| id.to_string()),
                item_id.map_or_else(|| "?".to_string(), |id| id.to_string()),
            );
        }
        ObserverEvent::SearchConcluded { .. } => {
            println!("搜索结束: 所有扇区已搜索完毕，未找到目标");
        }
        ObserverEvent::Shutdown => println!("协调器已关闭"),
    }
}

fn print_status(snapshot: &StatusSnapshot) {
    println!("状态快照:");
    println!(
        "  扇区: 未分配 {} / 搜索中 {} / 已完成 {}",
        snapshot.items.unassigned, snapshot.items.assigned, snapshot.items.completed
    );
    println!(
        "  蜂群: 共 {} / 活跃 {} / 断开 {}",
        snapshot.workers_total, snapshot.workers_active, snapshot.workers_disconnected
    );
    if let (Some(item_id), Some(worker_id)) = (snapshot.found_item, snapshot.found_by) {
        println!("  目标已由蜂群 #{} 在扇区 {} 找到", worker_id, item_id);
    } else if snapshot.all_items_exhausted {
        println!("  所有扇区已搜索完毕");
    }
}
