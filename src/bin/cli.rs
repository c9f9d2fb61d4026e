use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Subcommand;
use swarm_core::{
    decode, send_message, ControlCommand, ControlResponse, StatusSnapshot, Transport,
    WorkerSnapshot, WorkerStatus,
};
use swarm_infrastructure::UdpTransport;
use swarm_search::common::load_config;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化简单的日志系统
    tracing_subscriber::fmt::init();

    let cli = CliApp::parse();
    cli.run().await
}

/// CLI应用程序主结构
#[derive(clap::Parser, Debug)]
#[command(name = "swarmctl")]
#[command(version = "1.0.0")]
#[command(about = "扇区搜索协调器 - 管理工具")]
#[command(long_about = "通过协调器的管理通道查看蜂群、查询状态、断开或重新准入蜂群")]
struct CliApp {
    #[command(subcommand)]
    command: Commands,

    /// 协调器管理通道地址，默认取配置文件中的 coordinator.control_bind_address
    #[arg(short, long)]
    address: Option<String>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 等待应答的时间 (毫秒)
    #[arg(long, default_value = "1000")]
    timeout_ms: u64,

    /// 最大尝试次数
    #[arg(long, default_value = "3")]
    attempts: u32,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 列出所有蜂群
    List,
    /// 显示搜索状态
    Status,
    /// 强制断开蜂群，回收其扇区
    Disconnect {
        /// 蜂群ID
        worker_id: u32,
    },
    /// 重新准入被断开的蜂群
    Readmit {
        /// 蜂群ID
        worker_id: u32,
    },
}

impl CliApp {
    fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    async fn run(self) -> Result<()> {
        let address = match self.address {
            Some(address) => address,
            None => {
                load_config(self.config.as_deref())?
                    .coordinator
                    .control_bind_address
            }
        };
        let target: SocketAddr = address
            .parse()
            .with_context(|| format!("无效的管理通道地址: {address}"))?;

        let command = match self.command {
            Commands::List => ControlCommand::ListWorkers,
            Commands::Status => ControlCommand::Status,
            Commands::Disconnect { worker_id } => ControlCommand::DisconnectWorker { worker_id },
            Commands::Readmit { worker_id } => ControlCommand::ReadmitWorker { worker_id },
        };

        let response = send_command(
            target,
            command,
            Duration::from_millis(self.timeout_ms),
            self.attempts.max(1),
        )
        .await?;

        match response {
            ControlResponse::Workers { workers } => print_workers_table(&workers),
            ControlResponse::Status { snapshot } => print_status(&snapshot),
            ControlResponse::Ok { message } => println!("{message}"),
            ControlResponse::Error { message } => {
                return Err(anyhow::anyhow!("协调器拒绝了命令: {}", message));
            }
        }
        Ok(())
    }
}

/// 发送管理命令并等待应答，超时后重发
async fn send_command(
    target: SocketAddr,
    command: ControlCommand,
    reply_timeout: Duration,
    attempts: u32,
) -> Result<ControlResponse> {
    let bind_address: SocketAddr = if target.is_ipv4() {
        "0.0.0.0:0".parse()?
    } else {
        "[::]:0".parse()?
    };
    let transport = UdpTransport::bind(bind_address)
        .await
        .context("绑定本地地址失败")?;

    for attempt in 1..=attempts {
        send_message(&transport, &command, target)
            .await
            .context("发送管理命令失败")?;

        while let Some(datagram) = transport.recv_from(reply_timeout).await? {
            if datagram.source != target {
                continue;
            }
            return decode(&datagram.payload).context("无法解析协调器应答");
        }
        eprintln!("等待应答超时 (第 {attempt}/{attempts} 次)");
    }

    Err(anyhow::anyhow!("协调器 {} 无应答", target))
}

fn print_workers_table(workers: &[WorkerSnapshot]) {
    if workers.is_empty() {
        println!("暂无蜂群");
        return;
    }

    println!(
        "{:<8} {:<22} {:<8} {:<8} {:<8} {:<6} {}",
        "ID", "地址", "状态", "当前扇区", "已完成", "封禁", "最后活跃"
    );
    println!("{}", "-".repeat(90));
    for worker in workers {
        let status = match worker.status {
            WorkerStatus::Active => "活跃",
            WorkerStatus::Disconnected => "断开",
        };
        println!(
            "{:<8} {:<22} {:<8} {:<8} {:<8} {:<6} {}",
            worker.worker_id,
            worker.endpoint,
            status,
            worker
                .current_assignment
                .map_or_else(|| "-".to_string(), |id| id.to_string()),
            worker.items_completed,
            if worker.blocked { "是" } else { "否" },
            worker.last_seen.format("%Y-%m-%d %H:%M:%S"),
        );
    }
}

fn print_status(snapshot: &StatusSnapshot) {
    println!("搜索状态:");
    println!("  扇区总数: {}", snapshot.items.total);
    println!("  未分配: {}", snapshot.items.unassigned);
    println!("  搜索中: {}", snapshot.items.assigned);
    println!("  已完成: {}", snapshot.items.completed);
    println!(
        "  蜂群: 共 {} / 活跃 {} / 断开 {}",
        snapshot.workers_total, snapshot.workers_active, snapshot.workers_disconnected
    );

    match (snapshot.found_item, snapshot.found_by) {
        (Some(item_id), Some(worker_id)) => {
            println!("  结论: 蜂群 #{} 在扇区 {} 找到目标", worker_id, item_id)
        }
        _ if snapshot.all_items_exhausted => println!("  结论: 所有扇区已搜索完毕，未找到目标"),
        _ => println!("  结论: 搜索进行中"),
    }

    if !snapshot.item_details.is_empty() {
        println!();
        println!("{:<8} {:<10} {}", "扇区", "状态", "蜂群");
        for item in &snapshot.item_details {
            println!(
                "{:<8} {:<10} {}{}",
                item.id,
                format!("{:?}", item.state),
                item.assigned_worker
                    .map_or_else(|| "-".to_string(), |id| format!("#{id}")),
                if item.target_found_here { "  <- 目标" } else { "" },
            );
        }
    }
}
