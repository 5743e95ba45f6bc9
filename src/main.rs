//! 应用程序入口 (Application Entrypoint)
//!
//! 负责 CLI 指令解析、遥测层初始化，并通过共享拦截层发起探测请求。

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use reqwest::{Method, Request};
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use url::Url;

use metarouter::core::event::{EventReceiver, create_event_channel};
use metarouter::{
    AppConfig, BlockingMode, HttpTransport, Result, SegmentBlockerProtocol, TaskResponse,
};

/// 命令行界面脚手架 (CLI Scaffolding)
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 经拦截层向目标地址发起请求并报告结果
    Fetch {
        /// 目标 URL
        url: String,
        /// 拦截模式 (off / always / next)，缺省取配置文件
        #[arg(short, long)]
        mode: Option<BlockingMode>,
        /// 追加拦截域名片段
        #[arg(short, long)]
        block: Vec<String>,
        /// 请求次数
        #[arg(short, long, default_value_t = 1)]
        count: usize,
        /// 请求入口
        #[arg(short, long, value_enum, default_value_t = Entry::Async)]
        entry: Entry,
        /// 强制注册 Segment 阻断协议处理器
        #[arg(long)]
        protocol_handler: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Entry {
    /// 异步入口 `execute`
    Async,
    /// 回调入口：结构化请求
    Request,
    /// 回调入口：裸 URL
    Url,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 遥测层初始化 (Telemetry Layer Initialization)
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let config = AppConfig::load()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            url,
            mode,
            block,
            count,
            entry,
            protocol_handler,
        } => {
            let (events, receiver) = create_event_channel();
            let transport = HttpTransport::builder()
                .config(config.transport.clone())
                .events(events)
                .build()?;

            let reporter = tokio::spawn(report_events(receiver));

            let interception = &config.interception;
            transport.set_blocked_domains(interception.blocked_domains.iter().cloned());
            for domain in block {
                transport.add_blocked_domain(domain);
            }
            if protocol_handler || interception.register_protocol_handler {
                transport.register_protocol(Arc::new(SegmentBlockerProtocol::shared(
                    transport.policy().clone(),
                )));
            }
            if interception.install_on_start {
                transport.install();
            }
            transport.apply_mode(mode.unwrap_or(interception.mode));

            let target = Url::parse(&url)?;
            for attempt in 1..=count {
                let outcome = send(&transport, entry, target.clone()).await?;
                match outcome {
                    Ok(resp) => info!(
                        "[{}] {} {} ({} bytes)",
                        attempt,
                        resp.status(),
                        target,
                        resp.body.len()
                    ),
                    Err(e) if e.is_cancelled() => warn!("[{}] 已拦截: {}", attempt, target),
                    Err(e) => error!("[{}] 请求失败: {}", attempt, e),
                }
            }

            // 释放发送端后等待剩余事件输出
            drop(transport);
            let _ = tokio::time::timeout(Duration::from_secs(1), reporter).await;
        }
    }

    Ok(())
}

/// 通过指定入口发送一次请求
async fn send(
    transport: &HttpTransport,
    entry: Entry,
    url: Url,
) -> anyhow::Result<Result<TaskResponse>> {
    match entry {
        Entry::Async => {
            let outcome = match transport.execute(Request::new(Method::GET, url)).await {
                Ok(resp) => TaskResponse::read(resp).await,
                Err(e) => Err(e),
            };
            Ok(outcome)
        }
        Entry::Request | Entry::Url => {
            let (tx, rx) = oneshot::channel();
            let completion = move |outcome: Result<TaskResponse>| {
                let _ = tx.send(outcome);
            };
            let task = match entry {
                Entry::Request => transport.data_task(Request::new(Method::GET, url), completion),
                _ => transport.data_task_with_url(url, completion),
            };
            if task.is_decoy() {
                info!("返回诱饵任务 (cancelled = {})", task.is_cancelled());
            }
            Ok(rx.await?)
        }
    }
}

async fn report_events(receiver: EventReceiver) {
    while let Some(event) = receiver.recv_async().await {
        info!("事件: {:?}", event);
    }
}
