//! Pool protocol probe.
//!
//! Connects to a pool the way a miner would: logs in, prints the job and any
//! addenda, optionally downloads the full scratchpad and then keeps
//! following `newjob` notifications.

use anyhow::{Context, Result, bail};
use clap::Parser;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use pool_miner::protocol::{
    GetFullScratchpadResponse, GetJobResponse, HeightInfo, JobDetails, LoginResponse, Method,
    NEW_JOB_NOTIFICATION, ServerMessage, Status,
};
use pool_miner::types::Hash;

#[derive(Parser, Debug)]
#[command(name = "pool-probe", about = "Speak the pool protocol as a miner would")]
struct Args {
    /// Pool address
    #[arg(short, long, default_value = "127.0.0.1:4455")]
    addr: String,

    #[arg(short, long)]
    login: String,

    #[arg(short, long, default_value = "")]
    pass: String,

    /// Height the probe claims to be synced to
    #[arg(long, default_value_t = 0)]
    height: u64,

    /// Block id at --height, hex
    #[arg(long)]
    block_id: Option<String>,

    /// Fetch the full scratchpad after logging in
    #[arg(long)]
    full_scratchpad: bool,

    /// Follow this many newjob notifications, re-fetching the job each time
    #[arg(long, default_value_t = 0)]
    follow: usize,
}

type Lines = Framed<TcpStream, LinesCodec>;

struct Probe {
    lines: Lines,
    next_id: u64,
}

impl Probe {
    async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connecting to {addr}"))?;
        Ok(Self {
            lines: Framed::new(stream, LinesCodec::new()),
            next_id: 1,
        })
    }

    async fn call(&mut self, method: Method, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;
        let request = json!({"id": id, "method": method.as_ref(), "params": params});
        debug!(%request, "->");
        self.lines.send(request.to_string()).await?;

        loop {
            match self.next_message().await? {
                ServerMessage::Response(resp) if resp.id == id => return Ok(resp.result),
                ServerMessage::Response(resp) => warn!(id = resp.id, "Unexpected response id"),
                ServerMessage::Notification(n) => debug!(method = %n.method, "Notification while waiting"),
            }
        }
    }

    async fn next_message(&mut self) -> Result<ServerMessage> {
        let line = self
            .lines
            .next()
            .await
            .context("connection closed by pool")??;
        debug!(%line, "<-");
        Ok(serde_json::from_str(&line)?)
    }

    async fn wait_for_new_job(&mut self) -> Result<()> {
        loop {
            if let ServerMessage::Notification(n) = self.next_message().await? {
                if n.method == NEW_JOB_NOTIFICATION {
                    return Ok(());
                }
            }
        }
    }
}

fn print_job(job: &JobDetails, addms: usize) {
    println!("job {}:", job.job_id);
    println!("  builds on   {} ({})", job.prev_hi.height, job.prev_hi.block_id);
    println!("  difficulty  {}", job.difficulty);
    println!("  blob        {}", job.blob);
    println!("  addenda     {addms}");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let block_id = match &args.block_id {
        Some(hex) => hex.parse::<Hash>().context("--block-id")?,
        None => Hash::ZERO,
    };
    let mut hi = HeightInfo::new(args.height, block_id);

    let mut probe = Probe::connect(&args.addr).await?;
    info!(addr = %args.addr, login = %args.login, "Connected");

    let result = probe
        .call(
            Method::Login,
            json!({"login": args.login, "pass": args.pass, "agent": "pool-probe", "hi": hi}),
        )
        .await?;
    let login: LoginResponse = serde_json::from_value(result)?;
    println!("login: {} (session {})", login.status, login.id);
    if login.status == Status::Unauthorized.as_str() {
        bail!("login rejected");
    }
    if login.status == Status::Ok.as_str() {
        print_job(&login.job, login.addms.len());
        hi = login.job.prev_hi;
    }

    if args.full_scratchpad {
        let result = probe.call(Method::GetFullScratchpad, json!({})).await?;
        let full: GetFullScratchpadResponse = serde_json::from_value(result)?;
        let hashes = Hash::split_hex(&full.scratchpad_hex)?;
        println!(
            "scratchpad: {} ({} hashes, top {})",
            full.status,
            hashes.len(),
            full.hi.height
        );
        hi = full.hi;

        let result = probe.call(Method::GetJob, json!({"hi": hi})).await?;
        let job: GetJobResponse = serde_json::from_value(result)?;
        println!("getjob: {}", job.status);
        if job.status == Status::Ok.as_str() {
            print_job(&job.jd, job.addms.len());
        }
    }

    for _ in 0..args.follow {
        probe.wait_for_new_job().await?;
        info!("New job announced");

        let result = probe.call(Method::GetJob, json!({"hi": hi})).await?;
        let job: GetJobResponse = serde_json::from_value(result)?;
        println!("getjob: {}", job.status);
        if job.status == Status::Ok.as_str() {
            print_job(&job.jd, job.addms.len());
            hi = job.jd.prev_hi;
        }
    }

    Ok(())
}
