//! Command-line interface for pool-miner.
//!
//! This binary inspects and controls a running pool daemon via the HTTP
//! API.

use std::env;

use anyhow::Result;

use pool_miner::api_client;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: pool-cli <command>");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  status    Show pool status");
        eprintln!("  sessions  List connected miners");
        eprintln!("  rounds    Show payout history");
        eprintln!("  reload    Reload the credential file");
        eprintln!();
        eprintln!("Environment:");
        eprintln!(
            "  POOL_API_URL    API base URL (default: {})",
            api_client::DEFAULT_BASE_URL
        );
        std::process::exit(1);
    }

    let command = &args[1];

    match command.as_str() {
        "status" => cmd_status().await?,
        "sessions" => cmd_sessions().await?,
        "rounds" => cmd_rounds().await?,
        "reload" => cmd_reload().await?,
        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!("Run without arguments to see usage.");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Build an API client, honoring POOL_API_URL if set.
fn make_client() -> api_client::Client {
    match env::var("POOL_API_URL") {
        Ok(url) => api_client::Client::with_base_url(url),
        Err(_) => api_client::Client::new(),
    }
}

async fn cmd_status() -> Result<()> {
    let state = make_client().get_pool().await?;

    println!("Uptime:   {} s", state.uptime_secs);
    println!("Sessions: {}", state.session_count);
    println!("Blocks:   {}", state.blocks_found);

    match &state.template {
        Some(t) => {
            println!("Template: height {} (version {})", t.height, t.version);
            println!("  difficulty {} / share {}", t.difficulty, t.share_difficulty);
        }
        None => println!("Template: (none)"),
    }

    println!(
        "Round {}: {} shares",
        state.round.number, state.round.total_shares
    );
    for (login, shares) in &state.round.shares {
        println!("  - {login}: {shares}");
    }

    Ok(())
}

async fn cmd_sessions() -> Result<()> {
    let sessions = make_client().get_sessions().await?;
    if sessions.is_empty() {
        println!("No miners connected");
        return Ok(());
    }

    for s in &sessions {
        println!(
            "{:>6}  {:<16} {:<22} height {:<8} ok {:<6} rejected {}",
            s.id,
            s.login,
            s.peer.as_deref().unwrap_or("-"),
            s.last_height,
            s.accepted_shares,
            s.rejected_shares
        );
    }
    Ok(())
}

async fn cmd_rounds() -> Result<()> {
    let rounds = make_client().get_rounds().await?;
    if rounds.is_empty() {
        println!("No rounds closed yet");
        return Ok(());
    }

    for round in &rounds {
        println!(
            "Round {} at height {}: reward {}, {} shares, block {}",
            round.round, round.height, round.reward, round.total_shares, round.block_id
        );
        for p in &round.payments {
            let who = if p.login.is_empty() { "(owner)" } else { p.login.as_str() };
            println!("  - {who:<16} {:>20}  {}", p.amount, p.address);
        }
    }
    Ok(())
}

async fn cmd_reload() -> Result<()> {
    let result = make_client().reload_credentials().await?;
    println!("Loaded {} logins", result.logins);
    Ok(())
}
