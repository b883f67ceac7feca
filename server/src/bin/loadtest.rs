//! Load test for the chapayev relay.
//!
//! Spawns pairs of fake WebSocket clients. Each pair:
//! - registers two nicks
//! - invites each other (mutual invite pairs them at once)
//! - trades `move` messages at a fixed rate until the test ends
//!
//! Usage: cargo run --bin loadtest -- [OPTIONS]
//!
//! Options:
//!   --pairs N        Number of client pairs to spawn (default: 50)
//!   --duration S     Test duration in seconds (default: 30)
//!   --move-rate R    Moves per second per client (default: 1.0)
//!   --url URL        Server URL (default: ws://127.0.0.1:9001/ws)

use chapayev_shared::protocol::{ClientMsg, CmdName, MoveMsg, ServerMsg};
use futures_util::{SinkExt, StreamExt};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

type Ws = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

// === Metrics ===

#[derive(Default)]
struct Metrics {
    connected: AtomicU64,
    games_started: AtomicU64,
    moves_sent: AtomicU64,
    moves_received: AtomicU64,
    messages_received: AtomicU64,
    errors: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
}

// === Client task ===

async fn send(ws: &mut Ws, msg: &ClientMsg) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => ws.send(Message::Text(json.into())).await.is_ok(),
        Err(_) => false,
    }
}

async fn next_server_msg(ws: &mut Ws) -> Option<ServerMsg> {
    loop {
        match ws.next().await? {
            Ok(Message::Text(text)) => match serde_json::from_str(&text) {
                Ok(msg) => return Some(msg),
                Err(_) => continue,
            },
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Wait for a message matching `want`, counting everything seen.
async fn wait_for(
    ws: &mut Ws,
    metrics: &Metrics,
    timeout: Duration,
    want: impl Fn(&ServerMsg) -> bool,
) -> Option<ServerMsg> {
    tokio::time::timeout(timeout, async {
        while let Some(msg) = next_server_msg(ws).await {
            metrics.messages_received.fetch_add(1, Ordering::Relaxed);
            if want(&msg) {
                return Some(msg);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

async fn run_client(
    client_id: u32,
    nick: String,
    partner: String,
    url: String,
    move_rate: f64,
    duration: Duration,
    metrics: Arc<Metrics>,
) {
    let connect_start = Instant::now();
    let mut ws = match connect_async(&url).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            if client_id < 5 {
                eprintln!("Client {} failed to connect: {}", client_id, e);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };
    metrics
        .latency_sum_ms
        .fetch_add(connect_start.elapsed().as_millis() as u64, Ordering::Relaxed);
    metrics.latency_count.fetch_add(1, Ordering::Relaxed);
    metrics.connected.fetch_add(1, Ordering::Relaxed);

    let setup = Duration::from_secs(5);

    // Register
    if !send(&mut ws, &ClientMsg::Init { nick: Some(nick.clone()) }).await
        || wait_for(&mut ws, &metrics, setup, |m| matches!(m, ServerMsg::NickAck { .. }))
            .await
            .is_none()
    {
        metrics.errors.fetch_add(1, Ordering::Relaxed);
        metrics.connected.fetch_sub(1, Ordering::Relaxed);
        return;
    }

    // Wait until the partner is known, then invite. Both sides invite, so
    // whichever arrives second pairs them.
    let partner_known = |m: &ServerMsg| match m {
        ServerMsg::New { who } => *who == partner,
        ServerMsg::PlayersList { list } => list.iter().any(|e| e.nick == partner),
        _ => false,
    };
    let _ = send(&mut ws, &ClientMsg::Cmd { name: CmdName::List, arg: None }).await;
    if wait_for(&mut ws, &metrics, setup, partner_known).await.is_none() {
        if client_id < 3 {
            eprintln!("Client {} never saw partner {}", client_id, partner);
        }
        metrics.errors.fetch_add(1, Ordering::Relaxed);
        metrics.connected.fetch_sub(1, Ordering::Relaxed);
        return;
    }
    let invite = ClientMsg::Cmd {
        name: CmdName::Invite,
        arg: Some(partner.clone()),
    };
    let started = send(&mut ws, &invite).await
        && wait_for(&mut ws, &metrics, setup, |m| matches!(m, ServerMsg::GameStart { .. }))
            .await
            .is_some();
    if !started {
        metrics.errors.fetch_add(1, Ordering::Relaxed);
        metrics.connected.fetch_sub(1, Ordering::Relaxed);
        return;
    }
    metrics.games_started.fetch_add(1, Ordering::Relaxed);

    let move_interval = if move_rate > 0.0 {
        Duration::from_secs_f64(1.0 / move_rate)
    } else {
        Duration::from_secs(3600) // Effectively never
    };
    let mut move_timer = tokio::time::interval(move_interval);
    move_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut rng = ChaCha8Rng::seed_from_u64(client_id as u64);
    let test_end = Instant::now() + duration;

    while Instant::now() < test_end {
        tokio::select! {
            _ = move_timer.tick() => {
                let msg = ClientMsg::Move(MoveMsg {
                    piece: format!("w{}", rng.gen_range(1..=8)),
                    vector: [rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0)],
                });
                if send(&mut ws, &msg).await {
                    metrics.moves_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            msg = next_server_msg(&mut ws) => {
                match msg {
                    Some(ServerMsg::Move(_)) => {
                        metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                        metrics.moves_received.fetch_add(1, Ordering::Relaxed);
                    }
                    Some(ServerMsg::OpponentLeft { .. }) => {
                        metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    Some(_) => {
                        metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                    }
                    None => {
                        if client_id < 3 {
                            eprintln!("Client {} stream ended", client_id);
                        }
                        break;
                    }
                }
            }
        }
    }

    let _ = ws.close(None).await;
    metrics.connected.fetch_sub(1, Ordering::Relaxed);
}

// === Main ===

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut num_pairs: u32 = 50;
    let mut duration_secs: u64 = 30;
    let mut move_rate: f64 = 1.0;
    let mut url = "ws://127.0.0.1:9001/ws".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--pairs" => {
                i += 1;
                num_pairs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(50);
            }
            "--duration" => {
                i += 1;
                duration_secs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
            }
            "--move-rate" => {
                i += 1;
                move_rate = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(1.0);
            }
            "--url" => {
                i += 1;
                url = args.get(i).cloned().unwrap_or(url);
            }
            _ => {}
        }
        i += 1;
    }

    println!("=== Chapayev Relay Load Test ===");
    println!("Pairs: {}", num_pairs);
    println!("Duration: {}s", duration_secs);
    println!("Move rate: {}/s per client", move_rate);
    println!("URL: {}", url);
    println!();

    let metrics = Arc::new(Metrics::default());
    let duration = Duration::from_secs(duration_secs);
    let mut handles = Vec::with_capacity(num_pairs as usize * 2);

    println!("Spawning {} clients...", num_pairs * 2);
    let spawn_start = Instant::now();

    for pair in 0..num_pairs {
        let nicks = [format!("load{}a", pair), format!("load{}b", pair)];
        for side in 0..2 {
            let client_id = pair * 2 + side as u32;
            let nick = nicks[side].clone();
            let partner = nicks[1 - side].clone();
            let url = url.clone();
            let metrics = Arc::clone(&metrics);
            handles.push(tokio::spawn(async move {
                run_client(client_id, nick, partner, url, move_rate, duration, metrics).await;
            }));
        }

        // Stagger spawns slightly to avoid thundering herd
        if pair % 25 == 24 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    println!("All clients spawned in {:?}", spawn_start.elapsed());
    println!();

    // Print stats periodically
    let metrics_clone = Arc::clone(&metrics);
    let stats_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        let start = Instant::now();

        loop {
            interval.tick().await;
            let elapsed = start.elapsed().as_secs();
            if elapsed >= duration_secs + 10 {
                break;
            }
            println!(
                "[{:3}s] connected={}, games={}, moves_sent={}, moves_received={}, msgs={}, errors={}",
                elapsed,
                metrics_clone.connected.load(Ordering::Relaxed),
                metrics_clone.games_started.load(Ordering::Relaxed),
                metrics_clone.moves_sent.load(Ordering::Relaxed),
                metrics_clone.moves_received.load(Ordering::Relaxed),
                metrics_clone.messages_received.load(Ordering::Relaxed),
                metrics_clone.errors.load(Ordering::Relaxed),
            );
        }
    });

    for handle in handles {
        let _ = handle.await;
    }
    stats_handle.abort();

    // Final stats
    println!();
    println!("=== Final Results ===");
    let games = metrics.games_started.load(Ordering::Relaxed);
    let sent = metrics.moves_sent.load(Ordering::Relaxed);
    let received = metrics.moves_received.load(Ordering::Relaxed);
    let msgs = metrics.messages_received.load(Ordering::Relaxed);
    let errors = metrics.errors.load(Ordering::Relaxed);
    let latency_sum = metrics.latency_sum_ms.load(Ordering::Relaxed);
    let latency_count = metrics.latency_count.load(Ordering::Relaxed);

    println!("Clients in a game: {} of {}", games, num_pairs * 2);
    println!("Total moves sent: {}", sent);
    println!("Total moves received: {}", received);
    println!("Total messages received: {}", msgs);
    println!("Total errors: {}", errors);
    if latency_count > 0 {
        println!("Average connect latency: {}ms", latency_sum / latency_count);
    }
    if sent > 0 {
        println!("Move delivery rate: {:.1}%", received as f64 / sent as f64 * 100.0);
    }
    println!(
        "Moves/sec relayed: {:.0}",
        received as f64 / duration_secs.max(1) as f64
    );
}
