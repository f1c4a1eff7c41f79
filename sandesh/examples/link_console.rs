//! Interactive link console
//!
//! Accepts (or dials) a robot link, prints decoded reports and the tracked
//! robot pose, and sends stdin lines as commands:
//!
//! - `f`, `r`, `tl`, `tr`, `fl`, `fr`: manual drive tokens
//! - `start`: start the run with the current obstacle snapshot
//! - `obstacle <x> <y> <N|E|S|W>`: place an obstacle and send the edit
//! - anything else: sent verbatim
//!
//! Usage: `link_console [config.toml] [peer-address]`

use crossbeam_channel::{select, unbounded};
use parking_lot::Mutex;
use sandesh::protocol::{Command, Facing, MoveCommand};
use sandesh::{Arena, Config, Obstacle, Peer, SessionManager};
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let config = match args.get(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("=== Sandesh Link Console ===");

    let manager = SessionManager::from_config(&config)?;
    let arena = Arc::new(Mutex::new(Arena::from_config(&config.arena)));

    let message_arena = Arc::clone(&arena);
    manager.subscribe_messages(move |message| {
        println!("<< {}", message.raw());
        let mut arena = message_arena.lock();
        if arena.apply(message) {
            let (x, y) = arena.robot.position();
            println!(
                "   robot at ({:.1}, {:.1}) facing {}",
                x,
                y,
                arena.robot.facing()
            );
        }
    })?;
    manager.subscribe_lifecycle(|peer, connected| {
        if connected {
            println!("** connected to {}", peer);
        } else {
            println!("** disconnected from {}", peer);
        }
    })?;

    for peer in manager.bonded_peers() {
        log::info!("Bonded peer: {}", peer);
    }

    match args.get(2) {
        Some(address) => manager.connect_as_client(Peer::new(address.as_str()))?,
        None => manager.accept_incoming()?,
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })?;

    let (line_tx, line_rx) = unbounded::<String>();
    std::thread::Builder::new()
        .name("console-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        })?;

    while running.load(Ordering::Relaxed) {
        select! {
            recv(line_rx) -> line => match line {
                Ok(line) => {
                    if let Err(e) = handle_line(&manager, &arena, line.trim()) {
                        log::warn!("Send failed: {}", e);
                    }
                }
                Err(_) => break,
            },
            default(Duration::from_millis(200)) => {}
        }
    }

    manager.disconnect();
    log::info!("Console stopped");
    Ok(())
}

fn handle_line(manager: &SessionManager, arena: &Mutex<Arena>, line: &str) -> sandesh::Result<()> {
    if line.is_empty() {
        return Ok(());
    }
    if let Some(step) = MoveCommand::from_token(line) {
        arena.lock().robot.apply_move(step);
        return manager.send_command(&Command::Move(step));
    }
    if line == "start" {
        let snapshot = arena.lock().snapshot_command();
        manager.send_command(&snapshot)?;
        return manager.send_command(&Command::Start);
    }
    let parts: Vec<&str> = line.split_whitespace().collect();
    if let ["obstacle", x, y, facing] = parts.as_slice()
        && let (Ok(x), Ok(y)) = (x.parse::<i32>(), y.parse::<i32>())
    {
        let edit = {
            let mut arena = arena.lock();
            if arena.grid.has_obstacle_at(x, y) || !arena.grid.is_inside(x, y) {
                println!("!! cell ({}, {}) unavailable", x, y);
                return Ok(());
            }
            let id = arena
                .grid
                .add_obstacle(Obstacle::new(x, y, Facing::parse_field(facing)));
            println!("** obstacle {} placed", id);
            arena.grid.find_by_id(id).map(Obstacle::edit)
        };
        if let Some(edit) = edit {
            return manager.send_command(&Command::ObstacleEdit(edit));
        }
        return Ok(());
    }
    manager.send_raw(line)
}
