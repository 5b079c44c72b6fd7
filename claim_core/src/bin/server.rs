use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::{env, fs, thread};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{info, warn};

use claim_core::{Cell, ClaimEngine, ClaimRecord, EngineError, GroupId, WorldId};

const DEFAULT_BIND: &str = "127.0.0.1:41100";
const DEFAULT_MAP_RADIUS: u32 = 5;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let engine = Arc::new(ClaimEngine::from_env());

    if let Ok(path) = env::var("CLAIM_IMPORT_PATH") {
        import_from_file(&engine, Path::new(&path));
    }

    let bind: SocketAddr = env::var("CLAIM_SERVER_BIND")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or_else(|| DEFAULT_BIND.parse().expect("default bind address parses"));

    let request_rx = spawn_command_listener(bind);

    info!(
        target: "guild_claims::server",
        command_bind = %bind,
        max_claims = engine.max_claims_per_group(),
        "claim server ready"
    );

    while let Ok(request) = request_rx.recv() {
        let response = execute(&engine, request.command);
        if request.reply.send(response).is_err() {
            warn!(target: "guild_claims::server", "reply dropped: client disconnected");
        }
    }
}

#[derive(Debug)]
enum Command {
    Group(GroupId),
    Delete(GroupId),
    Claim(GroupId, Cell),
    Unclaim(GroupId, Cell),
    ClaimRect {
        group: GroupId,
        world: WorldId,
        corners: [i32; 4],
    },
    UnclaimRect {
        group: GroupId,
        world: WorldId,
        corners: [i32; 4],
    },
    UnclaimAll(GroupId, WorldId),
    Analyze(GroupId, WorldId),
    AnalyzeWithout(GroupId, Cell),
    Map {
        group: GroupId,
        center: Cell,
        radius: u32,
    },
    BuyOutposts(GroupId, u32),
    Outposts(GroupId),
    Export,
}

struct Request {
    command: Command,
    reply: Sender<String>,
}

fn import_from_file(engine: &ClaimEngine, path: &Path) {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            warn!(
                target: "guild_claims::server",
                path = %path.display(),
                error = %err,
                "claims.import_failed=read"
            );
            return;
        }
    };
    match serde_json::from_str::<Vec<ClaimRecord>>(&contents) {
        Ok(records) => {
            let summary = engine.import_claims(records);
            info!(
                target: "guild_claims::server",
                path = %path.display(),
                imported = summary.imported,
                "claims.import_loaded"
            );
        }
        Err(err) => warn!(
            target: "guild_claims::server",
            path = %path.display(),
            error = %err,
            "claims.import_failed=parse"
        ),
    }
}

fn spawn_command_listener(bind_addr: SocketAddr) -> Receiver<Request> {
    let listener = TcpListener::bind(bind_addr).expect("command listener bind failed");

    let (sender, receiver) = unbounded::<Request>();
    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Ok(addr) = stream.peer_addr() {
                        info!(target: "guild_claims::server", "Command client connected: {}", addr);
                    }
                    let sender = sender.clone();
                    thread::spawn(move || handle_client(stream, sender));
                }
                Err(err) => {
                    warn!("Error accepting command client: {}", err);
                    thread::sleep(std::time::Duration::from_millis(200));
                }
            }
        }
    });

    receiver
}

fn handle_client(stream: TcpStream, sender: Sender<Request>) {
    let mut writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(err) => {
            warn!("Failed to clone command stream: {}", err);
            return;
        }
    };
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let response = match parse_command(trimmed) {
                    Some(command) => {
                        let (reply_tx, reply_rx) = unbounded();
                        let request = Request {
                            command,
                            reply: reply_tx,
                        };
                        if sender.send(request).is_err() {
                            break;
                        }
                        match reply_rx.recv() {
                            Ok(response) => response,
                            Err(_) => break,
                        }
                    }
                    None => {
                        warn!("Invalid command: {}", trimmed);
                        format!("error: invalid command '{trimmed}'")
                    }
                };
                if writeln!(writer, "{response}").is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!("Command read error: {}", err);
                break;
            }
        }
    }
}

fn parse_command(input: &str) -> Option<Command> {
    let mut parts = input.split_whitespace();
    let verb = parts.next()?.to_ascii_lowercase();
    let mut next_i32 = || -> Option<i32> { parts.next()?.parse().ok() };

    let command = match verb.as_str() {
        "group" => Command::Group(group_arg(next_i32()?)?),
        "delete" => Command::Delete(group_arg(next_i32()?)?),
        "claim" | "unclaim" => {
            let group = group_arg(next_i32()?)?;
            let world = world_arg(next_i32()?)?;
            let cell = Cell::new(world, next_i32()?, next_i32()?);
            if verb == "claim" {
                Command::Claim(group, cell)
            } else {
                Command::Unclaim(group, cell)
            }
        }
        "claim_rect" | "unclaim_rect" => {
            let group = group_arg(next_i32()?)?;
            let world = world_arg(next_i32()?)?;
            let corners = [next_i32()?, next_i32()?, next_i32()?, next_i32()?];
            if verb == "claim_rect" {
                Command::ClaimRect {
                    group,
                    world,
                    corners,
                }
            } else {
                Command::UnclaimRect {
                    group,
                    world,
                    corners,
                }
            }
        }
        "unclaim_all" => {
            Command::UnclaimAll(group_arg(next_i32()?)?, world_arg(next_i32()?)?)
        }
        "analyze" => Command::Analyze(group_arg(next_i32()?)?, world_arg(next_i32()?)?),
        "analyze_without" => {
            let group = group_arg(next_i32()?)?;
            let world = world_arg(next_i32()?)?;
            Command::AnalyzeWithout(group, Cell::new(world, next_i32()?, next_i32()?))
        }
        "map" => {
            let group = group_arg(next_i32()?)?;
            let world = world_arg(next_i32()?)?;
            let center = Cell::new(world, next_i32()?, next_i32()?);
            let radius = match next_i32() {
                Some(value) => u32::try_from(value).ok()?,
                None => DEFAULT_MAP_RADIUS,
            };
            Command::Map {
                group,
                center,
                radius,
            }
        }
        "buy_outposts" => {
            let group = group_arg(next_i32()?)?;
            let amount = u32::try_from(next_i32().unwrap_or(1)).ok()?;
            Command::BuyOutposts(group, amount)
        }
        "outposts" => Command::Outposts(group_arg(next_i32()?)?),
        "export" => Command::Export,
        _ => return None,
    };
    Some(command)
}

fn group_arg(value: i32) -> Option<GroupId> {
    u32::try_from(value).ok().map(GroupId)
}

fn world_arg(value: i32) -> Option<WorldId> {
    u32::try_from(value).ok().map(WorldId)
}

fn execute(engine: &ClaimEngine, command: Command) -> String {
    match run(engine, command) {
        Ok(response) => response,
        Err(err) => {
            warn!(target: "guild_claims::server", error = %err, "command.rejected");
            format!("error: {err}")
        }
    }
}

fn run(engine: &ClaimEngine, command: Command) -> Result<String, EngineError> {
    let response = match command {
        Command::Group(group) => {
            let added = engine.register_group(group);
            format!("group {group} {}", if added { "registered" } else { "exists" })
        }
        Command::Delete(group) => {
            let released = engine.delete_group(group)?;
            format!("group {group} deleted, released {released}")
        }
        Command::Claim(group, cell) => engine.claim_cell(group, cell)?.to_string(),
        Command::Unclaim(group, cell) => engine.unclaim_cell(group, cell)?.to_string(),
        Command::ClaimRect {
            group,
            world,
            corners: [x1, z1, x2, z2],
        } => to_json(&engine.claim_rect(group, world, x1, z1, x2, z2)),
        Command::UnclaimRect {
            group,
            world,
            corners: [x1, z1, x2, z2],
        } => to_json(&engine.unclaim_rect(group, world, x1, z1, x2, z2)),
        Command::UnclaimAll(group, world) => {
            format!("released {}", engine.unclaim_all(group, world)?)
        }
        Command::Analyze(group, world) => to_json(&engine.analyze_connectivity(group, world)?),
        Command::AnalyzeWithout(group, cell) => {
            to_json(&engine.analyze_connectivity_after_removal(group, cell)?)
        }
        Command::Map {
            group,
            center,
            radius,
        } => engine
            .render_map(group, center.world, center.x, center.z, radius, Some(center))?
            .join("\n"),
        Command::BuyOutposts(group, amount) => {
            format!("allowance {}", engine.add_outpost_allowance(group, amount)?)
        }
        Command::Outposts(group) => format!(
            "allowance {} centers {}",
            engine.outpost_allowance(group)?,
            engine.outpost_center_count(group)?
        ),
        Command::Export => to_json(&engine.export_claims()),
    };
    Ok(response)
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|err| format!("error: {err}"))
}
