use std::fs;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::dispatch::{BoardSource, Completion, Dispatcher};
use crate::io::http::HttpBoardApi;
use crate::io::push::{ChannelEvent, PushChannel};
use crate::io::ws::{WsTransport, board_stream_url};
use crate::model::board::OrderModel;
use crate::model::event::decode_event;
use crate::ops::optimistic::MoveTarget;
use crate::ops::order_ops::{self, diff_containers};
use crate::ops::remote::{RemoteConsumer, RemoteOutcome};
use crate::ops::session::{BoardSession, Effect};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Poll cadence of the watch loop
const WATCH_TICK: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    match cli.command {
        Commands::Check(args) => cmd_check(args, json),
        Commands::Move(args) => cmd_move(args, json),
        Commands::Apply(args) => cmd_apply(args, json),
        Commands::Watch(args) => cmd_watch(args),
    }
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

fn cmd_check(args: CheckArgs, json: bool) -> CmdResult {
    let data = config_io::read_board(&args.board)?;
    let mut violations = order_ops::check_board_positions(&data);
    let model = OrderModel::from_board(data);
    violations.extend(order_ops::check_invariants(&model));

    let columns = model.containers().count();
    let items = model.item_count();
    if json {
        let result = CheckJson {
            ok: violations.is_empty(),
            columns,
            items,
            violations: violations.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if violations.is_empty() {
        println!("ok: {columns} columns, {items} items");
    } else {
        println!("Problems:");
        for v in &violations {
            println!("  {v}");
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(format!("{} ordering problem(s) in {}", violations.len(), args.board.display()).into())
    }
}

// ---------------------------------------------------------------------------
// move
// ---------------------------------------------------------------------------

/// The board file is the authority: the optimistic move is confirmed
/// against the resulting record, then written back.
fn cmd_move(args: MoveArgs, json: bool) -> CmdResult {
    let data = config_io::read_board(&args.board)?;
    let mut session = BoardSession::new("local", data);
    let before = session.model().snapshot().clone();

    let effects = session.move_item(&args.item, MoveTarget::new(&args.column, args.position))?;
    for effect in effects {
        if let Effect::Dispatch(request) = effect {
            let record = session
                .model()
                .item(&request.item_id)
                .map(|item| item.to_record())
                .ok_or_else(|| format!("item vanished during move: {}", request.item_id))?;
            session.on_move_settled(request.request_id, Ok(record));
        }
    }

    let changes = diff_containers(&before, session.model().snapshot());
    let (column, position) = session
        .model()
        .locate(&args.item)
        .map(|(c, i)| (c.to_string(), i))
        .ok_or_else(|| format!("item not found: {}", args.item))?;
    let moved = !changes.is_empty();

    if moved && !args.dry_run {
        config_io::write_board(&args.board, &session.model().to_board())?;
    }

    if json {
        let result = MoveJson {
            item: args.item,
            column,
            position,
            moved,
            changes,
        };
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        if moved {
            println!("moved {} to {}[{}]", args.item, column, position);
            for change in &changes {
                println!("  {}", format_change(change));
            }
        } else {
            println!("{} already at {}[{}]", args.item, column, position);
        }
        print!("{}", render_board(session.model()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

fn cmd_apply(args: ApplyArgs, json: bool) -> CmdResult {
    let data = config_io::read_board(&args.board)?;
    let text = fs::read_to_string(&args.events)
        .map_err(|e| format!("could not read {}: {}", args.events.display(), e))?;

    let mut decoded = Vec::new();
    let mut skipped = 0;
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match decode_event(line) {
            Ok(event) => decoded.push((idx + 1, event)),
            Err(e) => {
                eprintln!("warning: line {}: {}", idx + 1, e);
                skipped += 1;
            }
        }
    }

    let board_id = args
        .board_id
        .or_else(|| decoded.first().map(|(_, ev)| ev.board_id.clone()))
        .unwrap_or_else(|| "local".to_string());
    let mut model = OrderModel::from_board(data);
    let mut consumer = RemoteConsumer::new(&board_id);

    let mut lines = Vec::new();
    let (mut applied, mut ignored) = (0, 0);
    let mut resync_needed = false;
    for (line, event) in decoded {
        let kind = event.kind.name().to_string();
        let outcome = consumer.apply(&mut model, false, event);
        match outcome {
            RemoteOutcome::Applied => applied += 1,
            RemoteOutcome::ResyncRequested | RemoteOutcome::Deferred => resync_needed = true,
            RemoteOutcome::Ignored | RemoteOutcome::ForeignBoard | RemoteOutcome::Unknown(_) => ignored += 1,
        }
        lines.push(ApplyLineJson {
            line,
            kind,
            outcome: outcome_label(&outcome),
        });
    }

    if applied > 0 {
        config_io::write_board(&args.board, &model.to_board())?;
    }

    if json {
        let result = ApplyJson {
            board_id,
            applied,
            ignored,
            skipped,
            resync_needed,
            events: lines,
        };
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for l in &lines {
            println!("  {:>3}  {:<8} {}", l.line, l.kind, l.outcome);
        }
        println!("applied {applied}, ignored {ignored}, skipped {skipped}");
        if resync_needed {
            println!("note: move events are not applied positionally; fetch a fresh board to see them");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// watch
// ---------------------------------------------------------------------------

fn cmd_watch(args: WatchArgs) -> CmdResult {
    let cwd = std::env::current_dir()?;
    let config = config_io::read_config(args.config.as_deref(), &cwd)?;
    let board_id = args
        .board
        .or_else(|| config.server.board_id.clone())
        .ok_or("no board id: pass --board or set [server] board_id in boardflow.toml")?;

    let api = HttpBoardApi::new(&config.server)?;
    let data = api.fetch_board(&board_id)?;
    let mut session = BoardSession::new(&board_id, data);
    print!("{}", render_board(session.model()));
    session.subscribe(|change| {
        for line in format_model_change(change) {
            println!("{line}");
        }
    });

    let url = board_stream_url(&config.server.ws_url, &board_id);
    info!(%url, "following board");
    let transport = WsTransport::new(url, Duration::from_millis(config.push.read_timeout_ms));
    let channel = PushChannel::start(transport, &config.push);
    let dispatcher = Dispatcher::start(api);

    loop {
        for event in channel.poll() {
            let effects = match event {
                ChannelEvent::Connected { reconnect } => session.on_connected(reconnect),
                ChannelEvent::Event(ev) => session.on_change_event(ev),
                ChannelEvent::Disconnected { reason } => {
                    warn!(%reason, "push channel lost");
                    session.on_disconnected()
                }
            };
            run_effects(&dispatcher, session.board_id(), effects);
        }
        for done in dispatcher.poll() {
            let effects = match done {
                Completion::Moved { request_id, result } => session.on_move_settled(request_id, result),
                Completion::Fetched(Ok(data)) => session.on_resync(data),
                Completion::Fetched(Err(e)) => {
                    eprintln!("warning: resync failed: {e}");
                    Vec::new()
                }
            };
            run_effects(&dispatcher, session.board_id(), effects);
        }
        thread::sleep(WATCH_TICK);
    }
}

fn run_effects(dispatcher: &Dispatcher, board_id: &str, effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::Dispatch(request) => dispatcher.dispatch(request),
            Effect::RequestResync => dispatcher.request_resync(board_id),
            Effect::Notify(notice) => eprintln!("{}", format_notice(&notice)),
        }
    }
}
