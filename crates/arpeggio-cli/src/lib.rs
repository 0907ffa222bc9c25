//! `arpeggio` CLI: drive a calculator session from stdin key presses, replay
//! operation streams from a file, and inspect JSONL history logs.

use arpeggio_core::{
    DispatchOutcome, HistoryEvent, HistoryLog, KeyOutcome, Keyboard, LogError, Value,
};
use std::env;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DEFAULT_KEYS: &str = "jfkdls";

#[derive(Debug, Clone)]
enum CliCommand {
    Run {
        log: Option<PathBuf>,
        keys: String,
        session: Option<Uuid>,
        json: bool,
    },
    Replay {
        file: PathBuf,
        log: Option<PathBuf>,
        keys: String,
        session: Option<Uuid>,
        json: bool,
    },
    Log {
        log: PathBuf,
        session: Option<Uuid>,
    },
}

pub fn run_from_env() -> Result<(), String> {
    run_from_args(env::args().skip(1).collect())
}

pub fn run_from_args(args: Vec<String>) -> Result<(), String> {
    match parse_command(args)? {
        CliCommand::Run {
            log,
            keys,
            session,
            json,
        } => match log {
            Some(path) => {
                let store = JsonlLog::open(&path).map_err(|e| e.to_string())?;
                let mut keyboard = start_keyboard(store, &keys, session)?;
                run_interactive(&mut keyboard, json)
            }
            None => {
                let mut keyboard = start_keyboard(arpeggio_core::MemoryLog::new(), &keys, session)?;
                run_interactive(&mut keyboard, json)
            }
        },
        CliCommand::Replay {
            file,
            log,
            keys,
            session,
            json,
        } => match log {
            Some(path) => {
                let store = JsonlLog::open(&path).map_err(|e| e.to_string())?;
                let mut keyboard = start_keyboard(store, &keys, session)?;
                run_replay(&mut keyboard, &file, json)
            }
            None => {
                let mut keyboard = start_keyboard(arpeggio_core::MemoryLog::new(), &keys, session)?;
                run_replay(&mut keyboard, &file, json)
            }
        },
        CliCommand::Log { log, session } => run_log(&log, session),
    }
}

// ─── argument parsing ────────────────────────────────────────────────────────

fn parse_command(args: Vec<String>) -> Result<CliCommand, String> {
    if args.is_empty() {
        return Err(help_text());
    }

    let cmd = args[0].as_str();
    match cmd {
        "run" => parse_run(args),
        "replay" => parse_replay(args),
        "log" => parse_log(args),
        "help" | "--help" | "-h" => Err(help_text()),
        _ => Err(format!("unknown command: {cmd}\n\n{}", help_text())),
    }
}

fn parse_run(args: Vec<String>) -> Result<CliCommand, String> {
    let mut log: Option<PathBuf> = None;
    let mut keys = DEFAULT_KEYS.to_string();
    let mut session: Option<Uuid> = None;
    let mut json = false;

    let mut i = 1usize;
    while i < args.len() {
        let token = &args[i];
        match token.as_str() {
            "--log" => {
                i += 1;
                log = Some(PathBuf::from(
                    args.get(i).ok_or_else(|| "--log requires a path".to_string())?,
                ));
            }
            "--keys" => {
                i += 1;
                keys = args
                    .get(i)
                    .ok_or_else(|| "--keys requires symbols".to_string())?
                    .to_string();
            }
            "--session" => {
                i += 1;
                session = Some(parse_session_id(
                    args.get(i)
                        .ok_or_else(|| "--session requires a UUID".to_string())?,
                )?);
            }
            "--json" => json = true,
            x if x.starts_with("--") => return Err(format!("unknown flag: {x}")),
            _ => return Err("run does not accept positional args".to_string()),
        }
        i += 1;
    }

    Ok(CliCommand::Run {
        log,
        keys,
        session,
        json,
    })
}

fn parse_replay(args: Vec<String>) -> Result<CliCommand, String> {
    let mut file: Option<PathBuf> = None;
    let mut log: Option<PathBuf> = None;
    let mut keys = DEFAULT_KEYS.to_string();
    let mut session: Option<Uuid> = None;
    let mut json = false;

    let mut i = 1usize;
    while i < args.len() {
        let token = &args[i];
        match token.as_str() {
            "--log" => {
                i += 1;
                log = Some(PathBuf::from(
                    args.get(i).ok_or_else(|| "--log requires a path".to_string())?,
                ));
            }
            "--keys" => {
                i += 1;
                keys = args
                    .get(i)
                    .ok_or_else(|| "--keys requires symbols".to_string())?
                    .to_string();
            }
            "--session" => {
                i += 1;
                session = Some(parse_session_id(
                    args.get(i)
                        .ok_or_else(|| "--session requires a UUID".to_string())?,
                )?);
            }
            "--json" => json = true,
            x if x.starts_with("--") => return Err(format!("unknown flag: {x}")),
            _ => {
                if file.is_some() {
                    return Err("only one FILE positional argument is allowed".to_string());
                }
                file = Some(PathBuf::from(token));
            }
        }
        i += 1;
    }

    let file = file.ok_or_else(|| "replay requires FILE".to_string())?;
    Ok(CliCommand::Replay {
        file,
        log,
        keys,
        session,
        json,
    })
}

fn parse_log(args: Vec<String>) -> Result<CliCommand, String> {
    let mut log: Option<PathBuf> = None;
    let mut session: Option<Uuid> = None;

    let mut i = 1usize;
    while i < args.len() {
        let token = &args[i];
        match token.as_str() {
            "--log" => {
                i += 1;
                log = Some(PathBuf::from(
                    args.get(i).ok_or_else(|| "--log requires a path".to_string())?,
                ));
            }
            "--session" => {
                i += 1;
                session = Some(parse_session_id(
                    args.get(i)
                        .ok_or_else(|| "--session requires a UUID".to_string())?,
                )?);
            }
            x if x.starts_with("--") => return Err(format!("unknown flag: {x}")),
            _ => {
                if log.is_some() {
                    return Err("only one PATH positional argument is allowed".to_string());
                }
                log = Some(PathBuf::from(token));
            }
        }
        i += 1;
    }

    let log = log.ok_or_else(|| "log requires a PATH (or --log PATH)".to_string())?;
    Ok(CliCommand::Log { log, session })
}

fn parse_session_id(raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw).map_err(|_| format!("invalid session id: {raw}"))
}

fn parse_keys(keys: &str) -> Vec<char> {
    keys.chars().collect()
}

fn help_text() -> String {
    [
        "arpeggio CLI",
        "",
        "Commands:",
        "  arpeggio run [--log PATH] [--keys jfkdls] [--session UUID] [--json]",
        "      interactive session; reads key presses from stdin",
        "  arpeggio replay FILE [--log PATH] [--keys jfkdls] [--session UUID] [--json]",
        "      dispatch operation names from FILE (one per line, '#' comments;",
        "      a bare integer expands to zero + succ/pred presses)",
        "  arpeggio log PATH [--session UUID]",
        "      print the events stored in a JSONL history log",
    ]
    .join("\n")
}

// ─── drivers ─────────────────────────────────────────────────────────────────

fn start_keyboard<L: HistoryLog>(
    log: L,
    keys: &str,
    session: Option<Uuid>,
) -> Result<Keyboard<L>, String> {
    let alphabet = parse_keys(keys);
    let keyboard = match session {
        Some(id) => Keyboard::resume(id, alphabet, log),
        None => Keyboard::new(alphabet, log),
    };
    keyboard.map_err(|e| format!("start session: {e}"))
}

fn run_interactive<L: HistoryLog>(keyboard: &mut Keyboard<L>, json: bool) -> Result<(), String> {
    println!("[arpeggio] session {}", keyboard.session().id);
    print_snapshot(keyboard, json)?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| format!("read stdin: {e}"))?;
        for symbol in line.chars().filter(|c| !c.is_whitespace()) {
            let outcome = keyboard.key(symbol).map_err(|e| e.to_string())?;
            report_outcome(&outcome);
            if matches!(outcome, KeyOutcome::Dispatched { .. }) {
                print_snapshot(keyboard, json)?;
            }
        }
    }
    Ok(())
}

fn run_replay<L: HistoryLog>(
    keyboard: &mut Keyboard<L>,
    file: &Path,
    json: bool,
) -> Result<(), String> {
    let source =
        fs::read_to_string(file).map_err(|e| format!("read {}: {e}", file.display()))?;

    println!("[arpeggio] session {}", keyboard.session().id);
    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        replay_step(keyboard, line)?;
    }
    print_snapshot(keyboard, json)
}

/// One replay line: an operation name, or a bare integer expanded into the
/// `zero` + `succ`/`pred` presses that produce it.
fn replay_step<L: HistoryLog>(keyboard: &mut Keyboard<L>, line: &str) -> Result<(), String> {
    if let Ok(value) = line.parse::<i64>() {
        return push_int(keyboard, value);
    }
    dispatch_reported(keyboard, line)
}

fn push_int<L: HistoryLog>(keyboard: &mut Keyboard<L>, value: i64) -> Result<(), String> {
    dispatch_reported(keyboard, "zero")?;
    let step = if value >= 0 { "succ" } else { "pred" };
    for _ in 0..value.unsigned_abs() {
        dispatch_reported(keyboard, step)?;
    }
    Ok(())
}

fn dispatch_reported<L: HistoryLog>(keyboard: &mut Keyboard<L>, name: &str) -> Result<(), String> {
    let report = keyboard.dispatch(name).map_err(|e| e.to_string())?;
    match report.outcome {
        DispatchOutcome::Applied { .. } => {}
        DispatchOutcome::Rejected => {
            println!("[arpeggio] skipped '{name}': not legal on this stack");
        }
    }
    if let Some(err) = report.rebuild_error {
        println!("[arpeggio] keyboard rebuild failed, keeping previous table: {err}");
    }
    Ok(())
}

fn run_log(path: &Path, session: Option<Uuid>) -> Result<(), String> {
    let log = JsonlLog::open(path).map_err(|e| e.to_string())?;
    let events: Vec<&HistoryEvent> = match session {
        Some(id) => log.events().iter().filter(|e| e.session_id == id).collect(),
        None => log.events().iter().collect(),
    };
    for event in events {
        println!(
            "{}\t{}\t{}",
            event.session_id, event.sequence, event.operation
        );
    }
    Ok(())
}

fn report_outcome(outcome: &KeyOutcome) {
    match outcome {
        KeyOutcome::UnknownKey(c) => println!("[arpeggio] unknown key '{c}'"),
        KeyOutcome::Buffering => {}
        KeyOutcome::InvalidPrefix(buffer) => {
            println!("[arpeggio] no code starts with '{buffer}'");
        }
        KeyOutcome::Dispatched { operation, report } => {
            match report.outcome {
                DispatchOutcome::Applied { .. } => println!("-> {operation}"),
                DispatchOutcome::Rejected => {
                    println!("[arpeggio] '{operation}' no longer legal, ignored");
                }
            }
            if let Some(err) = &report.rebuild_error {
                println!("[arpeggio] keyboard rebuild failed, keeping previous table: {err}");
            }
        }
    }
}

// ─── rendering ───────────────────────────────────────────────────────────────

fn print_snapshot<L: HistoryLog>(keyboard: &Keyboard<L>, json: bool) -> Result<(), String> {
    if json {
        println!("{}", render_json(keyboard)?);
    } else {
        print!("{}", render_text(keyboard));
    }
    Ok(())
}

fn render_text<L: HistoryLog>(keyboard: &Keyboard<L>) -> String {
    let stack: Vec<String> = keyboard
        .stack()
        .iter()
        .map(Value::display_string)
        .collect();
    let mut out = format!("stack: [{}]\n", stack.join(", "));
    for row in keyboard.code_rows() {
        out.push_str(&format!(
            "  {:<8} {:<10} {}\n",
            row.key, row.operation, row.weight
        ));
    }
    out
}

fn render_json<L: HistoryLog>(keyboard: &Keyboard<L>) -> Result<String, String> {
    let rows: Vec<serde_json::Value> = keyboard
        .code_rows()
        .into_iter()
        .map(|row| {
            serde_json::json!({
                "key": row.key,
                "operation": row.operation,
                "weight": row.weight,
            })
        })
        .collect();
    let doc = serde_json::json!({
        "session": keyboard.session().id,
        "version": keyboard.session().version,
        "stack": keyboard.stack(),
        "keyboard": rows,
    });
    serde_json::to_string_pretty(&doc).map_err(|e| e.to_string())
}

// ─── JSONL history log ───────────────────────────────────────────────────────

/// File-backed history log: one JSON event per line, append-only. The path is
/// explicit configuration; nothing here reads the environment.
pub struct JsonlLog {
    events: Vec<HistoryEvent>,
    file: fs::File,
}

impl JsonlLog {
    pub fn open(path: &Path) -> Result<Self, LogError> {
        let mut events = Vec::new();
        if path.exists() {
            let source = fs::read_to_string(path)
                .map_err(|e| LogError::new(format!("read {}: {e}", path.display())))?;
            for (idx, line) in source.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let event: HistoryEvent = serde_json::from_str(line).map_err(|e| {
                    LogError::new(format!("{}:{}: {e}", path.display(), idx + 1))
                })?;
                events.push(event);
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| LogError::new(format!("open {}: {e}", path.display())))?;

        Ok(Self { events, file })
    }

    /// All stored events, every session, in append order.
    pub fn events(&self) -> &[HistoryEvent] {
        &self.events
    }
}

impl HistoryLog for JsonlLog {
    fn append(&mut self, session_id: Uuid, operation: &str) -> Result<u64, LogError> {
        let sequence = self
            .events
            .iter()
            .filter(|e| e.session_id == session_id)
            .count() as u64
            + 1;
        let event = HistoryEvent {
            session_id,
            sequence,
            operation: operation.to_string(),
        };
        let line = serde_json::to_string(&event)
            .map_err(|e| LogError::new(format!("encode event: {e}")))?;
        writeln!(self.file, "{line}").map_err(|e| LogError::new(format!("append: {e}")))?;
        self.file
            .flush()
            .map_err(|e| LogError::new(format!("flush: {e}")))?;
        self.events.push(event);
        Ok(sequence)
    }

    fn read_from(&self, session_id: Uuid, offset: u64) -> Vec<HistoryEvent> {
        self.events
            .iter()
            .filter(|e| e.session_id == session_id && e.sequence >= offset)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arpeggio_core::MemoryLog;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{}-{}-{}", prefix, std::process::id(), ts));
        std::fs::create_dir_all(&dir).expect("failed to create temp dir");
        dir
    }

    fn keyboard() -> Keyboard<MemoryLog> {
        start_keyboard(MemoryLog::new(), DEFAULT_KEYS, None).expect("start")
    }

    #[test]
    fn parse_run_defaults() {
        let cmd = parse_command(vec!["run".to_string()]).expect("parse");
        match cmd {
            CliCommand::Run {
                log,
                keys,
                session,
                json,
            } => {
                assert_eq!(log, None);
                assert_eq!(keys, DEFAULT_KEYS);
                assert_eq!(session, None);
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parse_replay_flags() {
        let cmd = parse_command(
            ["replay", "ops.txt", "--log", "hist.jsonl", "--keys", "asdf", "--json"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        )
        .expect("parse");
        match cmd {
            CliCommand::Replay {
                file,
                log,
                keys,
                session,
                json,
            } => {
                assert_eq!(file, PathBuf::from("ops.txt"));
                assert_eq!(log, Some(PathBuf::from("hist.jsonl")));
                assert_eq!(keys, "asdf");
                assert_eq!(session, None);
                assert!(json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_unknown_flags_and_missing_args() {
        assert!(parse_command(vec!["run".to_string(), "--wat".to_string()]).is_err());
        assert!(parse_command(vec!["replay".to_string()]).is_err());
        assert!(parse_command(vec!["log".to_string()]).is_err());
        assert!(parse_command(vec!["conjure".to_string()]).is_err());
        assert!(parse_command(vec![
            "run".to_string(),
            "--session".to_string(),
            "not-a-uuid".to_string()
        ])
        .is_err());
    }

    #[test]
    fn jsonl_log_round_trips_across_reopen() {
        let dir = unique_temp_dir("arpeggio-log");
        let path = dir.join("history.jsonl");
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        {
            let mut log = JsonlLog::open(&path).expect("open");
            assert_eq!(log.append(a, "zero"), Ok(1));
            assert_eq!(log.append(b, "true"), Ok(1));
            assert_eq!(log.append(a, "succ"), Ok(2));
        }

        let log = JsonlLog::open(&path).expect("reopen");
        let events = log.read_from(a, 1);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].operation, "zero");
        assert_eq!(events[1].operation, "succ");
        assert_eq!(events[1].sequence, 2);
        assert_eq!(log.read_from(b, 1).len(), 1);

        let mut log = JsonlLog::open(&path).expect("reopen again");
        assert_eq!(log.append(a, "dup"), Ok(3));
    }

    #[test]
    fn jsonl_log_rejects_corrupt_lines() {
        let dir = unique_temp_dir("arpeggio-log");
        let path = dir.join("history.jsonl");
        fs::write(&path, "not json\n").expect("write");
        assert!(JsonlLog::open(&path).is_err());
    }

    #[test]
    fn replay_steps_expand_integers() {
        let mut kb = keyboard();
        replay_step(&mut kb, "3").expect("push 3");
        replay_step(&mut kb, "-2").expect("push -2");
        assert_eq!(kb.stack(), &[Value::Int(3), Value::Int(-2)]);
        replay_step(&mut kb, "add").expect("add");
        assert_eq!(kb.stack(), &[Value::Int(1)]);
    }

    #[test]
    fn replay_skips_illegal_steps_without_failing() {
        let mut kb = keyboard();
        replay_step(&mut kb, "add").expect("rejected but reported");
        assert_eq!(kb.session().version, 0);
        assert!(replay_step(&mut kb, "frobnicate").is_err());
    }

    #[test]
    fn render_text_shows_stack_and_rows() {
        let mut kb = keyboard();
        replay_step(&mut kb, "2").expect("push");
        let text = render_text(&kb);
        assert!(text.starts_with("stack: [2]\n"), "{text}");
        assert!(text.contains("zero"), "{text}");
    }

    #[test]
    fn render_json_is_a_snapshot_document() {
        let mut kb = keyboard();
        replay_step(&mut kb, "zero").expect("zero");
        let doc: serde_json::Value =
            serde_json::from_str(&render_json(&kb).expect("render")).expect("parse");
        assert_eq!(doc["version"], 1);
        assert!(doc["keyboard"].as_array().is_some_and(|rows| !rows.is_empty()));
    }

    #[test]
    fn resumed_session_continues_from_the_stored_stack() {
        let dir = unique_temp_dir("arpeggio-resume");
        let path = dir.join("history.jsonl");

        let id = {
            let log = JsonlLog::open(&path).expect("open");
            let mut kb = start_keyboard(log, DEFAULT_KEYS, None).expect("start");
            for op in ["zero", "succ", "succ"] {
                kb.dispatch(op).expect("dispatch");
            }
            kb.session().id
        };

        let log = JsonlLog::open(&path).expect("reopen");
        let mut kb = start_keyboard(log, DEFAULT_KEYS, Some(id)).expect("resume");
        assert_eq!(kb.stack(), &[Value::Int(2)]);
        kb.dispatch("dup").expect("dispatch");
        kb.dispatch("mul").expect("dispatch");
        assert_eq!(kb.stack(), &[Value::Int(4)]);
        assert_eq!(kb.session().version, 5);
    }
}
