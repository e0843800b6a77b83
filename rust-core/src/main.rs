//! CLI: stdin JSON -> stdout JSON.
//!
//! Usage:
//!   echo '[{"title":"...","source":"...","url":"...","timestamp":"..."}]' | fear-engine fud
//!   echo '{"fng":{"value":"25"}}' | fear-engine fear
//!   echo '{"whaleTransactions":[...]}' | fear-engine whale --source whales
//!   echo '{"current":80,"history":[50,52,48]}' | fear-engine anomaly
//!   fear-engine serve < requests.jsonl
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use fear_core::config::CONFIG_ENV;
use fear_core::{
    Engine, EngineConfig, EngineError, EngineResult, FearHistory, FearMeterResult, MemoryCache,
    Request,
};
use serde_json::{json, Value};
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fear-engine", about = "Crypto FUD and fear scoring engine")]
struct Cli {
    /// JSON config file. Falls back to $FEAR_ENGINE_CONFIG, then defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score an array of articles for FUD.
    Fud,
    /// Compute the fear meter from supplied components or an index reading.
    Fear,
    /// Wrap an upstream whale/holder/VC payload in its response envelope.
    Whale {
        #[arg(long, default_value = "whales")]
        source: String,
    },
    /// Group scored articles into campaigns by shared keyword.
    Campaigns,
    /// Check a fear score against its history.
    Anomaly,
    /// Compare two fear scores for a change alert.
    Alert,
    /// Run a single request object carrying its own "op".
    Run,
    /// Answer one JSON request per stdin line until EOF.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(flag: Option<PathBuf>) -> EngineResult<EngineConfig> {
    let path = flag.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    match path {
        Some(p) => EngineConfig::load(&p),
        None => Ok(EngineConfig::default()),
    }
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf).context("reading stdin")?;
    Ok(buf)
}

/// Empty input means an empty request object.
fn parse_input(input: &str) -> EngineResult<Value> {
    if input.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(input)
        .map_err(|e| EngineError::usage(format!("stdin is not valid JSON: {e}")))
}

/// Tag a stdin object with the subcommand's op.
fn with_op(op: &str, body: Value) -> Value {
    match body {
        Value::Object(mut map) => {
            map.insert("op".to_string(), Value::String(op.to_string()));
            Value::Object(map)
        }
        other => json!({ "op": op, "body": other }),
    }
}

fn request_for(command: &Command, body: Value) -> Result<Request, EngineError> {
    let tagged = match command {
        Command::Fud => json!({ "op": "fud", "articles": body }),
        Command::Campaigns => {
            // Accept either a bare score list or a full FUD analysis.
            let articles = body.get("articles").cloned().unwrap_or(body);
            json!({ "op": "campaigns", "articles": articles })
        }
        Command::Whale { source } => json!({ "op": "whale", "source": source, "payload": body }),
        Command::Fear => with_op("fear", body),
        Command::Anomaly => with_op("anomaly", body),
        Command::Alert => with_op("alert", body),
        Command::Run | Command::Serve => body,
    };
    serde_json::from_value(tagged).map_err(|e| EngineError::usage(format!("invalid request: {e}")))
}

fn write_line<W: Write>(out: &mut W, value: &Value) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn record_reading(history: &mut FearHistory, sigma: f64, value: &Value) {
    let Ok(meter) = serde_json::from_value::<FearMeterResult>(value.clone()) else {
        return;
    };
    if let Some(a) = history.check(meter.fear_score, sigma).filter(|a| a.is_anomaly) {
        warn!(
            score = a.current,
            mean = a.baseline_mean,
            z = a.z_score,
            "fear score outside historical band"
        );
    }
    if let Some(alert) = history.record(meter) {
        warn!(severity = ?alert.severity, message = %alert.message, "fear alert");
    }
}

fn serve(engine: &Engine) -> Result<()> {
    let mut cache = MemoryCache::new();
    let mut history = FearHistory::with_capacity(engine.config().history_capacity);
    let mut rng = rand::thread_rng();
    let stdin = io::stdin();
    let mut out = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line.context("reading request line")?;
        if line.trim().is_empty() {
            continue;
        }
        let now = Utc::now();
        cache.purge(now);

        let outcome = Request::from_json(&line).and_then(|req| {
            let is_fear = matches!(req, Request::Fear(_));
            let value = engine.handle(req, &mut cache, &mut rng, now)?;
            if is_fear {
                record_reading(&mut history, engine.config().anomaly_sigma, &value);
            }
            Ok(value)
        });
        let value = match outcome {
            Ok(v) => v,
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "request failed");
                error_value(&e, now)
            }
        };
        write_line(&mut out, &value)?;
    }
    info!(readings = history.len(), "input closed");
    Ok(())
}

/// One-shot request: the response body and whether it succeeded.
fn run_once(
    config: EngineResult<EngineConfig>,
    command: &Command,
    input: &str,
    now: DateTime<Utc>,
) -> (Value, bool) {
    let result = config.and_then(|cfg| {
        let engine = Engine::new(cfg);
        let req = parse_input(input).and_then(|body| request_for(command, body))?;
        engine.handle(req, &mut MemoryCache::new(), &mut rand::thread_rng(), now)
    });
    match result {
        Ok(value) => (value, true),
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "request failed");
            (error_value(&e, now), false)
        }
    }
}

fn error_value(e: &EngineError, now: DateTime<Utc>) -> Value {
    let body = e.to_body(now);
    json!({ "error": body.error, "kind": body.kind, "timestamp": body.timestamp })
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config);

    if let Command::Serve = cli.command {
        return match config {
            Ok(cfg) => {
                serve(&Engine::new(cfg))?;
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "cannot start");
                write_line(&mut io::stdout().lock(), &error_value(&e, Utc::now()))?;
                Ok(ExitCode::FAILURE)
            }
        };
    }

    let input = read_stdin()?;
    let (value, ok) = run_once(config, &cli.command, &input, Utc::now());
    write_line(&mut io::stdout().lock(), &value)?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_malformed_stdin_is_usage_body() {
        let (body, ok) = run_once(Ok(EngineConfig::default()), &Command::Fud, "not json", now());
        assert!(!ok);
        assert_eq!(body["kind"], "usage");
        assert_eq!(body["timestamp"], "2024-07-01T12:00:00.000Z");
        assert!(body["error"].as_str().unwrap().starts_with("stdin is not valid JSON"));
    }

    #[test]
    fn test_bad_config_is_usage_body() {
        let config = EngineConfig::from_json(r#"{"keyword_limit":"x"}"#);
        let (body, ok) = run_once(config, &Command::Fud, "[]", now());
        assert!(!ok);
        assert_eq!(body["kind"], "usage");
        assert!(body["error"].as_str().unwrap().starts_with("invalid config"));
    }

    #[test]
    fn test_wrong_shape_is_usage_body() {
        let (body, ok) = run_once(Ok(EngineConfig::default()), &Command::Fud, r#"{"a":1}"#, now());
        assert!(!ok);
        assert_eq!(body["error"], "Expected array of articles");
    }

    #[test]
    fn test_one_shot_success() {
        let (body, ok) = run_once(
            Ok(EngineConfig::default()),
            &Command::Alert,
            r#"{"current":80,"previous":50}"#,
            now(),
        );
        assert!(ok);
        assert_eq!(body["severity"], "critical");

        let (body, ok) = run_once(Ok(EngineConfig::default()), &Command::Fear, "", now());
        assert!(ok);
        assert!(body["fearScore"].as_u64().unwrap() <= 100);
    }
}
