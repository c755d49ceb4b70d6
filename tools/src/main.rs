//! gain-runner: headless runner for the avoided-contact gain calculator.
//!
//! Usage:
//!   gain-runner --records perf.json --segment Móvel --volume 10000
//!   gain-runner --records perf.json --segment Móvel --subchannel "Meu App" --period 202405
//!   gain-runner --records perf.json --ipc-mode
//!
//! `--records` is a JSON array of performance rows (sheet column names
//! such as ANOMES / SEGMENTO / NM_KPI are accepted). Premises come from
//! `--data-dir` (default ./data) or, when that directory is absent, the
//! built-in standard config.

use anyhow::Result;
use gain_core::{
    command::CalcCommand,
    config::CalcConfig,
    engine::{CalcEngine, ScenarioReport, ScenarioRequest},
    snapshot::{RawRecord, RecordSnapshot},
    types::Period,
};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let data_dir = str_arg(&args, "--data-dir").unwrap_or("./data");
    let records_path = str_arg(&args, "--records")
        .ok_or_else(|| anyhow::anyhow!("--records <file.json> is required"))?;
    let volume = parse_arg(&args, "--volume", 10_000f64);

    let config = if Path::new(data_dir).is_dir() {
        CalcConfig::load(data_dir)?
    } else {
        log::warn!("{data_dir} not found, using built-in premises");
        CalcConfig::standard()
    };

    let content = std::fs::read_to_string(records_path)
        .map_err(|e| anyhow::anyhow!("Cannot read {records_path}: {e}"))?;
    let rows: Vec<RawRecord> = serde_json::from_str(&content)?;
    let (snapshot, stats) = RecordSnapshot::from_raw(rows, &config.eligible_kind);
    let engine = CalcEngine::new(config, Arc::new(snapshot))?;

    if ipc_mode {
        return run_ipc_loop(&engine);
    }

    println!("Avoided-contact gain calculator — gain-runner");
    println!("  records:   {records_path} ({} eligible, {} other kinds)", stats.accepted, stats.wrong_kind);
    println!("  data_dir:  {data_dir}");
    println!("  volume:    {volume}");
    println!();

    let segment = match str_arg(&args, "--segment") {
        Some(s) => s.to_string(),
        None => engine
            .segments()
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no eligible records to calculate over"))?,
    };
    let period = str_arg(&args, "--period").map(Period::parse).transpose()?;

    let request = ScenarioRequest {
        segment,
        subchannel: str_arg(&args, "--subchannel").map(str::to_string),
        period,
        expected_volume: volume,
    };
    let report = engine.run_scenario(&request)?;
    print_summary(&report);
    Ok(())
}

fn run_ipc_loop(engine: &CalcEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: CalcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let reply = match cmd {
            CalcCommand::Quit => break,
            CalcCommand::Segments => serde_json::to_value(engine.segments())?,
            CalcCommand::Periods => serde_json::to_value(engine.periods())?,
            CalcCommand::Subchannels { segment, period } => {
                serde_json::to_value(engine.subchannels(&segment, period))?
            }
            CalcCommand::Assumptions => serde_json::to_value(engine.assumptions())?,
            CalcCommand::Scenario(request) => match engine.run_scenario(&request) {
                Ok(report) => serde_json::to_value(report)?,
                Err(e) => serde_json::json!({ "error": e.to_string() }),
            },
        };
        writeln!(stdout, "{}", reply)?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_summary(report: &ScenarioReport) {
    let req = &report.request;
    println!("=== SCENARIO ===");
    println!("  segment:    {}", req.segment);
    println!(
        "  period:     {}",
        req.period.map(|p| p.to_string()).unwrap_or_else(|| "all".into())
    );

    if let Some(row) = &report.selected {
        println!();
        println!("=== SUBCHANNEL {} (tribe {}) ===", row.subchannel, row.tribe);
        println!("  transactions / access:  {:.2}", row.throughput_ratio);
        println!("  conversion rate:        {:.2}%", row.conversion_rate * 100.0);
        println!("  retention rate:         {:.2}%", row.retention_rate * 100.0);
        println!("  unique users:           {}", fmt_int(row.user_count));
        println!("  avoided contacts:       {}", row.avoided_volume);
    }

    println!();
    println!("=== ALL SUBCHANNELS (Pareto) ===");
    if report.pareto.ranked.is_empty() {
        println!("  (No subchannels for this scope)");
    }
    for r in &report.pareto.ranked {
        println!(
            "  {:>3}. {:<28} {:<10} avoided {:>10}  cum {:>6.2}%{}",
            r.rank,
            r.row.subchannel,
            r.row.tribe,
            r.row.avoided_volume,
            r.cumulative_pct,
            if r.priority { "  *" } else { "" },
        );
    }
    for f in &report.table.failures {
        println!("  !   {:<28} {}", f.subchannel, f.reason);
    }

    let s = &report.summary;
    println!();
    println!("=== INSIGHT ===");
    println!("  total avoided contacts: {}", s.total_avoided);
    println!(
        "  {} subchannels hold {:.1}% of the potential (cut at {:.0}%): {}",
        s.priority_count,
        s.priority_share_pct,
        s.threshold_pct,
        s.priority_subchannels.join(", "),
    );
}

fn fmt_int(x: f64) -> String {
    format!("{:.0}", x.floor())
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
