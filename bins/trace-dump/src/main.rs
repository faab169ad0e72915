//! Call Trace Dump Tool
//!
//! Decodes a compressed call trace file and prints its calls as text or
//! JSON lines.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::debug;

use calltrace_protocol::{Call, Value};

#[derive(Parser)]
#[command(name = "trace-dump")]
#[command(version)]
#[command(about = "Inspect compressed call trace files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every decoded call
    #[command(name = "dump", alias = "d")]
    Dump {
        /// Trace file
        file: PathBuf,
        /// Emit one JSON object per call
        #[arg(long)]
        json: bool,
        /// Stop after this many calls
        #[arg(long, value_name = "N")]
        calls: Option<u64>,
        /// Decode without printing calls, report only the total
        #[arg(short, long)]
        quiet: bool,
    },
    /// Print stream version and signature statistics
    #[command(name = "info", alias = "i")]
    Info {
        /// Trace file
        file: PathBuf,
        /// JSON output
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Dump {
            file,
            json,
            calls,
            quiet,
        } => dump(&file, json, calls, quiet),
        Commands::Info { file, json } => info(&file, json),
    }
}

fn open(file: &Path) -> Result<calltrace_parser::Parser> {
    calltrace_parser::Parser::open(file)
        .with_context(|| format!("failed to open trace {}", file.display()))
}

fn dump(file: &Path, json: bool, limit: Option<u64>, quiet: bool) -> Result<()> {
    let mut parser = open(file)?;
    let mut total = 0u64;
    while limit.map_or(true, |n| total < n) {
        let Some(call) = parser
            .parse_call()
            .with_context(|| format!("failed to decode {}", file.display()))?
        else {
            break;
        };
        total += 1;
        if quiet {
            continue;
        }
        if json {
            println!("{}", call_to_json(&call));
        } else {
            println!("{call}");
        }
    }
    debug!("decoded {} calls from {}", total, file.display());
    if quiet {
        println!("{total} calls");
    }
    Ok(())
}

fn info(file: &Path, json: bool) -> Result<()> {
    let mut parser = open(file)?;
    let mut total = 0u64;
    while parser
        .parse_call()
        .with_context(|| format!("failed to decode {}", file.display()))?
        .is_some()
    {
        total += 1;
    }
    let counts = parser.signature_counts();
    if json {
        println!(
            "{}",
            json!({
                "file": file.display().to_string(),
                "version": parser.version(),
                "calls": total,
                "functions": counts.functions,
                "structs": counts.structs,
                "enums": counts.enums,
                "bitmasks": counts.bitmasks,
            })
        );
    } else {
        println!("file:      {}", file.display());
        println!("version:   {}", parser.version());
        println!("calls:     {total}");
        println!("functions: {}", counts.functions);
        println!("structs:   {}", counts.structs);
        println!("enums:     {}", counts.enums);
        println!("bitmasks:  {}", counts.bitmasks);
    }
    Ok(())
}

fn call_to_json(call: &Call) -> serde_json::Value {
    let args: Vec<serde_json::Value> = call
        .args
        .iter()
        .enumerate()
        .map(|(i, arg)| {
            json!({
                "name": call.sig.arg_names.get(i).cloned().unwrap_or_else(|| format!("arg{i}")),
                "value": arg.as_ref().map(value_to_json),
            })
        })
        .collect();
    json!({
        "no": call.no,
        "function": call.sig.name,
        "args": args,
        "ret": call.ret.as_ref().map(value_to_json),
    })
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::SInt(v) => json!(v),
        Value::UInt(v) => json!(v),
        Value::Float(v) => json!(v),
        Value::Double(v) => json!(v),
        Value::String(bytes) => json!(String::from_utf8_lossy(bytes)),
        Value::Enum(sig) => json!({ "enum": sig.name, "value": sig.value }),
        Value::Bitmask(_, raw) => json!({ "bitmask": value.to_string(), "value": raw }),
        Value::Array(values) => {
            serde_json::Value::Array(values.iter().map(value_to_json).collect())
        }
        Value::Struct(sig, members) => {
            let object: serde_json::Map<String, serde_json::Value> = sig
                .member_names
                .iter()
                .zip(members)
                .map(|(name, member)| (name.clone(), value_to_json(member)))
                .collect();
            json!({ "struct": sig.name, "members": object })
        }
        Value::Blob(bytes) => json!({ "blob": bytes.len() }),
        Value::Pointer(addr) => json!(format!("{addr:#x}")),
    }
}
