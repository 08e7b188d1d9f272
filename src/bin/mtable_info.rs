//! Print table statistics as JSON, and optionally dump every entry.
//!
//! Usage: `mtable_info [--dump] <file>...`

use anyhow::{bail, Context, Result};
use mtable::{inspect, TableReader};
use std::io::{self, Write};

fn usage() -> ! {
    eprintln!("Usage: mtable_info [--dump] <file>...");
    std::process::exit(2);
}

fn escape(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}

fn dump(path: &str, out: &mut impl Write) -> Result<()> {
    let reader = TableReader::open(path).with_context(|| format!("open {}", path))?;
    for entry in reader.scan() {
        let (key, value) = entry.with_context(|| format!("scan {}", path))?;
        writeln!(out, "{} {}", escape(&key), escape(&value))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let mut dump_entries = false;
    let mut files = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--dump" | "-d" => dump_entries = true,
            "--help" | "-h" => usage(),
            flag if flag.starts_with('-') => bail!("unknown option {}", flag),
            _ => files.push(arg),
        }
    }
    if files.is_empty() {
        usage();
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for file in &files {
        let info = inspect(file).with_context(|| format!("inspect {}", file))?;
        writeln!(out, "{}", serde_json::to_string_pretty(&info)?)?;
        if dump_entries {
            dump(file, &mut out)?;
        }
    }
    Ok(())
}
