//! Stub child program for harness testing
//!
//! Hosts a handful of entry points with predictable behaviour so the launcher
//! can be exercised end to end without a real application.
//!
//! | Entry | Behaviour |
//! |-------|-----------|
//! | `forkharness::ForkLauncher` | setup only, exit 0 |
//! | `hello [ms]` | print `hello`, sleep (default 50 ms), exit 0 |
//! | `hang` | block forever |
//! | `emit <n>` | write `n` bytes of `#` to stdout, exit 0 |
//! | `fail <code>` | exit with `code` |
//! | `resume-download <file> <total> <half>` | see [`resume_download`] |

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use forkharness::child::exit_codes;
use forkharness::{EntryPoints, ForkContext, ForkLauncher};
use tracing::info;

const EMIT_CHUNK: usize = 8 * 1024;

fn main() {
    // A second subscriber can't be installed; the stub just runs unlogged then.
    let _ = forkharness_utils::logging::init_tracing(false);

    let entries = EntryPoints::new()
        .register(ForkLauncher::DEFAULT_ENTRY_POINT, |_| Ok(exit_codes::SUCCESS))
        .register("hello", hello)
        .register("hang", hang)
        .register("emit", emit)
        .register("fail", fail)
        .register("resume-download", resume_download);

    std::process::exit(entries.run_from_env());
}

fn numeric_parameter<T>(ctx: &ForkContext, index: usize, what: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = ctx
        .parameter(index)
        .with_context(|| format!("missing parameter <{what}>"))?;
    raw.parse()
        .with_context(|| format!("parameter <{what}> is not a number: {raw}"))
}

fn hello(ctx: &ForkContext) -> Result<i32> {
    let sleep_ms = match ctx.parameter(0) {
        Some(_) => numeric_parameter(ctx, 0, "ms")?,
        None => 50,
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "hello")?;
    stdout.flush()?;
    drop(stdout);

    thread::sleep(Duration::from_millis(sleep_ms));
    Ok(exit_codes::SUCCESS)
}

fn hang(_: &ForkContext) -> Result<i32> {
    loop {
        thread::sleep(Duration::from_secs(3600));
    }
}

fn emit(ctx: &ForkContext) -> Result<i32> {
    let total: usize = numeric_parameter(ctx, 0, "n")?;
    let chunk = [b'#'; EMIT_CHUNK];
    let mut stdout = io::stdout().lock();

    let mut remaining = total;
    while remaining > 0 {
        let n = remaining.min(EMIT_CHUNK);
        stdout.write_all(&chunk[..n])?;
        remaining -= n;
    }
    stdout.flush()?;
    Ok(exit_codes::SUCCESS)
}

fn fail(ctx: &ForkContext) -> Result<i32> {
    numeric_parameter(ctx, 0, "code")
}

/// Byte expected at `offset` of a downloaded file.
fn payload_byte(offset: u64) -> u8 {
    (offset % 251) as u8
}

/// A download that can be resumed.
///
/// On an empty or missing file, writes the first `half` bytes and then stalls
/// forever, like a transfer whose connection hung. On a partial file, appends
/// the rest up to `total` bytes and exits 0.
fn resume_download(ctx: &ForkContext) -> Result<i32> {
    let file = ctx.parameter(0).context("missing parameter <file>")?;
    let total: u64 = numeric_parameter(ctx, 1, "total")?;
    let half: u64 = numeric_parameter(ctx, 2, "half")?;
    if half > total {
        bail!("half ({half}) exceeds total ({total})");
    }

    let existing = std::fs::metadata(file).map_or(0, |m| m.len());
    if existing == 0 {
        append_payload(Path::new(file), 0, half)?;
        info!(file, written = half, "transfer stalled");
        loop {
            thread::sleep(Duration::from_secs(3600));
        }
    }

    append_payload(Path::new(file), existing, total)?;
    info!(file, resumed_at = existing, total, "transfer complete");
    Ok(exit_codes::SUCCESS)
}

fn append_payload(path: &Path, from: u64, to: u64) -> Result<()> {
    let mut out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let bytes: Vec<u8> = (from..to).map(payload_byte).collect();
    out.write_all(&bytes)?;
    out.sync_all()?;
    Ok(())
}
