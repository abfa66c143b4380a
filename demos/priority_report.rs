//! Priority Report: compare background-write priorities on your hardware.
//!
//! For each priority, two files are written through two chains of four
//! background writes each, while the main thread keeps busy with arithmetic.
//! The report shows how long the writes took, the throughput, and an
//! "interactivity score": main-thread calculations per second of writing.
//! Higher priorities should trade throughput for a higher score.
//!
//! Usage: `cargo run --example priority_report [START END] [MIB]`
//!
//! Set `RUST_LOG=nonblock=debug` to watch the tasks.

use nonblock::write::{MAX_PRIORITY, MIN_PRIORITY};
use nonblock::{
    background_write, background_write_chunked, Data, FdWriter, SharedStream, WriteOptions,
    WriteTask,
};
use std::fs::File;
use std::hint::black_box;
use std::time::Instant;
use tempdir::TempDir;

type Dest = SharedStream<FdWriter<File>>;

fn parse_args() -> (u32, u32, usize) {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let num = |i: usize, default: usize| args.get(i).and_then(|a| a.parse().ok()).unwrap_or(default);
    let start = num(0, MIN_PRIORITY as usize) as u32;
    let end = num(1, MAX_PRIORITY as usize) as u32;
    (start, end, num(2, 32))
}

/// First chain: whole, whole, quartered, whole (closes).
fn first_chain(dest: &Dest, data: &Data, priority: u32) -> nonblock::Result<WriteTask> {
    let opts = || WriteOptions::default().with_priority(priority);
    let a = background_write(dest.clone(), data.clone(), opts())?;
    let b = background_write(dest.clone(), data.clone(), opts().with_chain_after(a.status()))?;
    let c = background_write_chunked(
        dest.clone(),
        data.clone(),
        data.len() / 4,
        opts().with_chain_after(b.status()),
    )?;
    background_write(
        dest.clone(),
        data.clone(),
        opts().with_chain_after(c.status()).with_close_on_finish(true),
    )
}

/// Second chain: quartered, whole, whole, whole (closes).
fn second_chain(dest: &Dest, data: &Data, priority: u32) -> nonblock::Result<WriteTask> {
    let opts = || WriteOptions::default().with_priority(priority);
    let a = background_write_chunked(dest.clone(), data.clone(), data.len() / 4, opts())?;
    let b = background_write(dest.clone(), data.clone(), opts().with_chain_after(a.status()))?;
    let c = background_write(dest.clone(), data.clone(), opts().with_chain_after(b.status()))?;
    background_write(
        dest.clone(),
        data.clone(),
        opts().with_chain_after(c.status()).with_close_on_finish(true),
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let (start, end, mib) = parse_args();
    let data = Data::Binary((0..mib * 1024 * 1024).map(|i| (i % 251) as u8).collect());
    let total = data.len() * 8;
    let dir = TempDir::new("nonblock-priority-report")?;

    let (x, y) = (13_i64, 37_i64);

    for priority in start..=end {
        let out1 = Dest::new(FdWriter::new(File::create(dir.path().join("output1"))?));
        let out2 = Dest::new(FdWriter::new(File::create(dir.path().join("output2"))?));

        let before = Instant::now();
        let last1 = first_chain(&out1, &data, priority)?;
        let last2 = second_chain(&out2, &data, priority)?;

        let mut answers: u64 = 0;
        let mut i: i64 = 0;
        while !(last1.status().is_done() && last2.status().is_done()) {
            black_box(x * y * (i * i));
            black_box((x - y) * i.pow(4));
            black_box(x as f64 + y as f64 + i as f64 / 2.0);
            answers += 3;
            i = (i + 1) % 7;
        }

        let delta = before.elapsed().as_secs_f64();
        if let Some(err) = last1.error().or_else(|| last2.error()) {
            eprintln!("[{priority}] write failed: {err}");
            continue;
        }

        println!("{}", "-".repeat(40));
        println!("[{priority}] Time to write: {delta:.5}");
        println!("[{priority}] Number of answers generated: {answers}");
        println!(
            "[{priority}] Average write speed: {:.5} M/s",
            total as f64 / delta / (1024.0 * 1024.0)
        );
        println!("[{priority}] Interactivity score: {:.5}", answers as f64 / delta);
        println!("{}\n", "=".repeat(40));
    }

    Ok(())
}
