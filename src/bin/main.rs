// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use clap::{Parser, Subcommand};
use crossbeam::channel::{self, Receiver};
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::ops::AddAssign;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use wallet_ledger::{
    Engine, HistoryQuery, LedgerConfig, LedgerResult, LedgerStore, MemoryStore, MovementKind,
    MovementRequest, OpenDirectory, OwnerId, SqliteStore, TripRef,
};

/// Wallet Ledger - Apply wallet movements and inspect balances
///
/// Movements are read from CSV; balances and history are written to stdout as
/// CSV. Logs go to stderr and are filtered with `RUST_LOG`.
#[derive(Parser, Debug)]
#[command(name = "wallet-ledger")]
#[command(about = "Per-account wallet ledger", long_about = None)]
struct Args {
    /// SQLite database holding the ledger (in-memory when omitted)
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,

    /// How long to wait for a busy account before giving up
    #[arg(long, value_name = "MS", default_value_t = 5_000, global = true)]
    lock_timeout_ms: u64,

    /// Skip reconciling every account when the ledger is opened
    #[arg(long, global = true)]
    skip_verify: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply movements from a CSV file and print the resulting balances
    ///
    /// Expected format: owner,kind,amount,description,trip
    Apply {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Worker threads; rows of one owner always go to the same worker
        #[arg(long, default_value_t = 4)]
        workers: usize,
    },
    /// Print every account balance
    Balances,
    /// Print an owner's movement history
    History {
        #[arg(value_name = "OWNER")]
        owner: u64,

        /// Maximum number of movements to print
        #[arg(long)]
        limit: Option<usize>,

        /// Print the most recent movements first
        #[arg(long)]
        newest_first: bool,
    },
    /// Check every balance against its movement log
    Audit,
}

fn main() {
    init_tracing();
    let args = Args::parse();

    let engine = match open_engine(&args) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error opening ledger: {}", e);
            process::exit(1);
        }
    };

    let stdout = std::io::stdout();
    let result = match args.command {
        Command::Apply { input, workers } => {
            let file = match File::open(&input) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Error opening file '{}': {}", input.display(), e);
                    process::exit(1);
                }
            };
            apply_movements(&engine, BufReader::new(file), workers)
                .map_err(|e| e.to_string())
                .and_then(|summary| {
                    eprintln!(
                        "applied {}, rejected {}, skipped {}",
                        summary.applied, summary.rejected, summary.skipped
                    );
                    write_accounts(&engine, stdout.lock())
                })
        }
        Command::Balances => write_accounts(&engine, stdout.lock()),
        Command::History {
            owner,
            limit,
            newest_first,
        } => write_history(&engine, OwnerId(owner), limit, newest_first, stdout.lock()),
        Command::Audit => engine
            .audit_all()
            .map(|checked| eprintln!("{} accounts reconciled", checked))
            .map_err(|e| e.to_string()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn open_engine(args: &Args) -> LedgerResult<Engine> {
    let config = LedgerConfig {
        verify_on_open: !args.skip_verify,
        ..LedgerConfig::default()
    }
    .with_lock_timeout(Duration::from_millis(args.lock_timeout_ms));

    let store: Arc<dyn LedgerStore> = match &args.db {
        Some(path) => Arc::new(SqliteStore::open(path)?),
        None => Arc::new(MemoryStore::new()),
    };
    Engine::open(store, Arc::new(OpenDirectory), config)
}

/// Raw CSV record matching the input format.
///
/// Fields: `owner, kind, amount, description, trip`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    owner: u64,
    kind: String,
    amount: Decimal,
    description: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    trip: Option<u64>,
}

impl CsvRecord {
    fn into_job(self, line: u64) -> Result<Job, String> {
        let kind: MovementKind = self.kind.parse()?;
        let mut request = MovementRequest::new(kind, self.amount, self.description);
        if let Some(trip) = self.trip {
            request = request.with_trip(TripRef(trip));
        }
        Ok(Job {
            line,
            owner: OwnerId(self.owner),
            request,
        })
    }
}

#[derive(Debug)]
struct Job {
    line: u64,
    owner: OwnerId,
    request: MovementRequest,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub applied: usize,
    pub rejected: usize,
    pub skipped: usize,
}

impl AddAssign for Summary {
    fn add_assign(&mut self, other: Self) {
        self.applied += other.applied;
        self.rejected += other.rejected;
        self.skipped += other.skipped;
    }
}

/// Apply movements from a CSV reader.
///
/// Rows are streamed and routed to `workers` threads by owner, so every
/// owner's movements are applied in file order while different owners are
/// applied in parallel. Malformed rows are skipped and rejected movements are
/// logged; neither stops processing.
///
/// # CSV Format
///
/// ```csv
/// owner,kind,amount,description,trip
/// 1,deposit,50.00,trip payout,17
/// 1,fee,7.50,commission,17
/// 2,bonus,5.00,welcome promo,
/// ```
///
/// # Errors
///
/// Returns a CSV error only if the underlying reader fails.
pub fn apply_movements<R: Read>(
    engine: &Engine,
    reader: R,
    workers: usize,
) -> Result<Summary, csv::Error> {
    let workers = workers.max(1);
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    thread::scope(|scope| {
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let (tx, rx) = channel::bounded::<Job>(1024);
            senders.push(tx);
            handles.push(scope.spawn(move || run_worker(engine, rx)));
        }

        let mut summary = Summary::default();
        for (index, result) in rdr.deserialize::<CsvRecord>().enumerate() {
            // Header is line 1.
            let line = index as u64 + 2;
            let record = match result {
                Ok(record) => record,
                Err(e) if e.is_io_error() => return Err(e),
                Err(e) => {
                    warn!(line, error = %e, "skipping malformed row");
                    summary.skipped += 1;
                    continue;
                }
            };
            let job = match record.into_job(line) {
                Ok(job) => job,
                Err(e) => {
                    warn!(line, error = %e, "skipping invalid row");
                    summary.skipped += 1;
                    continue;
                }
            };

            let shard = (job.owner.0 % workers as u64) as usize;
            if senders[shard].send(job).is_err() {
                break;
            }
        }
        drop(senders);

        for handle in handles {
            match handle.join() {
                Ok(counts) => summary += counts,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        Ok(summary)
    })
}

fn run_worker(engine: &Engine, jobs: Receiver<Job>) -> Summary {
    let mut summary = Summary::default();
    for job in jobs {
        let result = engine
            .get_or_create(job.owner)
            .and_then(|account| engine.apply(account.id, &job.request));
        match result {
            Ok(receipt) => {
                debug!(
                    line = job.line,
                    owner = %job.owner,
                    movement = %receipt.movement_id,
                    "row applied"
                );
                summary.applied += 1;
            }
            Err(e) => {
                warn!(line = job.line, owner = %job.owner, error = %e, "row rejected");
                summary.rejected += 1;
            }
        }
    }
    summary
}

/// Write every account to a CSV writer.
///
/// Columns: `account, owner, balance, created_at, updated_at`
pub fn write_accounts<W: Write>(engine: &Engine, writer: W) -> Result<(), String> {
    let accounts = engine.accounts().map_err(|e| e.to_string())?;
    let mut wtr = Writer::from_writer(writer);
    for account in &accounts {
        wtr.serialize(account).map_err(|e| e.to_string())?;
    }
    wtr.flush().map_err(|e| e.to_string())
}

/// Write an owner's movements to a CSV writer, walking the log page by page.
pub fn write_history<W: Write>(
    engine: &Engine,
    owner: OwnerId,
    limit: Option<usize>,
    newest_first: bool,
    writer: W,
) -> Result<(), String> {
    let account = engine.get(owner).map_err(|e| e.to_string())?;
    let mut query = HistoryQuery::default().with_limit(engine.config().max_page_size);
    if newest_first {
        query = query.newest_first();
    }

    let mut wtr = Writer::from_writer(writer);
    let mut remaining = limit.unwrap_or(usize::MAX);
    while remaining > 0 {
        let page = engine
            .history(account.id, &query)
            .map_err(|e| e.to_string())?;
        for movement in page.movements.iter().take(remaining) {
            wtr.serialize(movement).map_err(|e| e.to_string())?;
        }
        remaining = remaining.saturating_sub(page.movements.len());
        match page.next {
            Some(cursor) => query = query.after(cursor),
            None => break,
        }
    }
    wtr.flush().map_err(|e| e.to_string())
}
