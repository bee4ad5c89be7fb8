//! Demonstration driver for the coopsync primitives.
//!
//! Spawns a batch of tasks on the lab executor contending on one of the
//! four primitives and logs the resulting schedule.

use clap::{ArgAction, Parser, Subcommand};
use coopsync::lab::LabExecutor;
use coopsync::sync::{FifoLock, PollingLock, RwLock, Semaphore};
use coopsync::time::sleep;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "coopsync-demo", version, about = "Contention demos for coopsync primitives")]
struct Cli {
    /// Number of contending tasks
    #[arg(short = 'n', long = "tasks", default_value_t = 5)]
    tasks: u64,

    /// Simulated critical-section duration in milliseconds
    #[arg(short = 'w', long = "work-ms", default_value_t = 50)]
    work_ms: u64,

    /// Enable debug-level logging
    #[arg(long = "debug", action = ArgAction::SetTrue)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Polling lock: unfair fixed-delay retry
    Polling {
        /// Retry delay in milliseconds
        #[arg(long = "retry-ms", default_value_t = 10)]
        retry_ms: u64,
    },
    /// FIFO lock: strict arrival-order handoff
    Fifo,
    /// Counting semaphore: bounded concurrent holders
    Semaphore {
        /// Maximum concurrent holders
        #[arg(long = "permits", default_value_t = 3)]
        permits: usize,
    },
    /// Reader/writer lock with writer preference
    Rwlock {
        /// Number of the tasks that act as writers
        #[arg(long = "writers", default_value_t = 2)]
        writers: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let work = Duration::from_millis(cli.work_ms);
    let mut lab = LabExecutor::new();

    match cli.command {
        Command::Polling { retry_ms } => {
            let lock = Rc::new(PollingLock::new(Duration::from_millis(retry_ms)));
            for id in 1..=cli.tasks {
                let lock = Rc::clone(&lock);
                lab.spawn(async move {
                    lock.acquire(id).await;
                    tracing::info!(task = id, "entered critical section");
                    sleep(work).await;
                    tracing::info!(task = id, "leaving critical section");
                    lock.release(id);
                });
            }
        }
        Command::Fifo => {
            let lock = Rc::new(FifoLock::new());
            for id in 1..=cli.tasks {
                let lock = Rc::clone(&lock);
                lab.spawn(async move {
                    tracing::info!(task = id, "requesting lock");
                    let _guard = lock.acquire().await;
                    tracing::info!(task = id, "granted in arrival order");
                    sleep(work).await;
                });
            }
        }
        Command::Semaphore { permits } => {
            let sem = match Semaphore::new(permits) {
                Ok(sem) => Rc::new(sem),
                Err(error) => {
                    tracing::error!(%error, "invalid semaphore configuration");
                    std::process::exit(2);
                }
            };
            let active = Rc::new(RefCell::new(0usize));
            for id in 1..=cli.tasks {
                let sem = Rc::clone(&sem);
                let active = Rc::clone(&active);
                lab.spawn(async move {
                    let _permit = sem.acquire().await;
                    let now = {
                        let mut a = active.borrow_mut();
                        *a += 1;
                        *a
                    };
                    tracing::info!(task = id, concurrent = now, "permit acquired");
                    sleep(work).await;
                    *active.borrow_mut() -= 1;
                    tracing::info!(task = id, "permit released");
                });
            }
        }
        Command::Rwlock { writers } => {
            let lock = Rc::new(RwLock::new());
            for id in 1..=cli.tasks {
                let lock = Rc::clone(&lock);
                let is_writer = id <= writers;
                lab.spawn(async move {
                    if is_writer {
                        tracing::info!(task = id, "requesting write access");
                        let _guard = lock.write().await;
                        tracing::info!(task = id, "writing exclusively");
                        sleep(work).await;
                    } else {
                        tracing::info!(task = id, "requesting read access");
                        let _guard = lock.read().await;
                        tracing::info!(task = id, readers = lock.readers(), "reading");
                        sleep(work).await;
                    }
                });
            }
        }
    }

    lab.run();
    tracing::info!("all tasks completed");
}
