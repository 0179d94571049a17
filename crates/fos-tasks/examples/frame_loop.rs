//! Example: a few frames of a game loop driven by the task scheduler
//!
//! Run with `RUST_LOG=fos_tasks=debug` to see pool startup and shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use fos_tasks::{SchedulerConfig, Task, TaskContext, TaskScheduler, TaskType};
use tracing_subscriber::EnvFilter;

const FRAMES: u64 = 5;
const ENTITIES: u64 = 8;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let scheduler = Arc::new(TaskScheduler::new(SchedulerConfig::default())?);
    println!(
        "fos-tasks v{} running {} workers per pool",
        fos_tasks::VERSION,
        scheduler.threads_per_pool()
    );

    // Asset loads: serialized on the large pool, results handed to the main thread.
    for name in ["level.bin", "atlas.png", "music.ogg"] {
        let handle = Arc::clone(&scheduler);
        scheduler.schedule_simple(TaskType::File, move || {
            std::thread::sleep(Duration::from_millis(10));
            let bytes = name.len() * 1024;
            handle.schedule_simple(TaskType::MainThread, move || {
                println!("loaded {name} ({bytes} bytes)");
            });
        });
    }

    let positions: Arc<Vec<AtomicU64>> = Arc::new((0..ENTITIES).map(|_| AtomicU64::new(0)).collect());

    for frame in 0..FRAMES {
        // Simulation: one game-logic task per entity, each fanning out child work.
        let updates: Vec<Task> = (0..ENTITIES)
            .map(|entity| {
                let positions = Arc::clone(&positions);
                Box::new(move |ctx: &TaskContext<'_>| {
                    let steps: Vec<Task> = (0..4)
                        .map(|_| {
                            let positions = Arc::clone(&positions);
                            Box::new(move |_: &TaskContext<'_>| {
                                positions[entity as usize].fetch_add(entity + 1, Ordering::SeqCst);
                            }) as Task
                        })
                        .collect();
                    ctx.process_child_tasks(steps);
                }) as Task
            })
            .collect();

        let handle = Arc::clone(&scheduler);
        let summary = Arc::clone(&positions);
        let report: Task = Box::new(move |_: &TaskContext<'_>| {
            let total: u64 = summary.iter().map(|p| p.load(Ordering::SeqCst)).sum();
            handle.schedule_simple(TaskType::MainThread, move || {
                println!("frame {frame}: simulation total {total}");
            });
        });

        scheduler.schedule_tasks(TaskType::GameLogic, updates, Some(report));

        // Waits for this frame's game logic, then runs main-thread work.
        scheduler.execute_main_thread_tasks();
        std::thread::sleep(Duration::from_millis(16));
    }

    scheduler.execute_main_thread_tasks();
    println!("stats: {:?}", scheduler.stats());

    Ok(())
}
