//! Synthetic workload runner
//!
//! Pushes a batch of timed items through one queue strategy and reports
//! how long the queue took to drain and how each item ended.

use prettytable::{format, Cell, Row, Table};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use strum::IntoEnumIterator;

use crate::app::cli::args::RunSettings;
use crate::core::cancel::CancellationToken;
use crate::core::styles::StyleRole;
use crate::core::sync::lock_recover;
use crate::queue::{
    queue_maximum, ExecutionError, ProducerConsumerQueue, QueueError, QueueMode, QueueOptions,
    QueueResult, TaskResult, WorkItem,
};

/// Outcome of one strategy run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub mode: QueueMode,
    pub threads: usize,
    pub items: usize,
    pub elapsed: Duration,
    /// `false` when the run was interrupted before the queue drained
    pub drained: bool,
    pub counts: HashMap<TaskResult, usize>,
}

impl RunReport {
    pub fn count(&self, result: TaskResult) -> usize {
        self.counts.get(&result).copied().unwrap_or(0)
    }
}

fn execute_synthetic(item: &mut WorkItem<usize>, work: Duration, fail_every: usize) -> Result<(), ExecutionError> {
    let id = *item.state();
    if !work.is_zero() {
        let cancelled = match item.token() {
            Some(token) => token.wait_timeout(work),
            None => {
                std::thread::sleep(work);
                false
            }
        };
        if cancelled {
            return Err(ExecutionError::Canceled);
        }
    }
    if fail_every > 0 && (id + 1) % fail_every == 0 {
        return Err(ExecutionError::failed(format!("synthetic failure on item {}", id)));
    }
    Ok(())
}

fn build_options(
    settings: &RunSettings,
    counts: &Arc<Mutex<HashMap<TaskResult, usize>>>,
) -> QueueResult<QueueOptions<usize>> {
    let work = settings.work;
    let fail_every = settings.fail_every;
    let sink = Arc::clone(counts);

    let mut builder = QueueOptions::<usize>::builder()
        .threads(settings.threads.unwrap_or_else(queue_maximum))
        .wait_on_dispose(settings.wait_on_dispose)
        .priority(settings.priority)
        .background(settings.background)
        .execute(move |item| execute_synthetic(item, work, fail_every))
        .on_result(move |item, result| {
            log::trace!("item {} finished: {}", item.state(), result);
            *lock_recover(sink.lock()).entry(result).or_insert(0) += 1;
        });

    if let Some(name) = &settings.name {
        builder = builder.name(name.clone());
    }
    if let Some(threshold) = settings.threshold {
        builder = builder.threshold(threshold);
    }
    if let Some(pause) = settings.sleep_after_enqueue {
        builder = builder.sleep_after_enqueue(pause);
    }
    if let Some(interval) = settings.poll_interval {
        builder = builder.poll_interval(interval);
    }
    #[cfg(target_os = "linux")]
    if settings.posix {
        builder = builder.primitives(Arc::new(crate::queue::named::PosixNamedPrimitives));
    }

    Ok(builder.build()?)
}

/// Run the synthetic workload through one strategy
pub async fn run_mode(
    settings: &RunSettings,
    mode: QueueMode,
    token: &CancellationToken,
) -> QueueResult<RunReport> {
    let counts = Arc::new(Mutex::new(HashMap::new()));
    let options = build_options(settings, &counts)?;
    let queue = ProducerConsumerQueue::new(mode, options, token)?;
    let threads = queue.threads();
    if settings.name.is_some() && !mode.uses_named_primitive() {
        log::debug!("{}: queue name is only used as a label", mode);
    }
    log::info!("{}: {} items on {} threads", mode, settings.items, threads);

    let started = Instant::now();
    for id in 0..settings.items {
        if token.is_cancelled() {
            break;
        }
        match queue.enqueue(id) {
            Ok(()) => {}
            Err(QueueError::Cancelled { .. }) => break,
            Err(e) => return Err(e),
        }
    }
    queue.complete()?;

    let drained = tokio::select! {
        drained = queue.wait_async(None) => drained,
        _ = token.cancelled() => false,
    };
    if !drained {
        log::warn!("{}: interrupted with {} item(s) outstanding", mode, queue.count());
        queue.stop_async(true).await;
    }
    let elapsed = started.elapsed();
    log::info!("{}: finished in {:.3}s", mode, elapsed.as_secs_f64());

    let counts = lock_recover(counts.lock()).clone();
    Ok(RunReport {
        mode,
        threads,
        items: settings.items,
        elapsed,
        drained,
        counts,
    })
}

fn styled(text: String, role: StyleRole, color: bool) -> Cell {
    let cell = Cell::new(&text);
    match role.table_spec().filter(|_| color) {
        Some(spec) => cell.style_spec(spec),
        None => cell,
    }
}

/// Summary table with one row per strategy
pub fn render_reports(reports: &[RunReport], color: bool) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);

    let outcomes: Vec<TaskResult> = TaskResult::iter().filter(|r| *r != TaskResult::None).collect();
    let mut titles = vec![
        styled("Mode".to_string(), StyleRole::Header, color),
        styled("Threads".to_string(), StyleRole::Header, color),
        styled("Items".to_string(), StyleRole::Header, color),
    ];
    titles.extend(
        outcomes
            .iter()
            .map(|r| styled(r.to_string(), StyleRole::Header, color)),
    );
    titles.push(styled("Elapsed".to_string(), StyleRole::Header, color));
    table.set_titles(Row::new(titles));

    for report in reports {
        let mut cells = vec![
            styled(report.mode.to_string(), StyleRole::Mode, color),
            styled(report.threads.to_string(), StyleRole::Value, color),
            styled(report.items.to_string(), StyleRole::Value, color),
        ];
        cells.extend(outcomes.iter().map(|r| {
            let n = report.count(*r);
            let role = if n == 0 { StyleRole::Dim } else { StyleRole::for_result(*r) };
            styled(n.to_string(), role, color)
        }));
        let elapsed = format!("{:.3}s", report.elapsed.as_secs_f64());
        let role = if report.drained { StyleRole::Value } else { StyleRole::Warning };
        cells.push(styled(elapsed, role, color));
        table.add_row(Row::new(cells));
    }
    table
}
