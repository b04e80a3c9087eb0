//! Batch runner: state machine, cancellation and the worker thread
//!
//! A batch walks `Idle → Running → {Completed, Cancelled, Failed}`. Items
//! run sequentially in enumeration order; cancellation is polled before
//! each item and never interrupts one in progress. An item that errors or
//! panics is reported and skipped.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::Sender;
use phenotex_algorithms::texture::texture_descriptors;
use phenotex_core::io::read_tile;

use crate::band::BandCode;
use crate::discover::discover_tiles;
use crate::error::{BatchError, Result};
use crate::events::{BatchEvent, BatchObserver};
use crate::ledger::{FeatureRecord, OutputLedger};
use crate::request::{BatchPlan, BatchRequest};

/// Shared cooperative cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BatchState {
    Idle = 0,
    Running = 1,
    Completed = 2,
    Cancelled = 3,
    Failed = 4,
}

impl BatchState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => BatchState::Running,
            2 => BatchState::Completed,
            3 => BatchState::Cancelled,
            4 => BatchState::Failed,
            _ => BatchState::Idle,
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, BatchState::Completed | BatchState::Cancelled | BatchState::Failed)
    }
}

#[derive(Debug, Clone)]
struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(BatchState::Idle as u8)))
    }

    fn get(&self) -> BatchState {
        BatchState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, state: BatchState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// One (file, window size) unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub path: PathBuf,
    pub window: usize,
}

impl WorkItem {
    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }

    /// `<file name> (<w>x<w>)`
    pub fn label(&self) -> String {
        format!("{} ({}x{})", self.file_name(), self.window, self.window)
    }
}

/// Final tally of a batch that was not stopped by a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub state: BatchState,
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
}

/// A validated texture batch
#[derive(Debug)]
pub struct TextureBatch {
    plan: BatchPlan,
    ledger: OutputLedger,
    state: StateCell,
}

impl TextureBatch {
    /// Validate `request`; fails with [`BatchError::InvalidRequest`]
    pub fn new(request: BatchRequest) -> Result<Self> {
        let plan = request.validate()?;
        let ledger = OutputLedger::new(&plan.output_root);
        Ok(Self {
            plan,
            ledger,
            state: StateCell::new(),
        })
    }

    pub fn plan(&self) -> &BatchPlan {
        &self.plan
    }

    pub fn state(&self) -> BatchState {
        self.state.get()
    }

    /// Work items in execution order: every window of the first file, then
    /// the next file. Zero-byte files are reported and left out.
    pub fn work_items<O: BatchObserver + ?Sized>(&self, observer: &O) -> Result<Vec<WorkItem>> {
        let found = discover_tiles(&self.plan.input_root)?;
        for path in found.empty {
            observer.on_event(BatchEvent::FileRejected {
                file: display_name(&path),
                message: "file is empty".into(),
            });
        }
        Ok(found
            .files
            .into_iter()
            .flat_map(|path| {
                self.plan.windows.iter().map(move |&window| WorkItem {
                    path: path.clone(),
                    window,
                })
            })
            .collect())
    }

    /// Run the batch on the calling thread.
    ///
    /// Per-item failures become [`BatchEvent::ItemFailed`]. A ledger write
    /// failure ends the batch in [`BatchState::Failed`] and is returned as
    /// the error.
    pub fn run<O: BatchObserver + ?Sized>(&self, observer: &O, cancel: &CancelToken) -> Result<BatchOutcome> {
        self.state.set(BatchState::Running);
        match self.run_items(observer, cancel) {
            Ok(outcome) => {
                self.state.set(outcome.state);
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(error = %e, "texture batch failed");
                self.state.set(BatchState::Failed);
                observer.on_event(BatchEvent::Failed { message: e.to_string() });
                Err(e)
            }
        }
    }

    fn run_items<O: BatchObserver + ?Sized>(&self, observer: &O, cancel: &CancelToken) -> Result<BatchOutcome> {
        let items = self.work_items(observer)?;
        let total = items.len();
        let start = Instant::now();
        tracing::info!(
            total,
            windows = ?self.plan.windows,
            features = self.plan.features.len(),
            "starting texture batch"
        );
        observer.on_event(BatchEvent::Started { total });

        let mut processed = 0;
        let mut failed = 0;
        for item in &items {
            if cancel.is_cancelled() {
                tracing::info!(processed, total, "texture batch cancelled");
                observer.on_event(BatchEvent::Cancelled { processed });
                return Ok(BatchOutcome {
                    state: BatchState::Cancelled,
                    total,
                    processed,
                    failed,
                });
            }

            let result = std::panic::catch_unwind(AssertUnwindSafe(|| self.process_item(item)))
                .unwrap_or_else(|payload| Err(phenotex_core::Error::Algorithm(panic_message(payload.as_ref()))));
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    failed += 1;
                    tracing::error!(file = %item.path.display(), window = item.window, error = %e, "item failed");
                    observer.on_event(BatchEvent::ItemFailed {
                        file: item.file_name(),
                        window: item.window,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let ledger = self.ledger.append(&record)?;
            processed += 1;
            tracing::debug!(done = processed, total, ledger = %ledger.display(), "item written");
            observer.on_event(BatchEvent::Progress {
                done: processed,
                total,
                label: item.label(),
            });
        }

        tracing::info!(
            processed,
            failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "texture batch completed"
        );
        observer.on_event(BatchEvent::Completed { processed, failed });
        Ok(BatchOutcome {
            state: BatchState::Completed,
            total,
            processed,
            failed,
        })
    }

    fn process_item(&self, item: &WorkItem) -> phenotex_core::Result<FeatureRecord> {
        let tile = read_tile(&item.path)?;
        let descriptors = texture_descriptors(&tile.raster, &self.plan.texture_params(item.window))?;
        let relative = item.path.strip_prefix(&self.plan.input_root).unwrap_or(&item.path);
        Ok(FeatureRecord {
            file_name: item.file_name(),
            window: item.window,
            band: BandCode::from_path(relative),
            values: descriptors.values,
        })
    }

    /// Validate `request` and run it on a dedicated worker thread, sending
    /// events to `events`.
    pub fn spawn(request: BatchRequest, events: Sender<BatchEvent>) -> Result<BatchHandle> {
        let batch = TextureBatch::new(request)?;
        let cancel = CancelToken::new();
        let state = batch.state.clone();
        let token = cancel.clone();

        let join = std::thread::Builder::new()
            .name("texture-batch".into())
            .spawn(move || batch.run(&events, &token))
            .map_err(phenotex_core::Error::from)?;

        Ok(BatchHandle { cancel, state, join })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map(|msg| format!("panicked: {}", msg))
        .unwrap_or_else(|| "panicked".into())
}

/// Handle to a batch running on its worker thread
#[derive(Debug)]
pub struct BatchHandle {
    cancel: CancelToken,
    state: StateCell,
    join: JoinHandle<Result<BatchOutcome>>,
}

impl BatchHandle {
    /// Ask the worker to stop before its next item
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> BatchState {
        self.state.get()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the worker and return its outcome
    pub fn join(self) -> Result<BatchOutcome> {
        self.join.join().map_err(|_| BatchError::WorkerPanicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_roundtrip() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), BatchState::Idle);
        for s in [BatchState::Running, BatchState::Completed, BatchState::Cancelled, BatchState::Failed] {
            cell.set(s);
            assert_eq!(cell.get(), s);
        }
        assert!(BatchState::Cancelled.is_finished());
        assert!(!BatchState::Running.is_finished());
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| -> u8 { panic!("index {} out of range", 9) }).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "panicked: index 9 out of range");
        let payload = std::panic::catch_unwind(|| -> u8 { std::panic::panic_any(7u8) }).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "panicked");
    }

    #[test]
    fn test_item_label() {
        let item = WorkItem {
            path: PathBuf::from("plots/Red/tile_04.tif"),
            window: 7,
        };
        assert_eq!(item.file_name(), "tile_04.tif");
        assert_eq!(item.label(), "tile_04.tif (7x7)");
    }
}
