//! # phenotex batch
//!
//! Runs the texture pipeline over every (file, window size) pair found under
//! an input directory and appends one row per pair to a CSV ledger keyed by
//! band and window size.
//!
//! ```no_run
//! use phenotex_batch::{BatchEvent, BatchRequest, TextureBatch};
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let request = BatchRequest::new("tiles", "features").with_window_sizes(vec![3, 5, 7]);
//! let handle = TextureBatch::spawn(request, tx)?;
//! for event in rx.iter() {
//!     if let BatchEvent::Progress { done, total, label } = &event {
//!         println!("{done}/{total} {label}");
//!     }
//!     if event.is_terminal() {
//!         break;
//!     }
//! }
//! handle.join()?;
//! # Ok::<(), phenotex_batch::BatchError>(())
//! ```

pub mod band;
pub mod discover;
pub mod error;
pub mod events;
pub mod ledger;
pub mod request;
pub mod runner;

pub use band::BandCode;
pub use discover::{discover_tiles, Discovery};
pub use error::{BatchError, Result};
pub use events::{BatchEvent, BatchObserver, NullObserver};
pub use ledger::{ledger_header, ledger_path, FeatureRecord, OutputLedger, LEDGER_FILE};
pub use request::{BatchPlan, BatchRequest};
pub use runner::{BatchHandle, BatchOutcome, BatchState, CancelToken, TextureBatch, WorkItem};
