//! Orchestration layer: the ingestion pipeline and the periodic jobs that
//! derive leaderboards, winners and highlights from the ledger.

pub mod highlights;
pub mod ingest;
pub mod materialize;
pub mod reversal;
pub mod scheduler;
pub mod uploads;
pub mod winners;

pub use highlights::DailyHighlights;
pub use ingest::{BatchIngestor, IngestError, IngestOutcome, IngestReport};
pub use materialize::LeaderboardMaterializer;
pub use reversal::ReversalProcessor;
pub use scheduler::{Cadence, Job, JobError, Scheduler};
pub use uploads::{ExportError, UploadHistory, UploadPage};
pub use winners::WinnerArchiver;
