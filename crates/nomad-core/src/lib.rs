pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod stats;
pub mod store;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::ScrapeConfig;
pub use error::{AppError, ErrorKind};
pub use models::{
    Company, EmploymentType, FetchedJobs, PlatformStrategy, ScrapeTarget, ScrapedJob, Seniority,
    TargetStatus, compute_hash,
};
pub use orchestrator::{BatchOrchestrator, RunEvent, RunReporter, ScrapeRun, TracingRunReporter};
pub use stats::{JobMerger, ScrapeRunStats, TargetError};
pub use store::InMemoryTargetStore;
pub use traits::{HttpClient, HttpResponse, JobSource, RequestOptions, TargetStore};
