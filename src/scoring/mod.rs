//! Project Health Scoring
//!
//! Computes the overall health of a monitored project from a test outcome
//! and presence checks on the project tree.
//!
//! # Scoring Formula
//!
//! ```text
//! Overall      = Coverage × 0.35 + Documentation × 0.15 + Modules × 0.25 + Integration × 0.15
//! Illumination = min(1, (Overall + 10 if production ready) / 100)
//! ```
//!
//! The default weights sum to 0.90, so a project tops out at 0.90 before
//! the production-ready bonus. `normalize_weights = true` in `[scoring]`
//! rescales them to 1.0.
//!
//! # Sub-scores (0-100)
//!
//! - **Documentation**: README > 500 bytes (30), LICENSE (20), instructions
//!   file (20), OpenAPI spec (15), setup/quickstart guide (15)
//! - **Modules**: frontend files (25), backend files (25), test files (30),
//!   config checklist fraction × 20
//! - **Integration**: API configured (50) + min(providers × 15, 50)
//! - **Coverage**: taken from the test outcome

mod health_scorer;
mod probe;

pub use health_scorer::{HealthScorer, ScoreInput};
pub use probe::{FilesystemProbe, ProbeFacts, ProjectProbe};
