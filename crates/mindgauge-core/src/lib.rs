//! mindgauge-core: adaptive psychometric assessment engine.
//!
//! Decides which questions an attempt shows given earlier answers, tracks
//! progress over that shifting question set, scores completed attempts with
//! several strategies and derives interpretation and clinical risk. The
//! [`engine::AssessmentEngine`] facade serves all of it over a
//! [`store::TemplateStore`].

pub mod branching;
pub mod catalog;
pub mod condition;
pub mod engine;
pub mod error;
pub mod expr;
pub mod interpret;
pub mod model;
pub mod parser;
pub mod results;
pub mod risk;
pub mod rules;
pub mod scoring;
pub mod session;
pub mod store;
pub mod validator;

pub use engine::{AssessmentEngine, EngineConfig, QuestionPrompt, SubmitOutcome};
pub use error::EngineError;
pub use model::{Question, Response, ResponseValue, TestTemplate};
pub use results::AssessmentResult;
pub use session::Session;
