//! Health coordinator and its doctor and coach specialists.
//!
//! - [`Coordinator`] — routes a [`Task`](health_core::Task), dispatches specialists, assembles the answer
//! - [`Specialist`] / [`AgentDefinition`] — bounded think/act loop over a [`LanguageModel`](health_llm::LanguageModel)
//! - [`classify`] / [`RoutingDecision`] — pure keyword routing
//! - [`assembly`] / [`citations`] — one document, one gap-free citation numbering
//! - [`Language`] — fixed notices and headings follow the question's language
//! - [`AuditSink`] / [`RequestContext`] — request-scoped audit artifacts and cancellation
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use health_agents::{Coordinator, CoordinatorSettings, FsAuditSink, RequestContext};
//! use health_core::Task;
//!
//! let coordinator = Coordinator::new(model, &registry, CoordinatorSettings::default())?;
//! let ctx = RequestContext::new(Arc::new(FsAuditSink::new("data/audit")));
//!
//! let response = coordinator.handle(&Task::new("What are 3 tips to improve sleep?"), &ctx).await?;
//! println!("{}", response.content);
//! ```
//!
//! # Request Flow
//!
//! 1. Classify the task and pick a [`RoutingDecision`]
//! 2. Write `question.txt`
//! 3. Run the chosen specialists, in parallel or doctor-then-coach
//! 4. Apply the doctor safety guards, assemble, validate
//! 5. Optionally let the coordinator model rewrite the draft
//! 6. Write `final_response.md`

pub mod assembly;
pub mod audit;
pub mod citations;
mod coordinator;
pub mod language;
pub mod policy;
pub mod prompts;
mod routing;
mod specialist;

pub use audit::{AuditRecord, AuditSink, FsAuditSink, MemoryAuditSink, RequestContext, FINAL_ARTIFACT, QUESTION_ARTIFACT};
pub use language::Language;
pub use coordinator::{Coordinator, CoordinatorEvent, CoordinatorResponse, CoordinatorSettings, SPECIALIST_TOOLS};
pub use routing::{classify, Classification, Domain, RoutingDecision};
pub use specialist::{AgentDefinition, PriorFindings, Specialist, SpecialistReport, SpecialistRole, BRIEFING_HISTORY};
