//! Stackflow cloud orchestration
//!
//! This crate drives a [`ControlPlane`] through a stack: creating resources
//! in dependency order, and deleting them in reverse.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 stackflow CLI                   │
//! │            (stackflow / stackflow -d)           │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                stackflow-cloud                  │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │              Orchestrator                │   │
//! │  │  plan / create / discover / delete       │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  trait ControlPlane { create, describe,  │   │
//! │  │                       delete, ... }      │   │
//! │  └──────────────────────────────────────────┘   │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │  in-memory    │ │      aws      │
//! │  (dry run)    │ │ control plane │
//! └───────────────┘ └───────────────┘
//! ```

pub mod action;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod provider;
pub mod state;
pub mod wait;

// Re-exports
pub use action::{Action, ActionResult, ActionType, ApplyReport, Mode, Outcome, Plan, PlanSummary};
pub use error::{CloudError, Result};
pub use memory::InMemoryControlPlane;
pub use orchestrator::{ApplyError, ApplyEvent, Orchestrator};
pub use provider::{AuthStatus, ControlPlane, ResolvedResource};
pub use state::{ResourceState, ResourceStatus, StackState};
pub use wait::{WaitConfig, retry_while_not_ready, wait_until};
