//! Stack orchestration
//!
//! Drives a [`ControlPlane`] through a stack in dependency order. Create
//! walks the graph forwards; delete first rediscovers what exists, then
//! walks it backwards. Either run stops at the first failure and leaves
//! whatever was already done in place.

use crate::action::{Action, ActionType, ApplyReport, Mode, Outcome, Plan};
use crate::error::CloudError;
use crate::provider::{ControlPlane, ResolvedResource};
use crate::state::StackState;
use stackflow_core::{ResourceKind, ResourceSpec, StackError, StackTemplate};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Progress notification for one resource
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyEvent {
    /// A create or delete call is about to be made
    Started {
        resource: String,
        kind: ResourceKind,
        action: ActionType,
    },
    Created {
        resource: String,
        kind: ResourceKind,
        id: String,
    },
    Deleted {
        resource: String,
        kind: ResourceKind,
        id: String,
    },
    /// Nothing to do for this resource
    Skipped {
        resource: String,
        kind: ResourceKind,
        reason: String,
    },
    Failed {
        resource: String,
        kind: ResourceKind,
        error: String,
    },
}

type Listener = Box<dyn Fn(&ApplyEvent) + Send + Sync>;

/// An aborted run
#[derive(Debug)]
pub struct ApplyError {
    pub mode: Mode,

    /// Resource being processed when the run stopped; `None` if the stack
    /// itself was rejected before any call
    pub resource: Option<String>,

    /// Resources created (or deleted) before the failure, in order
    pub completed: Vec<String>,

    /// Everything recorded up to the failure
    pub report: Box<ApplyReport>,

    pub source: CloudError,
}

impl ApplyError {
    fn invalid(mode: Mode, source: StackError) -> Self {
        Self {
            mode,
            resource: None,
            completed: Vec::new(),
            report: Box::new(ApplyReport::new(mode)),
            source: source.into(),
        }
    }
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource {
            Some(resource) => write!(f, "{} failed at '{}': {}", self.mode, resource, self.source),
            None => write!(f, "{} rejected: {}", self.mode, self.source),
        }
    }
}

impl std::error::Error for ApplyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Runs stacks against a control plane
pub struct Orchestrator {
    control_plane: Arc<dyn ControlPlane>,
    listener: Option<Listener>,
}

impl Orchestrator {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self {
            control_plane,
            listener: None,
        }
    }

    /// Receive an [`ApplyEvent`] for every step
    pub fn with_listener(mut self, listener: impl Fn(&ApplyEvent) + Send + Sync + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn control_plane(&self) -> &dyn ControlPlane {
        self.control_plane.as_ref()
    }

    fn emit(&self, event: ApplyEvent) {
        if let Some(listener) = &self.listener {
            listener(&event);
        }
    }

    /// Ordered actions for `mode`, without calling the control plane
    pub fn plan(template: &StackTemplate, mode: Mode) -> stackflow_core::Result<Plan> {
        let graph = template.graph()?;
        let actions = match mode {
            Mode::Create => graph
                .creation_order()?
                .into_iter()
                .map(|spec| Action {
                    resource: spec.name.clone(),
                    kind: spec.kind,
                    action_type: ActionType::Create,
                    description: format!("create {} '{}'", spec.kind, spec.name),
                    depends_on: spec.depends_on.clone(),
                })
                .collect(),
            Mode::Delete => graph
                .deletion_order()?
                .into_iter()
                .map(|spec| Action {
                    resource: spec.name.clone(),
                    kind: spec.kind,
                    action_type: ActionType::Delete,
                    description: format!("delete {} '{}' if present", spec.kind, spec.name),
                    depends_on: graph
                        .dependents_of(&spec.name)
                        .into_iter()
                        .map(|d| d.name.clone())
                        .collect(),
                })
                .collect(),
        };
        Ok(Plan::new(mode, actions))
    }

    /// Create every resource in dependency order.
    ///
    /// The first failure stops the run; resources created before it are
    /// left in place and listed in the error.
    pub async fn create(&self, template: &StackTemplate) -> Result<ApplyReport, ApplyError> {
        let start = Instant::now();
        let mode = Mode::Create;
        let graph = template.graph().map_err(|e| ApplyError::invalid(mode, e))?;
        let order = graph.creation_order().map_err(|e| ApplyError::invalid(mode, e))?;

        info!(
            stack = %template.name,
            control_plane = self.control_plane.name(),
            resources = order.len(),
            "Creating stack"
        );

        let mut report = ApplyReport::new(mode);
        let mut completed = Vec::new();

        for spec in order {
            self.emit(ApplyEvent::Started {
                resource: spec.name.clone(),
                kind: spec.kind,
                action: ActionType::Create,
            });
            info!(resource = %spec.name, kind = %spec.kind, "Creating resource");

            let result = match ResolvedResource::resolve(spec, &report.state) {
                Ok(resolved) => self.control_plane.create(&resolved).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(state) => {
                    info!(resource = %spec.name, id = %state.id, "Created resource");
                    self.emit(ApplyEvent::Created {
                        resource: spec.name.clone(),
                        kind: spec.kind,
                        id: state.id.clone(),
                    });
                    report.record(
                        &spec.name,
                        spec.kind,
                        ActionType::Create,
                        Outcome::Succeeded,
                        format!("created {}", state.id),
                    );
                    report.state.insert(&spec.name, state);
                    completed.push(spec.name.clone());
                }
                Err(e) => {
                    return Err(self.abort(spec, ActionType::Create, e, report, completed, start));
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(stack = %template.name, duration_ms = report.duration_ms, "Stack created");
        Ok(report)
    }

    /// Describe every resource in dependency order.
    ///
    /// A resource is looked up by its identity properties only. When one of
    /// those refers to something that is gone, the resource is treated as
    /// absent too.
    pub async fn discover(&self, template: &StackTemplate) -> Result<StackState, ApplyError> {
        let mode = Mode::Delete;
        let graph = template.graph().map_err(|e| ApplyError::invalid(mode, e))?;
        let order = graph.creation_order().map_err(|e| ApplyError::invalid(mode, e))?;

        let mut state = StackState::new();
        for spec in order {
            match self.describe_one(spec, &state).await {
                Ok(Some((_, found))) => {
                    debug!(resource = %spec.name, id = %found.id, "Found resource");
                    state.insert(&spec.name, found);
                }
                Ok(None) => debug!(resource = %spec.name, "Resource absent"),
                Err(e) => {
                    let mut report = ApplyReport::new(mode);
                    report.state = state;
                    return Err(ApplyError {
                        mode,
                        resource: Some(spec.name.clone()),
                        completed: Vec::new(),
                        report: Box::new(report),
                        source: e,
                    });
                }
            }
        }
        Ok(state)
    }

    async fn describe_one(
        &self,
        spec: &ResourceSpec,
        state: &StackState,
    ) -> Result<Option<(ResolvedResource, crate::state::ResourceState)>, CloudError> {
        let resolved = match ResolvedResource::resolve_identity(spec, state) {
            Ok(resolved) => resolved,
            Err(CloudError::Stack(StackError::UnresolvedReference { reference, .. })) => {
                debug!(resource = %spec.name, %reference, "Parent resource absent");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        Ok(self
            .control_plane
            .describe(&resolved)
            .await?
            .map(|found| (resolved, found)))
    }

    /// Delete every existing resource in reverse dependency order.
    ///
    /// Resources that are already gone are skipped, so deleting a stack
    /// that was never created succeeds without doing anything.
    pub async fn delete(&self, template: &StackTemplate) -> Result<ApplyReport, ApplyError> {
        let start = Instant::now();
        let mode = Mode::Delete;
        let graph = template.graph().map_err(|e| ApplyError::invalid(mode, e))?;
        let creation = graph.creation_order().map_err(|e| ApplyError::invalid(mode, e))?;

        info!(
            stack = %template.name,
            control_plane = self.control_plane.name(),
            resources = creation.len(),
            "Deleting stack"
        );

        // Discovery: rebuild state and the resolved form of each present resource
        let mut report = ApplyReport::new(mode);
        let mut resolved: HashMap<&str, ResolvedResource> = HashMap::new();
        for spec in &creation {
            match self.describe_one(spec, &report.state).await {
                Ok(Some((resource, found))) => {
                    report.state.insert(&spec.name, found);
                    resolved.insert(spec.name.as_str(), resource);
                }
                Ok(None) => {}
                Err(e) => {
                    return Err(self.abort(spec, ActionType::Delete, e, report, Vec::new(), start));
                }
            }
        }

        // Teardown
        let mut completed = Vec::new();
        for spec in creation.iter().rev() {
            let (Some(resource), Some(state)) =
                (resolved.get(spec.name.as_str()), report.state.get(&spec.name).cloned())
            else {
                self.skip(&mut report, spec, "not found");
                continue;
            };

            self.emit(ApplyEvent::Started {
                resource: spec.name.clone(),
                kind: spec.kind,
                action: ActionType::Delete,
            });
            info!(resource = %spec.name, id = %state.id, "Deleting resource");

            match self.control_plane.delete(resource, &state).await {
                Ok(()) => {
                    self.emit(ApplyEvent::Deleted {
                        resource: spec.name.clone(),
                        kind: spec.kind,
                        id: state.id.clone(),
                    });
                    report.record(
                        &spec.name,
                        spec.kind,
                        ActionType::Delete,
                        Outcome::Succeeded,
                        format!("deleted {}", state.id),
                    );
                    report.state.remove(&spec.name);
                    completed.push(spec.name.clone());
                }
                Err(e) if e.is_not_found() => {
                    warn!(resource = %spec.name, error = %e, "Resource disappeared before delete");
                    report.state.remove(&spec.name);
                    self.skip(&mut report, spec, "already deleted");
                }
                Err(e) => {
                    return Err(self.abort(spec, ActionType::Delete, e, report, completed, start));
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(stack = %template.name, duration_ms = report.duration_ms, "Stack deleted");
        Ok(report)
    }

    fn skip(&self, report: &mut ApplyReport, spec: &ResourceSpec, reason: &str) {
        debug!(resource = %spec.name, reason, "Skipping resource");
        self.emit(ApplyEvent::Skipped {
            resource: spec.name.clone(),
            kind: spec.kind,
            reason: reason.to_string(),
        });
        report.record(
            &spec.name,
            spec.kind,
            ActionType::NoOp,
            Outcome::Skipped,
            reason,
        );
    }

    fn abort(
        &self,
        spec: &ResourceSpec,
        action: ActionType,
        source: CloudError,
        mut report: ApplyReport,
        completed: Vec<String>,
        start: Instant,
    ) -> ApplyError {
        error!(resource = %spec.name, kind = %spec.kind, error = %source, "Aborting run");
        self.emit(ApplyEvent::Failed {
            resource: spec.name.clone(),
            kind: spec.kind,
            error: source.to_string(),
        });
        report.record(
            &spec.name,
            spec.kind,
            action,
            Outcome::Failed,
            source.to_string(),
        );
        report.duration_ms = start.elapsed().as_millis() as u64;
        ApplyError {
            mode: report.mode,
            resource: Some(spec.name.clone()),
            completed,
            report: Box::new(report),
            source,
        }
    }
}
