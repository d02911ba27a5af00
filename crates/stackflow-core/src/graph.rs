//! Dependency graph over resource descriptors
//!
//! Creation visits resources in topological order (dependencies first),
//! deletion in the reverse order. Ties are broken by declaration order so
//! the same stack file always produces the same sequence of remote calls.

use crate::error::{Result, StackError};
use crate::model::ResourceSpec;
use std::collections::{BTreeSet, HashMap};

/// Validated dependency graph borrowing the stack's resources
#[derive(Debug)]
pub struct DependencyGraph<'a> {
    resources: &'a [ResourceSpec],
    /// edges[i] = indices of resources that i depends on
    edges: Vec<Vec<usize>>,
}

impl<'a> DependencyGraph<'a> {
    /// Build the graph, rejecting duplicate names, unknown dependencies,
    /// self-dependencies and references to attributes the kind never
    /// publishes. Cycles are detected by [`creation_order`](Self::creation_order).
    pub fn new(resources: &'a [ResourceSpec]) -> Result<Self> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(resources.len());
        for (i, r) in resources.iter().enumerate() {
            if r.name.is_empty() {
                return Err(StackError::InvalidConfig(
                    "resource name must not be empty".to_string(),
                ));
            }
            if index.insert(r.name.as_str(), i).is_some() {
                return Err(StackError::DuplicateResource(r.name.clone()));
            }
        }

        let mut edges = Vec::with_capacity(resources.len());
        for r in resources {
            let mut deps = Vec::with_capacity(r.depends_on.len());
            for dep in &r.depends_on {
                if dep == &r.name {
                    return Err(StackError::CircularDependency(format!(
                        "{} -> {}",
                        r.name, r.name
                    )));
                }
                let &j = index
                    .get(dep.as_str())
                    .ok_or_else(|| StackError::UnknownDependency {
                        resource: r.name.clone(),
                        dependency: dep.clone(),
                    })?;
                if !deps.contains(&j) {
                    deps.push(j);
                }
            }

            for reference in r.references() {
                let Some(&j) = index.get(reference.resource.as_str()) else {
                    return Err(StackError::UnknownDependency {
                        resource: r.name.clone(),
                        dependency: reference.resource.clone(),
                    });
                };
                let target = &resources[j];
                if !target.kind.attributes().contains(&reference.attribute.as_str()) {
                    return Err(StackError::InvalidConfig(format!(
                        "resource '{}' references '{}', but a {} only exposes: {}",
                        r.name,
                        reference,
                        target.kind,
                        target.kind.attributes().join(", ")
                    )));
                }
                if j == index[r.name.as_str()] {
                    return Err(StackError::CircularDependency(format!(
                        "{} -> {}",
                        r.name, r.name
                    )));
                }
                if !deps.contains(&j) {
                    deps.push(j);
                }
            }
            edges.push(deps);
        }

        Ok(Self { resources, edges })
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Direct dependencies of the named resource
    pub fn dependencies_of(&self, name: &str) -> Vec<&'a ResourceSpec> {
        self.position(name)
            .map(|i| self.edges[i].iter().map(|&j| &self.resources[j]).collect())
            .unwrap_or_default()
    }

    /// Resources that directly depend on the named resource
    pub fn dependents_of(&self, name: &str) -> Vec<&'a ResourceSpec> {
        let Some(target) = self.position(name) else {
            return Vec::new();
        };
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, deps)| deps.contains(&target))
            .map(|(i, _)| &self.resources[i])
            .collect()
    }

    /// Topological order: every resource appears after all of its
    /// dependencies. Fails with the cycle path if none exists.
    pub fn creation_order(&self) -> Result<Vec<&'a ResourceSpec>> {
        let n = self.resources.len();
        let mut remaining_deps: Vec<usize> = self.edges.iter().map(|d| d.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, deps) in self.edges.iter().enumerate() {
            for &j in deps {
                dependents[j].push(i);
            }
        }

        // Smallest declaration index first
        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| remaining_deps[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &k in &dependents[i] {
                remaining_deps[k] -= 1;
                if remaining_deps[k] == 0 {
                    ready.insert(k);
                }
            }
        }

        if order.len() != n {
            let stuck: Vec<usize> = (0..n).filter(|&i| remaining_deps[i] > 0).collect();
            return Err(StackError::CircularDependency(self.describe_cycle(&stuck)));
        }

        Ok(order.into_iter().map(|i| &self.resources[i]).collect())
    }

    /// Reverse topological order: dependents before their dependencies
    pub fn deletion_order(&self) -> Result<Vec<&'a ResourceSpec>> {
        let mut order = self.creation_order()?;
        order.reverse();
        Ok(order)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.name == name)
    }

    /// Walk dependency edges from a node left over by Kahn's algorithm until
    /// a node repeats; that suffix is a cycle.
    fn describe_cycle(&self, stuck: &[usize]) -> String {
        let Some(&start) = stuck.first() else {
            return String::from("(unknown)");
        };

        let mut path = vec![start];
        let mut current = start;
        loop {
            let Some(&next) = self.edges[current].iter().find(|j| stuck.contains(j)) else {
                break;
            };
            if let Some(pos) = path.iter().position(|&p| p == next) {
                let mut cycle: Vec<&str> = path[pos..]
                    .iter()
                    .map(|&i| self.resources[i].name.as_str())
                    .collect();
                cycle.push(self.resources[next].name.as_str());
                return cycle.join(" -> ");
            }
            path.push(next);
            current = next;
        }

        stuck
            .iter()
            .map(|&i| self.resources[i].name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
