//! Dependency planning for resource descriptors.
//!
//! The planner turns an unordered set of [`ResourceDescriptor`]s into an
//! [`ExecutionPlan`]: a sequence in which every descriptor appears strictly
//! after all of its prerequisites. Planning is pure. It never touches the
//! cloud, so an unexecutable descriptor set is rejected before anything is
//! created.
//!
//! Ordering uses Kahn's algorithm. When several descriptors are ready at the
//! same time the one that came first in the input wins, so identical input
//! always yields an identical plan.
//!
//! # Example
//!
//! ```rust
//! use gcprov::planner::plan;
//! use gcprov::resource::{ResourceDescriptor, ResourceId};
//!
//! let bucket = ResourceDescriptor::bucket("p1-pdf-input")
//!     .with_dependency(ResourceId::project("p1"));
//! let project = ResourceDescriptor::project("p1");
//!
//! let plan = plan(vec![bucket, project]).unwrap();
//! let order: Vec<String> = plan.iter().map(|d| d.id().to_string()).collect();
//! assert_eq!(order, vec!["project/p1", "bucket/p1-pdf-input"]);
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::resource::{ResourceDescriptor, ResourceId, ResourceKind};

// ============================================================================
// Error Types
// ============================================================================

/// Reasons a descriptor set cannot be turned into a plan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanningError {
    /// Two descriptors share the same identity.
    #[error("Duplicate resource identity: '{0}'")]
    DuplicateIdentity(ResourceId),

    /// A dependency names a resource that is not part of the input.
    #[error("Resource '{resource}' depends on '{missing}', which is not declared")]
    UnresolvedDependency {
        /// The descriptor declaring the dependency
        resource: ResourceId,
        /// The identity that could not be found
        missing: ResourceId,
    },

    /// The dependency graph contains a cycle.
    #[error("Circular dependency detected: {}", format_cycle(.0))]
    CyclicDependency(Vec<ResourceId>),
}

/// Format a cycle path for display
fn format_cycle(cycle: &[ResourceId]) -> String {
    if cycle.is_empty() {
        return "empty cycle".to_string();
    }
    let mut parts: Vec<String> = cycle.iter().map(ToString::to_string).collect();
    parts.push(cycle[0].to_string());
    parts.join(" -> ")
}

// ============================================================================
// Execution Plan
// ============================================================================

/// Dependency-respecting order of descriptors, ready for execution.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ExecutionPlan {
    steps: Vec<ResourceDescriptor>,
}

impl ExecutionPlan {
    /// Number of steps in the plan.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Iterate over the descriptors in execution order.
    pub fn iter(&self) -> std::slice::Iter<'_, ResourceDescriptor> {
        self.steps.iter()
    }

    /// Descriptors in execution order.
    pub fn steps(&self) -> &[ResourceDescriptor] {
        &self.steps
    }

    /// Position of a descriptor in the plan.
    pub fn position(&self, id: &ResourceId) -> Option<usize> {
        self.steps.iter().position(|d| d.id() == id)
    }

    /// Numbered, human-readable listing.
    pub fn to_list(&self) -> String {
        let mut output = String::new();
        for (i, step) in self.steps.iter().enumerate() {
            output.push_str(&format!("{:>3}. {}", i + 1, step.id()));
            if !step.depends_on().is_empty() {
                let deps: Vec<String> = step.depends_on().iter().map(ToString::to_string).collect();
                output.push_str(&format!("  (after {})", deps.join(", ")));
            }
            output.push('\n');
        }
        output
    }

    /// Generate DOT format output for Graphviz visualization
    pub fn to_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph ExecutionPlan {\n");
        output.push_str("    rankdir=TB;\n");
        output.push_str("    node [shape=box, style=rounded];\n\n");

        for step in &self.steps {
            let (shape, color) = match step.kind() {
                ResourceKind::Project => ("house", "#607D8B"),
                ResourceKind::Service => ("box", "#4CAF50"),
                ResourceKind::Bucket => ("folder", "#795548"),
            };
            output.push_str(&format!(
                "    \"{}\" [label=\"{}\\n({})\", shape={}, fillcolor=\"{}\", style=\"filled,rounded\"];\n",
                step.id(),
                step.name(),
                step.kind(),
                shape,
                color
            ));
        }

        output.push('\n');
        for step in &self.steps {
            for dep in step.depends_on() {
                output.push_str(&format!("    \"{}\" -> \"{}\";\n", step.id(), dep));
            }
        }

        output.push_str("}\n");
        output
    }

    /// Generate Mermaid format output for documentation
    pub fn to_mermaid(&self) -> String {
        let safe = |id: &ResourceId| {
            id.to_string()
                .chars()
                .map(|c| if c.is_alphanumeric() { c } else { '_' })
                .collect::<String>()
        };

        let mut output = String::new();
        output.push_str("graph TD\n");

        for step in &self.steps {
            let (open, close) = match step.kind() {
                ResourceKind::Project => ("{{", "}}"),
                ResourceKind::Service => ("[", "]"),
                ResourceKind::Bucket => ("[(", ")]"),
            };
            output.push_str(&format!(
                "    {}{}\"{}\"{};\n",
                safe(step.id()),
                open,
                step.id(),
                close
            ));
        }

        output.push('\n');
        for step in &self.steps {
            for dep in step.depends_on() {
                output.push_str(&format!("    {} --> {};\n", safe(dep), safe(step.id())));
            }
        }

        output
    }
}

impl<'a> IntoIterator for &'a ExecutionPlan {
    type Item = &'a ResourceDescriptor;
    type IntoIter = std::slice::Iter<'a, ResourceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_list())
    }
}

// ============================================================================
// Planning
// ============================================================================

/// Order descriptors so that every prerequisite comes first.
pub fn plan(
    descriptors: impl IntoIterator<Item = ResourceDescriptor>,
) -> Result<ExecutionPlan, PlanningError> {
    let descriptors: Vec<ResourceDescriptor> = descriptors.into_iter().collect();

    // identity -> input index
    let mut index: HashMap<&ResourceId, usize> = HashMap::with_capacity(descriptors.len());
    for (i, d) in descriptors.iter().enumerate() {
        if index.insert(d.id(), i).is_some() {
            return Err(PlanningError::DuplicateIdentity(d.id().clone()));
        }
    }

    let mut in_degree = vec![0usize; descriptors.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); descriptors.len()];
    for (i, d) in descriptors.iter().enumerate() {
        for dep in d.depends_on() {
            let &j = index
                .get(dep)
                .ok_or_else(|| PlanningError::UnresolvedDependency {
                    resource: d.id().clone(),
                    missing: dep.clone(),
                })?;
            in_degree[i] += 1;
            dependents[j].push(i);
        }
    }

    let mut ready: BTreeSet<usize> = (0..descriptors.len())
        .filter(|&i| in_degree[i] == 0)
        .collect();
    let mut order = Vec::with_capacity(descriptors.len());

    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &k in &dependents[i] {
            in_degree[k] -= 1;
            if in_degree[k] == 0 {
                ready.insert(k);
            }
        }
    }

    if order.len() < descriptors.len() {
        let placed: HashSet<usize> = order.iter().copied().collect();
        let cycle = find_cycle(&descriptors, &index, &placed);
        return Err(PlanningError::CyclicDependency(cycle));
    }

    debug!(steps = order.len(), "Planned execution order");

    let mut slots: Vec<Option<ResourceDescriptor>> = descriptors.into_iter().map(Some).collect();
    let steps = order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect();

    Ok(ExecutionPlan { steps })
}

/// Walk dependencies among the unplaced descriptors until a node repeats.
///
/// Every unplaced descriptor has at least one unplaced prerequisite, so the
/// walk is guaranteed to close a cycle.
fn find_cycle(
    descriptors: &[ResourceDescriptor],
    index: &HashMap<&ResourceId, usize>,
    placed: &HashSet<usize>,
) -> Vec<ResourceId> {
    let Some(start) = (0..descriptors.len()).find(|i| !placed.contains(i)) else {
        return Vec::new();
    };

    let mut path: Vec<usize> = Vec::new();
    let mut seen_at: HashMap<usize, usize> = HashMap::new();
    let mut current = start;

    loop {
        if let Some(&pos) = seen_at.get(&current) {
            return path[pos..]
                .iter()
                .map(|&i| descriptors[i].id().clone())
                .collect();
        }
        seen_at.insert(current, path.len());
        path.push(current);

        let next = descriptors[current]
            .depends_on()
            .iter()
            .filter_map(|dep| index.get(dep).copied())
            .find(|j| !placed.contains(j));

        match next {
            Some(j) => current = j,
            None => return path.iter().map(|&i| descriptors[i].id().clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(plan: &ExecutionPlan) -> Vec<String> {
        plan.iter().map(|d| d.id().to_string()).collect()
    }

    #[test]
    fn test_plan_respects_dependencies() {
        let plan = plan(vec![
            ResourceDescriptor::bucket("b").with_dependency(ResourceId::service("s")),
            ResourceDescriptor::service("s").with_dependency(ResourceId::project("p")),
            ResourceDescriptor::project("p"),
        ])
        .unwrap();

        assert_eq!(ids(&plan), vec!["project/p", "service/s", "bucket/b"]);
        assert_eq!(plan.position(&ResourceId::bucket("b")), Some(2));
    }

    #[test]
    fn test_plan_tie_break_is_input_order() {
        let p = ResourceId::project("p");
        let plan = plan(vec![
            ResourceDescriptor::project("p"),
            ResourceDescriptor::bucket("z").with_dependency(p.clone()),
            ResourceDescriptor::service("a").with_dependency(p.clone()),
            ResourceDescriptor::bucket("m").with_dependency(p),
        ])
        .unwrap();

        assert_eq!(
            ids(&plan),
            vec!["project/p", "bucket/z", "service/a", "bucket/m"]
        );
    }

    #[test]
    fn test_same_name_different_kind_is_distinct() {
        let plan = plan(vec![
            ResourceDescriptor::project("x"),
            ResourceDescriptor::bucket("x"),
        ])
        .unwrap();
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_duplicate_identity() {
        let err = plan(vec![
            ResourceDescriptor::bucket("b"),
            ResourceDescriptor::bucket("b"),
        ])
        .unwrap_err();
        assert_eq!(err, PlanningError::DuplicateIdentity(ResourceId::bucket("b")));
    }

    #[test]
    fn test_unresolved_dependency() {
        let err = plan(vec![
            ResourceDescriptor::bucket("b").with_dependency(ResourceId::project("missing"))
        ])
        .unwrap_err();
        assert_eq!(
            err,
            PlanningError::UnresolvedDependency {
                resource: ResourceId::bucket("b"),
                missing: ResourceId::project("missing"),
            }
        );
    }

    #[test]
    fn test_cycle_detected_with_path() {
        let err = plan(vec![
            ResourceDescriptor::project("root"),
            ResourceDescriptor::service("a").with_dependency(ResourceId::bucket("b")),
            ResourceDescriptor::bucket("b").with_dependency(ResourceId::service("a")),
        ])
        .unwrap_err();

        match err {
            PlanningError::CyclicDependency(cycle) => {
                assert_eq!(cycle.len(), 2);
                assert!(cycle.contains(&ResourceId::service("a")));
                assert!(cycle.contains(&ResourceId::bucket("b")));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let err = plan(vec![
            ResourceDescriptor::bucket("b").with_dependency(ResourceId::bucket("b"))
        ])
        .unwrap_err();
        assert_eq!(
            err,
            PlanningError::CyclicDependency(vec![ResourceId::bucket("b")])
        );
        assert_eq!(
            err.to_string(),
            "Circular dependency detected: bucket/b -> bucket/b"
        );
    }

    #[test]
    fn test_empty_plan() {
        let plan = plan(Vec::new()).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.to_list(), "");
    }

    #[test]
    fn test_renderers() {
        let plan = plan(vec![
            ResourceDescriptor::project("p1"),
            ResourceDescriptor::bucket("p1-in").with_dependency(ResourceId::project("p1")),
        ])
        .unwrap();

        let list = plan.to_list();
        assert!(list.contains("  1. project/p1"));
        assert!(list.contains("  2. bucket/p1-in  (after project/p1)"));

        let dot = plan.to_dot();
        assert!(dot.starts_with("digraph ExecutionPlan {"));
        assert!(dot.contains("\"bucket/p1-in\" -> \"project/p1\";"));

        let mermaid = plan.to_mermaid();
        assert!(mermaid.contains("project_p1 --> bucket_p1_in;"));
    }
}
