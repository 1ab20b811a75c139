//! Dependency graph for step execution ordering.
//!
//! Built from a workflow's declared `depends_on` edges. Produces a
//! deterministic execution plan: among all steps whose dependencies are
//! satisfied, the one declared earliest in the workflow runs first, so two
//! runs over an unchanged workflow always pick the same order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::error::{LabelflowError, Result};
use crate::workflow::schema::StepSpec;

/// Dependency relationships between the steps of one workflow.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Step names in declaration order.
    order: Vec<String>,
    /// Map of step name to its declaration index.
    index: HashMap<String, usize>,
    /// Map of step name to its direct dependencies.
    dependencies: HashMap<String, HashSet<String>>,
    /// Map of step name to steps that depend on it.
    dependents: HashMap<String, HashSet<String>>,
}

impl DependencyGraph {
    /// Build a graph from workflow steps.
    ///
    /// Fails if a step name is duplicated or a dependency references a
    /// step that does not exist in the workflow.
    pub fn from_steps(steps: &[StepSpec]) -> Result<Self> {
        let mut order = Vec::with_capacity(steps.len());
        let mut index = HashMap::with_capacity(steps.len());

        for step in steps {
            if index.insert(step.name.clone(), order.len()).is_some() {
                return Err(LabelflowError::WorkflowValidation {
                    message: format!("duplicate step name '{}'", step.name),
                });
            }
            order.push(step.name.clone());
        }

        let mut dependencies: HashMap<String, HashSet<String>> = HashMap::new();
        let mut dependents: HashMap<String, HashSet<String>> = HashMap::new();
        for name in &order {
            dependencies.insert(name.clone(), HashSet::new());
            dependents.insert(name.clone(), HashSet::new());
        }

        for step in steps {
            for dep in &step.depends_on {
                if !index.contains_key(dep) {
                    return Err(LabelflowError::UnknownDependency {
                        step: step.name.clone(),
                        dependency: dep.clone(),
                    });
                }
                dependencies.get_mut(&step.name).unwrap().insert(dep.clone());
                dependents.get_mut(dep).unwrap().insert(step.name.clone());
            }
        }

        Ok(Self {
            order,
            index,
            dependencies,
            dependents,
        })
    }

    /// Get the direct dependencies of a step.
    pub fn dependencies_of(&self, step: &str) -> Option<&HashSet<String>> {
        self.dependencies.get(step)
    }

    /// Get steps that directly depend on the given step.
    pub fn dependents_of(&self, step: &str) -> Option<&HashSet<String>> {
        self.dependents.get(step)
    }

    /// Check if a step exists in the graph.
    pub fn contains(&self, step: &str) -> bool {
        self.index.contains_key(step)
    }

    /// Get the number of steps in the graph.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns the execution plan: steps ordered so every step appears
    /// after all of its dependencies.
    ///
    /// Among steps whose dependencies are all satisfied, the one with the
    /// lowest declaration index is emitted first. Returns an error naming
    /// the offending steps if a cycle exists.
    pub fn execution_order(&self) -> Result<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> = self
            .order
            .iter()
            .map(|s| (s.as_str(), self.dependencies[s].len()))
            .collect();

        // Min-heap on declaration index keeps the tie-break deterministic.
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(step, _)| Reverse(self.index[*step]))
            .collect();

        let mut plan = Vec::with_capacity(self.order.len());

        while let Some(Reverse(idx)) = ready.pop() {
            let step = &self.order[idx];
            plan.push(step.clone());

            for dependent in &self.dependents[step] {
                let degree = in_degree.get_mut(dependent.as_str()).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(self.index[dependent]));
                }
            }
        }

        if plan.len() != self.order.len() {
            let cycle = match self.find_cycle() {
                Some(path) => path.join(" -> "),
                None => {
                    let mut remaining: Vec<_> = in_degree
                        .iter()
                        .filter(|(_, &d)| d > 0)
                        .map(|(s, _)| s.to_string())
                        .collect();
                    remaining.sort_by_key(|s| self.index[s]);
                    remaining.join(", ")
                }
            };
            return Err(LabelflowError::CircularDependency { cycle });
        }

        Ok(plan)
    }

    /// Find a cycle in the graph, returning the path if one exists.
    ///
    /// Steps are visited in declaration order so the reported path is
    /// stable across runs.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Unvisited,
            Visiting,
            Visited,
        }

        let mut state: HashMap<&str, State> = self
            .order
            .iter()
            .map(|s| (s.as_str(), State::Unvisited))
            .collect();

        let mut path: Vec<String> = Vec::new();

        fn dfs<'a>(
            node: &'a str,
            graph: &'a DependencyGraph,
            state: &mut HashMap<&'a str, State>,
            path: &mut Vec<String>,
        ) -> Option<Vec<String>> {
            state.insert(node, State::Visiting);
            path.push(node.to_string());

            if let Some(deps) = graph.dependencies.get(node) {
                let mut deps: Vec<_> = deps.iter().collect();
                deps.sort_by_key(|d| graph.index[d.as_str()]);

                for dep in deps {
                    match state.get(dep.as_str()) {
                        Some(State::Visiting) => {
                            let cycle_start = path.iter().position(|s| s == dep).unwrap();
                            let mut cycle: Vec<String> = path[cycle_start..].to_vec();
                            cycle.push(dep.clone());
                            return Some(cycle);
                        }
                        Some(State::Unvisited) | None => {
                            if let Some(cycle) = dfs(dep, graph, state, path) {
                                return Some(cycle);
                            }
                        }
                        Some(State::Visited) => {}
                    }
                }
            }

            path.pop();
            state.insert(node, State::Visited);
            None
        }

        for step in &self.order {
            if state.get(step.as_str()) == Some(&State::Unvisited) {
                if let Some(cycle) = dfs(step, self, &mut state, &mut path) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    /// Get all transitive dependents of a step.
    ///
    /// Returns steps that depend on the given step, directly or indirectly.
    /// Used for skip propagation when a step fails.
    pub fn transitive_dependents(&self, step: &str) -> HashSet<String> {
        let mut result = HashSet::new();
        let mut to_visit = vec![step.to_string()];

        while let Some(current) = to_visit.pop() {
            if let Some(dependents) = self.dependents.get(&current) {
                for dep in dependents {
                    if result.insert(dep.clone()) {
                        to_visit.push(dep.clone());
                    }
                }
            }
        }

        result
    }
}
