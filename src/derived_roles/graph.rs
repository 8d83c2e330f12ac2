//! Dependency graph for derived roles with Kahn's algorithm for topological sorting
//!
//! This module implements Kahn's algorithm to:
//! 1. Detect circular dependencies between derived roles
//! 2. Provide a topologically sorted evaluation order
//! 3. Ensure derived roles are evaluated after their dependencies

use super::types::DerivedRole;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Graph-related errors
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    /// Circular dependency detected in the role graph
    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    /// Role name is duplicated
    #[error("Duplicate role name: {0}")]
    DuplicateRole(String),

    /// Invalid role definition
    #[error("Invalid role: {0}")]
    InvalidRole(String),
}

/// Graph node representing a derived role and its dependencies
#[derive(Debug, Clone)]
struct GraphNode {
    /// The derived role name
    role: String,

    /// Dependencies (other derived roles this role depends on via parent roles)
    dependencies: Vec<String>,

    /// Number of incoming edges (for Kahn's algorithm)
    in_degree: usize,
}

impl GraphNode {
    fn new(role: String) -> Self {
        Self {
            role,
            dependencies: Vec::new(),
            in_degree: 0,
        }
    }

    fn add_dependency(&mut self, depends_on: String) {
        if !self.dependencies.contains(&depends_on) {
            self.dependencies.push(depends_on);
        }
    }
}

/// Dependency graph for derived roles
///
/// Uses Kahn's algorithm for topological sorting to determine the correct
/// evaluation order for derived roles. Also detects circular dependencies.
///
/// # Example
///
/// ```ignore
/// use authz_core::derived_roles::{DerivedRole, DependencyGraph};
///
/// let mut graph = DependencyGraph::new();
///
/// let role1 = DerivedRole::new("manager", vec!["employee".to_string()]);
/// let role2 = DerivedRole::new("senior_manager", vec!["manager".to_string()]);
///
/// graph.add_role(&role1)?;
/// graph.add_role(&role2)?;
///
/// let order = graph.resolve_order()?;
/// assert_eq!(order, vec!["manager", "senior_manager"]);
/// ```
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Map of role names to graph nodes
    nodes: HashMap<String, GraphNode>,

    /// Set of all derived role names for quick lookup
    derived_role_names: HashSet<String>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            derived_role_names: HashSet::new(),
        }
    }

    /// Add a derived role to the dependency graph
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The role name is duplicated
    /// - The role definition is invalid
    pub fn add_role(&mut self, role: &DerivedRole) -> Result<(), GraphError> {
        // Validate the role
        role.validate()
            .map_err(|e| GraphError::InvalidRole(e.to_string()))?;

        // Check for duplicate names
        if self.derived_role_names.contains(&role.name) {
            return Err(GraphError::DuplicateRole(role.name.clone()));
        }

        // Create node for this role
        let node = GraphNode::new(role.name.clone());
        self.nodes.insert(role.name.clone(), node);
        self.derived_role_names.insert(role.name.clone());

        Ok(())
    }

    /// Add a dependency edge between two roles
    ///
    /// Indicates that `from_role` depends on `to_role` (must be evaluated after)
    fn add_dependency_edge(&mut self, from_role: &str, to_role: &str) {
        if let Some(node) = self.nodes.get_mut(from_role) {
            node.add_dependency(to_role.to_string());
        }
    }

    /// Resolve the evaluation order using Kahn's algorithm
    ///
    /// Returns a topologically sorted list of role names, where dependencies
    /// are evaluated before roles that depend on them.
    ///
    /// # Errors
    ///
    /// Returns an error if a circular dependency is detected.
    ///
    /// # Algorithm
    ///
    /// Kahn's algorithm:
    /// 1. Calculate in-degree for all nodes
    /// 2. Add all nodes with in-degree 0 to queue
    /// 3. While queue is not empty:
    ///    - Dequeue a node
    ///    - Add it to sorted list
    ///    - For each node that depends on it:
    ///      - Decrease its in-degree
    ///      - If in-degree becomes 0, add to queue
    /// 4. If sorted list size < total nodes, there's a cycle
    pub fn resolve_order(&self) -> Result<Vec<String>, GraphError> {
        if self.nodes.is_empty() {
            return Ok(Vec::new());
        }

        // Build reverse edges (who depends on me) and calculate in-degrees
        let mut reverse_edges: HashMap<String, Vec<String>> = HashMap::new();
        let mut in_degree: HashMap<String, usize> = HashMap::new();

        // Initialize
        for name in self.nodes.keys() {
            reverse_edges.insert(name.clone(), Vec::new());
            in_degree.insert(name.clone(), 0);
        }

        // Build reverse edges and count in-degrees
        for (name, node) in &self.nodes {
            for dep in &node.dependencies {
                // name depends on dep, so dep -> name (reverse edge)
                if let Some(edges) = reverse_edges.get_mut(dep) {
                    edges.push(name.clone());
                }
                // Increment in-degree of name
                if let Some(degree) = in_degree.get_mut(name) {
                    *degree += 1;
                }
            }
        }

        // Find all nodes with in-degree 0 (no dependencies)
        let mut queue: VecDeque<String> = VecDeque::new();
        for (name, degree) in &in_degree {
            if *degree == 0 {
                queue.push_back(name.clone());
            }
        }

        // Kahn's algorithm
        let mut sorted = Vec::new();
        let mut visited_count = 0;

        while let Some(current) = queue.pop_front() {
            sorted.push(current.clone());
            visited_count += 1;

            // Reduce in-degree for all nodes that depend on current
            if let Some(dependents) = reverse_edges.get(&current) {
                for dependent in dependents {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent.clone());
                        }
                    }
                }
            }
        }

        // Check if all nodes were visited (no cycles)
        if visited_count != self.nodes.len() {
            // Find the cycle for better error message
            let cycles = self.find_cycles_dfs()?;
            if let Some(cycle) = cycles.first() {
                return Err(GraphError::CircularDependency(cycle.join(" -> ")));
            }
            return Err(GraphError::CircularDependency(
                "Unknown cycle detected".to_string(),
            ));
        }

        Ok(sorted)
    }

    /// Detect all cycles in the dependency graph using DFS
    ///
    /// Returns all cycles found in the graph.
    ///
    /// # Algorithm
    ///
    /// Uses depth-first search with three states:
    /// - White (0): Unvisited
    /// - Gray (1): Currently being visited (in DFS stack)
    /// - Black (2): Fully visited
    ///
    /// A cycle exists if we encounter a gray node during DFS.
    pub fn detect_cycles(&self) -> Result<Vec<Vec<String>>, GraphError> {
        self.find_cycles_dfs()
    }

    /// Internal DFS-based cycle detection
    fn find_cycles_dfs(&self) -> Result<Vec<Vec<String>>, GraphError> {
        // State: 0 = unvisited, 1 = visiting (gray), 2 = visited (black)
        let mut state: HashMap<String, u8> = HashMap::new();
        let mut cycles: Vec<Vec<String>> = Vec::new();

        for name in self.nodes.keys() {
            state.insert(name.clone(), 0);
        }

        // DFS from each unvisited node
        for start_node in self.nodes.keys() {
            if state[start_node] == 0 {
                let mut path = Vec::new();
                self.dfs_cycle_detect(start_node, &mut state, &mut path, &mut cycles)?;
            }
        }

        Ok(cycles)
    }

    /// Recursive DFS for cycle detection
    fn dfs_cycle_detect(
        &self,
        node: &str,
        state: &mut HashMap<String, u8>,
        path: &mut Vec<String>,
        cycles: &mut Vec<Vec<String>>,
    ) -> Result<(), GraphError> {
        // Check current state
        match state.get(node) {
            Some(1) => {
                // Found a cycle - node is currently being visited (gray)
                // Find where the cycle starts in the path
                if let Some(cycle_start) = path.iter().position(|n| n == node) {
                    let cycle: Vec<String> = path[cycle_start..]
                        .iter()
                        .chain(std::iter::once(&node.to_string()))
                        .cloned()
                        .collect();
                    cycles.push(cycle.clone());

                    // Return error immediately for the first cycle found
                    return Err(GraphError::CircularDependency(cycle.join(" -> ")));
                }
                return Ok(());
            }
            Some(2) => {
                // Already fully processed (black)
                return Ok(());
            }
            _ => {}
        }

        // Mark as visiting (gray)
        state.insert(node.to_string(), 1);
        path.push(node.to_string());

        // Visit dependencies
        if let Some(graph_node) = self.nodes.get(node) {
            for dep in &graph_node.dependencies {
                self.dfs_cycle_detect(dep, state, path, cycles)?;
            }
        }

        // Mark as visited (black)
        state.insert(node.to_string(), 2);
        path.pop();

        Ok(())
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Extended DependencyGraph with full DerivedRole storage
///
/// This version stores the complete DerivedRole objects to enable
/// full dependency analysis including parent role patterns.
#[derive(Debug, Clone)]
pub struct DependencyGraphBuilder {
    roles: Vec<DerivedRole>,
}

impl DependencyGraphBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self { roles: Vec::new() }
    }

    /// Add a derived role to the builder
    pub fn add_role(&mut self, role: DerivedRole) -> Result<(), GraphError> {
        // Validate the role
        role.validate()
            .map_err(|e| GraphError::InvalidRole(e.to_string()))?;

        // Check for duplicates
        if self.roles.iter().any(|r| r.name == role.name) {
            return Err(GraphError::DuplicateRole(role.name.clone()));
        }

        self.roles.push(role);
        Ok(())
    }

    /// Build the dependency graph
    pub fn build(self) -> Result<DependencyGraph, GraphError> {
        let mut graph = DependencyGraph::new();

        // Collect all derived role names
        let derived_names: HashSet<String> =
            self.roles.iter().map(|r| r.name.clone()).collect();

        // Add all nodes first
        for role in &self.roles {
            graph.add_role(role)?;
        }

        // Build dependency edges
        for role in &self.roles {
            for parent in &role.parent_roles {
                // Only add edge if parent is also a derived role
                if derived_names.contains(parent) {
                    graph.add_dependency_edge(&role.name, parent);
                }
            }
        }

        // Verify no cycles
        graph.detect_cycles()?;

        Ok(graph)
    }
}

impl Default for DependencyGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
