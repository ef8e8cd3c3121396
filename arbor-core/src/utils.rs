//! Utility functions for the container
//!
//! Naming helpers for generated bean names and the bookkeeping used for
//! circular dependency detection.

/// Naming convention utilities for bean names
pub mod naming {
    /// Converts a PascalCase type name to camelCase for bean naming.
    ///
    /// Used for generated bean names: `UserService` becomes `userService`.
    ///
    /// # Examples
    ///
    /// ```
    /// use arbor_core::utils::naming::to_camel_case;
    ///
    /// assert_eq!(to_camel_case("UserService"), "userService");
    /// assert_eq!(to_camel_case("DatabaseConnectionPool"), "databaseConnectionPool");
    /// assert_eq!(to_camel_case("A"), "a");
    /// assert_eq!(to_camel_case(""), "");
    /// ```
    pub fn to_camel_case(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mut result = String::with_capacity(s.len());
                result.extend(first.to_lowercase());
                result.push_str(chars.as_str());
                result
            }
        }
    }

    /// Returns the last path segment of a type name, without generic arguments.
    ///
    /// ```
    /// use arbor_core::utils::naming::short_type_name;
    ///
    /// assert_eq!(short_type_name("app::repo::UserRepository"), "UserRepository");
    /// assert_eq!(short_type_name("alloc::vec::Vec<u8>"), "Vec");
    /// ```
    pub fn short_type_name(type_name: &str) -> &str {
        let base = type_name.split('<').next().unwrap_or(type_name);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// Generates the name of an inner bean: the camelCase type name followed by
    /// a unique counter, e.g. `connectionPool#3`.
    pub fn inner_bean_name(type_name: &str, counter: usize) -> String {
        format!(
            "{}{}{}",
            to_camel_case(short_type_name(type_name)),
            crate::constants::GENERATED_BEAN_NAME_SEPARATOR,
            counter
        )
    }
}

/// Dependency resolution utilities
pub mod dependency {
    use std::collections::{HashMap, HashSet};
    use std::thread::{self, ThreadId};

    use parking_lot::RwLock;

    /// Tracks beans currently being created to detect circular dependencies.
    ///
    /// The in-creation chain is kept per thread, so two threads resolving
    /// unrelated beans never see each other's entries.
    #[derive(Debug, Default)]
    pub struct CreationTracker {
        creating: RwLock<HashMap<ThreadId, Vec<String>>>,
    }

    impl CreationTracker {
        /// Creates a new empty creation tracker.
        pub fn new() -> Self {
            Self::default()
        }

        /// Checks if a bean is being created on the current thread.
        pub fn is_creating(&self, name: &str) -> bool {
            self.creating
                .read()
                .get(&thread::current().id())
                .is_some_and(|chain| chain.iter().any(|n| n == name))
        }

        /// Marks a bean as being created on the current thread.
        ///
        /// Returns `false` if the bean was already in the chain (circular dependency).
        pub fn start_creating(&self, name: &str) -> bool {
            let mut creating = self.creating.write();
            let chain = creating.entry(thread::current().id()).or_default();
            if chain.iter().any(|n| n == name) {
                return false;
            }
            chain.push(name.to_string());
            true
        }

        /// Marks a bean as finished being created on the current thread.
        pub fn finish_creating(&self, name: &str) {
            let me = thread::current().id();
            let mut creating = self.creating.write();
            if let Some(chain) = creating.get_mut(&me) {
                if let Some(pos) = chain.iter().rposition(|n| n == name) {
                    chain.remove(pos);
                }
                if chain.is_empty() {
                    creating.remove(&me);
                }
            }
        }

        /// The current thread's creation chain, outermost first.
        pub fn current_creating(&self) -> Vec<String> {
            self.creating
                .read()
                .get(&thread::current().id())
                .cloned()
                .unwrap_or_default()
        }
    }

    /// Dependency graph analysis result
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum DependencyValidationError {
        /// Circular dependency detected
        CircularDependency {
            /// The dependency chain forming the cycle
            cycle: Vec<String>,
        },
        /// Missing dependency detected
        MissingDependency {
            /// The bean that requires the dependency
            bean: String,
            /// The missing dependency
            missing: String,
        },
    }

    impl std::fmt::Display for DependencyValidationError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::CircularDependency { cycle } => {
                    write!(f, "Circular dependency detected: {}", cycle.join(" -> "))
                }
                Self::MissingDependency { bean, missing } => {
                    write!(f, "Bean '{}' depends on '{}' which is not registered", bean, missing)
                }
            }
        }
    }

    /// Validates dependency graph for circular dependencies and missing beans
    ///
    /// `dependencies` maps each bean name to the names it needs, and is walked
    /// in the given order so the first reported issue is deterministic.
    pub fn validate_dependency_graph(
        dependencies: &[(String, Vec<String>)],
    ) -> Result<(), DependencyValidationError> {
        let graph: HashMap<&str, &[String]> = dependencies
            .iter()
            .map(|(name, deps)| (name.as_str(), deps.as_slice()))
            .collect();

        // Check for missing dependencies
        for (bean_name, deps) in dependencies {
            if let Some(dep) = deps.iter().find(|dep| !graph.contains_key(dep.as_str())) {
                return Err(DependencyValidationError::MissingDependency {
                    bean: bean_name.clone(),
                    missing: dep.clone(),
                });
            }
        }

        // Check for circular dependencies using DFS
        let mut visited = HashSet::new();
        let mut rec_stack = Vec::new();

        for (bean_name, _) in dependencies {
            if !visited.contains(bean_name.as_str()) {
                if let Some(cycle) = detect_cycle_dfs(bean_name, &graph, &mut visited, &mut rec_stack) {
                    return Err(DependencyValidationError::CircularDependency { cycle });
                }
            }
        }

        Ok(())
    }

    /// DFS-based cycle detection
    ///
    /// Returns Some(cycle) if a cycle is detected, None otherwise
    fn detect_cycle_dfs<'a>(
        node: &'a str,
        graph: &HashMap<&'a str, &'a [String]>,
        visited: &mut HashSet<&'a str>,
        rec_stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        visited.insert(node);
        rec_stack.push(node);

        if let Some(deps) = graph.get(node).copied() {
            for dep in deps {
                if let Some(start_idx) = rec_stack.iter().position(|x| *x == dep.as_str()) {
                    let mut cycle: Vec<String> =
                        rec_stack[start_idx..].iter().map(|s| s.to_string()).collect();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
                if !visited.contains(dep.as_str()) {
                    if let Some(cycle) = detect_cycle_dfs(dep, graph, visited, rec_stack) {
                        return Some(cycle);
                    }
                }
            }
        }

        rec_stack.pop();
        None
    }
}
