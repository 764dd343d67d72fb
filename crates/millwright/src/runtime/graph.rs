//! Component graph construction and configuration checks

use crate::runtime::component::{Component, ComponentSpec};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;

/// The full set of components and their dependency edges.
///
/// Built once at startup and never structurally modified afterwards.
#[derive(Debug)]
pub struct ComponentGraph {
    components: IndexMap<String, Arc<Component>>,
}

impl ComponentGraph {
    /// Validate the specs and build the graph
    pub fn build(specs: Vec<ComponentSpec>) -> Result<Self, ConfigError> {
        validate(&specs)?;

        let components = specs
            .into_iter()
            .map(|spec| (spec.name.clone(), Arc::new(Component::new(spec))))
            .collect();

        Ok(Self { components })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Component>> {
        self.components.get(name)
    }

    /// Components in configuration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Component>> {
        self.components.values()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Order in which a full launch would bring components up: every
    /// component after all of its dependencies, roots visited in
    /// configuration order.
    pub fn launch_order(&self) -> Vec<&str> {
        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(self.components.len());
        for name in self.components.keys() {
            self.visit(name, &mut visited, &mut order);
        }
        order
    }

    fn visit<'a>(&'a self, name: &'a str, visited: &mut HashSet<&'a str>, order: &mut Vec<&'a str>) {
        if !visited.insert(name) {
            return;
        }
        if let Some(component) = self.components.get(name) {
            for dependency in component.dependencies() {
                self.visit(dependency, visited, order);
            }
        }
        order.push(name);
    }
}

/// Reject configurations that can never be launched.
///
/// Only direct mutual dependencies (A depends on B and B depends on A) are
/// detected. Longer cycles pass this check.
pub fn validate(specs: &[ComponentSpec]) -> Result<(), ConfigError> {
    let mut by_name: IndexMap<&str, &ComponentSpec> = IndexMap::new();
    for spec in specs {
        if by_name.insert(spec.name.as_str(), spec).is_some() {
            return Err(ConfigError::DuplicateComponent(spec.name.clone()));
        }
    }

    for spec in specs {
        for dependency in &spec.dependencies {
            let Some(dep) = by_name.get(dependency.as_str()) else {
                return Err(ConfigError::UnknownDependency {
                    component: spec.name.clone(),
                    dependency: dependency.clone(),
                });
            };
            if dep.dependencies.iter().any(|d| d == &spec.name) {
                return Err(ConfigError::CyclicDependency {
                    component: spec.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    Ok(())
}

/// Errors in the component configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cyclic dependency found: {component} and {dependency}")]
    CyclicDependency { component: String, dependency: String },

    #[error("Component '{component}' depends on unknown component '{dependency}'")]
    UnknownDependency { component: String, dependency: String },

    #[error("Component '{0}' is defined more than once")]
    DuplicateComponent(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::component::RunSpec;
    use std::path::PathBuf;

    fn spec(name: &str, deps: &[&str]) -> ComponentSpec {
        ComponentSpec {
            name: name.to_string(),
            run_spec: RunSpec {
                build_context: PathBuf::from(name),
                build_file: PathBuf::from("Dockerfile"),
                env: vec![],
            },
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            ignore_health: false,
        }
    }

    #[test]
    fn test_acyclic_chain_passes() {
        let specs = vec![spec("a", &[]), spec("b", &["a"]), spec("c", &["b"])];
        assert!(validate(&specs).is_ok());
    }

    #[test]
    fn test_direct_mutual_dependency_fails() {
        let specs = vec![spec("a", &[]), spec("b", &["a", "c"]), spec("c", &["b"])];
        let err = validate(&specs).unwrap_err();
        assert_eq!(err.to_string(), "Cyclic dependency found: b and c");
        match err {
            ConfigError::CyclicDependency { component, dependency } => {
                assert_eq!(component, "b");
                assert_eq!(dependency, "c");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let specs = vec![spec("a", &["a"])];
        assert!(matches!(
            validate(&specs),
            Err(ConfigError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_three_cycle_is_not_detected() {
        let specs = vec![spec("a", &["c"]), spec("b", &["a"]), spec("c", &["b"])];
        assert!(validate(&specs).is_ok());
    }

    #[test]
    fn test_unknown_dependency() {
        let specs = vec![spec("b", &["a"])];
        assert!(matches!(
            validate(&specs),
            Err(ConfigError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn test_duplicate_component() {
        let specs = vec![spec("a", &[]), spec("a", &[])];
        assert!(matches!(
            validate(&specs),
            Err(ConfigError::DuplicateComponent(name)) if name == "a"
        ));
    }

    #[test]
    fn test_launch_order_diamond() {
        let specs = vec![
            spec("d", &["b", "c"]),
            spec("b", &["a"]),
            spec("c", &["a"]),
            spec("a", &[]),
        ];
        let graph = ComponentGraph::build(specs).unwrap();
        assert_eq!(graph.launch_order(), vec!["a", "b", "c", "d"]);
        assert_eq!(graph.len(), 4);
    }
}
