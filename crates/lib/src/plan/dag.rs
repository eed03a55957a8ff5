use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;
use tracing::debug;

use crate::build::Configuration;
use crate::manifest::{ConfigurationFailure, Manifest};
use crate::version;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
  #[error("dependency cycle: {}", cycle.join(" -> "))]
  CyclicDependency { cycle: Vec<String> },
}

/// Kahn's algorithm that always releases the lowest-indexed ready node first.
///
/// Node indices are positions, so independent nodes keep their original
/// relative order. On a cycle, returns the nodes of one cycle in edge order.
fn stable_kahn<N>(graph: &DiGraph<N, ()>) -> Result<Vec<NodeIndex>, Vec<NodeIndex>> {
  let mut in_degree: Vec<usize> = graph
    .node_indices()
    .map(|idx| graph.neighbors_directed(idx, Direction::Incoming).count())
    .collect();

  let mut ready: BinaryHeap<Reverse<NodeIndex>> = graph
    .node_indices()
    .filter(|idx| in_degree[idx.index()] == 0)
    .map(Reverse)
    .collect();

  let mut order = Vec::with_capacity(graph.node_count());
  while let Some(Reverse(idx)) = ready.pop() {
    order.push(idx);
    for next in graph.neighbors_directed(idx, Direction::Outgoing) {
      let degree = &mut in_degree[next.index()];
      *degree = degree.saturating_sub(1);
      if *degree == 0 {
        ready.push(Reverse(next));
      }
    }
  }

  if order.len() == graph.node_count() {
    return Ok(order);
  }

  let scc = tarjan_scc(graph)
    .into_iter()
    .filter(|scc| scc.len() > 1)
    .min_by_key(|scc| scc.iter().min().copied())
    .unwrap_or_default();
  Err(walk_cycle(graph, &scc))
}

/// Follow edges inside a strongly connected component from its lowest node,
/// always taking the lowest successor, until a node repeats.
fn walk_cycle<N>(graph: &DiGraph<N, ()>, scc: &[NodeIndex]) -> Vec<NodeIndex> {
  let Some(&start) = scc.iter().min() else {
    return Vec::new();
  };
  let members: BTreeSet<NodeIndex> = scc.iter().copied().collect();

  let mut path = vec![start];
  let mut current = start;
  loop {
    let Some(next) = graph
      .neighbors_directed(current, Direction::Outgoing)
      .filter(|n| *n != current && members.contains(n))
      .min()
    else {
      return path;
    };
    if let Some(pos) = path.iter().position(|&n| n == next) {
      return path.split_off(pos);
    }
    path.push(next);
    current = next;
  }
}

/// Stable topological order of `0..node_count` under `(from, to)` edges,
/// where `from` must come before `to`. Self edges are ignored.
///
/// On a cycle, returns its nodes in edge order.
pub fn stable_toposort(node_count: usize, edges: &[(usize, usize)]) -> Result<Vec<usize>, Vec<usize>> {
  let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(node_count, edges.len());
  let nodes: Vec<NodeIndex> = (0..node_count).map(|_| graph.add_node(())).collect();
  for &(from, to) in edges {
    if from != to && from < node_count && to < node_count {
      graph.update_edge(nodes[from], nodes[to], ());
    }
  }
  stable_kahn(&graph)
    .map(|order| order.into_iter().map(NodeIndex::index).collect())
    .map_err(|cycle| cycle.into_iter().map(NodeIndex::index).collect())
}

/// Close a cycle for display: `a -> b -> a`.
pub fn close_cycle(mut names: Vec<String>) -> Vec<String> {
  if let Some(first) = names.first().cloned() {
    names.push(first);
  }
  names
}

/// Dependency graph over finalized configurations.
///
/// Node `i` is configuration `i` of the slice the graph was built from.
pub struct ConfigDag {
  graph: DiGraph<String, ()>,
}

impl ConfigDag {
  /// Add an edge `dependency -> consumer` for every requirement of a
  /// configuration that names another configuration's package.
  ///
  /// A requirement with a build string selects the configuration carrying it.
  /// Otherwise the configurations matching the version constraint are
  /// narrowed to those whose assignment agrees with the consumer's on shared
  /// parameters, falling back to all of them.
  pub fn from_configurations(configs: &[Configuration]) -> Self {
    let mut graph = DiGraph::with_capacity(configs.len(), 0);
    let nodes: Vec<NodeIndex> = configs.iter().map(|c| graph.add_node(c.filename())).collect();

    for (consumer, config) in configs.iter().enumerate() {
      for (_, spec) in config.requirements.iter() {
        let candidates: Vec<usize> = configs
          .iter()
          .enumerate()
          .filter(|(idx, other)| *idx != consumer && other.name == spec.name)
          .filter(|(_, other)| match &spec.build {
            Some(build) => &other.build_string == build,
            None => true,
          })
          .filter(|(_, other)| match &spec.version {
            Some(constraint) => version::matches(&other.version, constraint),
            None => true,
          })
          .map(|(idx, _)| idx)
          .collect();

        let agreeing: Vec<usize> = candidates
          .iter()
          .copied()
          .filter(|idx| configs[*idx].variant.agrees_with(&config.variant))
          .collect();
        let chosen = if agreeing.is_empty() { candidates } else { agreeing };

        for dependency in chosen {
          graph.update_edge(nodes[dependency], nodes[consumer], ());
        }
      }
    }

    Self { graph }
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  /// Direct dependencies of configuration `idx`, in index order.
  pub fn dependencies(&self, idx: usize) -> Vec<usize> {
    let mut deps: Vec<usize> = self
      .graph
      .neighbors_directed(NodeIndex::new(idx), Direction::Incoming)
      .map(NodeIndex::index)
      .collect();
    deps.sort_unstable();
    deps
  }

  fn cycle_error(&self, cycle: Vec<NodeIndex>) -> OrderError {
    OrderError::CyclicDependency {
      cycle: close_cycle(cycle.into_iter().map(|idx| self.graph[idx].clone()).collect()),
    }
  }

  /// Stable topological order: dependencies first, otherwise original order.
  pub fn order(&self) -> Result<Vec<usize>, OrderError> {
    stable_kahn(&self.graph)
      .map(|order| order.into_iter().map(NodeIndex::index).collect())
      .map_err(|cycle| self.cycle_error(cycle))
  }

  /// Group configurations into waves. Every member of a wave depends only on
  /// members of earlier waves. Members keep index order within a wave.
  pub fn waves(&self) -> Result<Vec<Vec<usize>>, OrderError> {
    let order = self.order()?;
    let mut level = vec![0usize; self.len()];
    for &idx in &order {
      level[idx] = self
        .dependencies(idx)
        .into_iter()
        .map(|dep| level[dep] + 1)
        .max()
        .unwrap_or(0);
    }

    let depth = level.iter().copied().max().map_or(0, |max| max + 1);
    let mut waves = vec![Vec::new(); depth];
    for (idx, lvl) in level.into_iter().enumerate() {
      waves[lvl].push(idx);
    }
    Ok(waves)
  }
}

/// Configurations in build order with their parallel waves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildPlan {
  pub configurations: Vec<Configuration>,
  waves: Vec<Vec<usize>>,
}

impl BuildPlan {
  /// Indices into `configurations`, grouped into parallel waves.
  pub fn waves(&self) -> &[Vec<usize>] {
    &self.waves
  }

  pub fn into_manifest(self, failures: Vec<ConfigurationFailure>) -> Manifest {
    Manifest {
      configurations: self.configurations,
      waves: self.waves,
      failures,
    }
  }
}

/// Order configurations so that every dependency precedes its consumers.
///
/// Fills each configuration's `depends_on` with the filenames of its direct
/// dependencies.
pub fn order(configs: Vec<Configuration>) -> Result<BuildPlan, OrderError> {
  let dag = ConfigDag::from_configurations(&configs);
  let order = dag.order()?;
  let waves = dag.waves()?;

  let mut position = vec![0usize; configs.len()];
  for (pos, &idx) in order.iter().enumerate() {
    position[idx] = pos;
  }

  let filenames: Vec<String> = configs.iter().map(Configuration::filename).collect();
  let mut slots: Vec<Option<Configuration>> = configs.into_iter().map(Some).collect();
  let mut ordered = Vec::with_capacity(slots.len());
  for &idx in &order {
    if let Some(mut config) = slots[idx].take() {
      config.depends_on = dag.dependencies(idx).into_iter().map(|dep| filenames[dep].clone()).collect();
      ordered.push(config);
    }
  }

  let mut waves: Vec<Vec<usize>> = waves
    .into_iter()
    .map(|wave| wave.into_iter().map(|idx| position[idx]).collect())
    .collect();
  for wave in &mut waves {
    wave.sort_unstable();
  }

  debug!(configurations = ordered.len(), waves = waves.len(), "ordered build plan");
  Ok(BuildPlan {
    configurations: ordered,
    waves,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::recipe::PackageSpec;
  use crate::variant::VariantValue;

  fn config(name: &str, build_string: &str, run: &[&str]) -> Configuration {
    let mut config = Configuration::new("recipe", name, "1.0");
    config.build_string = build_string.to_string();
    config.requirements.run = run.iter().filter_map(|r| PackageSpec::parse(r)).collect();
    config
  }

  fn names(plan: &BuildPlan) -> Vec<&str> {
    plan.configurations.iter().map(|c| c.name.as_str()).collect()
  }

  mod toposort {
    use super::*;

    #[test]
    fn keeps_original_order_without_edges() {
      assert_eq!(stable_toposort(4, &[]), Ok(vec![0, 1, 2, 3]));
    }

    #[test]
    fn moves_only_what_it_must() {
      assert_eq!(stable_toposort(4, &[(3, 1)]), Ok(vec![0, 2, 3, 1]));
    }

    #[test]
    fn reports_cycle_members() {
      assert_eq!(stable_toposort(4, &[(1, 2), (2, 1), (0, 3)]), Err(vec![1, 2]));
    }

    #[test]
    fn cycle_follows_real_edges() {
      assert_eq!(stable_toposort(3, &[(0, 2), (2, 1), (1, 0)]), Err(vec![0, 2, 1]));
    }

    #[test]
    fn cycle_inside_larger_component() {
      let edges = [(0, 3), (3, 0), (3, 1), (1, 2), (2, 3)];
      assert_eq!(stable_toposort(4, &edges), Err(vec![0, 3]));
    }

    #[test]
    fn ignores_self_edges() {
      assert_eq!(stable_toposort(2, &[(1, 1)]), Ok(vec![0, 1]));
    }
  }

  mod ordering {
    use super::*;

    #[test]
    fn exact_pin_orders_target_first() {
      let lib = config("lib", "h1_0", &[]);
      let app = config("app", "h2_0", &["lib 1.0 h1_0"]);

      let plan = order(vec![app.clone(), lib.clone()]).unwrap();
      assert_eq!(names(&plan), vec!["lib", "app"]);
      assert_eq!(plan.configurations[1].depends_on, vec!["lib-1.0-h1_0".to_string()]);

      let plan = order(vec![lib, app]).unwrap();
      assert_eq!(names(&plan), vec!["lib", "app"]);
    }

    #[test]
    fn independent_configurations_keep_order() {
      let plan = order(vec![config("c", "0", &[]), config("a", "0", &[]), config("b", "0", &[])]).unwrap();
      assert_eq!(names(&plan), vec!["c", "a", "b"]);
      assert_eq!(plan.waves(), &[vec![0, 1, 2]]);
    }

    #[test]
    fn build_string_selects_one_variant() {
      let lib_a = config("lib", "ha_0", &[]);
      let lib_b = config("lib", "hb_0", &[]);
      let app = config("app", "0", &["lib 1.0 hb_0"]);
      let dag = ConfigDag::from_configurations(&[lib_a, lib_b, app]);
      assert_eq!(dag.dependencies(2), vec![1]);
    }

    #[test]
    fn agreeing_variant_is_preferred() {
      let mut lib_311 = config("lib", "ha_0", &[]);
      lib_311.variant.insert("python", VariantValue::from("3.11"));
      let mut lib_312 = config("lib", "hb_0", &[]);
      lib_312.variant.insert("python", VariantValue::from("3.12"));
      let mut app = config("app", "0", &["lib"]);
      app.variant.insert("python", VariantValue::from("3.12"));

      let dag = ConfigDag::from_configurations(&[lib_311, lib_312, app]);
      assert_eq!(dag.dependencies(2), vec![1]);
    }

    #[test]
    fn version_constraint_filters_candidates() {
      let lib = config("lib", "0", &[]);
      let app = config("app", "0", &["lib >=2"]);
      let dag = ConfigDag::from_configurations(&[lib, app]);
      assert!(dag.dependencies(1).is_empty());
    }

    #[test]
    fn cycle_is_named() {
      let a = config("a", "0", &["b"]);
      let b = config("b", "0", &["a"]);
      let err = order(vec![a, b]).unwrap_err();
      assert_eq!(
        err,
        OrderError::CyclicDependency {
          cycle: vec!["a-1.0-0".to_string(), "b-1.0-0".to_string(), "a-1.0-0".to_string()]
        }
      );
      assert!(err.to_string().contains("a-1.0-0 -> b-1.0-0 -> a-1.0-0"));
    }
  }

  mod cycles {
    use super::*;

    #[test]
    fn three_node_cycle_names_existing_edges() {
      let a = config("a", "0", &["b"]);
      let b = config("b", "0", &["c"]);
      let c = config("c", "0", &["a"]);
      let err = order(vec![a, b, c]).unwrap_err();
      assert_eq!(err.to_string(), "dependency cycle: a-1.0-0 -> c-1.0-0 -> b-1.0-0 -> a-1.0-0");
    }
  }

  mod waves {
    use super::*;

    #[test]
    fn chain_and_fan_out() {
      let lib = config("lib", "0", &[]);
      let tools = config("tools", "0", &["lib"]);
      let app = config("app", "0", &["lib"]);
      let meta = config("meta", "0", &["tools", "app"]);
      let other = config("other", "0", &[]);

      let plan = order(vec![meta, app, tools, lib, other]).unwrap();
      assert_eq!(names(&plan), vec!["lib", "app", "tools", "meta", "other"]);
      assert_eq!(plan.waves(), &[vec![0, 4], vec![1, 2], vec![3]]);
    }

    #[test]
    fn empty_plan_has_no_waves() {
      let plan = order(Vec::new()).unwrap();
      assert!(plan.waves().is_empty());
      assert!(plan.configurations.is_empty());
    }
  }
}
