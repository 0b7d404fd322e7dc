//! Explicit breadth-first reachability.
//!
//! This is the cross-validation oracle for the symbolic engine: it
//! enumerates every reachable marking one by one, so it is only usable on
//! small nets. The symbolic engine in [`crate::symbolic`] is the intended
//! analysis path.

use crate::error::AnalysisError;
use crate::marking::Marking;
use crate::petri_net::PetriNet;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// The result of a breadth-first exploration: the set of reachable
/// markings and the firing edges between them.
#[derive(Debug, Default)]
pub struct ReachabilityGraph {
    pub markings: HashSet<Marking>,
    /// For every reached marking, the enabled transitions and the marking
    /// each one leads to.
    pub successors: HashMap<Marking, BTreeMap<String, Marking>>,
}

impl ReachabilityGraph {
    pub fn len(&self) -> usize {
        self.markings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markings.is_empty()
    }

    pub fn is_reachable(&self, marking: &Marking) -> bool {
        self.markings.contains(marking)
    }
}

/// Explore all markings reachable from `initial` by firing enabled
/// transitions, in breadth-first order.
pub fn explore(net: &PetriNet, initial: &Marking) -> Result<ReachabilityGraph, AnalysisError> {
    let mut graph = ReachabilityGraph::default();
    let mut queue = VecDeque::new();

    graph.markings.insert(initial.clone());
    graph.successors.insert(initial.clone(), BTreeMap::new());
    queue.push_back(initial.clone());

    while let Some(current) = queue.pop_front() {
        for transition in net.enabled_transitions(&current) {
            let next = net.fire(transition, &current)?;
            graph
                .successors
                .get_mut(&current)
                .expect("dequeued markings are registered")
                .insert(transition.to_string(), next.clone());
            if graph.markings.insert(next.clone()) {
                graph.successors.insert(next.clone(), BTreeMap::new());
                queue.push_back(next);
            }
        }
    }

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::explore;
    use crate::marking::Marking;
    use crate::test_utils::{chain_net, choice_net, cycle_net, fork_net, self_loop_net};

    #[test]
    fn chain_reaches_three_markings() {
        let net = chain_net();
        let graph = explore(&net, net.initial_marking()).unwrap();
        assert_eq!(graph.len(), 3);
        assert!(graph.is_reachable(&Marking::from_marked(["p1"])));
        assert!(graph.is_reachable(&Marking::from_marked(["p2"])));
        assert!(graph.is_reachable(&Marking::from_marked(["p3"])));
        assert!(!graph.is_reachable(&Marking::new()));
    }

    #[test]
    fn cycle_reaches_two_markings() {
        let net = cycle_net();
        let graph = explore(&net, net.initial_marking()).unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn choice_branches_to_both_outcomes() {
        let net = choice_net();
        let graph = explore(&net, net.initial_marking()).unwrap();
        assert_eq!(graph.len(), 3);
        let initial = net.initial_marking();
        let edges = &graph.successors[initial];
        assert_eq!(edges["t1"], Marking::from_marked(["p2"]));
        assert_eq!(edges["t2"], Marking::from_marked(["p3"]));
    }

    #[test]
    fn fork_produces_two_tokens() {
        let net = fork_net();
        let graph = explore(&net, net.initial_marking()).unwrap();
        assert_eq!(graph.len(), 2);
        assert!(graph.is_reachable(&Marking::from_marked(["p2", "p3"])));
    }

    #[test]
    fn self_loop_stays_put() {
        let net = self_loop_net();
        let graph = explore(&net, net.initial_marking()).unwrap();
        assert_eq!(graph.len(), 1);
        let initial = net.initial_marking();
        assert_eq!(graph.successors[initial]["t"], *initial);
    }
}
