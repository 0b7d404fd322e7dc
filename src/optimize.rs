//! Linear-objective optimization over the reachable set.
//!
//! Given a weight per place, the optimizer finds a reachable marking that
//! maximizes the weighted token sum. The search is a branch-and-bound
//! depth-first descent through the place variables: every search node
//! carries the BDD of reachable markings consistent with the decisions
//! taken so far, so infeasible branches vanish as soon as the conjunction
//! becomes empty, and an admissible bound (the sum of the remaining
//! positive weights) prunes branches that cannot beat the incumbent.

use crate::cancellation::CancellationToken;
use crate::error::AnalysisError;
use crate::marking::Marking;
use crate::symbolic::{SymbolicContext, SymbolicReachability};
use biodivine_lib_bdd::Bdd;
use log::{debug, warn};
use std::collections::BTreeMap;

/// How to search for the maximizing marking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OptimizeMode {
    /// Commit places with positive weight in descending weight order as
    /// long as the set stays non-empty. Fast, feasible, not necessarily
    /// optimal.
    Greedy,
    /// Exhaustive branch-and-bound. Always returns a true maximizer.
    #[default]
    Exact,
}

/// A maximizing marking together with its objective value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Optimum {
    pub marking: Marking,
    pub value: i64,
}

/// One pending node of the branch-and-bound descent.
struct Frame {
    idx: usize,
    node: Bdd,
    score: i64,
    partial: Marking,
}

pub struct MarkingOptimizer<'a> {
    engine: &'a SymbolicReachability<'a>,
}

impl<'a> MarkingOptimizer<'a> {
    pub fn new(engine: &'a SymbolicReachability<'a>) -> MarkingOptimizer<'a> {
        MarkingOptimizer { engine }
    }

    /// Find `max { w · M : M reachable }`.
    ///
    /// Places missing from `weights` count as weight 0. Returns `None`
    /// when the reachable set is empty. The token is polled on every
    /// search node.
    pub fn maximize(
        &self,
        weights: &BTreeMap<String, i64>,
        mode: OptimizeMode,
        cancel: &CancellationToken,
    ) -> Result<Option<Optimum>, AnalysisError> {
        let context = self.engine.context()?;
        let reachable = self.engine.reachable()?;
        if reachable.is_false() {
            return Ok(None);
        }

        // No objective: any reachable marking attains the optimum 0.
        if weights.is_empty() {
            let marking = context
                .pick_marking(reachable)
                .expect("non-empty set has a witness");
            return Ok(Some(Optimum { marking, value: 0 }));
        }

        let greedy = self.greedy(context, reachable, weights);
        if mode == OptimizeMode::Greedy {
            return Ok(Some(greedy));
        }
        self.branch_and_bound(context, reachable, weights, greedy, cancel)
            .map(Some)
    }

    /// A feasible marking obtained in `O(|P|)` BDD operations; serves as
    /// the initial incumbent of the exact search.
    fn greedy(
        &self,
        context: &SymbolicContext,
        reachable: &Bdd,
        weights: &BTreeMap<String, i64>,
    ) -> Optimum {
        let weight_of = |place: &str| weights.get(place).copied().unwrap_or(0);
        let mut order: Vec<&String> = context.places().iter().collect();
        order.sort_by(|a, b| weight_of(b).cmp(&weight_of(a)).then(a.cmp(b)));

        let mut current = reachable.clone();
        for place in order {
            if weight_of(place) <= 0 {
                continue;
            }
            let variable = context
                .current_variable(place)
                .expect("ordering covers net places only");
            let committed = current.and(&context.variables().mk_var(variable));
            if !committed.is_false() {
                current = committed;
            }
        }
        let marking = context
            .pick_marking(&current)
            .expect("committed set stays non-empty");
        let value = score(weights, &marking);
        Optimum { marking, value }
    }

    fn branch_and_bound(
        &self,
        context: &SymbolicContext,
        reachable: &Bdd,
        weights: &BTreeMap<String, i64>,
        incumbent: Optimum,
        cancel: &CancellationToken,
    ) -> Result<Optimum, AnalysisError> {
        let weight_of = |place: &str| weights.get(place).copied().unwrap_or(0);

        // Descend through high-reward places first; the optimistic bound
        // then decays as fast as possible.
        let mut order: Vec<&String> = context.places().iter().collect();
        order.sort_by(|a, b| {
            weight_of(b)
                .max(0)
                .cmp(&weight_of(a).max(0))
                .then(a.cmp(b))
        });

        // suffix[i] = sum of positive weights of order[i..].
        let mut suffix = vec![0i64; order.len() + 1];
        for i in (0..order.len()).rev() {
            suffix[i] = suffix[i + 1] + weight_of(order[i]).max(0);
        }

        let mut best = incumbent;
        let mut visited = 0usize;

        let mut stack = vec![Frame {
            idx: 0,
            node: reachable.clone(),
            score: 0,
            partial: Marking::new(),
        }];
        while let Some(frame) = stack.pop() {
            cancel.checkpoint()?;
            visited += 1;

            // Even claiming every remaining positive weight cannot beat
            // the incumbent.
            if frame.score + suffix[frame.idx] <= best.value {
                continue;
            }
            if frame.idx == order.len() {
                // Every non-pruned leaf is a satisfying assignment of R.
                best = Optimum {
                    marking: frame.partial,
                    value: frame.score,
                };
                continue;
            }

            let place = order[frame.idx];
            let variable = context
                .current_variable(place)
                .expect("ordering covers net places only");
            let literal = context.variables().mk_var(variable);

            // Push the 0-branch first so the 1-branch is explored first.
            let without = frame.node.and(&literal.not());
            if !without.is_false() {
                stack.push(Frame {
                    idx: frame.idx + 1,
                    node: without,
                    score: frame.score,
                    partial: frame.partial.clone(),
                });
            }
            let with = frame.node.and(&literal);
            if !with.is_false() {
                let mut partial = frame.partial;
                partial.set_token(place, true);
                stack.push(Frame {
                    idx: frame.idx + 1,
                    node: with,
                    score: frame.score + weight_of(place),
                    partial,
                });
            }
        }
        debug!(
            "branch-and-bound visited {} nodes, best value {}",
            visited, best.value
        );
        Ok(best)
    }
}

/// The objective value of a concrete marking.
pub fn score(weights: &BTreeMap<String, i64>, marking: &Marking) -> i64 {
    marking
        .marked_places()
        .map(|place| weights.get(place).copied().unwrap_or(0))
        .sum()
}

/// Parse a weight list of the form `p1=10, p2=-5`. Entries that do not
/// parse are skipped with a warning.
pub fn parse_weights(input: &str) -> BTreeMap<String, i64> {
    let mut weights = BTreeMap::new();
    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.split_once('=') {
            Some((place, value)) => match value.trim().parse::<i64>() {
                Ok(value) => {
                    weights.insert(place.trim().to_string(), value);
                }
                Err(_) => warn!("cannot parse weight for `{part}`"),
            },
            None => warn!("cannot parse weight for `{part}`"),
        }
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::{parse_weights, score, MarkingOptimizer, OptimizeMode};
    use crate::cancellation::CancellationToken;
    use crate::error::AnalysisError;
    use crate::marking::Marking;
    use crate::petri_net::PetriNet;
    use crate::symbolic::SymbolicReachability;
    use crate::test_utils::{chain_net, choice_net, cycle_net, fork_net};
    use std::collections::BTreeMap;

    fn computed(net: &PetriNet) -> SymbolicReachability<'_> {
        let mut engine = SymbolicReachability::new(net);
        engine
            .compute_reachability(net.initial_marking(), &CancellationToken::new())
            .unwrap();
        engine
    }

    fn weights(entries: &[(&str, i64)]) -> BTreeMap<String, i64> {
        entries
            .iter()
            .map(|(place, value)| (place.to_string(), *value))
            .collect()
    }

    fn maximize(net: &PetriNet, entries: &[(&str, i64)]) -> (Marking, i64) {
        let engine = computed(net);
        let optimizer = MarkingOptimizer::new(&engine);
        let optimum = optimizer
            .maximize(
                &weights(entries),
                OptimizeMode::Exact,
                &CancellationToken::new(),
            )
            .unwrap()
            .unwrap();
        (optimum.marking, optimum.value)
    }

    #[test]
    fn chain_prefers_the_final_place() {
        let net = chain_net();
        let (marking, value) = maximize(&net, &[("p1", 1), ("p2", 2), ("p3", 10)]);
        assert_eq!(value, 10);
        assert_eq!(marking, Marking::from_marked(["p3"]));
    }

    #[test]
    fn cycle_always_scores_one() {
        let net = cycle_net();
        let (marking, value) = maximize(&net, &[("p1", 1), ("p2", 1)]);
        assert_eq!(value, 1);
        assert_eq!(marking.total_tokens(), 1);
    }

    #[test]
    fn choice_takes_the_heavier_branch() {
        let net = choice_net();
        let (marking, value) = maximize(&net, &[("p2", 3), ("p3", 5)]);
        assert_eq!(value, 5);
        assert_eq!(marking, Marking::from_marked(["p3"]));
    }

    #[test]
    fn fork_collects_both_tokens() {
        let net = fork_net();
        let (marking, value) = maximize(&net, &[("p2", 3), ("p3", 4)]);
        assert_eq!(value, 7);
        assert_eq!(marking, Marking::from_marked(["p2", "p3"]));
    }

    #[test]
    fn negative_weights_pick_the_least_bad_marking() {
        let net = chain_net();
        let (marking, value) = maximize(&net, &[("p1", -5), ("p2", -1), ("p3", -2)]);
        assert_eq!(value, -1);
        assert_eq!(marking, Marking::from_marked(["p2"]));
    }

    #[test]
    fn empty_weights_return_some_reachable_marking_with_value_zero() {
        let net = choice_net();
        let engine = computed(&net);
        let optimizer = MarkingOptimizer::new(&engine);
        let optimum = optimizer
            .maximize(
                &BTreeMap::new(),
                OptimizeMode::Exact,
                &CancellationToken::new(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(optimum.value, 0);
        assert!(engine.is_reachable(&optimum.marking).unwrap());
    }

    #[test]
    fn greedy_result_is_feasible_and_bounded_by_exact() {
        let net = choice_net();
        let engine = computed(&net);
        let optimizer = MarkingOptimizer::new(&engine);
        let w = weights(&[("p2", 3), ("p3", 5)]);
        let greedy = optimizer
            .maximize(&w, OptimizeMode::Greedy, &CancellationToken::new())
            .unwrap()
            .unwrap();
        let exact = optimizer
            .maximize(&w, OptimizeMode::Exact, &CancellationToken::new())
            .unwrap()
            .unwrap();
        assert!(engine.is_reachable(&greedy.marking).unwrap());
        assert_eq!(greedy.value, score(&w, &greedy.marking));
        assert!(greedy.value <= exact.value);
    }

    #[test]
    fn exact_value_matches_brute_force_over_extracted_markings() {
        for net in [chain_net(), cycle_net(), choice_net(), fork_net()] {
            let engine = computed(&net);
            let w = weights(&[("p1", -2), ("p2", 4), ("p3", 1)]);
            let optimizer = MarkingOptimizer::new(&engine);
            let exact = optimizer
                .maximize(&w, OptimizeMode::Exact, &CancellationToken::new())
                .unwrap()
                .unwrap();
            let brute = engine
                .extract_markings()
                .unwrap()
                .iter()
                .map(|m| score(&w, m))
                .max()
                .unwrap();
            assert_eq!(exact.value, brute);
            assert!(engine.is_reachable(&exact.marking).unwrap());
            assert_eq!(score(&w, &exact.marking), exact.value);
        }
    }

    #[test]
    fn optimizer_requires_a_computed_engine() {
        let net = chain_net();
        let mut engine = SymbolicReachability::new(&net);
        engine.initialize();
        let optimizer = MarkingOptimizer::new(&engine);
        assert!(matches!(
            optimizer.maximize(
                &BTreeMap::new(),
                OptimizeMode::Exact,
                &CancellationToken::new()
            ),
            Err(AnalysisError::EngineNotComputed)
        ));
    }

    #[test]
    fn cancellation_aborts_the_search() {
        let net = chain_net();
        let engine = computed(&net);
        let optimizer = MarkingOptimizer::new(&engine);
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            optimizer.maximize(&weights(&[("p1", 1)]), OptimizeMode::Exact, &token),
            Err(AnalysisError::Cancelled)
        ));
    }

    #[test]
    fn weight_parsing_skips_malformed_entries() {
        let parsed = parse_weights("p1=10, p2=-5, garbage, p3=x,, p4 = 2");
        assert_eq!(parsed, weights(&[("p1", 10), ("p2", -5), ("p4", 2)]));
        assert!(parse_weights("").is_empty());
    }
}
