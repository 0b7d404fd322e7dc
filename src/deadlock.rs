//! Hybrid deadlock detection: ILP candidate generation filtered by
//! symbolic reachability.
//!
//! The state equation `M = M0 + C · n` is a necessary condition for
//! reachability, so an integer program over it combined with the "every
//! transition is disabled" constraints yields candidate dead markings.
//! Each candidate is checked against the symbolic reachable set; spurious
//! candidates are excluded with a canonical no-good cut and the program is
//! solved again. Every cut removes exactly one 0/1 vertex, so the loop
//! terminates with either a verified deadlock or an infeasible program.

use crate::cancellation::CancellationToken;
use crate::error::AnalysisError;
use crate::marking::Marking;
use crate::petri_net::PetriNet;
use crate::symbolic::SymbolicReachability;
use good_lp::{
    constraint, default_solver, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use log::{debug, warn};
use std::collections::BTreeMap;

pub struct DeadlockDetector<'a> {
    net: &'a PetriNet,
    engine: &'a SymbolicReachability<'a>,
}

impl<'a> DeadlockDetector<'a> {
    pub fn new(net: &'a PetriNet, engine: &'a SymbolicReachability<'a>) -> DeadlockDetector<'a> {
        DeadlockDetector { net, engine }
    }

    /// Search for a reachable marking at which no transition is enabled.
    ///
    /// Returns `None` when the net is deadlock-free, and also when the
    /// solver fails to produce an optimal or infeasible status (a positive
    /// answer depends on a correct solve, so nothing is proven then). The
    /// token is polled once per solver round.
    pub fn detect(&self, cancel: &CancellationToken) -> Result<Option<Marking>, AnalysisError> {
        // Fail early if the reachable set is missing.
        self.engine.reachable()?;

        // A transition with an empty preset is enabled in every marking.
        for transition in self.net.transitions() {
            let flow = self.net.flow(transition).expect("flow exists");
            if flow.inputs.is_empty() {
                debug!("transition `{transition}` has an empty preset; net is deadlock-free");
                return Ok(None);
            }
        }

        let mut cuts: Vec<Marking> = Vec::new();
        let mut round = 0usize;
        loop {
            cancel.checkpoint()?;
            round += 1;

            let candidate = match self.solve_candidate(&cuts) {
                Ok(Some(candidate)) => candidate,
                Ok(None) => {
                    debug!("ILP infeasible after {round} rounds; no deadlock exists");
                    return Ok(None);
                }
                Err(error) => {
                    warn!("{error}; no deadlock proven");
                    return Ok(None);
                }
            };

            if self.engine.is_reachable(&candidate)? {
                debug!("deadlock found after {round} ILP rounds");
                return Ok(Some(candidate));
            }

            debug!("candidate {candidate} is unreachable; adding no-good cut");
            cuts.push(candidate);
        }
    }

    /// Solve the candidate program under the accumulated cuts. `Ok(None)`
    /// means infeasible, i.e. no dead marking satisfies the state
    /// equation.
    fn solve_candidate(&self, cuts: &[Marking]) -> Result<Option<Marking>, AnalysisError> {
        let initial = self.net.initial_marking();
        let incidence = self.net.incidence();

        let mut problem = ProblemVariables::new();
        let marking_vars: BTreeMap<&str, Variable> = self
            .net
            .places()
            .iter()
            .map(|place| (place.as_str(), problem.add(variable().binary())))
            .collect();
        let firing_vars: BTreeMap<&str, Variable> = self
            .net
            .transitions()
            .iter()
            .map(|transition| {
                (transition.as_str(), problem.add(variable().integer().min(0)))
            })
            .collect();

        // Bias the search towards candidates close to the initial
        // marking; any bounded objective would do, this one converges
        // fast in practice.
        let objective: Expression = firing_vars
            .values()
            .map(|&count| Expression::from(count))
            .sum();
        let mut model = problem.minimise(objective).using(default_solver);

        // State equation: x_p - sum_t C[p][t] * n_t = M0[p].
        for place in self.net.places() {
            let mut lhs = Expression::from(marking_vars[place.as_str()]);
            for transition in self.net.transitions() {
                let coefficient = incidence[place][transition];
                if coefficient != 0 {
                    lhs -= (coefficient as f64) * firing_vars[transition.as_str()];
                }
            }
            let tokens = if initial.has_token(place) { 1.0 } else { 0.0 };
            model = model.with(constraint!(lhs == tokens));
        }

        // Dead constraints: every transition misses at least one input
        // token. Presets are non-empty, the caller already handled source
        // transitions.
        for transition in self.net.transitions() {
            let inputs = &self.net.flow(transition).expect("flow exists").inputs;
            let occupied: Expression = inputs
                .iter()
                .map(|place| Expression::from(marking_vars[place.as_str()]))
                .sum();
            model = model.with(constraint!(occupied <= (inputs.len() - 1) as f64));
        }

        // No-good cuts: each one excludes exactly one rejected candidate.
        for cut in cuts {
            let flipped: Expression = self
                .net
                .places()
                .iter()
                .map(|place| {
                    let var = marking_vars[place.as_str()];
                    if cut.has_token(place) {
                        -1.0 * var
                    } else {
                        1.0 * var
                    }
                })
                .sum();
            let ones = cut.total_tokens() as f64;
            model = model.with(constraint!(flipped >= 1.0 - ones));
        }

        match model.solve() {
            Ok(solution) => {
                let mut candidate = Marking::new();
                for place in self.net.places() {
                    if solution.value(marking_vars[place.as_str()]) > 0.5 {
                        candidate.set_token(place, true);
                    }
                }
                Ok(Some(candidate))
            }
            Err(ResolutionError::Infeasible) => Ok(None),
            Err(error) => Err(AnalysisError::SolverFailure(error.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DeadlockDetector;
    use crate::cancellation::CancellationToken;
    use crate::error::AnalysisError;
    use crate::marking::Marking;
    use crate::petri_net::PetriNet;
    use crate::symbolic::SymbolicReachability;
    use crate::test_utils::{chain_net, choice_net, cycle_net, fork_net, self_loop_net};

    fn computed(net: &PetriNet) -> SymbolicReachability<'_> {
        let mut engine = SymbolicReachability::new(net);
        engine
            .compute_reachability(net.initial_marking(), &CancellationToken::new())
            .unwrap();
        engine
    }

    fn detect(net: &PetriNet) -> Option<Marking> {
        let engine = computed(net);
        DeadlockDetector::new(net, &engine)
            .detect(&CancellationToken::new())
            .unwrap()
    }

    fn assert_dead_and_reachable(net: &PetriNet, marking: &Marking) {
        let engine = computed(net);
        assert!(engine.is_reachable(marking).unwrap());
        assert!(net.enabled_transitions(marking).is_empty());
    }

    #[test]
    fn chain_deadlocks_in_its_final_place() {
        let net = chain_net();
        let deadlock = detect(&net).expect("chain has a deadlock");
        assert_eq!(deadlock, Marking::from_marked(["p3"]));
        assert_dead_and_reachable(&net, &deadlock);
    }

    #[test]
    fn cycle_is_deadlock_free() {
        assert_eq!(detect(&cycle_net()), None);
    }

    #[test]
    fn self_loop_is_deadlock_free() {
        assert_eq!(detect(&self_loop_net()), None);
    }

    #[test]
    fn choice_deadlocks_in_one_of_its_branches() {
        let net = choice_net();
        let deadlock = detect(&net).expect("choice has deadlocks");
        assert!(
            deadlock == Marking::from_marked(["p2"]) || deadlock == Marking::from_marked(["p3"])
        );
        assert_dead_and_reachable(&net, &deadlock);
    }

    #[test]
    fn fork_deadlocks_with_both_tokens() {
        let net = fork_net();
        let deadlock = detect(&net).expect("fork has a deadlock");
        assert_eq!(deadlock, Marking::from_marked(["p2", "p3"]));
        assert_dead_and_reachable(&net, &deadlock);
    }

    #[test]
    fn source_transition_short_circuits_to_deadlock_free() {
        let mut net = chain_net();
        // A transition with no inputs is enabled everywhere.
        net.add_transition("spawn", None).unwrap();
        net.add_arc("spawn", "p1").unwrap();
        assert_eq!(detect(&net), None);
    }

    #[test]
    fn detector_requires_a_computed_engine() {
        let net = chain_net();
        let engine = SymbolicReachability::new(&net);
        let detector = DeadlockDetector::new(&net, &engine);
        assert!(matches!(
            detector.detect(&CancellationToken::new()),
            Err(AnalysisError::EngineNotComputed)
        ));
    }

    #[test]
    fn cancellation_aborts_the_cutting_loop() {
        let net = chain_net();
        let engine = computed(&net);
        let detector = DeadlockDetector::new(&net, &engine);
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            detector.detect(&token),
            Err(AnalysisError::Cancelled)
        ));
    }

    #[test]
    fn cuts_drive_the_search_past_unreachable_candidates() {
        // A chain p1 -> t1 -> p2 -> t2 -> p3 -> t3 -> p4 with a shortcut
        // v: {p1, g} -> {s, g} that is never enabled because g stays
        // unmarked. The state equation still admits the marking {s} with a
        // single firing of v, so the firing-count objective proposes the
        // unreachable {s} before the reachable deadlock {p4} (three
        // firings). Only a no-good cut gets the search past it.
        let mut net = PetriNet::new();
        for (place, marked) in [
            ("p1", true),
            ("p2", false),
            ("p3", false),
            ("p4", false),
            ("g", false),
            ("s", false),
        ] {
            net.add_place(place, marked, None).unwrap();
        }
        for (transition, input, output) in
            [("t1", "p1", "p2"), ("t2", "p2", "p3"), ("t3", "p3", "p4")]
        {
            net.add_transition(transition, None).unwrap();
            net.add_arc(input, transition).unwrap();
            net.add_arc(transition, output).unwrap();
        }
        net.add_transition("v", None).unwrap();
        net.add_arc("p1", "v").unwrap();
        net.add_arc("g", "v").unwrap();
        net.add_arc("v", "s").unwrap();
        net.add_arc("v", "g").unwrap();

        let deadlock = detect(&net).expect("the chain still deadlocks");
        assert_eq!(deadlock, Marking::from_marked(["p4"]));
        assert_dead_and_reachable(&net, &deadlock);
    }
}
