//! Symbolic reachability over binary decision diagrams.
//!
//! The reachable set of a 1-safe net is represented as the characteristic
//! function of its markings over one Boolean variable per place. The
//! engine follows the usual three-phase lifecycle: it is constructed
//! empty, [`SymbolicReachability::initialize`] declares the variables and
//! builds the transition relation, and
//! [`SymbolicReachability::compute_reachability`] iterates the post-image
//! to the fixpoint. The resulting set is then queried (but never mutated)
//! by the deadlock detector and the optimizer.

use crate::cancellation::CancellationToken;
use crate::error::AnalysisError;
use crate::marking::Marking;
use crate::petri_net::PetriNet;
use biodivine_lib_bdd::Bdd;
use debug_ignore::DebugIgnore;
use log::debug;
use num_bigint::BigInt;
use std::collections::BTreeSet;

pub mod context;

pub use context::SymbolicContext;

/// The symbolic reachability engine for one net.
///
/// The engine owns the BDD variable universe for the whole analysis
/// session; consumers borrow it and must not declare further variables.
#[derive(Debug)]
pub struct SymbolicReachability<'a> {
    net: &'a PetriNet,
    context: Option<SymbolicContext>,
    reachable: Option<DebugIgnore<Bdd>>,
}

impl<'a> SymbolicReachability<'a> {
    /// Create an engine with no symbolic state yet.
    pub fn new(net: &'a PetriNet) -> SymbolicReachability<'a> {
        SymbolicReachability {
            net,
            context: None,
            reachable: None,
        }
    }

    /// Declare the place variables and build the transition relation.
    /// Any previously computed reachable set is discarded.
    pub fn initialize(&mut self) {
        self.context = Some(SymbolicContext::new(self.net));
        self.reachable = None;
    }

    /// The symbolic context, available after [`Self::initialize`].
    pub fn context(&self) -> Result<&SymbolicContext, AnalysisError> {
        self.context
            .as_ref()
            .ok_or(AnalysisError::EngineUninitialized)
    }

    pub fn encode_marking(&self, marking: &Marking) -> Result<Bdd, AnalysisError> {
        self.context()?.encode_marking(marking)
    }

    /// One application of the post-image to an arbitrary symbolic set.
    pub fn post(&self, set: &Bdd) -> Result<Bdd, AnalysisError> {
        Ok(self.context()?.post(set))
    }

    /// Compute the least fixpoint `R = R0 ∪ Post(R)` starting from the
    /// given initial marking. Initializes the engine first if needed.
    ///
    /// The token is polled once per fixpoint iteration; on cancellation
    /// the partially computed set is discarded.
    pub fn compute_reachability(
        &mut self,
        initial: &Marking,
        cancel: &CancellationToken,
    ) -> Result<(), AnalysisError> {
        if self.context.is_none() {
            self.initialize();
        }
        let context = self.context.as_ref().expect("initialized above");

        let mut reachable = context.encode_marking(initial)?;
        let mut steps = 0usize;
        loop {
            cancel.checkpoint()?;
            let next = reachable.or(&context.post(&reachable));
            if next == reachable {
                break;
            }
            steps += 1;
            debug!(
                "reachability step {}: states={}, nodes={}",
                steps,
                context.count_markings(&next),
                next.size()
            );
            reachable = next;
        }
        debug!(
            "reachability fixpoint after {} steps: states={}, nodes={}",
            steps,
            context.count_markings(&reachable),
            reachable.size()
        );
        self.reachable = Some(DebugIgnore(reachable));
        Ok(())
    }

    /// The reachable set, available after [`Self::compute_reachability`].
    pub fn reachable(&self) -> Result<&Bdd, AnalysisError> {
        self.reachable
            .as_deref()
            .ok_or(AnalysisError::EngineNotComputed)
    }

    /// Membership test: `encode(marking) ∧ R ≠ ⊥`.
    pub fn is_reachable(&self, marking: &Marking) -> Result<bool, AnalysisError> {
        let reachable = self.reachable()?;
        let encoded = self.encode_marking(marking)?;
        Ok(!encoded.and(reachable).is_false())
    }

    /// Enumerate the reachable markings explicitly. Only meant for tests
    /// and verbose listing.
    pub fn extract_markings(&self) -> Result<BTreeSet<Marking>, AnalysisError> {
        let reachable = self.reachable()?;
        Ok(self.context()?.decode_markings(reachable))
    }

    pub fn count_markings(&self) -> Result<f64, AnalysisError> {
        let reachable = self.reachable()?;
        Ok(self.context()?.count_markings(reachable))
    }

    pub fn count_markings_exact(&self) -> Result<BigInt, AnalysisError> {
        let reachable = self.reachable()?;
        Ok(self.context()?.count_markings_exact(reachable))
    }
}

#[cfg(test)]
mod tests {
    use super::SymbolicReachability;
    use crate::cancellation::CancellationToken;
    use crate::error::AnalysisError;
    use crate::explicit;
    use crate::marking::Marking;
    use crate::petri_net::PetriNet;
    use crate::test_utils::{
        chain_net, choice_net, cycle_net, fork_net, independent_pairs_net, self_loop_net,
    };
    use num_bigint::BigInt;

    fn computed(net: &PetriNet) -> SymbolicReachability<'_> {
        let mut engine = SymbolicReachability::new(net);
        engine
            .compute_reachability(net.initial_marking(), &CancellationToken::new())
            .unwrap();
        engine
    }

    #[test]
    fn uninitialized_engine_rejects_queries() {
        let net = chain_net();
        let engine = SymbolicReachability::new(&net);
        assert!(matches!(
            engine.encode_marking(net.initial_marking()),
            Err(AnalysisError::EngineUninitialized)
        ));
        assert!(matches!(
            engine.reachable(),
            Err(AnalysisError::EngineNotComputed)
        ));
    }

    #[test]
    fn membership_requires_computed_set() {
        let net = chain_net();
        let mut engine = SymbolicReachability::new(&net);
        engine.initialize();
        assert!(engine.encode_marking(net.initial_marking()).is_ok());
        assert!(matches!(
            engine.is_reachable(net.initial_marking()),
            Err(AnalysisError::EngineNotComputed)
        ));
    }

    #[test]
    fn encoding_rejects_unknown_places() {
        let net = chain_net();
        let mut engine = SymbolicReachability::new(&net);
        engine.initialize();
        let foreign = Marking::from_marked(["q99"]);
        assert!(matches!(
            engine.encode_marking(&foreign),
            Err(AnalysisError::InvalidNet(_))
        ));
    }

    #[test]
    fn cancellation_aborts_the_fixpoint() {
        let net = chain_net();
        let mut engine = SymbolicReachability::new(&net);
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            engine.compute_reachability(net.initial_marking(), &token),
            Err(AnalysisError::Cancelled)
        ));
        assert!(engine.reachable().is_err());
    }

    #[test]
    fn chain_scenario() {
        let net = chain_net();
        let engine = computed(&net);
        assert_eq!(engine.count_markings_exact().unwrap(), BigInt::from(3));
        for place in ["p1", "p2", "p3"] {
            assert!(engine.is_reachable(&Marking::from_marked([place])).unwrap());
        }
        assert!(!engine.is_reachable(&Marking::new()).unwrap());
        assert!(!engine
            .is_reachable(&Marking::from_marked(["p1", "p2"]))
            .unwrap());
    }

    #[test]
    fn cycle_scenario() {
        let net = cycle_net();
        let engine = computed(&net);
        assert_eq!(engine.count_markings_exact().unwrap(), BigInt::from(2));
    }

    #[test]
    fn choice_scenario() {
        let net = choice_net();
        let engine = computed(&net);
        assert_eq!(engine.count_markings_exact().unwrap(), BigInt::from(3));
    }

    #[test]
    fn fork_scenario() {
        let net = fork_net();
        let engine = computed(&net);
        assert_eq!(engine.count_markings_exact().unwrap(), BigInt::from(2));
        assert!(engine
            .is_reachable(&Marking::from_marked(["p2", "p3"]))
            .unwrap());
    }

    #[test]
    fn self_loop_scenario() {
        let net = self_loop_net();
        let engine = computed(&net);
        assert_eq!(engine.count_markings_exact().unwrap(), BigInt::from(1));
    }

    #[test]
    fn initial_marking_is_always_reachable() {
        for net in [
            chain_net(),
            cycle_net(),
            choice_net(),
            fork_net(),
            self_loop_net(),
            independent_pairs_net(4),
        ] {
            let engine = computed(&net);
            assert!(engine.is_reachable(net.initial_marking()).unwrap());
        }
    }

    #[test]
    fn reachable_set_is_closed_under_firing() {
        for net in [
            chain_net(),
            cycle_net(),
            choice_net(),
            fork_net(),
            self_loop_net(),
            independent_pairs_net(3),
        ] {
            let engine = computed(&net);
            for marking in engine.extract_markings().unwrap() {
                for transition in net.enabled_transitions(&marking) {
                    let successor = net.fire(transition, &marking).unwrap();
                    assert!(
                        engine.is_reachable(&successor).unwrap(),
                        "successor of {marking} under {transition} must stay reachable"
                    );
                }
            }
        }
    }

    #[test]
    fn agrees_with_explicit_reachability() {
        for net in [
            chain_net(),
            cycle_net(),
            choice_net(),
            fork_net(),
            self_loop_net(),
            independent_pairs_net(5),
        ] {
            let engine = computed(&net);
            let graph = explicit::explore(&net, net.initial_marking()).unwrap();
            let symbolic = engine.extract_markings().unwrap();
            assert_eq!(symbolic.len(), graph.len());
            for marking in &symbolic {
                assert!(graph.is_reachable(marking));
            }
        }
    }

    #[test]
    fn independent_pairs_count_matches_two_to_the_n() {
        for n in [10usize, 11, 13] {
            let net = independent_pairs_net(n);
            let engine = computed(&net);
            let expected = BigInt::from(1u64 << n);
            assert_eq!(engine.count_markings_exact().unwrap(), expected);
            let graph = explicit::explore(&net, net.initial_marking()).unwrap();
            assert_eq!(graph.len(), 1 << n);
        }
    }

    #[test]
    fn transition_relation_matches_the_firing_relation() {
        for net in [
            chain_net(),
            cycle_net(),
            choice_net(),
            fork_net(),
            self_loop_net(),
        ] {
            let engine = computed(&net);
            let context = engine.context().unwrap();
            let markings: Vec<Marking> = engine.extract_markings().unwrap().into_iter().collect();
            for from in &markings {
                for to in &markings {
                    let fires = net.enabled_transitions(from).iter().any(|t| {
                        net.fire(t, from).unwrap() == *to
                    });
                    assert_eq!(
                        context.step_holds(from, to),
                        fires,
                        "T must relate {from} -> {to} iff some transition fires between them"
                    );
                }
            }
        }
    }

    #[test]
    fn post_image_of_the_initial_marking() {
        let net = choice_net();
        let engine = computed(&net);
        let context = engine.context().unwrap();
        let initial = engine.encode_marking(net.initial_marking()).unwrap();
        let successors = context.decode_markings(&engine.post(&initial).unwrap());
        let expected: std::collections::BTreeSet<_> = [
            Marking::from_marked(["p2"]),
            Marking::from_marked(["p3"]),
        ]
        .into_iter()
        .collect();
        assert_eq!(successors, expected);
    }
}
