use crate::error::AnalysisError;
use crate::marking::Marking;
use crate::petri_net::PetriNet;
use biodivine_lib_bdd::{
    Bdd, BddPartialValuation, BddValuation, BddVariable, BddVariableSet, BddVariableSetBuilder,
};
use debug_ignore::DebugIgnore;
use num_bigint::BigInt;
use std::collections::BTreeMap;
use std::ops::Shr;

/// The symbolic encoding of a net: one current-state and one next-state
/// BDD variable per place, the transition relation `T(s, s')`, and the
/// identity relation used to map next-state results back onto the
/// current-state family.
///
/// Variables are declared in sorted place order, with each place's primed
/// variable (suffix `'`) directly below its current one. The mapping from
/// places to variables is fixed for the lifetime of the context.
#[derive(Clone, Debug)]
pub struct SymbolicContext {
    variables: DebugIgnore<BddVariableSet>,
    places: Vec<String>,
    place_index: BTreeMap<String, usize>,
    current_vars: Vec<BddVariable>,
    next_vars: Vec<BddVariable>,
    transition_relation: DebugIgnore<Bdd>,
    identity: DebugIgnore<Bdd>,
}

impl SymbolicContext {
    /// Declare the symbolic variables for `net` and build its transition
    /// relation.
    pub fn new(net: &PetriNet) -> SymbolicContext {
        let places = net.sorted_places();

        let mut builder = BddVariableSetBuilder::new();
        let mut current_vars = Vec::with_capacity(places.len());
        let mut next_vars = Vec::with_capacity(places.len());
        for place in &places {
            current_vars.push(builder.make_variable(place.as_str()));
            next_vars.push(builder.make_variable(format!("{place}'").as_str()));
        }
        let variables = builder.build();

        let place_index = places
            .iter()
            .enumerate()
            .map(|(i, place)| (place.clone(), i))
            .collect();

        let transition_relation = Self::build_transition_relation(
            net,
            &variables,
            &places,
            &current_vars,
            &next_vars,
        );

        // Conjoining this relation and quantifying the next family away
        // renames every next variable to its current counterpart.
        let mut identity = variables.mk_true();
        for i in 0..places.len() {
            let current = variables.mk_var(current_vars[i]);
            let next = variables.mk_var(next_vars[i]);
            identity = identity.and(&current.iff(&next));
        }

        SymbolicContext {
            variables: DebugIgnore(variables),
            places,
            place_index,
            current_vars,
            next_vars,
            transition_relation: DebugIgnore(transition_relation),
            identity: DebugIgnore(identity),
        }
    }

    /// `T(s, s') = OR_t enabled_t(s) AND update_t(s, s')`, where the update
    /// forces produced places on, consumed places off, and carries every
    /// untouched place over unchanged.
    fn build_transition_relation(
        net: &PetriNet,
        variables: &BddVariableSet,
        places: &[String],
        current_vars: &[BddVariable],
        next_vars: &[BddVariable],
    ) -> Bdd {
        let mut relation = variables.mk_false();
        for transition in net.transitions() {
            let flow = net
                .flow(transition)
                .expect("every transition has a flow entry");

            let mut enabled = variables.mk_true();
            for place in &flow.inputs {
                let i = places.binary_search(place).expect("flow references known place");
                enabled = enabled.and(&variables.mk_var(current_vars[i]));
            }

            let mut update = variables.mk_true();
            for (i, place) in places.iter().enumerate() {
                let next = variables.mk_var(next_vars[i]);
                let step = if flow.outputs.contains(place) {
                    next
                } else if flow.inputs.contains(place) {
                    next.not()
                } else {
                    variables.mk_var(current_vars[i]).iff(&next)
                };
                update = update.and(&step);
            }

            relation = relation.or(&enabled.and(&update));
        }
        relation
    }

    pub fn variables(&self) -> &BddVariableSet {
        &self.variables
    }

    /// Place identifiers in declaration (sorted) order.
    pub fn places(&self) -> &[String] {
        &self.places
    }

    pub fn current_variable(&self, place: &str) -> Option<BddVariable> {
        self.place_index.get(place).map(|&i| self.current_vars[i])
    }

    pub fn next_variable(&self, place: &str) -> Option<BddVariable> {
        self.place_index.get(place).map(|&i| self.next_vars[i])
    }

    pub fn transition_relation(&self) -> &Bdd {
        &self.transition_relation
    }

    /// Encode a concrete marking as the conjunction of current-state
    /// literals. Fails if the marking references a place the net does not
    /// have.
    pub fn encode_marking(&self, marking: &Marking) -> Result<Bdd, AnalysisError> {
        for place in marking.marked_places() {
            if !self.place_index.contains_key(place) {
                return Err(AnalysisError::InvalidNet(format!(
                    "marking references unknown place `{place}`"
                )));
            }
        }
        let mut valuation = BddPartialValuation::empty();
        for (i, place) in self.places.iter().enumerate() {
            valuation.set_value(self.current_vars[i], marking.has_token(place));
        }
        Ok(self.variables.mk_conjunctive_clause(&valuation))
    }

    /// Read a marking back from a total valuation, looking only at the
    /// current-state variables.
    pub fn decode_marking(&self, valuation: &BddValuation) -> Marking {
        let mut marking = Marking::new();
        for (i, place) in self.places.iter().enumerate() {
            if valuation.value(self.current_vars[i]) {
                marking.set_token(place, true);
            }
        }
        marking
    }

    /// The set of immediate successors of `set`, expressed over the
    /// current-state family again.
    pub fn post(&self, set: &Bdd) -> Bdd {
        let stepped = set
            .and(&self.transition_relation)
            .exists(&self.current_vars);
        stepped.and(&self.identity).exists(&self.next_vars)
    }

    /// Evaluate whether `T` relates the pair of concrete markings.
    pub fn step_holds(&self, from: &Marking, to: &Marking) -> bool {
        let mut values = vec![false; self.places.len() * 2];
        for (i, place) in self.places.iter().enumerate() {
            values[2 * i] = from.has_token(place);
            values[2 * i + 1] = to.has_token(place);
        }
        self.transition_relation.eval_in(&BddValuation::new(values))
    }

    /// Pick one marking from a non-empty symbolic set.
    pub fn pick_marking(&self, set: &Bdd) -> Option<Marking> {
        set.sat_witness()
            .map(|valuation| self.decode_marking(&valuation))
    }

    /// Decode the whole symbolic set into explicit markings. Intended for
    /// tests and verbose listing; the analyses themselves never need it.
    pub fn decode_markings(&self, set: &Bdd) -> std::collections::BTreeSet<Marking> {
        // Pin the next-state family to `false` so every marking shows up
        // in exactly one satisfying valuation.
        let fixed: Vec<(BddVariable, bool)> = self.next_vars.iter().map(|v| (*v, false)).collect();
        let set = set.exists(&self.next_vars).select(&fixed);
        set.sat_valuations()
            .map(|valuation| self.decode_marking(&valuation))
            .collect()
    }

    /// Approximate number of markings in the given set.
    ///
    /// The BDD cardinality counts valuations of both variable families, so
    /// the next-state half is divided out.
    pub fn count_markings(&self, set: &Bdd) -> f64 {
        set.cardinality() / 2.0f64.powi(self.places.len() as i32)
    }

    /// Exact number of markings in the given set.
    pub fn count_markings_exact(&self, set: &Bdd) -> BigInt {
        set.exact_cardinality().shr(self.places.len())
    }
}
