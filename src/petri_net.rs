use crate::error::AnalysisError;
use crate::marking::Marking;
use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The flow relation of one transition: the places it consumes from and
/// the places it produces into. Arc weights are implicitly one.
#[derive(Clone, Debug, Default)]
pub struct Flow {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// The incidence matrix `C[p][t] = [p in post(t)] - [p in pre(t)]`.
pub type IncidenceMatrix = BTreeMap<String, BTreeMap<String, i64>>;

/// A 1-safe Petri net: places, transitions, the flow relation and the
/// initial marking.
///
/// Place and transition identifiers are opaque strings, unique within
/// their respective sets. The net assumes 1-safety of its input (checked
/// at parse time); firing itself does not re-check it.
#[derive(Debug, Default)]
pub struct PetriNet {
    places: BTreeSet<String>,
    transitions: BTreeSet<String>,
    flows: BTreeMap<String, Flow>,
    initial_marking: Marking,
    place_names: BTreeMap<String, String>,
    transition_names: BTreeMap<String, String>,
    incidence: OnceCell<IncidenceMatrix>,
}

impl PetriNet {
    pub fn new() -> PetriNet {
        PetriNet::default()
    }

    /// Add a place, recording whether it is marked initially.
    pub fn add_place(
        &mut self,
        id: &str,
        has_token: bool,
        name: Option<&str>,
    ) -> Result<(), AnalysisError> {
        if !self.places.insert(id.to_string()) {
            return Err(AnalysisError::InvalidNet(format!(
                "place `{id}` already exists"
            )));
        }
        self.initial_marking.set_token(id, has_token);
        if let Some(name) = name {
            self.place_names.insert(id.to_string(), name.to_string());
        }
        Ok(())
    }

    pub fn add_transition(&mut self, id: &str, name: Option<&str>) -> Result<(), AnalysisError> {
        if !self.transitions.insert(id.to_string()) {
            return Err(AnalysisError::InvalidNet(format!(
                "transition `{id}` already exists"
            )));
        }
        self.flows.insert(id.to_string(), Flow::default());
        if let Some(name) = name {
            self.transition_names
                .insert(id.to_string(), name.to_string());
        }
        Ok(())
    }

    /// Add an arc, classified by its endpoints: place → transition is an
    /// input arc, transition → place an output arc. Any other combination
    /// violates bipartiteness. A repeated arc is stored once.
    pub fn add_arc(&mut self, source: &str, target: &str) -> Result<(), AnalysisError> {
        if self.places.contains(source) && self.transitions.contains(target) {
            let flow = self.flows.get_mut(target).expect("flow exists for every transition");
            if !flow.inputs.iter().any(|p| p == source) {
                flow.inputs.push(source.to_string());
            }
        } else if self.transitions.contains(source) && self.places.contains(target) {
            let flow = self.flows.get_mut(source).expect("flow exists for every transition");
            if !flow.outputs.iter().any(|p| p == target) {
                flow.outputs.push(target.to_string());
            }
        } else {
            return Err(AnalysisError::InvalidNet(format!(
                "invalid arc from `{source}` to `{target}`: arcs must connect \
                 a place to a transition or a transition to a place"
            )));
        }
        // The cached incidence matrix no longer matches the flow relation.
        self.incidence.take();
        Ok(())
    }

    pub fn places(&self) -> &BTreeSet<String> {
        &self.places
    }

    pub fn transitions(&self) -> &BTreeSet<String> {
        &self.transitions
    }

    /// Place identifiers in sorted order.
    pub fn sorted_places(&self) -> Vec<String> {
        self.places.iter().cloned().collect()
    }

    pub fn initial_marking(&self) -> &Marking {
        &self.initial_marking
    }

    pub fn flow(&self, transition: &str) -> Option<&Flow> {
        self.flows.get(transition)
    }

    pub fn place_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.place_names.get(id).map(String::as_str).unwrap_or(id)
    }

    pub fn transition_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.transition_names
            .get(id)
            .map(String::as_str)
            .unwrap_or(id)
    }

    /// A transition is enabled iff all its input places are marked.
    pub fn is_enabled(&self, transition: &str, marking: &Marking) -> Result<bool, AnalysisError> {
        let flow = self.flows.get(transition).ok_or_else(|| {
            AnalysisError::InvalidNet(format!("transition `{transition}` does not exist"))
        })?;
        Ok(flow.inputs.iter().all(|place| marking.has_token(place)))
    }

    /// Fire a transition: clear every input place, then mark every output
    /// place. Returns a fresh marking; the argument is not modified.
    pub fn fire(&self, transition: &str, marking: &Marking) -> Result<Marking, AnalysisError> {
        if !self.is_enabled(transition, marking)? {
            return Err(AnalysisError::NotEnabled(transition.to_string()));
        }
        let flow = &self.flows[transition];
        let mut next = marking.clone();
        for place in &flow.inputs {
            next.set_token(place, false);
        }
        for place in &flow.outputs {
            next.set_token(place, true);
        }
        Ok(next)
    }

    /// All transitions enabled in the given marking, sorted by id.
    pub fn enabled_transitions(&self, marking: &Marking) -> Vec<&str> {
        self.flows
            .iter()
            .filter(|(_, flow)| flow.inputs.iter().all(|place| marking.has_token(place)))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// The incidence matrix, built on first access and cached.
    pub fn incidence(&self) -> &IncidenceMatrix {
        self.incidence.get_or_init(|| {
            let mut matrix: IncidenceMatrix = self
                .places
                .iter()
                .map(|p| {
                    let row = self.transitions.iter().map(|t| (t.clone(), 0)).collect();
                    (p.clone(), row)
                })
                .collect();
            for (transition, flow) in &self.flows {
                for place in &flow.inputs {
                    *matrix.get_mut(place).unwrap().get_mut(transition).unwrap() -= 1;
                }
                for place in &flow.outputs {
                    *matrix.get_mut(place).unwrap().get_mut(transition).unwrap() += 1;
                }
            }
            matrix
        })
    }

    /// Check structural consistency. The result lists every dangling
    /// reference found; an empty list means the net is consistent.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for transition in &self.transitions {
            if !self.flows.contains_key(transition) {
                issues.push(format!("transition `{transition}` has no flow information"));
            }
        }
        for (transition, flow) in &self.flows {
            if !self.transitions.contains(transition) {
                issues.push(format!(
                    "flow references non-existent transition `{transition}`"
                ));
            }
            for place in &flow.inputs {
                if !self.places.contains(place) {
                    issues.push(format!(
                        "input arc of `{transition}` references non-existent place `{place}`"
                    ));
                }
            }
            for place in &flow.outputs {
                if !self.places.contains(place) {
                    issues.push(format!(
                        "output arc of `{transition}` references non-existent place `{place}`"
                    ));
                }
            }
        }
        issues
    }
}

impl fmt::Display for PetriNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Places ({}):", self.places.len())?;
        for place in &self.places {
            match self.place_names.get(place) {
                Some(name) => writeln!(f, "  {place} ({name})")?,
                None => writeln!(f, "  {place}")?,
            }
        }
        writeln!(f, "Transitions ({}):", self.transitions.len())?;
        for transition in &self.transitions {
            match self.transition_names.get(transition) {
                Some(name) => writeln!(f, "  {transition} ({name})")?,
                None => writeln!(f, "  {transition}")?,
            }
        }
        let arc_count: usize = self
            .flows
            .values()
            .map(|flow| flow.inputs.len() + flow.outputs.len())
            .sum();
        writeln!(f, "Number of arcs: {arc_count}")?;

        // Incidence matrix with column widths driven by the longest id.
        let col_width = self
            .transitions
            .iter()
            .map(|t| t.len())
            .chain([3])
            .max()
            .unwrap()
            + 2;
        let row_width = self.places.iter().map(|p| p.len()).max().unwrap_or(0) + 2;
        writeln!(f, "Incidence matrix C:")?;
        write!(f, "{:row_width$}", "")?;
        for transition in &self.transitions {
            write!(f, "{transition:>col_width$}")?;
        }
        writeln!(f)?;
        let incidence = self.incidence();
        for place in &self.places {
            write!(f, "{place:>row_width$}")?;
            for transition in &self.transitions {
                write!(f, "{:>col_width$}", incidence[place][transition])?;
            }
            writeln!(f)?;
        }
        write!(f, "Initial marking: {}", self.initial_marking)
    }
}
