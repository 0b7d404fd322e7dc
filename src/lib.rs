//! Analysis of 1-safe Petri nets: symbolic reachability, hybrid deadlock
//! detection and linear-objective optimization over the reachable state
//! space, using Binary Decision Diagrams (BDDs) as the underlying
//! representation.
//!
//! # Main Modules
//!
//! - [`petri_net`] / [`marking`]: the net data model (places, transitions,
//!   flow relation, enabling and firing).
//! - [`symbolic`]: the BDD reachability engine (transition relation,
//!   post-image, fixpoint).
//! - [`explicit`]: breadth-first reachability, kept as a cross-validation
//!   oracle for the symbolic engine.
//! - [`deadlock`]: ILP candidate generation over the state equation,
//!   filtered by symbolic reachability and driven by no-good cuts.
//! - [`optimize`]: branch-and-bound maximization of a weighted token sum
//!   over the reachable set.
//! - [`xml_parsing`]: PNML input (1-safe subset).
//!
//! # Quick Start
//!
//! ```
//! use petri_net_analysis::{
//!     CancellationToken, DeadlockDetector, Marking, PetriNet, SymbolicReachability,
//! };
//!
//! // p1 -> t1 -> p2: a token that moves one step and stops.
//! let mut net = PetriNet::new();
//! net.add_place("p1", true, None).unwrap();
//! net.add_place("p2", false, None).unwrap();
//! net.add_transition("t1", None).unwrap();
//! net.add_arc("p1", "t1").unwrap();
//! net.add_arc("t1", "p2").unwrap();
//!
//! let mut engine = SymbolicReachability::new(&net);
//! engine
//!     .compute_reachability(net.initial_marking(), &CancellationToken::new())
//!     .unwrap();
//! assert!(engine.is_reachable(&Marking::from_marked(["p2"])).unwrap());
//!
//! let detector = DeadlockDetector::new(&net, &engine);
//! let deadlock = detector.detect(&CancellationToken::new()).unwrap();
//! assert_eq!(deadlock, Some(Marking::from_marked(["p2"])));
//! ```

pub mod cancellation;
pub mod deadlock;
pub mod error;
pub mod explicit;
pub mod marking;
pub mod optimize;
pub mod petri_net;
pub mod symbolic;
pub mod test_utils;
pub mod xml_parsing;

pub use cancellation::CancellationToken;
pub use deadlock::DeadlockDetector;
pub use error::AnalysisError;
pub use marking::Marking;
pub use optimize::{MarkingOptimizer, OptimizeMode, Optimum};
pub use petri_net::PetriNet;
pub use symbolic::{SymbolicContext, SymbolicReachability};
