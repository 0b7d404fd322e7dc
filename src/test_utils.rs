//! Small, well-understood example nets used across the test suite.
//!
//! Each builder documents the full reachability graph of its net, so the
//! expected results of the analyses can be read off directly.

use crate::petri_net::PetriNet;

/// A linear chain `p1 -> t1 -> p2 -> t2 -> p3` with `p1` marked.
///
/// Reachable markings: `{p1}`, `{p2}`, `{p3}`. The single deadlock is
/// `{p3}`.
pub fn chain_net() -> PetriNet {
    let mut net = PetriNet::new();
    net.add_place("p1", true, None).unwrap();
    net.add_place("p2", false, None).unwrap();
    net.add_place("p3", false, None).unwrap();
    net.add_transition("t1", None).unwrap();
    net.add_transition("t2", None).unwrap();
    net.add_arc("p1", "t1").unwrap();
    net.add_arc("t1", "p2").unwrap();
    net.add_arc("p2", "t2").unwrap();
    net.add_arc("t2", "p3").unwrap();
    net
}

/// A two-place cycle `p1 -> t1 -> p2 -> t2 -> p1` with `p1` marked.
///
/// Reachable markings: `{p1}`, `{p2}`; the token circulates forever, so
/// there is no deadlock.
pub fn cycle_net() -> PetriNet {
    let mut net = PetriNet::new();
    net.add_place("p1", true, None).unwrap();
    net.add_place("p2", false, None).unwrap();
    net.add_transition("t1", None).unwrap();
    net.add_transition("t2", None).unwrap();
    net.add_arc("p1", "t1").unwrap();
    net.add_arc("t1", "p2").unwrap();
    net.add_arc("p2", "t2").unwrap();
    net.add_arc("t2", "p1").unwrap();
    net
}

/// A free choice `p2 <- t1 <- p1 -> t2 -> p3` with `p1` marked.
///
/// Reachable markings: `{p1}`, `{p2}`, `{p3}`; both branch outcomes are
/// deadlocks.
pub fn choice_net() -> PetriNet {
    let mut net = PetriNet::new();
    net.add_place("p1", true, None).unwrap();
    net.add_place("p2", false, None).unwrap();
    net.add_place("p3", false, None).unwrap();
    net.add_transition("t1", None).unwrap();
    net.add_transition("t2", None).unwrap();
    net.add_arc("p1", "t1").unwrap();
    net.add_arc("t1", "p2").unwrap();
    net.add_arc("p1", "t2").unwrap();
    net.add_arc("t2", "p3").unwrap();
    net
}

/// A fork `p1 -> t1 -> {p2, p3}` with `p1` marked.
///
/// Reachable markings: `{p1}` and `{p2, p3}`; the latter is a deadlock.
pub fn fork_net() -> PetriNet {
    let mut net = PetriNet::new();
    net.add_place("p1", true, None).unwrap();
    net.add_place("p2", false, None).unwrap();
    net.add_place("p3", false, None).unwrap();
    net.add_transition("t1", None).unwrap();
    net.add_arc("p1", "t1").unwrap();
    net.add_arc("t1", "p2").unwrap();
    net.add_arc("t1", "p3").unwrap();
    net
}

/// A single place with a self-loop transition `t: p -> p`, `p` marked.
///
/// The only reachable marking is `{p}` and `t` stays enabled in it, so
/// the net is deadlock-free.
pub fn self_loop_net() -> PetriNet {
    let mut net = PetriNet::new();
    net.add_place("p", true, None).unwrap();
    net.add_transition("t", None).unwrap();
    net.add_arc("p", "t").unwrap();
    net.add_arc("t", "p").unwrap();
    net
}

/// `n` disjoint pairs `a_i -> t_i -> b_i`, every `a_i` marked.
///
/// The pairs evolve independently, so exactly `2^n` markings are
/// reachable. Useful for checking symbolic state counts against the
/// explicit oracle.
pub fn independent_pairs_net(n: usize) -> PetriNet {
    let mut net = PetriNet::new();
    for i in 0..n {
        let a = format!("a{i:02}");
        let b = format!("b{i:02}");
        let t = format!("t{i:02}");
        net.add_place(&a, true, None).unwrap();
        net.add_place(&b, false, None).unwrap();
        net.add_transition(&t, None).unwrap();
        net.add_arc(&a, &t).unwrap();
        net.add_arc(&t, &b).unwrap();
    }
    net
}
