use super::common::*;
use crate::{envelope::Transition, settings::SearchSettings, state::SearchState, Address};

////////////////////////////////////////////////////////////////////////////////

#[test]
fn initial_state_collects_init_emissions() {
    let settings = SearchSettings::default();
    let state = ab_system(&settings);

    assert_eq!(state.depth(), 0);
    assert!(state.previous().is_none());
    assert!(state.transition().is_none());
    assert!(state.error().is_none());

    let network: Vec<_> = state.network().cloned().collect();
    assert_eq!(network, vec![msg_env("a", "b", &Msg::Foo)]);
    assert_eq!(state.new_messages().count(), 1);
}

#[test]
fn delivery_keeps_envelope_in_network() {
    let settings = SearchSettings::default();
    let state = ab_system(&settings);

    let s1 = state
        .step_message(&msg_env("a", "b", &Msg::Foo), &settings, false)
        .unwrap();
    assert_eq!(s1.depth(), 1);
    assert_eq!(s1.network().count(), 3);
    assert!(s1.network().any(|m| *m == msg_env("a", "b", &Msg::Foo)));

    // redelivery of the same envelope stays legal and changes nothing
    let s2 = s1
        .step_message(&msg_env("a", "b", &Msg::Foo), &settings, false)
        .unwrap();
    assert_eq!(s2.depth(), 2);
    assert_eq!(s2, s1);
    assert_eq!(s2.hash(), s1.hash());
}

#[test]
fn stepping_leaves_predecessor_untouched() {
    let settings = SearchSettings::default();
    let state = ab_system(&settings);

    let s1 = state
        .step_message(&msg_env("a", "b", &Msg::Foo), &settings, false)
        .unwrap();
    let s2 = s1
        .step_message(&msg_env("b", "a", &Msg::Bar), &settings, false)
        .unwrap();

    assert!(foo_flag(&s2));
    assert!(!foo_flag(&s1));
    assert!(!foo_flag(s2.previous().unwrap()));
    assert_eq!(state.network().count(), 1);
}

#[test]
fn illegal_steps_return_none() {
    let settings = SearchSettings::default();
    let state = ab_system(&settings);

    // not in the network
    assert!(state
        .step_message(&msg_env("b", "a", &Msg::Bar), &settings, false)
        .is_none());
    // recipient does not exist, even without checks
    assert!(state
        .step_message(&msg_env("a", "c", &Msg::Foo), &settings, true)
        .is_none());
    // delivery policy forbids it
    let blocked = settings
        .clone()
        .link_active(Address::from("a"), Address::from("b"), false);
    assert!(state
        .step_message(&msg_env("a", "b", &Msg::Foo), &blocked, false)
        .is_none());
}

#[test]
fn handler_error_is_captured_on_successor() {
    let settings = SearchSettings::default();
    let state = ab_system(&settings);

    let s1 = state
        .step_message(&msg_env("a", "b", &Msg::Foo), &settings, false)
        .unwrap();
    assert!(s1.error().is_none());

    let s2 = s1
        .step_message(&msg_env("b", "a", &Msg::Foo), &settings, false)
        .unwrap();
    let error = s2.error().unwrap();
    assert_eq!(error.kind, "unexpected-message");
}

#[test]
fn transitions_enumerate_legal_deliveries() {
    let settings = SearchSettings::default();
    let state = ab_system(&settings);

    let transitions = state.transitions(&settings);
    assert_eq!(transitions.len(), 1);
    assert!(transitions[0].is_message());

    // cutting the only link empties the menu
    let blocked = settings
        .clone()
        .link_active(Address::from("a"), Address::from("b"), false);
    assert!(state.transitions(&blocked).is_empty());
}

#[test]
fn timer_ordering_is_enforced_across_steps() {
    let settings = SearchSettings::default();
    let addr = Address::from("t");
    let state = timer_system(&settings);

    let queue = state.timers(&addr).unwrap();
    assert_eq!(queue.len(), 2);

    // only t1 may fire first
    let transitions = state.transitions(&settings);
    assert_eq!(transitions.len(), 1);
    let Transition::Timer(t1) = &transitions[0] else {
        panic!("expected a timer transition");
    };
    assert_eq!(t1.timer(), "t1");

    let t2 = queue.iter().find(|t| t.timer() == "t2").unwrap().clone();
    assert!(!state.can_step_timer(&t2, &settings));
    assert!(state.step_timer(&t2, &settings, false).is_none());

    let s1 = state.step_timer(t1, &settings, false).unwrap();
    assert_eq!(fired_timers(&s1), vec!["t1".to_owned()]);
    assert_eq!(s1.timers(&addr).unwrap().len(), 1);

    // t2 unblocks once t1 fired
    assert!(s1.can_step_timer(&t2, &settings));
    let s2 = s1.step_timer(&t2, &settings, false).unwrap();
    assert_eq!(fired_timers(&s2), vec!["t1".to_owned(), "t2".to_owned()]);
    assert!(s2.timers(&addr).unwrap().is_empty());
    assert!(s2.transitions(&settings).is_empty());
}

#[test]
fn timer_delivery_respects_policy() {
    let settings = SearchSettings::default().deliver_timers(false);
    let state = timer_system(&settings);
    assert!(state.transitions(&settings).is_empty());

    let enabled = settings.deliver_timers_at(Address::from("t"), true);
    assert_eq!(state.transitions(&enabled).len(), 1);
}

#[test]
fn replay_reproduces_fingerprints() {
    let settings = SearchSettings::default();
    let state = ab_system(&settings);

    let run = |state: &SearchState| {
        let mut cur = state.clone();
        for _ in 0..3 {
            let transition = cur.transitions(&settings).into_iter().next().unwrap();
            cur = cur.step(&transition, &settings, false).unwrap();
        }
        cur
    };

    let once = run(&state);
    let twice = run(&state);
    assert_eq!(once.hash(), twice.hash());
    assert_eq!(once, twice);
}

#[test]
fn trace_walks_back_to_initial() {
    let settings = SearchSettings::default();
    let state = ab_system(&settings);

    let s1 = state
        .step_message(&msg_env("a", "b", &Msg::Foo), &settings, false)
        .unwrap();
    let s2 = s1
        .step_message(&msg_env("b", "a", &Msg::Bar), &settings, false)
        .unwrap();

    let trace = s2.trace();
    assert_eq!(trace.len(), 3);
    assert!(trace[0].transition().is_none());
    assert_eq!(trace[2].depth(), 2);
    assert_eq!(s2.format_trace().lines().count(), 2);
}

#[test]
fn exceptional_state_dedups_apart_from_clean_twin() {
    let settings = SearchSettings::default();
    let state = ab_system(&settings);

    let s1 = state
        .step_message(&msg_env("a", "b", &Msg::Foo), &settings, false)
        .unwrap();
    let crashed = s1
        .step_message(&msg_env("b", "a", &Msg::Foo), &settings, false)
        .unwrap();

    // the failing handler never mutated the node, so the configurations
    // agree but the search fingerprints must not
    assert_eq!(crashed.hash(), s1.hash());
    assert_ne!(crashed.search_hash(), s1.search_hash());
}
