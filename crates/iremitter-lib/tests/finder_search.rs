//! End-to-end tests of the driver search engine against a scripted UVC
//! device and probe: enumeration order, per-pair budgets, restoration,
//! and the fatal short-circuit paths.

use std::sync::atomic::AtomicBool;

use iremitter_lib::driver::Driver;
use iremitter_lib::probe::mock::ScriptProbe;
use iremitter_lib::probe::{self, EmitterProbe, ProbeError};
use iremitter_lib::search::{Finder, SearchError};
use iremitter_lib::uvc;
use iremitter_lib::uvc::mock::{MockControl, MockUvc};

const DEVICE: &str = "/dev/video0";

fn control(current: &[u8], maximum: &[u8], resolution: Option<&[u8]>) -> MockControl {
    MockControl::new(
        current.to_vec(),
        maximum.to_vec(),
        resolution.map(|r| r.to_vec()),
    )
}

#[test]
fn worked_example_confirms_first_candidate() {
    // One unit, selector 9: size 2, current [0,0], maximum [3,3],
    // resolution [2,1]. The probe confirms the first applied candidate.
    let uvc = MockUvc::new();
    uvc.add_control(4, 9, control(&[0, 0], &[3, 3], Some(&[2, 1])));
    let mut probe = ScriptProbe::new(vec![false, true]); // pre-check, candidate 1

    let mut finder = Finder::new(DEVICE, &uvc, &mut probe, vec![4], 40);
    let driver = finder.find().unwrap();

    assert_eq!(driver, Driver::new(DEVICE, 4, 9, vec![2, 1]));
    // Exactly one applied candidate after the writability round-trip; the
    // winning pair keeps its winning value.
    assert_eq!(uvc.sets_for(4, 9), vec![vec![0, 0], vec![2, 1]]);
    assert_eq!(*probe.calls.borrow(), 2);
}

#[test]
fn enumeration_order_is_deterministic() {
    let run = || {
        let uvc = MockUvc::new();
        uvc.add_control(4, 9, control(&[0], &[5], Some(&[1])));
        uvc.add_control(12, 3, control(&[0], &[5], Some(&[1])));
        let mut probe = ScriptProbe::new(vec![false, false, false, true]);
        let mut finder = Finder::new(DEVICE, &uvc, &mut probe, vec![12, 4], 2);
        let result = finder.find();
        (uvc.length_queries.borrow().clone(), result)
    };

    let (order_a, result_a) = run();
    let (order_b, result_b) = run();
    assert_eq!(order_a, order_b);
    assert_eq!(result_a.unwrap(), result_b.unwrap());
}

#[test]
fn units_are_visited_ascending_and_deduplicated() {
    let uvc = MockUvc::new();
    uvc.add_control(12, 0, control(&[0], &[5], Some(&[1])));
    let mut probe = ScriptProbe::new(vec![false, true]);

    // Passed out of order with a duplicate.
    let mut finder = Finder::new(DEVICE, &uvc, &mut probe, vec![12, 4, 4], 40);
    let driver = finder.find().unwrap();
    assert_eq!(driver.unit, 12);

    let queries = uvc.length_queries.borrow();
    // All 256 unit-4 selectors come first, then unit 12 starts.
    assert_eq!(queries.len(), 257);
    assert!(queries[..256].iter().all(|&(u, _)| u == 4));
    assert_eq!(queries[256], (12, 0));
}

#[test]
fn first_success_stops_all_further_exploration() {
    let uvc = MockUvc::new();
    uvc.add_control(4, 9, control(&[0], &[5], Some(&[1])));
    uvc.add_control(4, 10, control(&[0], &[5], Some(&[1])));
    let mut probe = ScriptProbe::new(vec![false, true]);

    let mut finder = Finder::new(DEVICE, &uvc, &mut probe, vec![4], 40);
    let driver = finder.find().unwrap();

    assert_eq!((driver.unit, driver.selector), (4, 9));
    // Selector 10 was never touched.
    assert!(!uvc.length_queries.borrow().contains(&(4, 10)));
    assert!(uvc.sets_for(4, 10).is_empty());
    // The last applied control is the returned one.
    assert_eq!(
        uvc.set_calls.borrow().last().map(|(_, _, v)| v.clone()),
        Some(driver.control)
    );
}

#[test]
fn negative_limit_abandons_pair_after_exactly_k_candidates() {
    let uvc = MockUvc::new();
    uvc.add_control(4, 9, control(&[0], &[10], Some(&[1])));
    // Pre-check no, then the script runs dry: every candidate answers no.
    let mut probe = ScriptProbe::new(vec![false]);

    let mut finder = Finder::new(DEVICE, &uvc, &mut probe, vec![4], 3);
    let err = finder.find().unwrap_err();
    assert!(matches!(err, SearchError::NotFound));

    // Round-trip, exactly 3 candidates, one restoration.
    assert_eq!(
        uvc.sets_for(4, 9),
        vec![vec![0], vec![1], vec![2], vec![3], vec![0]]
    );
    assert_eq!(*probe.calls.borrow(), 1 + 3);
}

#[test]
fn first_step_overflow_yields_no_candidates() {
    // current + resolution exceeds maximum immediately: nothing beyond the
    // writability round-trip is applied.
    let uvc = MockUvc::new();
    uvc.add_control(4, 9, control(&[2], &[3], Some(&[2])));
    let mut probe = ScriptProbe::new(vec![false]);

    let mut finder = Finder::new(DEVICE, &uvc, &mut probe, vec![4], 40);
    assert!(matches!(finder.find(), Err(SearchError::NotFound)));

    assert_eq!(uvc.sets_for(4, 9), vec![vec![2], vec![2]]);
    assert_eq!(*probe.calls.borrow(), 1); // pre-check only
}

#[test]
fn losing_pair_is_restored_once_and_winner_is_not() {
    let uvc = MockUvc::new();
    // Selector 9 has a single candidate that fails; selector 10 wins.
    uvc.add_control(4, 9, control(&[0], &[1], Some(&[1])));
    uvc.add_control(4, 10, control(&[0], &[3], Some(&[1])));
    let mut probe = ScriptProbe::new(vec![false, false, true]);

    let mut finder = Finder::new(DEVICE, &uvc, &mut probe, vec![4], 40);
    let driver = finder.find().unwrap();
    assert_eq!((driver.unit, driver.selector), (4, 10));

    // Losing pair: round-trip, one candidate, one restoration.
    assert_eq!(uvc.sets_for(4, 9), vec![vec![0], vec![1], vec![0]]);
    // Winning pair: round-trip and the winning write, nothing after.
    assert_eq!(uvc.sets_for(4, 10), vec![vec![0], vec![1]]);
}

#[test]
fn resolution_fallback_steps_only_differing_bytes() {
    // No resolution query: the substitute step is 1 where current and
    // maximum differ, 0 elsewhere.
    let uvc = MockUvc::new();
    uvc.add_control(4, 9, control(&[0, 2], &[2, 2], None));
    let mut probe = ScriptProbe::new(vec![false]);

    let mut finder = Finder::new(DEVICE, &uvc, &mut probe, vec![4], 40);
    assert!(matches!(finder.find(), Err(SearchError::NotFound)));

    assert_eq!(
        uvc.sets_for(4, 9),
        vec![vec![0, 2], vec![1, 2], vec![2, 2], vec![0, 2]]
    );
}

#[test]
fn current_equal_to_maximum_is_not_a_candidate() {
    let uvc = MockUvc::new();
    uvc.add_control(4, 9, control(&[3, 3], &[3, 3], Some(&[1, 1])));
    let mut probe = ScriptProbe::new(vec![false]);

    let mut finder = Finder::new(DEVICE, &uvc, &mut probe, vec![4], 40);
    assert!(matches!(finder.find(), Err(SearchError::NotFound)));

    // Only the writability round-trip; the pair was never moved, so there
    // is nothing to restore.
    assert_eq!(uvc.sets_for(4, 9), vec![vec![3, 3]]);
}

#[test]
fn read_only_control_is_skipped() {
    let uvc = MockUvc::new();
    let mut read_only = control(&[0], &[5], Some(&[1]));
    read_only.writable = false;
    uvc.add_control(4, 9, read_only);
    let mut probe = ScriptProbe::new(vec![false]);

    let mut finder = Finder::new(DEVICE, &uvc, &mut probe, vec![4], 40);
    assert!(matches!(finder.find(), Err(SearchError::NotFound)));
    assert!(uvc.sets_for(4, 9).is_empty());
    assert_eq!(*probe.calls.borrow(), 1);
}

#[test]
fn zero_size_control_is_skipped() {
    let uvc = MockUvc::new();
    uvc.add_control(4, 9, control(&[], &[], Some(&[])));
    let mut probe = ScriptProbe::new(vec![false]);

    let mut finder = Finder::new(DEVICE, &uvc, &mut probe, vec![4], 40);
    assert!(matches!(finder.find(), Err(SearchError::NotFound)));
    assert!(uvc.sets_for(4, 9).is_empty());
}

#[test]
fn vanished_device_short_circuits_enumeration() {
    let uvc = MockUvc::new();
    let mut gone = control(&[0], &[5], Some(&[1]));
    gone.unavailable = true;
    uvc.add_control(4, 9, gone);
    uvc.add_control(5, 0, control(&[0], &[5], Some(&[1])));
    let mut probe = ScriptProbe::new(vec![false]);

    let mut finder = Finder::new(DEVICE, &uvc, &mut probe, vec![4, 5], 40);
    let err = finder.find().unwrap_err();
    let SearchError::DeviceUnavailable { pair, .. } = err else {
        panic!("expected DeviceUnavailable, got {err:?}");
    };
    assert_eq!(pair, Some((4, 9)));

    // Enumeration stopped at the failing pair: unit 5 was never visited.
    let queries = uvc.length_queries.borrow();
    assert_eq!(queries.last(), Some(&(4, 9)));
    assert!(!queries.iter().any(|&(u, _)| u == 5));
}

#[test]
fn probe_failure_during_precheck_is_fatal_before_any_query() {
    struct FailingProbe;
    impl EmitterProbe for FailingProbe {
        fn probe(
            &mut self,
            _apply: &mut dyn FnMut() -> uvc::Result<()>,
        ) -> probe::Result<bool> {
            Err(ProbeError::Unavailable("stream died".into()))
        }
    }

    let uvc = MockUvc::new();
    uvc.add_control(4, 9, control(&[0], &[5], Some(&[1])));
    let mut probe = FailingProbe;

    let mut finder = Finder::new(DEVICE, &uvc, &mut probe, vec![4], 40);
    let err = finder.find().unwrap_err();
    assert!(matches!(
        err,
        SearchError::DeviceUnavailable { pair: None, .. }
    ));
    assert!(uvc.length_queries.borrow().is_empty());
}

#[test]
fn positive_precheck_returns_already_exists_without_queries() {
    let uvc = MockUvc::new();
    uvc.add_control(4, 9, control(&[0], &[5], Some(&[1])));
    let mut probe = ScriptProbe::new(vec![true]);

    let mut finder = Finder::new(DEVICE, &uvc, &mut probe, vec![4], 40);
    assert!(matches!(
        finder.find(),
        Err(SearchError::DriverAlreadyExists)
    ));
    assert!(uvc.length_queries.borrow().is_empty());
    assert!(uvc.set_calls.borrow().is_empty());
}

#[test]
fn excluded_pairs_are_never_touched() {
    let uvc = MockUvc::new();
    uvc.add_control(4, 9, control(&[0], &[5], Some(&[1])));
    uvc.add_control(4, 10, control(&[0], &[5], Some(&[1])));
    let mut probe = ScriptProbe::new(vec![false, true]);

    let mut finder =
        Finder::new(DEVICE, &uvc, &mut probe, vec![4], 40).exclude(vec![(4, 9)]);
    let driver = finder.find().unwrap();

    assert_eq!((driver.unit, driver.selector), (4, 10));
    assert!(!uvc.length_queries.borrow().contains(&(4, 9)));
    assert!(uvc.sets_for(4, 9).is_empty());
}

#[test]
fn cleared_running_flag_interrupts_and_restores() {
    let uvc = MockUvc::new();
    uvc.add_control(4, 9, control(&[0], &[5], Some(&[1])));
    let mut probe = ScriptProbe::new(vec![false]);
    let running = AtomicBool::new(false);

    let mut finder =
        Finder::new(DEVICE, &uvc, &mut probe, vec![4], 40).running_flag(&running);
    assert!(matches!(finder.find(), Err(SearchError::Interrupted)));

    // The pair under walk was restored before bailing out.
    assert_eq!(uvc.sets_for(4, 9), vec![vec![0], vec![0]]);
    assert_eq!(*probe.calls.borrow(), 1); // pre-check only
}

#[test]
fn empty_unit_list_exhausts_immediately() {
    let uvc = MockUvc::new();
    let mut probe = ScriptProbe::new(vec![false]);

    let mut finder = Finder::new(DEVICE, &uvc, &mut probe, vec![], 40);
    assert!(matches!(finder.find(), Err(SearchError::NotFound)));
    assert!(uvc.length_queries.borrow().is_empty());
}
