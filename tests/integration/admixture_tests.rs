//! Admixture tensor behavior through the public API.

use std::sync::Arc;

use approx::assert_relative_eq;
use demograph::{
    build_demography, Demography, DemographyError, DemographyOptions, EdgeSpec,
    PopulationSpec, RawEvent,
};

/// Leaf x with `n` lineages admixes into p and q, which merge into root.
fn admixture_history(n: u32, p1: f64, p2: f64) -> Result<Demography, DemographyError> {
    let pops = vec![
        PopulationSpec::named("root"),
        PopulationSpec::named("p"),
        PopulationSpec::named("q"),
        PopulationSpec::leaf("x", n),
    ];
    let edges = vec![
        EdgeSpec::new("root", "p", 1.0),
        EdgeSpec::new("root", "q", 1.0),
        EdgeSpec::new("p", "x", 0.5),
        EdgeSpec::new("q", "x", 0.5),
    ];
    let events = vec![
        RawEvent::admixture("x", "p", p1, "q", p2),
        RawEvent::merge("root", "p", "q"),
    ];
    build_demography(&pops, &edges, &events)
}

#[test]
fn tensor_shape_tracks_lineage_count() {
    for n in 1..=5u32 {
        let d = admixture_history(n, 0.5, 0.5).unwrap();
        let ev = d.admixture_events().next().unwrap().id;
        let t = d.admixture_probability(ev).unwrap();
        let expect = (n + 1) as usize;
        assert_eq!(t.probs.shape(), &[expect, expect, expect]);
        assert_eq!(t.lineage_count() as u32, n);
    }
}

#[test]
fn single_lineage_fully_assigned_to_first_parent() {
    let d = admixture_history(1, 1.0, 0.0).unwrap();
    let ev = d.admixture_events().next().unwrap().id;
    let t = d.admixture_probability(ev).unwrap();

    assert_eq!(d.graph().name(t.parent1), "p");
    assert_eq!(d.graph().name(t.parent2), "q");
    // The child's derived count is mirrored in parent 1; parent 2 receives
    // no lineages so its axis is unconstrained.
    for d2 in 0..=1 {
        assert_relative_eq!(t.probs[[0, 0, d2]], 1.0);
        assert_relative_eq!(t.probs[[1, 1, d2]], 1.0);
        assert_relative_eq!(t.probs[[1, 0, d2]], 0.0);
        assert_relative_eq!(t.probs[[0, 1, d2]], 0.0);
    }
}

#[test]
fn even_two_lineage_split_concentrates_quarter_mass() {
    let d = admixture_history(2, 0.5, 0.5).unwrap();
    let ev = d.admixture_events().next().unwrap().id;
    let t = d.admixture_probability(ev).unwrap();

    assert_relative_eq!(t.probs[[2, 0, 2]], 0.25);
    assert_relative_eq!(t.probs[[0, 2, 0]], 0.25);
    for d1 in 0..=2 {
        for d2 in 0..=2 {
            let s: f64 = (0..=2).map(|c| t.probs[[c, d1, d2]]).sum();
            assert_relative_eq!(s, 1.0, epsilon = 1e-12);
        }
    }
}

#[test]
fn probability_sum_precondition_is_fail_fast() {
    let d = admixture_history(30, 0.5, 0.3).unwrap();
    let ev = d.admixture_events().next().unwrap().id;
    let err = d.admixture_probability(ev).unwrap_err();
    assert!(matches!(err, DemographyError::Validation(_)));
    assert!(err.to_string().contains("sum to 1"));
}

#[test]
fn epsilon_option_reaches_the_mixer() {
    let pops = vec![
        PopulationSpec::named("root"),
        PopulationSpec::named("p"),
        PopulationSpec::named("q"),
        PopulationSpec::leaf("x", 2),
    ];
    let edges = vec![
        EdgeSpec::new("root", "p", 1.0),
        EdgeSpec::new("root", "q", 1.0),
        EdgeSpec::new("p", "x", 0.5),
        EdgeSpec::new("q", "x", 0.5),
    ];
    let events = vec![
        RawEvent::admixture("x", "p", 0.5, "q", 0.5 + 1e-7),
        RawEvent::merge("root", "p", "q"),
    ];

    let strict = build_demography(&pops, &edges, &events).unwrap();
    let ev = strict.admixture_events().next().unwrap().id;
    assert!(strict.admixture_probability(ev).is_err());

    let lenient = Demography::with_options(
        &pops,
        &edges,
        &events,
        DemographyOptions {
            prob_epsilon: 1e-6,
            ..DemographyOptions::default()
        },
    )
    .unwrap();
    let ev = lenient.admixture_events().next().unwrap().id;
    assert!(lenient.admixture_probability(ev).is_ok());
}

#[test]
fn repeated_evaluation_reuses_the_memoized_tensor() {
    let d = admixture_history(4, 0.3, 0.7).unwrap();
    let ev = d.admixture_events().next().unwrap().id;
    let a = d.admixture_probability(ev).unwrap();
    let b = d.admixture_probability(ev).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn two_admixture_events_with_equal_n_share_kernel_work() {
    // Two independent admixed leaves; the per-n kernel is computed once and
    // both tensors must come out exactly as if computed in isolation.
    let pops = vec![
        PopulationSpec::named("root"),
        PopulationSpec::named("s"),
        PopulationSpec::named("t"),
        PopulationSpec::named("p1"),
        PopulationSpec::named("q1"),
        PopulationSpec::named("p2"),
        PopulationSpec::named("q2"),
        PopulationSpec::leaf("x", 3),
        PopulationSpec::leaf("y", 3),
    ];
    let edges = vec![
        EdgeSpec::new("root", "s", 1.0),
        EdgeSpec::new("root", "t", 1.0),
        EdgeSpec::new("s", "p1", 1.0),
        EdgeSpec::new("s", "q1", 1.0),
        EdgeSpec::new("t", "p2", 1.0),
        EdgeSpec::new("t", "q2", 1.0),
        EdgeSpec::new("p1", "x", 0.5),
        EdgeSpec::new("q1", "x", 0.5),
        EdgeSpec::new("p2", "y", 0.5),
        EdgeSpec::new("q2", "y", 0.5),
    ];
    let events = vec![
        RawEvent::admixture("x", "p1", 0.2, "q1", 0.8),
        RawEvent::admixture("y", "p2", 0.6, "q2", 0.4),
        RawEvent::merge("s", "p1", "q1"),
        RawEvent::merge("t", "p2", "q2"),
        RawEvent::merge("root", "s", "t"),
    ];
    let d = build_demography(&pops, &edges, &events).unwrap();

    let batch = d.admixture_probabilities().unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(d.graph().name(batch[0].child), "x");
    assert_eq!(d.graph().name(batch[1].child), "y");

    let solo = admixture_history(3, 0.2, 0.8).unwrap();
    let solo_t = solo
        .admixture_probability(solo.admixture_events().next().unwrap().id)
        .unwrap();
    assert_eq!(batch[0].probs, solo_t.probs);
}
