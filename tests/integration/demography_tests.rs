//! End-to-end behavior of the assembled demographic model.

use demograph::{
    build_demography, AlleleUpdate, DemographyError, EdgeSpec, EventType, ModelKind,
    PopulationSpec, RawEvent, SizeHistory,
};

fn history() -> (Vec<PopulationSpec>, Vec<EdgeSpec>, Vec<RawEvent>) {
    let mut c = PopulationSpec::leaf("c", 1);
    c.effective_size = Some(0.5);
    let pops = vec![
        PopulationSpec::named("root"),
        PopulationSpec::named("ab"),
        PopulationSpec::leaf("a", 2),
        PopulationSpec::leaf("b", 2),
        c,
    ];
    let edges = vec![
        EdgeSpec::new("root", "ab", 2.0),
        EdgeSpec::new("root", "c", 3.0),
        EdgeSpec::new("ab", "a", 1.0),
        EdgeSpec::new("ab", "b", 1.0),
    ];
    let events = vec![
        RawEvent::merge("ab", "a", "b"),
        RawEvent::merge("root", "ab", "c"),
    ];
    (pops, edges, events)
}

#[test]
fn full_pipeline_builds_and_exposes_consumption_surface() {
    let (pops, edges, events) = history();
    let d = build_demography(&pops, &edges, &events).unwrap();

    assert_eq!(d.graph().name(d.root()), "root");
    assert_eq!(d.leaves().len(), 3);
    assert_eq!(d.lineage_count_at(d.root()), 5);
    assert_eq!(d.event_type(d.root_event()), Some(EventType::MergeClusters));
    assert_eq!(d.sub_pops(d.root_event()).unwrap().len(), 1);
    assert!(d.admixture_events().next().is_none());
}

#[test]
fn size_histories_cover_every_population() {
    let (pops, edges, events) = history();
    let d = build_demography(&pops, &edges, &events).unwrap();

    let c = d.population("c").unwrap();
    assert_eq!(
        c.size_history,
        SizeHistory::constant_truncated(0.5, 3.0, 1).unwrap()
    );

    let ab = d.population("ab").unwrap();
    assert_eq!(ab.size_history.tau(), 2.0);
    assert_eq!(ab.size_history.n_max(), 4);

    let root = d.population("root").unwrap();
    assert!(root.size_history.is_unbounded());
    assert_eq!(root.size_history.n_max(), 5);
}

#[test]
fn unsupported_model_tag_fails_at_construction() {
    let (mut pops, edges, events) = history();
    pops[1].model = Some("piecewise-exponential".to_string());
    let err = build_demography(&pops, &edges, &events).unwrap_err();
    assert!(matches!(err, DemographyError::UnsupportedModel(_)));
    // The tag resolver itself is the closed dispatch point.
    assert!(ModelKind::from_tag(Some("piecewise-exponential")).is_err());
}

#[test]
fn allele_updates_flow_through_the_facade() {
    let (pops, edges, events) = history();
    let mut d = build_demography(&pops, &edges, &events).unwrap();

    d.update_allele_state(&[
        ("a".to_string(), AlleleUpdate { derived: 1, ancestral: 1 }),
        ("b".to_string(), AlleleUpdate { derived: 2, ancestral: 0 }),
        ("c".to_string(), AlleleUpdate { derived: 0, ancestral: 1 }),
    ])
    .unwrap();
    assert_eq!(d.derived_count_subtended_by(d.root()), 3);

    let err = d
        .update_allele_state(&[("c".to_string(), AlleleUpdate { derived: 2, ancestral: 2 })])
        .unwrap_err();
    assert!(matches!(err, DemographyError::Consistency(_)));
    // Previous state still in force.
    assert_eq!(d.derived_count_subtended_by(d.root()), 3);
}

#[test]
fn leaf_validation_precedes_event_tree_work() {
    let (mut pops, edges, _) = history();
    pops[2].lineages = None; // leaf "a"
    // The event list is also malformed, but the leaf check fires first.
    let err = build_demography(&pops, &edges, &[]).unwrap_err();
    assert!(matches!(err, DemographyError::Validation(_)));
}
