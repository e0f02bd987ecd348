//! Lineage-graph behavior through the public API.

use demograph::{
    AlleleUpdate, DemographyError, EdgeSpec, LineageGraph, PopulationSpec,
};

/// Balanced four-leaf tree: ((a,b)ab,(c,d)cd)root.
fn four_leaf_tree() -> (Vec<PopulationSpec>, Vec<EdgeSpec>) {
    let pops = vec![
        PopulationSpec::named("root"),
        PopulationSpec::named("ab"),
        PopulationSpec::named("cd"),
        PopulationSpec::leaf("a", 2),
        PopulationSpec::leaf("b", 2),
        PopulationSpec::leaf("c", 1),
        PopulationSpec::leaf("d", 3),
    ];
    let edges = vec![
        EdgeSpec::new("root", "ab", 2.0),
        EdgeSpec::new("root", "cd", 2.0),
        EdgeSpec::new("ab", "a", 1.0),
        EdgeSpec::new("ab", "b", 1.0),
        EdgeSpec::new("cd", "c", 1.0),
        EdgeSpec::new("cd", "d", 1.0),
    ];
    (pops, edges)
}

#[test]
fn leaves_subtended_by_root_equals_leaf_set() {
    let (pops, edges) = four_leaf_tree();
    let g = LineageGraph::new(&pops, &edges).unwrap();
    assert_eq!(g.leaves_subtended_by(g.root()), g.leaves());
    assert_eq!(g.leaves().len(), 4);
}

#[test]
fn lineage_counts_accumulate_bottom_up() {
    let (pops, edges) = four_leaf_tree();
    let g = LineageGraph::new(&pops, &edges).unwrap();
    assert_eq!(g.lineage_count_at(g.pop_id("ab").unwrap()), 4);
    assert_eq!(g.lineage_count_at(g.pop_id("cd").unwrap()), 4);
    assert_eq!(g.lineage_count_at(g.root()), 8);
}

#[test]
fn lineage_counts_monotone_along_tree_paths() {
    let (pops, edges) = four_leaf_tree();
    let g = LineageGraph::new(&pops, &edges).unwrap();
    for node in g.populations() {
        for &child in g.children_of(node.id) {
            assert!(g.lineage_count_at(node.id) >= g.lineage_count_at(child));
        }
    }
}

#[test]
fn missing_leaf_lineages_fails_before_any_event_work() {
    let (mut pops, edges) = four_leaf_tree();
    pops[3].lineages = None; // leaf "a"
    let err = LineageGraph::new(&pops, &edges).unwrap_err();
    assert!(matches!(err, DemographyError::Validation(_)));
    assert!(err.to_string().contains('a'));
}

#[test]
fn allele_state_round_trip_with_derived_aggregate() {
    let (pops, edges) = four_leaf_tree();
    let mut g = LineageGraph::new(&pops, &edges).unwrap();

    g.update_allele_state(&[
        ("a".to_string(), AlleleUpdate { derived: 1, ancestral: 1 }),
        ("b".to_string(), AlleleUpdate { derived: 0, ancestral: 2 }),
        ("c".to_string(), AlleleUpdate { derived: 1, ancestral: 0 }),
        ("d".to_string(), AlleleUpdate { derived: 2, ancestral: 1 }),
    ])
    .unwrap();

    assert_eq!(g.derived_count_subtended_by(g.pop_id("ab").unwrap()), 1);
    assert_eq!(g.derived_count_subtended_by(g.pop_id("cd").unwrap()), 3);
    assert_eq!(g.derived_count_subtended_by(g.root()), 4);

    // A second configuration over the same topology.
    g.update_allele_state(&[
        ("a".to_string(), AlleleUpdate { derived: 2, ancestral: 0 }),
        ("c".to_string(), AlleleUpdate { derived: 0, ancestral: 1 }),
    ])
    .unwrap();
    assert_eq!(g.derived_count_subtended_by(g.root()), 4);
}

#[test]
fn failed_update_preserves_topology_caches() {
    let (pops, edges) = four_leaf_tree();
    let mut g = LineageGraph::new(&pops, &edges).unwrap();
    let subtended_before = g.leaves_subtended_by(g.root()).clone();

    let err = g
        .update_allele_state(&[("a".to_string(), AlleleUpdate { derived: 9, ancestral: 9 })])
        .unwrap_err();
    assert!(matches!(err, DemographyError::Consistency(_)));

    assert_eq!(g.leaves_subtended_by(g.root()), &subtended_before);
    assert_eq!(g.derived_count_subtended_by(g.root()), 0);
}
