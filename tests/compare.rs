mod common;

use covagg::artifact::ArtifactPatterns;
use covagg::cli::{cmd_compare, Workspace};
use covagg::compare::{compare, Level, VariantPair};
use covagg::sink::CsvDirSink;

fn seed() -> common::Store {
    let store = common::Store::new();
    store.function("alpha", "P1", "a_cpp", "f1", (0.0, 0.0), (50.0, 40.0));
    store.function("alpha", "P1", "a_cpp", "f2", (0.0, 0.0), (60.0, 20.0));
    store.function("alpha", "P1", "b_h", "g1", (0.0, 0.0), (30.0, 30.0));
    store.function("alpha", "p2", "a_cpp", "h1", (0.0, 0.0), (10.0, 10.0));

    store.function("beta", "P1", "a_cpp", "f1", (0.0, 0.0), (70.0, 40.0));
    store.function("beta", "P1", "a_cpp", "f2", (0.0, 0.0), (60.0, 20.0));
    store.function("beta", "P1", "c_cpp", "k", (0.0, 0.0), (90.0, 90.0));
    store.function("beta", "p2", "a_cpp", "h1", (0.0, 0.0), (10.0, 15.0));
    store
}

fn load(store: &common::Store) -> Workspace {
    Workspace::load(store.path(), &ArtifactPatterns::default(), false).unwrap()
}

#[test]
fn test_file_level_report() {
    let store = seed();
    let ws = load(&store);
    let out = tempfile::tempdir().unwrap();
    let mut sink = CsvDirSink::new(out.path()).unwrap();

    let summary =
        cmd_compare(&ws, &mut sink, Level::File, None, None, &VariantPair::default()).unwrap();
    assert!(summary.contains("coverage_compare_alpha_vs_beta_by_file.csv"));

    let rows = common::read_csv(&out.path().join("coverage_compare_alpha_vs_beta_by_file.csv"));
    assert_eq!(
        rows[0],
        [
            "File Name",
            "Project",
            "alpha Total Statement Coverage",
            "beta Total Statement Coverage",
            "alpha Total Branch Coverage",
            "beta Total Branch Coverage",
        ]
    );
    assert_eq!(rows[1], ["a.cpp", "P1", "55.00", "65.00", "30.00", "30.00"]);
    assert_eq!(rows[2], ["b.h", "P1", "30.00", "", "30.00", ""]);
    assert_eq!(rows[3], ["c.cpp", "P1", "", "90.00", "", "90.00"]);
    assert_eq!(rows[4], ["a.cpp", "p2", "10.00", "10.00", "10.00", "15.00"]);
    assert_eq!(rows.len(), 5);
}

#[test]
fn test_project_level_report() {
    let store = seed();
    let ws = load(&store);
    let out = tempfile::tempdir().unwrap();
    let mut sink = CsvDirSink::new(out.path()).unwrap();

    cmd_compare(&ws, &mut sink, Level::Project, None, None, &VariantPair::default()).unwrap();

    let rows = common::read_csv(&out.path().join("coverage_compare_projects_alpha_vs_beta.csv"));
    assert_eq!(rows[0][0], "Project");
    assert_eq!(rows[1], ["P1", "46.67", "73.33", "30.00", "50.00"]);
    assert_eq!(rows[2], ["p2", "10.00", "10.00", "10.00", "15.00"]);
}

#[test]
fn test_function_level_reports() {
    let store = seed();
    let ws = load(&store);
    let out = tempfile::tempdir().unwrap();
    let mut sink = CsvDirSink::new(out.path()).unwrap();

    cmd_compare(
        &ws,
        &mut sink,
        Level::Function,
        Some("alpha"),
        Some("beta"),
        &VariantPair::default(),
    )
    .unwrap();

    let rows = common::read_csv(
        &out.path().join("coverage_comparison_alpha_vs_beta_by_function.csv"),
    );
    assert_eq!(
        rows[0],
        [
            "Function Name",
            "Statement_alpha",
            "Statement_beta",
            "Statement_Δ",
            "Branch_alpha",
            "Branch_beta",
            "Branch_Δ",
        ]
    );
    // f2 is unchanged; g1 and k exist on one side only.
    assert_eq!(rows[1], ["f1", "50", "70", "20", "40", "40", "0"]);
    assert_eq!(rows[2], ["h1", "10", "10", "0", "10", "15", "5"]);
    assert_eq!(rows[3], ["AVERAGE", "", "", "10", "", "", "2.5"]);
    assert_eq!(rows.len(), 4);

    let strict = common::read_csv(
        &out.path().join("coverage_comparison_alpha_vs_beta_by_function_nonzero.csv"),
    );
    assert_eq!(strict.len(), 3);
    assert_eq!(strict[2][0], "h1");
}

#[test]
fn test_reversed_pair_negates_deltas() {
    let store = seed();
    let ws = load(&store);

    for level in [Level::Function, Level::File, Level::Project] {
        let forward = compare(level, &ws.index, "alpha", "beta").unwrap();
        let backward = compare(level, &ws.index, "beta", "alpha").unwrap();
        assert_eq!(forward.len(), backward.len());
        for (a, b) in forward.iter().zip(&backward) {
            assert_eq!(a.key, b.key);
            assert_eq!(a.statement_delta.map(|v| -v), b.statement_delta);
            assert_eq!(a.branch_delta.map(|v| -v), b.branch_delta);
        }
    }
}

#[test]
fn test_single_variant_cannot_be_compared() {
    let store = common::Store::new();
    store.function("only", "p", "a_cpp", "f", (0.0, 0.0), (10.0, 10.0));
    let ws = load(&store);
    let out = tempfile::tempdir().unwrap();
    let mut sink = CsvDirSink::new(out.path()).unwrap();

    let err =
        cmd_compare(&ws, &mut sink, Level::File, None, None, &VariantPair::default()).unwrap_err();
    assert!(err.to_string().contains("Need at least two variants"));
}
