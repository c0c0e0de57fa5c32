//! Сквозные тесты детерминизма конвейера генерации.
//!
//! Проверяем на полном размере карты: одинаковые контролы дают побайтово
//! одинаковый результат, а частичная правка контролов пересчитывает только
//! затронутые стадии.

use islandgen::pipeline::StageState;
use islandgen::{GenerationPipeline, MapConfig, TerrainGenerationControls, find_face_path_astar};

fn reference_controls() -> TerrainGenerationControls {
    TerrainGenerationControls {
        seed: 1337,
        site_spacing: 32.0,
        ..TerrainGenerationControls::default()
    }
}

fn reference_config() -> MapConfig {
    MapConfig {
        width: 512,
        height: 512,
    }
}

#[test]
fn identical_controls_give_identical_provinces() {
    let controls = reference_controls();

    let mut first = GenerationPipeline::new(reference_config(), &controls);
    first.generate();
    let mut second = GenerationPipeline::new(reference_config(), &controls);
    second.generate();

    let a = first.state().unwrap();
    let b = second.state().unwrap();
    assert_eq!(a.fingerprint, b.fingerprint);
    assert_eq!(a.provinces.province_by_face, b.provinces.province_by_face);
    assert_eq!(a.rivers.river_edge_mask, b.rivers.river_edge_mask);
    assert_eq!(a.mountains.land_elevation, b.mountains.land_elevation);
}

#[test]
fn river_tweak_skips_upstream_stages() {
    let controls = reference_controls();
    let mut pipeline = GenerationPipeline::new(reference_config(), &controls);
    pipeline.generate();

    let elevation_before = pipeline.state().unwrap().mountains.land_elevation.clone();

    let tweaked = TerrainGenerationControls {
        river_branch_chance: 0.6,
        ..controls
    };
    let report = pipeline.set_controls(&tweaked);

    assert!(!report.mesh, "меш не должен помечаться грязным");
    assert!(!report.water);
    assert!(!report.elevation);
    assert!(report.rivers);
    assert!(report.provinces, "провинции каскадно зависят от рек");

    let states = pipeline.stage_states();
    assert_eq!(states[0], StageState::Clean);
    assert_eq!(states[1], StageState::Clean);
    assert_eq!(states[2], StageState::Clean);
    assert_eq!(states[3], StageState::Recomputed);
    assert_eq!(states[4], StageState::Recomputed);

    // Нетронутые стадии остаются побайтово прежними
    let state = pipeline.state().unwrap();
    assert_eq!(state.mountains.land_elevation, elevation_before);
}

#[test]
fn full_map_yields_navigable_land() {
    let controls = reference_controls();
    let mut pipeline = GenerationPipeline::new(reference_config(), &controls);
    pipeline.generate();
    let state = pipeline.state().unwrap();

    let land: Vec<usize> = (0..state.mesh.faces.len())
        .filter(|&f| state.water.is_land[f])
        .collect();
    assert!(!land.is_empty(), "на дефолтных контролах остров существует");
    assert!(!state.provinces.provinces.is_empty());

    // Внутри одной провинции маршрут между гранями обязан находиться,
    // если обе грани проходимы для навигации
    let nav = pipeline.navigation_graph().unwrap();
    let province = &state.provinces.provinces[0];
    let reachable: Vec<usize> = province
        .faces
        .iter()
        .copied()
        .filter(|&f| nav.nodes[f].is_some())
        .collect();
    if let (Some(&from), Some(&to)) = (reachable.first(), reachable.last()) {
        let path = find_face_path_astar(&nav, from, to);
        if from == to {
            assert_eq!(path.faces, vec![from]);
        } else if !path.faces.is_empty() {
            assert_eq!(path.faces[0], from);
            assert_eq!(*path.faces.last().unwrap(), to);
            assert!(path.total_cost.is_finite());
        }
    }
}

#[test]
fn snapshot_restores_exact_fingerprint() {
    let controls = reference_controls();
    let mut original = GenerationPipeline::new(reference_config(), &controls);
    original.generate();
    let snapshot = original.snapshot();

    let mut replica = GenerationPipeline::new(
        MapConfig {
            width: 256,
            height: 256,
        },
        &TerrainGenerationControls::default(),
    );
    replica.generate();
    replica.apply_snapshot(&snapshot);

    assert_eq!(original.fingerprint(), replica.fingerprint());
    let a = original.state().unwrap();
    let b = replica.state().unwrap();
    assert_eq!(a.provinces.province_by_face, b.provinces.province_by_face);
}
