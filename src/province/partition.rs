// src/province/partition.rs
//! Разбиение суши на сбалансированные провинции
//!
//! Схема:
//! 1. компоненты связности суши; мелкие острова целиком становятся одной
//!    провинцией;
//! 2. крупные компоненты делятся на проходимые подкомпоненты (ребро
//!    непроходимо, если его пересекает река или нижняя из двух граней выше
//!    порога перевала);
//! 3. места распределяются пропорционально размеру, минимум одно на
//!    проходимую подкомпоненту; семена внутри — итеративный выбор самой
//!    далёкой точки;
//! 4. рост — многоисточниковая заливка с очередью с приоритетом
//!    («сбалансированный Вороной»): быстрорастущие провинции притормаживают;
//! 5. недостижимые карманы добираются резервными провинциями;
//! 6. скан рёбер меша даёт внешние рёбра и смежность, затем раскраска ≤4.

use crate::config::TerrainGenerationControls;
use crate::elevation::{MAX_LAND_ELEVATION, MountainState, land_components};
use crate::mesh::MeshGraph;
use crate::province::color::color_provinces;
use crate::province::{NO_PROVINCE, OuterEdge, Province, ProvinceGraph};
use crate::rivers::RiverState;
use crate::water::WaterState;
use petgraph::graph::UnGraph;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

/// Ребро проходимо для роста провинций и навигации
#[must_use]
pub fn edge_passable(
    mesh: &MeshGraph,
    water: &WaterState,
    mountains: &MountainState,
    rivers: &RiverState,
    threshold: f32,
    edge: usize,
) -> bool {
    let e = &mesh.edges[edge];
    if e.face_a < 0 || e.face_b < 0 {
        return false;
    }
    let (a, b) = (e.face_a as usize, e.face_b as usize);
    if !water.is_land[a] || !water.is_land[b] {
        return false;
    }
    if rivers.river_edge_mask[edge] {
        return false;
    }
    let lower = mountains.land_elevation[a].min(mountains.land_elevation[b]);
    lower as f32 <= threshold * MAX_LAND_ELEVATION as f32
}

/// Сортируемая стоимость фронтира (f32 с тотальным порядком)
#[derive(Debug, Clone, Copy, PartialEq)]
struct Score(f32);

impl Eq for Score {}
impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Score {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Проходимые подкомпоненты внутри набора граней
fn passable_subcomponents(
    mesh: &MeshGraph,
    faces: &[usize],
    passable: &[bool],
) -> Vec<Vec<usize>> {
    let n = mesh.faces.len();
    let mut in_set = vec![false; n];
    for &f in faces {
        in_set[f] = true;
    }
    let mut seen = vec![false; n];
    let mut result = Vec::new();

    for &start in faces {
        if seen[start] {
            continue;
        }
        seen[start] = true;
        let mut sub = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(f) = queue.pop_front() {
            for &e in &mesh.faces[f].edges {
                if !passable[e] {
                    continue;
                }
                let other = mesh.edges[e].other_face(f);
                if other < 0 {
                    continue;
                }
                let other = other as usize;
                if in_set[other] && !seen[other] {
                    seen[other] = true;
                    sub.push(other);
                    queue.push_back(other);
                }
            }
        }
        result.push(sub);
    }
    result
}

/// Итеративный выбор самых далёких семян внутри подкомпоненты.
///
/// Первое семя — грань, самая далёкая от моря (при равенстве меньший id);
/// каждое следующее максимизирует минимальное расстояние до уже выбранных.
fn farthest_point_seeds(
    mesh: &MeshGraph,
    water: &WaterState,
    faces: &[usize],
    count: usize,
) -> Vec<usize> {
    if faces.is_empty() || count == 0 {
        return Vec::new();
    }
    let Some(first) = faces
        .iter()
        .copied()
        .max_by_key(|&f| (water.land_distance[f], Reverse(f)))
    else {
        return Vec::new();
    };
    let mut seeds = vec![first];

    while seeds.len() < count.min(faces.len()) {
        let next = faces
            .iter()
            .copied()
            .filter(|f| !seeds.contains(f))
            .max_by(|&a, &b| {
                let da = seeds
                    .iter()
                    .map(|&s| mesh.faces[a].site.dist_sq(mesh.faces[s].site))
                    .fold(f32::INFINITY, f32::min);
                let db = seeds
                    .iter()
                    .map(|&s| mesh.faces[b].site.dist_sq(mesh.faces[s].site))
                    .fold(f32::INFINITY, f32::min);
                da.total_cmp(&db).then(b.cmp(&a))
            });
        match next {
            Some(f) => seeds.push(f),
            None => break,
        }
    }
    seeds
}

/// Разбивает сушу на провинции и строит их топологию.
#[must_use]
pub fn partition_provinces(
    mesh: &MeshGraph,
    water: &WaterState,
    mountains: &MountainState,
    rivers: &RiverState,
    controls: &TerrainGenerationControls,
) -> ProvinceGraph {
    let n = mesh.faces.len();
    let mut province_by_face = vec![NO_PROVINCE; n];
    // (семя, целевой размер) на провинцию
    let mut seeds: Vec<(usize, usize)> = Vec::new();

    let passable: Vec<bool> = (0..mesh.edges.len())
        .map(|e| {
            edge_passable(
                mesh,
                water,
                mountains,
                rivers,
                controls.mountain_passage_threshold,
                e,
            )
        })
        .collect();

    // === 1. Компоненты суши и мелкие острова ===
    let (component, component_sizes) = land_components(mesh, &water.is_land);
    let total_land: usize = component_sizes.iter().sum();
    if total_land == 0 {
        return ProvinceGraph {
            province_by_face,
            provinces: Vec::new(),
            outer_edges: Vec::new(),
            four_colored: true,
        };
    }
    let small_limit =
        ((total_land as f32 * controls.small_island_percent).ceil() as usize).max(1);

    let mut component_faces: Vec<Vec<usize>> = vec![Vec::new(); component_sizes.len()];
    for f in 0..n {
        if component[f] >= 0 {
            component_faces[component[f] as usize].push(f);
        }
    }

    let mut large_components: Vec<usize> = Vec::new();
    let mut large_total = 0usize;
    for (c, &size) in component_sizes.iter().enumerate() {
        if size <= small_limit {
            // Мелкий остров — одна провинция целиком, без учёта проходимости
            let faces = &component_faces[c];
            let seed = faces[0];
            let target = faces.len().max(1);
            let pid = seeds.len() as i32;
            seeds.push((seed, target));
            for &f in faces {
                province_by_face[f] = pid;
            }
        } else {
            large_components.push(c);
            large_total += size;
        }
    }

    // === 2–3. Места и семена крупных компонент ===
    for &c in &large_components {
        let size = component_sizes[c];
        let share = (controls.province_count as f32 * size as f32 / large_total as f32)
            .round() as usize;
        let component_quota = share.max(1);

        let subs = passable_subcomponents(mesh, &component_faces[c], &passable);
        let sub_total: usize = subs.iter().map(Vec::len).sum();
        for sub in &subs {
            let sub_share = (component_quota as f32 * sub.len() as f32 / sub_total as f32)
                .round() as usize;
            let sub_quota = sub_share.max(1).min(sub.len());
            let target = (sub.len() / sub_quota).max(1);
            for seed in farthest_point_seeds(mesh, water, sub, sub_quota) {
                seeds.push((seed, target));
            }
        }
    }

    // === 4. Сбалансированная заливка из всех семян ===
    let mut sizes = vec![0usize; seeds.len()];
    let mut heap: BinaryHeap<Reverse<(Score, usize, usize)>> = BinaryHeap::new();
    for (pid, &(seed, _)) in seeds.iter().enumerate() {
        if province_by_face[seed] == NO_PROVINCE {
            heap.push(Reverse((Score(0.0), seed, pid)));
        }
    }
    while let Some(Reverse((_, face, pid))) = heap.pop() {
        if province_by_face[face] != NO_PROVINCE {
            continue;
        }
        province_by_face[face] = pid as i32;
        sizes[pid] += 1;

        let (seed_face, target) = seeds[pid];
        let seed_site = mesh.faces[seed_face].site;
        for &e in &mesh.faces[face].edges {
            if !passable[e] {
                continue;
            }
            let other = mesh.edges[e].other_face(face);
            if other < 0 {
                continue;
            }
            let other = other as usize;
            if province_by_face[other] != NO_PROVINCE {
                continue;
            }
            // Быстрорастущие провинции штрафуются относительно медленных
            let score = mesh.faces[other].site.dist(seed_site)
                + controls.province_balance * (sizes[pid] as f32 / target as f32);
            heap.push(Reverse((Score(score), other, pid)));
        }
    }

    // === 5. Добор недостижимых карманов резервными провинциями ===
    let leftover: Vec<usize> = (0..n)
        .filter(|&f| water.is_land[f] && province_by_face[f] == NO_PROVINCE)
        .collect();
    if !leftover.is_empty() {
        for sub in passable_subcomponents(mesh, &leftover, &passable) {
            let pid = seeds.len() as i32;
            seeds.push((sub[0], sub.len()));
            sizes.push(sub.len());
            for &f in &sub {
                province_by_face[f] = pid;
            }
        }
    }
    // Полностью изолированные грани (все рёбра непроходимы) — по провинции
    for f in 0..n {
        if water.is_land[f] && province_by_face[f] == NO_PROVINCE {
            let pid = seeds.len() as i32;
            seeds.push((f, 1));
            sizes.push(1);
            province_by_face[f] = pid;
        }
    }

    // === 6. Сборка провинций и топологии ===
    let count = seeds.len();
    let mut provinces: Vec<Province> = (0..count)
        .map(|id| Province {
            id: id as u32,
            faces: Vec::new(),
            outer_edges: Vec::new(),
            neighbors: Vec::new(),
            passable_neighbors: Vec::new(),
            color: 0,
        })
        .collect();
    for f in 0..n {
        if province_by_face[f] >= 0 {
            provinces[province_by_face[f] as usize].faces.push(f);
        }
    }

    let mut outer_edges: Vec<OuterEdge> = Vec::new();
    let mut graph: UnGraph<u32, ()> = UnGraph::new_undirected();
    let nodes: Vec<_> = (0..count as u32).map(|id| graph.add_node(id)).collect();

    for (eid, edge) in mesh.edges.iter().enumerate() {
        let pa = if edge.face_a >= 0 {
            province_by_face[edge.face_a as usize]
        } else {
            NO_PROVINCE
        };
        let pb = if edge.face_b >= 0 {
            province_by_face[edge.face_b as usize]
        } else {
            NO_PROVINCE
        };

        match (pa, pb) {
            (a, b) if a >= 0 && b >= 0 && a != b => {
                let oid = outer_edges.len();
                outer_edges.push(OuterEdge {
                    edge: eid,
                    province_a: a,
                    province_b: b,
                });
                let (a, b) = (a as usize, b as usize);
                provinces[a].outer_edges.push(oid);
                provinces[b].outer_edges.push(oid);
                if !provinces[a].neighbors.contains(&b) {
                    provinces[a].neighbors.push(b);
                    provinces[b].neighbors.push(a);
                    graph.add_edge(nodes[a], nodes[b], ());
                }
                if passable[eid] && !provinces[a].passable_neighbors.contains(&b) {
                    provinces[a].passable_neighbors.push(b);
                    provinces[b].passable_neighbors.push(a);
                }
            }
            (a, b) if (a >= 0) != (b >= 0) => {
                // Граница провинции с водой или краем карты
                let land_province = a.max(b);
                let oid = outer_edges.len();
                outer_edges.push(OuterEdge {
                    edge: eid,
                    province_a: land_province,
                    province_b: NO_PROVINCE,
                });
                provinces[land_province as usize].outer_edges.push(oid);
            }
            _ => {}
        }
    }

    // === 7. Раскраска ===
    let (colors, four_colored) = color_provinces(&graph, count);
    for (pid, color) in colors.into_iter().enumerate() {
        provinces[pid].color = color;
    }

    ProvinceGraph {
        province_by_face,
        provinces,
        outer_edges,
        four_colored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::synthesize_elevation;
    use crate::rivers::trace_rivers;
    use crate::rng::{SALT_ELEVATION, SALT_RIVERS, SALT_SITES, SALT_WATER, stage_rng};
    use crate::sampler::sample_sites;
    use crate::water::classify_water;

    fn test_provinces(
        controls: &TerrainGenerationControls,
    ) -> (MeshGraph, WaterState, ProvinceGraph) {
        let mut rng = stage_rng(controls.seed, SALT_SITES);
        let sites = sample_sites(512.0, 512.0, 32.0, &mut rng);
        let mesh = crate::mesh::build_mesh(&sites, 512.0, 512.0);
        let mut wrng = stage_rng(controls.seed, SALT_WATER);
        let water = classify_water(&mesh, controls, &mut wrng);
        let mut erng = stage_rng(controls.seed, SALT_ELEVATION);
        let mountains = synthesize_elevation(&mesh, &water, controls, &mut erng);
        let mut rrng = stage_rng(controls.seed, SALT_RIVERS);
        let rivers = trace_rivers(&mesh, &water, &mountains, controls, &mut rrng);
        let provinces = partition_provinces(&mesh, &water, &mountains, &rivers, controls);
        (mesh, water, provinces)
    }

    #[test]
    fn every_land_face_has_exactly_one_province() {
        let controls = TerrainGenerationControls {
            seed: 1337,
            ..TerrainGenerationControls::default()
        }
        .sanitized();
        let (_, water, pg) = test_provinces(&controls);
        for f in 0..water.is_land.len() {
            if water.is_land[f] {
                assert!(pg.province_by_face[f] >= 0, "грань суши {f} без провинции");
                assert!((pg.province_by_face[f] as usize) < pg.provinces.len());
            } else {
                assert_eq!(pg.province_by_face[f], NO_PROVINCE);
            }
        }
    }

    #[test]
    fn province_face_lists_round_trip() {
        let controls = TerrainGenerationControls {
            seed: 42,
            ..TerrainGenerationControls::default()
        }
        .sanitized();
        let (_, _, pg) = test_provinces(&controls);
        for province in &pg.provinces {
            assert!(!province.faces.is_empty());
            for &f in &province.faces {
                assert_eq!(pg.province_by_face[f], province.id as i32);
            }
        }
    }

    #[test]
    fn outer_edges_separate_distinct_sides() {
        let controls = TerrainGenerationControls {
            seed: 7,
            ..TerrainGenerationControls::default()
        }
        .sanitized();
        let (_, _, pg) = test_provinces(&controls);
        for oe in &pg.outer_edges {
            assert!(oe.province_a >= 0);
            assert_ne!(oe.province_a, oe.province_b);
        }
    }

    #[test]
    fn adjacency_is_symmetric() {
        let controls = TerrainGenerationControls {
            seed: 99,
            ..TerrainGenerationControls::default()
        }
        .sanitized();
        let (_, _, pg) = test_provinces(&controls);
        for province in &pg.provinces {
            for &nb in &province.neighbors {
                assert!(pg.provinces[nb].neighbors.contains(&(province.id as usize)));
            }
            for &nb in &province.passable_neighbors {
                assert!(province.neighbors.contains(&nb));
            }
        }
    }

    #[test]
    fn four_coloring_gives_distinct_adjacent_colors() {
        let controls = TerrainGenerationControls {
            seed: 1337,
            ..TerrainGenerationControls::default()
        }
        .sanitized();
        let (_, _, pg) = test_provinces(&controls);
        if pg.four_colored {
            for province in &pg.provinces {
                assert!(province.color < 4);
                for &nb in &province.neighbors {
                    assert_ne!(province.color, pg.provinces[nb].color);
                }
            }
        }
    }

    #[test]
    fn rivers_block_province_growth() {
        // Непроходимое ребро никогда не внутри провинции: обе стороны реки
        // могут совпасть провинцией только через обходной проходимый путь.
        let controls = TerrainGenerationControls {
            seed: 2,
            river_density: 0.9,
            ..TerrainGenerationControls::default()
        }
        .sanitized();
        let (mesh, water, pg) = test_provinces(&controls);
        // Внешние рёбра покрывают все межпровинциальные границы
        for (eid, edge) in mesh.edges.iter().enumerate() {
            if edge.face_a < 0 || edge.face_b < 0 {
                continue;
            }
            let (a, b) = (edge.face_a as usize, edge.face_b as usize);
            if water.is_land[a] && water.is_land[b] {
                let (pa, pb) = (pg.province_by_face[a], pg.province_by_face[b]);
                if pa != pb {
                    assert!(
                        pg.outer_edges.iter().any(|oe| oe.edge == eid),
                        "граница провинций без внешнего ребра"
                    );
                }
            }
        }
    }
}
