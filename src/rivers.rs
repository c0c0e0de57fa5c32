// src/rivers.rs
//! Трассировка рек
//!
//! Реки текут вдоль рёбер меша (границ между гранями), от береговых устьев
//! вверх к хребтам. Из каждого устья растёт жадная стохастическая трасса:
//! предпочитаются рёбра, чьи фланговые грани строго выше текущей высоты,
//! плоские продолжения разрешены ограниченной серией, спуск запрещён
//! (кроме ограниченного начального сброса у устья).
//!
//! Трассы ранжируются по длине и пику; верхняя половина (попарно не
//! пересекающаяся по рёбрам) становится главными реками, от которых с
//! заданным шансом отращиваются ветви. Маска `river_edge_mask` по рёбрам
//! питает проходимость провинций и стоимость навигации.

use crate::config::TerrainGenerationControls;
use crate::elevation::{MAX_LAND_ELEVATION, MountainState};
use crate::mesh::MeshGraph;
use crate::water::WaterState;
use rand::Rng;
use std::collections::VecDeque;

/// Водоёмы меньше этого числа граней — «лужи», их берег не годится в устья
const PUDDLE_FACES: usize = 5;

/// Лимит подряд идущих плоских шагов без броска на climb_chance
const FLAT_RUN_LIMIT: u32 = 3;

/// Одна трасса реки от устья к истоку
#[derive(Debug, Clone)]
pub struct RiverTrace {
    /// Рёбра русла по порядку
    pub edges: Vec<usize>,
    /// Вершины русла (на одну больше, чем рёбер)
    pub vertices: Vec<usize>,
    /// Фланговые грани в порядке прохождения
    pub faces: Vec<usize>,
    /// 0 — главное русло, >0 — поколение ветви
    pub depth: u32,
    /// Пиковая ступень высоты, достигнутая трассой
    pub max_elevation: i32,
    /// Длина пути в рёбрах
    pub length: usize,
}

/// Результат трассировки рек (неизменяемый выход стадии)
#[derive(Debug, Clone)]
pub struct RiverState {
    pub traces: Vec<RiverTrace>,
    /// Маска рёбер, занятых принятыми трассами
    pub river_edge_mask: Vec<bool>,
}

/// Размеры компонент связности воды (для отсева луж)
fn water_component_sizes(mesh: &MeshGraph, is_land: &[bool]) -> (Vec<i32>, Vec<usize>) {
    let n = mesh.faces.len();
    let mut component = vec![-1i32; n];
    let mut sizes = Vec::new();
    let mut queue = VecDeque::new();
    for start in 0..n {
        if is_land[start] || component[start] >= 0 {
            continue;
        }
        let id = sizes.len() as i32;
        component[start] = id;
        queue.push_back(start);
        let mut size = 0;
        while let Some(f) = queue.pop_front() {
            size += 1;
            for &nb in &mesh.faces[f].neighbors {
                if !is_land[nb] && component[nb] < 0 {
                    component[nb] = id;
                    queue.push_back(nb);
                }
            }
        }
        sizes.push(size);
    }
    (component, sizes)
}

/// Кандидаты-устья: береговые вершины, общие для суши и воды.
///
/// Вершины, чья вода состоит из одних луж, идут во вторую корзину и
/// используются только если нормальных кандидатов нет вовсе.
fn mouth_candidates(mesh: &MeshGraph, water: &WaterState) -> Vec<usize> {
    let (component, sizes) = water_component_sizes(mesh, &water.is_land);
    let mut good = Vec::new();
    let mut puddle_only = Vec::new();

    for (v, vertex) in mesh.vertices.iter().enumerate() {
        let has_land = vertex.faces.iter().any(|&f| water.is_land[f]);
        if !has_land {
            continue;
        }
        let water_faces: Vec<usize> = vertex
            .faces
            .iter()
            .copied()
            .filter(|&f| !water.is_land[f])
            .collect();
        if water_faces.is_empty() {
            continue;
        }
        let all_puddles = water_faces
            .iter()
            .all(|&f| sizes[component[f] as usize] < PUDDLE_FACES);
        if all_puddles {
            puddle_only.push(v);
        } else {
            good.push(v);
        }
    }

    if good.is_empty() { puddle_only } else { good }
}

/// Высота шага по ребру: максимум фланговых граней суши
fn edge_elevation(mesh: &MeshGraph, mountains: &MountainState, edge: usize) -> i32 {
    let e = &mesh.edges[edge];
    let a = mountains.land_elevation[e.face_a as usize];
    let b = mountains.land_elevation[e.face_b as usize];
    a.max(b)
}

/// Жадная стохастическая трасса из вершины `mouth`.
///
/// Возвращает трассу и профиль высоты по вершинам (для отбора ветвей).
fn grow_trace<R: Rng>(
    mesh: &MeshGraph,
    water: &WaterState,
    mountains: &MountainState,
    controls: &TerrainGenerationControls,
    blocked_edges: &[bool],
    mouth: usize,
    start_elevation: i32,
    depth: u32,
    rng: &mut R,
) -> (RiverTrace, Vec<i32>) {
    let mut trace = RiverTrace {
        edges: Vec::new(),
        vertices: vec![mouth],
        faces: Vec::new(),
        depth,
        max_elevation: start_elevation,
        length: 0,
    };
    let mut profile = vec![start_elevation];
    let mut visited = vec![false; mesh.vertices.len()];
    visited[mouth] = true;

    let mut cur = mouth;
    let mut cur_elev = start_elevation;
    let mut flat_run = 0u32;

    loop {
        let mut higher: Vec<(usize, usize, i32)> = Vec::new(); // (ребро, вершина, высота)
        let mut flat: Vec<(usize, usize, i32)> = Vec::new();
        let mut initial_drop: Vec<(usize, usize, i32)> = Vec::new();

        for &e in &mesh.vertices[cur].edges {
            if blocked_edges[e] || trace.edges.contains(&e) {
                continue;
            }
            let edge = &mesh.edges[e];
            // Русло идёт только между двумя гранями суши
            if edge.face_a < 0 || edge.face_b < 0 {
                continue;
            }
            if !water.is_land[edge.face_a as usize] || !water.is_land[edge.face_b as usize] {
                continue;
            }
            let next = if edge.v0 == cur { edge.v1 } else { edge.v0 };
            if visited[next] {
                continue;
            }
            let elev = edge_elevation(mesh, mountains, e);
            if elev > cur_elev {
                higher.push((e, next, elev));
            } else if elev == cur_elev {
                flat.push((e, next, elev));
            } else if trace.edges.is_empty() && elev >= cur_elev - 1 {
                // Ограниченный начальный сброс у самого устья
                initial_drop.push((e, next, elev));
            }
        }

        let chosen = if !higher.is_empty() {
            flat_run = 0;
            Some(higher[rng.gen_range(0..higher.len())])
        } else if !flat.is_empty()
            && (flat_run < FLAT_RUN_LIMIT || rng.gen_range(0.0..1.0) < controls.river_climb_chance)
        {
            flat_run += 1;
            Some(flat[rng.gen_range(0..flat.len())])
        } else if !initial_drop.is_empty() {
            Some(initial_drop[rng.gen_range(0..initial_drop.len())])
        } else {
            None
        };

        let Some((e, next, elev)) = chosen else {
            break;
        };
        visited[next] = true;
        trace.edges.push(e);
        trace.vertices.push(next);
        for fid in [mesh.edges[e].face_a as usize, mesh.edges[e].face_b as usize] {
            if trace.faces.last() != Some(&fid) && !trace.faces.contains(&fid) {
                trace.faces.push(fid);
            }
        }
        cur = next;
        cur_elev = cur_elev.max(elev);
        trace.max_elevation = trace.max_elevation.max(elev);
        profile.push(cur_elev);

        if cur_elev >= MAX_LAND_ELEVATION {
            break;
        }
    }

    trace.length = trace.edges.len();
    (trace, profile)
}

/// Начальная высота у устья: минимальная ступень суши вокруг вершины
fn mouth_elevation(mesh: &MeshGraph, water: &WaterState, mountains: &MountainState, v: usize) -> i32 {
    mesh.vertices[v]
        .faces
        .iter()
        .copied()
        .filter(|&f| water.is_land[f])
        .map(|f| mountains.land_elevation[f])
        .min()
        .unwrap_or(1)
}

/// Трассирует реки и строит маску речных рёбер.
#[must_use]
pub fn trace_rivers<R: Rng>(
    mesh: &MeshGraph,
    water: &WaterState,
    mountains: &MountainState,
    controls: &TerrainGenerationControls,
    rng: &mut R,
) -> RiverState {
    let mut mask = vec![false; mesh.edges.len()];
    let mut accepted: Vec<RiverTrace> = Vec::new();

    // === 1. Выбор устьев ===
    let mut candidates = mouth_candidates(mesh, water);
    let target = (candidates.len() as f32 * controls.river_density).round() as usize;
    let mouth_count = if controls.river_density > 0.0 && !candidates.is_empty() {
        target.max(1).min(candidates.len())
    } else {
        0
    };
    // Частичный Фишер–Йетс: первые mouth_count позиций
    for i in 0..mouth_count {
        let j = i + rng.gen_range(0..candidates.len() - i);
        candidates.swap(i, j);
    }
    let mouths: Vec<usize> = candidates[..mouth_count].to_vec();

    // === 2. Трассы из устьев ===
    let mut grown: Vec<(RiverTrace, Vec<i32>)> = Vec::new();
    for &mouth in &mouths {
        let start = mouth_elevation(mesh, water, mountains, mouth);
        let (trace, profile) = grow_trace(
            mesh, water, mountains, controls, &mask, mouth, start, 0, rng,
        );
        if trace.length >= controls.river_min_length as usize {
            grown.push((trace, profile));
        }
    }

    // === 3. Ранжирование и отбор главных (верхняя половина, без общих рёбер) ===
    grown.sort_by_key(|(t, _)| {
        (
            std::cmp::Reverse(t.length as i64 + 2 * t.max_elevation as i64),
            t.vertices[0],
        )
    });
    let main_quota = grown.len().div_ceil(2);
    let mut mains: Vec<(RiverTrace, Vec<i32>)> = Vec::new();
    for (trace, profile) in grown {
        if mains.len() >= main_quota {
            break;
        }
        if trace.edges.iter().any(|&e| mask[e]) {
            continue; // пересекается с уже принятой рекой
        }
        for &e in &trace.edges {
            mask[e] = true;
        }
        mains.push((trace, profile));
    }

    // === 4. Ветви главных рек ===
    let mut branches: Vec<RiverTrace> = Vec::new();
    for (main, profile) in &mains {
        let len = main.vertices.len();
        for idx in 1..len.saturating_sub(1) {
            if rng.gen_range(0.0..1.0) >= controls.river_branch_chance {
                continue;
            }
            let from = main.vertices[idx];
            let (branch, _) = grow_trace(
                mesh,
                water,
                mountains,
                controls,
                &mask,
                from,
                profile[idx],
                main.depth + 1,
                rng,
            );
            // Эвристика принятия: чем ближе точка ветвления к пику родителя,
            // тем длиннее обязана быть ветвь (отсекает огрызки у вершины).
            let t = idx as f32 / len as f32;
            let required = (controls.river_min_length as f32 * (0.5 + t)).round() as usize;
            if branch.length < required.max(2) {
                continue;
            }
            for &e in &branch.edges {
                mask[e] = true;
            }
            branches.push(branch);
        }
    }

    let mut traces: Vec<RiverTrace> = mains.into_iter().map(|(t, _)| t).collect();
    traces.append(&mut branches);

    RiverState {
        traces,
        river_edge_mask: mask,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::synthesize_elevation;
    use crate::rng::{SALT_ELEVATION, SALT_RIVERS, SALT_SITES, SALT_WATER, stage_rng};
    use crate::sampler::sample_sites;
    use crate::water::classify_water;

    fn test_rivers(
        controls: &TerrainGenerationControls,
    ) -> (MeshGraph, WaterState, MountainState, RiverState) {
        let mut rng = stage_rng(controls.seed, SALT_SITES);
        let sites = sample_sites(512.0, 512.0, 32.0, &mut rng);
        let mesh = crate::mesh::build_mesh(&sites, 512.0, 512.0);
        let mut wrng = stage_rng(controls.seed, SALT_WATER);
        let water = classify_water(&mesh, controls, &mut wrng);
        let mut erng = stage_rng(controls.seed, SALT_ELEVATION);
        let mountains = synthesize_elevation(&mesh, &water, controls, &mut erng);
        let mut rrng = stage_rng(controls.seed, SALT_RIVERS);
        let rivers = trace_rivers(&mesh, &water, &mountains, controls, &mut rrng);
        (mesh, water, mountains, rivers)
    }

    #[test]
    fn river_edges_flank_only_land() {
        let controls = TerrainGenerationControls {
            seed: 1337,
            ..TerrainGenerationControls::default()
        }
        .sanitized();
        let (mesh, water, _, rivers) = test_rivers(&controls);
        for (e, &masked) in rivers.river_edge_mask.iter().enumerate() {
            if masked {
                let edge = &mesh.edges[e];
                assert!(edge.face_a >= 0 && edge.face_b >= 0);
                assert!(water.is_land[edge.face_a as usize]);
                assert!(water.is_land[edge.face_b as usize]);
            }
        }
    }

    #[test]
    fn traces_are_edge_disjoint() {
        let controls = TerrainGenerationControls {
            seed: 777,
            river_density: 0.8,
            river_branch_chance: 0.6,
            ..TerrainGenerationControls::default()
        }
        .sanitized();
        let (_, _, _, rivers) = test_rivers(&controls);
        let mut seen = std::collections::HashSet::new();
        for trace in &rivers.traces {
            for &e in &trace.edges {
                assert!(seen.insert(e), "ребро {e} в двух трассах");
            }
        }
    }

    #[test]
    fn trace_vertices_chain_along_edges() {
        let controls = TerrainGenerationControls {
            seed: 31,
            ..TerrainGenerationControls::default()
        }
        .sanitized();
        let (mesh, _, _, rivers) = test_rivers(&controls);
        for trace in &rivers.traces {
            assert_eq!(trace.vertices.len(), trace.edges.len() + 1);
            assert_eq!(trace.length, trace.edges.len());
            for (k, &e) in trace.edges.iter().enumerate() {
                let edge = &mesh.edges[e];
                let (a, b) = (trace.vertices[k], trace.vertices[k + 1]);
                assert!(
                    (edge.v0 == a && edge.v1 == b) || (edge.v0 == b && edge.v1 == a),
                    "ребро {e} не соединяет вершины {a} и {b}"
                );
            }
        }
    }

    #[test]
    fn zero_density_gives_no_rivers() {
        let controls = TerrainGenerationControls {
            seed: 10,
            river_density: 0.0,
            ..TerrainGenerationControls::default()
        }
        .sanitized();
        let (_, _, _, rivers) = test_rivers(&controls);
        assert!(rivers.traces.is_empty());
        assert!(rivers.river_edge_mask.iter().all(|&m| !m));
    }

    #[test]
    fn branches_reference_parent_depth() {
        let controls = TerrainGenerationControls {
            seed: 2024,
            river_density: 0.9,
            river_branch_chance: 0.9,
            ..TerrainGenerationControls::default()
        }
        .sanitized();
        let (_, _, _, rivers) = test_rivers(&controls);
        for trace in &rivers.traces {
            assert!(trace.depth <= 1);
            if trace.depth == 0 {
                assert!(trace.length >= controls.river_min_length as usize);
            }
        }
    }

    #[test]
    fn determinism_for_fixed_controls() {
        let controls = TerrainGenerationControls {
            seed: 555,
            ..TerrainGenerationControls::default()
        }
        .sanitized();
        let (_, _, _, a) = test_rivers(&controls);
        let (_, _, _, b) = test_rivers(&controls);
        assert_eq!(a.river_edge_mask, b.river_edge_mask);
        assert_eq!(a.traces.len(), b.traces.len());
        for (x, y) in a.traces.iter().zip(b.traces.iter()) {
            assert_eq!(x.edges, y.edges);
            assert_eq!(x.vertices, y.vertices);
        }
    }
}
