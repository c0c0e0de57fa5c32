// src/elevation.rs
//! Синтез высот суши
//!
//! Ступени высоты целые, в диапазоне `[1, MAX_LAND_ELEVATION]`; вода
//! сохраняет свою отрицательную глубину. Конвейер ступеней:
//!
//! 1. базовая высота от удаления от берега (степенная кривая 1.6);
//! 2. посев хребтов в локальных максимумах поля удаления от берега;
//! 3. подъём вокруг пиков со степенным спадом и зажимом по запасу высоты;
//! 4. при ненулевой связности — соединение пиков сплошными грядами вдоль
//!    кратчайших путей по суше с расширением гряды наружу;
//! 5. сглаживание низинных плато;
//! 6. опциональные линейные потолки от расстояния до берега.
//!
//! Выход стадии неизменяем: меш не трогаем, возвращаем отдельные массивы.

use crate::config::TerrainGenerationControls;
use crate::mesh::MeshGraph;
use crate::water::WaterState;
use rand::Rng;
use std::collections::VecDeque;

/// Максимальная ступень высоты суши
pub const MAX_LAND_ELEVATION: i32 = 10;

/// Результат синтеза высот (неизменяемый выход стадии)
#[derive(Debug, Clone)]
pub struct MountainState {
    /// Ступень высоты по граням: `[1, MAX]` на суше, глубина ≤0 на воде
    pub land_elevation: Vec<i32>,
    /// Высота вершин — среднее по инцидентным граням (только для рендера)
    pub vertex_elevation: Vec<f32>,
    /// Выбранные пики хребтов (диагностика и тесты)
    pub ridge_seeds: Vec<usize>,
}

/// Компоненты связности суши: id компоненты по граням (−1 для воды) и размеры
#[must_use]
pub fn land_components(mesh: &MeshGraph, is_land: &[bool]) -> (Vec<i32>, Vec<usize>) {
    let n = mesh.faces.len();
    let mut component = vec![-1i32; n];
    let mut sizes = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..n {
        if !is_land[start] || component[start] >= 0 {
            continue;
        }
        let id = sizes.len() as i32;
        component[start] = id;
        queue.push_back(start);
        let mut size = 0usize;
        while let Some(f) = queue.pop_front() {
            size += 1;
            for &nb in &mesh.faces[f].neighbors {
                if is_land[nb] && component[nb] < 0 {
                    component[nb] = id;
                    queue.push_back(nb);
                }
            }
        }
        sizes.push(size);
    }
    (component, sizes)
}

/// Кратчайший путь по суше между двумя гранями (BFS по рёбрам смежности)
fn shortest_land_path(
    mesh: &MeshGraph,
    is_land: &[bool],
    from: usize,
    to: usize,
) -> Option<Vec<usize>> {
    let n = mesh.faces.len();
    let mut prev = vec![usize::MAX; n];
    let mut seen = vec![false; n];
    let mut queue = VecDeque::new();
    seen[from] = true;
    queue.push_back(from);

    while let Some(f) = queue.pop_front() {
        if f == to {
            let mut path = vec![to];
            let mut cur = to;
            while cur != from {
                cur = prev[cur];
                path.push(cur);
            }
            path.reverse();
            return Some(path);
        }
        for &nb in &mesh.faces[f].neighbors {
            if is_land[nb] && !seen[nb] {
                seen[nb] = true;
                prev[nb] = f;
                queue.push_back(nb);
            }
        }
    }
    None
}

/// Выбор пиков хребтов из локальных максимумов поля удаления от берега.
///
/// Когда кандидатов больше, чем запрошено, сначала закрепляется по одному
/// пику на компоненту суши, затем добор взвешенным случайным выбором между
/// «дальше всех от моря» и «дальше всех от уже выбранных пиков».
fn select_ridge_seeds<R: Rng>(
    mesh: &MeshGraph,
    water: &WaterState,
    component: &[i32],
    component_sizes: &[usize],
    controls: &TerrainGenerationControls,
    rng: &mut R,
) -> Vec<usize> {
    let requested = controls.ridge_count as usize;
    if requested == 0 {
        return Vec::new();
    }

    let mut candidates: Vec<usize> = Vec::new();
    for f in 0..mesh.faces.len() {
        if !water.is_land[f] {
            continue;
        }
        let d = water.land_distance[f];
        let is_local_max = mesh.faces[f]
            .neighbors
            .iter()
            .all(|&nb| !water.is_land[nb] || water.land_distance[nb] <= d);
        if is_local_max {
            candidates.push(f);
        }
    }
    if candidates.len() <= requested {
        return candidates;
    }

    let max_dist = water.max_land_distance().max(1) as f32;
    let map_diag = (mesh.width * mesh.width + mesh.height * mesh.height).sqrt();
    let mut seeds: Vec<usize> = Vec::with_capacity(requested);
    let mut remaining = candidates;

    // === По одному пику на компоненту (крупные компоненты первыми) ===
    let mut comp_order: Vec<usize> = (0..component_sizes.len()).collect();
    comp_order.sort_by_key(|&c| std::cmp::Reverse(component_sizes[c]));
    for comp in comp_order {
        if seeds.len() >= requested {
            break;
        }
        let best = remaining
            .iter()
            .copied()
            .filter(|&f| component[f] == comp as i32)
            .max_by_key(|&f| (water.land_distance[f], std::cmp::Reverse(f)));
        if let Some(f) = best {
            seeds.push(f);
            remaining.retain(|&r| r != f);
        }
    }

    // === Добор взвешенным случайным выбором ===
    while seeds.len() < requested && !remaining.is_empty() {
        let weights: Vec<f32> = remaining
            .iter()
            .map(|&f| {
                let from_sea = water.land_distance[f] as f32 / max_dist;
                let from_seeds = seeds
                    .iter()
                    .map(|&s| mesh.faces[f].site.dist(mesh.faces[s].site))
                    .fold(f32::INFINITY, f32::min)
                    / map_diag;
                (1.0 - controls.ridge_separation) * from_sea
                    + controls.ridge_separation * from_seeds
            })
            .collect();

        let total: f32 = weights.iter().sum();
        let pick = if total > 0.0 {
            let mut x = rng.gen_range(0.0..total);
            let mut chosen = remaining.len() - 1;
            for (i, &w) in weights.iter().enumerate() {
                if x < w {
                    chosen = i;
                    break;
                }
                x -= w;
            }
            chosen
        } else {
            0
        };
        seeds.push(remaining.swap_remove(pick));
    }

    seeds
}

/// Подъём вокруг пиков: степенной спад по кольцам BFS, максимум по пикам
fn ridge_boost_field(
    mesh: &MeshGraph,
    water: &WaterState,
    seeds: &[usize],
    controls: &TerrainGenerationControls,
) -> Vec<f32> {
    let n = mesh.faces.len();
    let mut boost = vec![0.0f32; n];
    let radius = controls.ridge_radius as i32;
    let max_dist = water.max_land_distance().max(1) as f32;

    for &seed in seeds {
        let mut dist = vec![-1i32; n];
        let mut queue = VecDeque::new();
        dist[seed] = 0;
        queue.push_back(seed);
        while let Some(f) = queue.pop_front() {
            let d = dist[f];
            let shaped = (1.0 - d as f32 / radius as f32)
                .max(0.0)
                .powf(controls.ridge_falloff_exponent)
                * controls.ridge_strength;
            // Тяготение к центру суши: у берега подъём слабее
            let coast_factor = 1.0
                + controls.ridge_coast_affinity
                    * (water.land_distance[f] as f32 / max_dist - 1.0);
            boost[f] = boost[f].max(shaped * coast_factor.max(0.0));

            if d >= radius {
                continue;
            }
            for &nb in &mesh.faces[f].neighbors {
                if water.is_land[nb] && dist[nb] < 0 {
                    dist[nb] = d + 1;
                    queue.push_back(nb);
                }
            }
        }
    }
    boost
}

/// Соединение пиков грядами: ближайший неприсоединённый пик через кратчайший
/// путь по суше, подъём вдоль пути и расширение наружу со спадом по шагам
fn connect_ridges(
    mesh: &MeshGraph,
    water: &WaterState,
    seeds: &[usize],
    boost: &mut [f32],
    controls: &TerrainGenerationControls,
) {
    if seeds.len() < 2 || controls.ridge_continuity <= 0.0 {
        return;
    }

    let mut connected = vec![seeds[0]];
    let mut pending: Vec<usize> = seeds[1..].to_vec();
    let mut path_faces: Vec<(usize, f32)> = Vec::new();

    while !pending.is_empty() {
        // Ближайшая пара (присоединённый, ожидающий) по расстоянию между сайтами
        let mut best: Option<(usize, usize, f32)> = None;
        for &s in &connected {
            for (pi, &t) in pending.iter().enumerate() {
                let d = mesh.faces[s].site.dist(mesh.faces[t].site);
                if best.is_none_or(|(_, _, bd)| d < bd) {
                    best = Some((s, pi, d));
                }
            }
        }
        let Some((from, pending_idx, _)) = best else {
            break;
        };
        let to = pending.remove(pending_idx);
        connected.push(to);

        let Some(path) = shortest_land_path(mesh, &water.is_land, from, to) else {
            continue; // пики в разных компонентах суши
        };
        let len = path.len().max(2) as f32;
        for (k, &f) in path.iter().enumerate() {
            let t = k as f32 / (len - 1.0);
            // Гряда интерполирует подъём между пиками, ослабленная связностью
            let blended = (boost[from] * (1.0 - t) + boost[to] * t) * controls.ridge_continuity;
            if blended > boost[f] {
                boost[f] = blended;
                path_faces.push((f, blended));
            }
        }
    }

    // === Расширение гряды наружу: мультиисточниковый BFS со спадом ===
    let dilate_radius = (controls.ridge_radius / 3).max(1) as i32;
    let n = mesh.faces.len();
    let mut hop = vec![-1i32; n];
    let mut source_boost = vec![0.0f32; n];
    let mut queue = VecDeque::new();
    for &(f, b) in &path_faces {
        if b > source_boost[f] {
            source_boost[f] = b;
        }
        if hop[f] < 0 {
            hop[f] = 0;
            queue.push_back(f);
        }
    }
    while let Some(f) = queue.pop_front() {
        let d = hop[f];
        if d > 0 {
            let falloff = 1.0 - d as f32 / (dilate_radius + 1) as f32;
            boost[f] = boost[f].max(source_boost[f] * falloff);
        }
        if d >= dilate_radius {
            continue;
        }
        for &nb in &mesh.faces[f].neighbors {
            if water.is_land[nb] && hop[nb] < 0 {
                hop[nb] = d + 1;
                source_boost[nb] = source_boost[f];
                queue.push_back(nb);
            }
        }
    }
}

/// Синтезирует ступени высоты по граням и усреднённые высоты вершин.
#[must_use]
pub fn synthesize_elevation<R: Rng>(
    mesh: &MeshGraph,
    water: &WaterState,
    controls: &TerrainGenerationControls,
    rng: &mut R,
) -> MountainState {
    let n = mesh.faces.len();
    let max_dist = water.max_land_distance().max(1) as f32;

    // === 1. Базовая высота от удаления от берега ===
    let mut elevation = vec![0i32; n];
    for f in 0..n {
        if water.is_land[f] {
            let t = (water.land_distance[f] as f32 / max_dist).powf(1.6);
            let base = 1.0 + controls.land_relief * t * (MAX_LAND_ELEVATION - 1) as f32;
            elevation[f] = (base.floor() as i32).clamp(1, MAX_LAND_ELEVATION);
        } else {
            elevation[f] = water.water_elevation[f];
        }
    }

    // === 2–4. Хребты ===
    let (component, component_sizes) = land_components(mesh, &water.is_land);
    let ridge_seeds = select_ridge_seeds(mesh, water, &component, &component_sizes, controls, rng);
    let mut boost = ridge_boost_field(mesh, water, &ridge_seeds, controls);
    connect_ridges(mesh, water, &ridge_seeds, &mut boost, controls);

    for f in 0..n {
        if !water.is_land[f] || boost[f] <= 0.0 {
            continue;
        }
        let headroom = MAX_LAND_ELEVATION - elevation[f];
        let mut add = (boost[f] * (MAX_LAND_ELEVATION - 1) as f32).round() as i32;
        if controls.coast_cap_enabled {
            // Потолок подъёма: пик не может вырасти вплотную к берегу
            let cap = controls.coast_cap_offset
                + controls.coast_cap_slope * water.land_distance[f] as f32;
            add = add.min((cap.floor() as i32 - elevation[f]).max(0));
        }
        elevation[f] += add.clamp(0, headroom);
    }

    // === 5. Сглаживание низинных плато ===
    if controls.plateau_strength > 0.0 && controls.plateau_threshold > 0 {
        let threshold = controls.plateau_threshold as i32;
        let snapshot = elevation.clone();
        for f in 0..n {
            if !water.is_land[f] || snapshot[f] >= threshold {
                continue;
            }
            let mut sum = 0.0f32;
            let mut count = 0usize;
            // Усредняем только по соседям той же низинной полосы: хребет
            // рядом с низиной не подтягивает её вверх
            for &nb in &mesh.faces[f].neighbors {
                if water.is_land[nb] && snapshot[nb] < threshold {
                    sum += snapshot[nb] as f32;
                    count += 1;
                }
            }
            if count == 0 {
                continue;
            }
            let avg = sum / count as f32;
            let blended =
                snapshot[f] as f32 * (1.0 - controls.plateau_strength) + avg * controls.plateau_strength;
            elevation[f] = (blended.round() as i32).clamp(1, MAX_LAND_ELEVATION);
        }
    }

    // === 6. Финальный потолок от расстояния до берега ===
    if controls.coast_cap_enabled {
        for f in 0..n {
            if water.is_land[f] {
                let cap = controls.coast_cap_offset
                    + controls.coast_cap_slope * water.land_distance[f] as f32;
                elevation[f] = elevation[f].min((cap.floor() as i32).max(1));
            }
        }
    }

    // === 7. Высоты вершин (среднее по инцидентным граням) ===
    let mut vertex_elevation = vec![0.0f32; mesh.vertices.len()];
    for (v, vertex) in mesh.vertices.iter().enumerate() {
        if vertex.faces.is_empty() {
            continue;
        }
        let sum: f32 = vertex.faces.iter().map(|&f| elevation[f] as f32).sum();
        vertex_elevation[v] = sum / vertex.faces.len() as f32;
    }

    MountainState {
        land_elevation: elevation,
        vertex_elevation,
        ridge_seeds,
    }
}
