// src/nav.rs
//! Навигационный граф по суше и поиск пути A*
//!
//! Узел — грань суши ниже порога непроходимости. Стоимость шага к соседу:
//! `elevation_factor(высота цели) × (1 + речной штраф)`, поэтому рёбра
//! взаимны, но с потенциально разной стоимостью в каждую сторону.
//!
//! Эвристика A* — прямое расстояние, нормированное на наблюдаемый максимум
//! длины одного шага в графе; она допустима, пока все реальные стоимости
//! шага не меньше 1 в этой единице (фактор высоты ≥ 1 это гарантирует).
//! Равные стоимости разрешаются меньшим id грани — ради детерминизма.

use crate::config::TerrainGenerationControls;
use crate::elevation::MAX_LAND_ELEVATION;
use crate::geometry::Point2;
use crate::mesh::MeshGraph;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Параметры стоимости шага
#[derive(Debug, Clone, Copy)]
pub struct NavCostParams {
    /// Нормированная высота, ниже которой фактор равен 1
    pub lowland_threshold: f32,
    /// Нормированная высота, с которой грань исключается из графа
    pub impassable_threshold: f32,
    /// Максимальная надбавка фактора на подходе к порогу
    pub elevation_gain: f32,
    /// Экспонента роста фактора
    pub elevation_power: f32,
    /// Множительная надбавка за пересечение речного ребра
    pub river_penalty: f32,
}

impl NavCostParams {
    #[must_use]
    pub fn from_controls(controls: &TerrainGenerationControls) -> Self {
        Self {
            lowland_threshold: controls.nav_lowland_threshold,
            impassable_threshold: controls.nav_impassable_threshold,
            elevation_gain: controls.nav_elevation_gain,
            elevation_power: controls.nav_elevation_power,
            river_penalty: controls.nav_river_penalty,
        }
    }

    /// Фактор стоимости для нормированной высоты цели.
    ///
    /// `None` — грань непроходима и исключается из графа.
    #[must_use]
    pub fn elevation_factor(&self, normalized: f32) -> Option<f32> {
        if normalized >= self.impassable_threshold {
            return None;
        }
        if normalized < self.lowland_threshold {
            return Some(1.0);
        }
        let span = (self.impassable_threshold - self.lowland_threshold).max(1e-6);
        let t = (normalized - self.lowland_threshold) / span;
        Some(1.0 + self.elevation_gain * t.powf(self.elevation_power))
    }
}

/// Переход к соседней грани
#[derive(Debug, Clone, Copy)]
pub struct NavLink {
    /// Грань назначения
    pub to: usize,
    /// Пересекаемое ребро меша
    pub edge: usize,
    /// Стоимость шага (зависит от высоты грани назначения)
    pub cost: f32,
}

/// Узел навигационного графа
#[derive(Debug, Clone)]
pub struct NavNode {
    pub point: Point2,
    pub links: Vec<NavLink>,
}

/// Взвешенный граф движения по суше
#[derive(Debug, Clone)]
pub struct NavigationGraph {
    /// Узлы по id граней меша; `None` — вода или непроходимая грань
    pub nodes: Vec<Option<NavNode>>,
    pub params: NavCostParams,
    /// Максимальная длина одного шага (нормировка эвристики)
    pub max_step_distance: f32,
}

/// Результат поиска пути
#[derive(Debug, Clone)]
pub struct FacePath {
    /// Грани от старта к цели включительно; пуста, если маршрута нет
    pub faces: Vec<usize>,
    /// Суммарная стоимость; `INFINITY`, если маршрута нет
    pub total_cost: f32,
}

impl FacePath {
    fn no_route() -> Self {
        Self {
            faces: Vec::new(),
            total_cost: f32::INFINITY,
        }
    }
}

/// Строит навигационный граф по граням суши.
#[must_use]
pub fn build_navigation_graph(
    mesh: &MeshGraph,
    is_land: &[bool],
    land_elevation: &[i32],
    river_edge_mask: &[bool],
    params: NavCostParams,
) -> NavigationGraph {
    let n = mesh.faces.len();
    let normalized =
        |f: usize| -> f32 { land_elevation[f] as f32 / MAX_LAND_ELEVATION as f32 };

    // Грань входит в граф, если она суша и её фактор определён
    let included: Vec<bool> = (0..n)
        .map(|f| is_land[f] && params.elevation_factor(normalized(f)).is_some())
        .collect();

    let mut nodes: Vec<Option<NavNode>> = vec![None; n];
    let mut max_step_distance = 0.0f32;

    for f in 0..n {
        if !included[f] {
            continue;
        }
        let mut links = Vec::new();
        for &e in &mesh.faces[f].edges {
            let other = mesh.edges[e].other_face(f);
            if other < 0 {
                continue;
            }
            let to = other as usize;
            if !included[to] {
                continue;
            }
            let Some(factor) = params.elevation_factor(normalized(to)) else {
                continue;
            };
            let river_mult = if river_edge_mask[e] {
                1.0 + params.river_penalty
            } else {
                1.0
            };
            links.push(NavLink {
                to,
                edge: e,
                cost: factor * river_mult,
            });
            let step = mesh.faces[f].site.dist(mesh.faces[to].site);
            max_step_distance = max_step_distance.max(step);
        }
        nodes[f] = Some(NavNode {
            point: mesh.faces[f].site,
            links,
        });
    }

    NavigationGraph {
        nodes,
        params,
        max_step_distance: max_step_distance.max(1e-6),
    }
}

/// Стоимость с тотальным порядком для кучи
#[derive(Debug, Clone, Copy, PartialEq)]
struct Cost(f32);

impl Eq for Cost {}
impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Cost {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Классический A* по навигационному графу.
///
/// Возвращает пустой путь и бесконечную стоимость, если маршрута нет или
/// старт/цель исключены из графа (вода, непроходимая высота).
#[must_use]
pub fn find_face_path_astar(graph: &NavigationGraph, start: usize, target: usize) -> FacePath {
    let n = graph.nodes.len();
    if start >= n || target >= n {
        return FacePath::no_route();
    }
    let (Some(start_node), Some(target_node)) = (&graph.nodes[start], &graph.nodes[target]) else {
        return FacePath::no_route();
    };
    let target_point = target_node.point;
    let start_heuristic = start_node.point.dist(target_point) / graph.max_step_distance;

    let heuristic = |node: &NavNode| node.point.dist(target_point) / graph.max_step_distance;

    let mut g_score = vec![f32::INFINITY; n];
    let mut prev = vec![usize::MAX; n];
    let mut closed = vec![false; n];
    // (f, id грани): при равном f выигрывает меньший id
    let mut open: BinaryHeap<Reverse<(Cost, usize)>> = BinaryHeap::new();

    g_score[start] = 0.0;
    open.push(Reverse((Cost(start_heuristic), start)));

    while let Some(Reverse((_, face))) = open.pop() {
        if closed[face] {
            continue;
        }
        closed[face] = true;

        if face == target {
            let mut path = vec![target];
            let mut cur = target;
            while cur != start {
                cur = prev[cur];
                path.push(cur);
            }
            path.reverse();
            return FacePath {
                faces: path,
                total_cost: g_score[target],
            };
        }

        let Some(node) = &graph.nodes[face] else {
            continue;
        };
        for link in &node.links {
            if closed[link.to] {
                continue;
            }
            let Some(to_node) = &graph.nodes[link.to] else {
                continue;
            };
            let tentative = g_score[face] + link.cost;
            if tentative < g_score[link.to] {
                g_score[link.to] = tentative;
                prev[link.to] = face;
                open.push(Reverse((Cost(tentative + heuristic(to_node)), link.to)));
            }
        }
    }

    FacePath::no_route()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Ручной граф 3×3: грани 0..9, сетка
    /// ```text
    /// 0 1 2
    /// 3 4 5
    /// 6 7 8
    /// ```
    fn grid_graph(costs: &[(usize, usize, f32)]) -> NavigationGraph {
        let params = NavCostParams {
            lowland_threshold: 0.35,
            impassable_threshold: 0.9,
            elevation_gain: 2.0,
            elevation_power: 2.0,
            river_penalty: 1.5,
        };
        let mut nodes: Vec<Option<NavNode>> = (0..9)
            .map(|f| {
                Some(NavNode {
                    point: Point2::new((f % 3) as f32 * 10.0, (f / 3) as f32 * 10.0),
                    links: Vec::new(),
                })
            })
            .collect();
        for &(a, b, cost) in costs {
            nodes[a]
                .as_mut()
                .unwrap()
                .links
                .push(NavLink { to: b, edge: 0, cost });
            nodes[b]
                .as_mut()
                .unwrap()
                .links
                .push(NavLink { to: a, edge: 0, cost });
        }
        NavigationGraph {
            nodes,
            params,
            max_step_distance: 10.0,
        }
    }

    #[test]
    fn astar_finds_provably_minimal_path() {
        // Прямой коридор 0→1→2→5→8 стоит 4; любой обход дороже
        let graph = grid_graph(&[
            (0, 1, 1.0),
            (1, 2, 1.0),
            (2, 5, 1.0),
            (5, 8, 1.0),
            (0, 3, 2.0),
            (3, 4, 5.0),
            (4, 5, 5.0),
            (1, 4, 5.0),
            (4, 7, 5.0),
            (7, 8, 1.0),
            (3, 6, 1.0),
            (6, 7, 1.0),
        ]);
        let path = find_face_path_astar(&graph, 0, 8);
        assert_eq!(path.faces, vec![0, 1, 2, 5, 8]);
        assert!((path.total_cost - 4.0).abs() < 1e-6);
    }

    #[test]
    fn astar_takes_cheap_detour_over_expensive_straight() {
        let graph = grid_graph(&[
            (0, 1, 10.0),
            (1, 2, 10.0),
            (0, 3, 1.0),
            (3, 6, 1.0),
            (6, 7, 1.0),
            (7, 8, 1.0),
            (8, 5, 1.0),
            (5, 2, 1.0),
        ]);
        let path = find_face_path_astar(&graph, 0, 2);
        assert_eq!(path.faces, vec![0, 3, 6, 7, 8, 5, 2]);
        assert!((path.total_cost - 6.0).abs() < 1e-6);
    }

    #[test]
    fn excluded_target_returns_empty_and_infinite() {
        let mut graph = grid_graph(&[(0, 1, 1.0)]);
        graph.nodes[8] = None; // «под водой»
        let path = find_face_path_astar(&graph, 0, 8);
        assert!(path.faces.is_empty());
        assert!(path.total_cost.is_infinite());
    }

    #[test]
    fn disconnected_component_returns_empty_and_infinite() {
        let graph = grid_graph(&[(0, 1, 1.0), (7, 8, 1.0)]);
        let path = find_face_path_astar(&graph, 0, 8);
        assert!(path.faces.is_empty());
        assert!(path.total_cost.is_infinite());
    }

    #[test]
    fn start_equals_target_is_zero_cost() {
        let graph = grid_graph(&[(0, 1, 1.0)]);
        let path = find_face_path_astar(&graph, 4, 4);
        assert_eq!(path.faces, vec![4]);
        assert!(path.total_cost.abs() < 1e-6);
    }

    #[test]
    fn elevation_factor_shapes_cost() {
        let params = NavCostParams {
            lowland_threshold: 0.35,
            impassable_threshold: 0.9,
            elevation_gain: 2.0,
            elevation_power: 2.0,
            river_penalty: 1.5,
        };
        assert!((params.elevation_factor(0.1).unwrap() - 1.0).abs() < 1e-6);
        assert!(params.elevation_factor(0.9).is_none());
        assert!(params.elevation_factor(1.0).is_none());
        let mid = params.elevation_factor(0.625).unwrap();
        assert!(mid > 1.0 && mid < 3.0);
        // Монотонный рост между порогами
        assert!(
            params.elevation_factor(0.8).unwrap() > params.elevation_factor(0.5).unwrap()
        );
    }

    #[test]
    fn built_graph_excludes_water_and_peaks() {
        use crate::rng::{SALT_ELEVATION, SALT_SITES, SALT_WATER, stage_rng};
        let controls = crate::config::TerrainGenerationControls {
            seed: 1337,
            ..crate::config::TerrainGenerationControls::default()
        }
        .sanitized();
        let mut rng = stage_rng(controls.seed, SALT_SITES);
        let sites = crate::sampler::sample_sites(512.0, 512.0, 32.0, &mut rng);
        let mesh = crate::mesh::build_mesh(&sites, 512.0, 512.0);
        let mut wrng = stage_rng(controls.seed, SALT_WATER);
        let water = crate::water::classify_water(&mesh, &controls, &mut wrng);
        let mut erng = stage_rng(controls.seed, SALT_ELEVATION);
        let mountains = crate::elevation::synthesize_elevation(&mesh, &water, &controls, &mut erng);
        let mask = vec![false; mesh.edges.len()];
        let graph = build_navigation_graph(
            &mesh,
            &water.is_land,
            &mountains.land_elevation,
            &mask,
            NavCostParams::from_controls(&controls),
        );
        for f in 0..mesh.faces.len() {
            if !water.is_land[f] {
                assert!(graph.nodes[f].is_none());
            }
            if let Some(node) = &graph.nodes[f] {
                for link in &node.links {
                    assert!(link.cost >= 1.0);
                    assert!(graph.nodes[link.to].is_some());
                }
            }
        }
    }
}
