// src/mesh.rs
//! Планарный граф карты: грани (ячейки Вороного), вершины и рёбра
//!
//! Ячейка каждого сайта строится отсечением прямоугольника карты
//! полуплоскостями серединных перпендикуляров ко всем остальным сайтам
//! (клиппинг Сазерленда–Ходжмана). Вершины и рёбра дедуплицируются по
//! квантованному ключу координат, поэтому общие углы и стороны соседних
//! ячеек указывают на одни и те же сущности графа.
//!
//! Высоты в меше не хранятся: каждая стадия возвращает собственный
//! неизменяемый массив поверх индексов граней.

use crate::geometry::{Point2, edge_key, quantize};
use std::collections::HashMap;

/// Отсутствующая грань у ребра внешней границы карты
pub const NO_FACE: i32 = -1;

/// Грань меша — ячейка Вороного одного сайта
#[derive(Debug, Clone)]
pub struct Face {
    /// Сайт, породивший ячейку
    pub site: Point2,
    /// Замкнутый контур вершин в порядке обхода
    pub vertices: Vec<usize>,
    /// Смежные грани (через общее ребро)
    pub neighbors: Vec<usize>,
    /// Рёбра границы ячейки
    pub edges: Vec<usize>,
}

/// Вершина меша — общий угол нескольких ячеек
#[derive(Debug, Clone, Default)]
pub struct Vertex {
    pub point: Point2,
    /// Грани, в контур которых входит вершина
    pub faces: Vec<usize>,
    /// Вершины, соединённые ребром
    pub adjacent: Vec<usize>,
    /// Инцидентные рёбра
    pub edges: Vec<usize>,
}

/// Ребро меша между двумя вершинами
#[derive(Debug, Clone)]
pub struct Edge {
    /// Грань слева (первая зарегистрировавшая ребро)
    pub face_a: i32,
    /// Грань справа, `NO_FACE` у внешней границы
    pub face_b: i32,
    pub v0: usize,
    pub v1: usize,
    pub midpoint: Point2,
}

impl Edge {
    /// Вторая грань ребра относительно данной (`NO_FACE`, если её нет)
    #[must_use]
    pub fn other_face(&self, face: usize) -> i32 {
        if self.face_a == face as i32 {
            self.face_b
        } else {
            self.face_a
        }
    }
}

/// Полный планарный граф карты
#[derive(Debug, Clone)]
pub struct MeshGraph {
    pub width: f32,
    pub height: f32,
    pub faces: Vec<Face>,
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
}

const BORDER_EPS: f32 = 0.25;

impl MeshGraph {
    /// Грань касается внешней границы карты хотя бы одной вершиной
    #[must_use]
    pub fn face_touches_border(&self, face: usize) -> bool {
        self.faces[face].vertices.iter().any(|&v| {
            let p = self.vertices[v].point;
            p.x < BORDER_EPS
                || p.y < BORDER_EPS
                || p.x > self.width - BORDER_EPS
                || p.y > self.height - BORDER_EPS
        })
    }

    /// Ребро между двумя гранями, если они смежны
    #[must_use]
    pub fn edge_between(&self, a: usize, b: usize) -> Option<usize> {
        self.faces[a]
            .edges
            .iter()
            .copied()
            .find(|&e| self.edges[e].other_face(a) == b as i32)
    }
}

/// Клиппинг многоугольника полуплоскостью «ближе к site, чем к other».
///
/// Оставляем точки p с dot(p − m, other − site) ≤ 0, где m — середина отрезка
/// между сайтами; на смене знака добавляется точка пересечения.
fn clip_half_plane(polygon: &[Point2], site: Point2, other: Point2) -> Vec<Point2> {
    let mid = site.midpoint(other);
    let dir_x = other.x - site.x;
    let dir_y = other.y - site.y;
    let side = |p: Point2| -> f32 { (p.x - mid.x) * dir_x + (p.y - mid.y) * dir_y };

    let mut result = Vec::with_capacity(polygon.len() + 1);
    for i in 0..polygon.len() {
        let cur = polygon[i];
        let next = polygon[(i + 1) % polygon.len()];
        let dc = side(cur);
        let dn = side(next);

        if dc <= 0.0 {
            result.push(cur);
        }
        // Пересечение границы полуплоскости
        if (dc < 0.0 && dn > 0.0) || (dc > 0.0 && dn < 0.0) {
            let t = dc / (dc - dn);
            result.push(Point2::new(
                cur.x + (next.x - cur.x) * t,
                cur.y + (next.y - cur.y) * t,
            ));
        }
    }
    result
}

/// Строит планарный граф из списка сайтов.
///
/// Вырожденные ячейки (меньше трёх различимых вершин после клиппинга)
/// молча отбрасываются.
#[must_use]
pub fn build_mesh(sites: &[Point2], width: f32, height: f32) -> MeshGraph {
    let mut mesh = MeshGraph {
        width,
        height,
        faces: Vec::with_capacity(sites.len()),
        vertices: Vec::new(),
        edges: Vec::new(),
    };

    let mut vertex_by_key: HashMap<(i64, i64), usize> = HashMap::new();
    let mut edge_by_key: HashMap<((i64, i64), (i64, i64)), usize> = HashMap::new();

    for (i, &site) in sites.iter().enumerate() {
        // === 1. Ячейка Вороного: отсечение прямоугольника карты ===
        let mut polygon = vec![
            Point2::new(0.0, 0.0),
            Point2::new(width, 0.0),
            Point2::new(width, height),
            Point2::new(0.0, height),
        ];
        for (j, &other) in sites.iter().enumerate() {
            if i == j {
                continue;
            }
            polygon = clip_half_plane(&polygon, site, other);
            if polygon.len() < 3 {
                break;
            }
        }
        if polygon.len() < 3 {
            continue; // вырожденная ячейка
        }

        // === 2. Дедупликация вершин контура ===
        let mut loop_vertices: Vec<usize> = Vec::with_capacity(polygon.len());
        for &p in &polygon {
            let key = quantize(p);
            let vid = *vertex_by_key.entry(key).or_insert_with(|| {
                mesh.vertices.push(Vertex {
                    point: p,
                    ..Vertex::default()
                });
                mesh.vertices.len() - 1
            });
            // Квантование может склеить соседние точки контура
            if loop_vertices.last() != Some(&vid) {
                loop_vertices.push(vid);
            }
        }
        if loop_vertices.first() == loop_vertices.last() && loop_vertices.len() > 1 {
            loop_vertices.pop();
        }
        if loop_vertices.len() < 3 {
            continue;
        }

        let face_id = mesh.faces.len();
        mesh.faces.push(Face {
            site,
            vertices: loop_vertices.clone(),
            neighbors: Vec::new(),
            edges: Vec::new(),
        });

        // === 3. Рёбра контура с дедупликацией ===
        for k in 0..loop_vertices.len() {
            let v0 = loop_vertices[k];
            let v1 = loop_vertices[(k + 1) % loop_vertices.len()];
            let key = edge_key(
                quantize(mesh.vertices[v0].point),
                quantize(mesh.vertices[v1].point),
            );
            if let Some(&eid) = edge_by_key.get(&key) {
                // Вторая грань уже существующего ребра
                if mesh.edges[eid].face_b == NO_FACE && mesh.edges[eid].face_a != face_id as i32 {
                    mesh.edges[eid].face_b = face_id as i32;
                }
                mesh.faces[face_id].edges.push(eid);
            } else {
                let eid = mesh.edges.len();
                mesh.edges.push(Edge {
                    face_a: face_id as i32,
                    face_b: NO_FACE,
                    v0,
                    v1,
                    midpoint: mesh.vertices[v0].point.midpoint(mesh.vertices[v1].point),
                });
                edge_by_key.insert(key, eid);
                mesh.faces[face_id].edges.push(eid);
            }
        }
    }

    build_adjacency(&mut mesh);
    mesh
}

/// Достраивает симметричную смежность: грань↔грань, вершина↔грань, вершина↔вершина
fn build_adjacency(mesh: &mut MeshGraph) {
    for eid in 0..mesh.edges.len() {
        let edge = mesh.edges[eid].clone();

        if edge.face_a >= 0 && edge.face_b >= 0 {
            let (a, b) = (edge.face_a as usize, edge.face_b as usize);
            if !mesh.faces[a].neighbors.contains(&b) {
                mesh.faces[a].neighbors.push(b);
            }
            if !mesh.faces[b].neighbors.contains(&a) {
                mesh.faces[b].neighbors.push(a);
            }
        }

        for &(v, u) in &[(edge.v0, edge.v1), (edge.v1, edge.v0)] {
            if !mesh.vertices[v].adjacent.contains(&u) {
                mesh.vertices[v].adjacent.push(u);
            }
            if !mesh.vertices[v].edges.contains(&eid) {
                mesh.vertices[v].edges.push(eid);
            }
        }
    }

    let mut vertex_faces: Vec<Vec<usize>> = vec![Vec::new(); mesh.vertices.len()];
    for (fid, face) in mesh.faces.iter().enumerate() {
        for &v in &face.vertices {
            if !vertex_faces[v].contains(&fid) {
                vertex_faces[v].push(fid);
            }
        }
    }
    for (v, faces) in vertex_faces.into_iter().enumerate() {
        mesh.vertices[v].faces = faces;
    }
}
