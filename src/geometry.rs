// src/geometry.rs
//! Базовые геометрические примитивы для построения меша.

use serde::{Deserialize, Serialize};

/// Точка на плоскости карты (координаты в пикселях карты)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn dist_sq(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    #[must_use]
    pub fn dist(self, other: Self) -> f32 {
        self.dist_sq(other).sqrt()
    }

    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self {
            x: (self.x + other.x) * 0.5,
            y: (self.y + other.y) * 0.5,
        }
    }
}

/// Масштаб квантования координат: вершины, попавшие в одну ячейку 1/16 px,
/// считаются одной и той же вершиной графа.
const QUANT_SCALE: f32 = 16.0;

/// Ключ для дедупликации вершин/рёбер между соседними ячейками Вороного
#[must_use]
pub fn quantize(p: Point2) -> (i64, i64) {
    (
        (p.x * QUANT_SCALE).round() as i64,
        (p.y * QUANT_SCALE).round() as i64,
    )
}

/// Неориентированный ключ ребра из двух квантованных вершин
#[must_use]
pub fn edge_key(a: (i64, i64), b: (i64, i64)) -> ((i64, i64), (i64, i64)) {
    if a <= b { (a, b) } else { (b, a) }
}
