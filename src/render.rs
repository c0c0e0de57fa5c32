// src/render.rs
//! Диагностический рендер генерации в PNG
//!
//! Не игровой рендерер: быстрые превью для отладки контролов и визуальной
//! проверки стадий. Каждый пиксель красится по ближайшему сайту (поиск по
//! ведёрной сетке), реки рисуются отрезками по рёбрам меша.

use crate::elevation::{MAX_LAND_ELEVATION, MountainState};
use crate::mesh::MeshGraph;
use crate::province::ProvinceGraph;
use crate::rivers::RiverState;
use crate::water::WaterState;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Палитра провинций (индекс = цвет раскраски)
const PROVINCE_PALETTE: [[u8; 3]; 4] = [
    [196, 154, 108],
    [141, 179, 120],
    [205, 186, 124],
    [152, 138, 189],
];

/// Ведёрная сетка сайтов для поиска ближайшей грани по точке
struct SiteGrid {
    cell: f32,
    cols: usize,
    rows: usize,
    buckets: Vec<Vec<usize>>,
}

impl SiteGrid {
    fn build(mesh: &MeshGraph) -> Self {
        let area = mesh.width * mesh.height;
        let cell = (area / mesh.faces.len().max(1) as f32).sqrt().max(4.0);
        let cols = (mesh.width / cell).ceil() as usize + 1;
        let rows = (mesh.height / cell).ceil() as usize + 1;
        let mut buckets = vec![Vec::new(); cols * rows];
        for (f, face) in mesh.faces.iter().enumerate() {
            let cx = ((face.site.x / cell) as usize).min(cols - 1);
            let cy = ((face.site.y / cell) as usize).min(rows - 1);
            buckets[cy * cols + cx].push(f);
        }
        Self {
            cell,
            cols,
            rows,
            buckets,
        }
    }

    /// Ближайший сайт: кольца ведёрок расширяются, пока не найдём кандидата,
    /// плюс одно запасное кольцо для честного минимума
    fn nearest(&self, mesh: &MeshGraph, x: f32, y: f32) -> usize {
        let cx = ((x / self.cell) as i64).clamp(0, self.cols as i64 - 1);
        let cy = ((y / self.cell) as i64).clamp(0, self.rows as i64 - 1);
        let mut best = 0usize;
        let mut best_d = f32::INFINITY;
        let mut found_ring: Option<i64> = None;

        let max_ring = self.cols.max(self.rows) as i64;
        for ring in 0..=max_ring {
            if let Some(fr) = found_ring {
                if ring > fr + 1 {
                    break;
                }
            }
            for dy in -ring..=ring {
                for dx in -ring..=ring {
                    if dx.abs() != ring && dy.abs() != ring {
                        continue; // только периметр кольца
                    }
                    let bx = cx + dx;
                    let by = cy + dy;
                    if bx < 0 || by < 0 || bx >= self.cols as i64 || by >= self.rows as i64 {
                        continue;
                    }
                    for &f in &self.buckets[(by as usize) * self.cols + bx as usize] {
                        let d = mesh.faces[f].site.dist_sq(crate::geometry::Point2::new(x, y));
                        if d < best_d {
                            best_d = d;
                            best = f;
                        }
                    }
                }
            }
            if best_d.is_finite() && found_ring.is_none() {
                found_ring = Some(ring);
            }
        }
        best
    }
}

/// Цвет грани для превью карты
fn face_color(
    f: usize,
    water: &WaterState,
    mountains: &MountainState,
    provinces: Option<&ProvinceGraph>,
) -> [u8; 3] {
    if !water.is_land[f] {
        let depth = (-water.water_elevation[f]).clamp(0, 8) as u8;
        return if water.ocean_water[f] {
            [18, 60u8.saturating_sub(depth * 4), 130u8.saturating_sub(depth * 8)]
        } else {
            [60, 120, 180] // озеро
        };
    }
    if let Some(pg) = provinces {
        let pid = pg.province_by_face[f];
        if pid >= 0 {
            let color = pg.provinces[pid as usize].color as usize;
            return PROVINCE_PALETTE[color % PROVINCE_PALETTE.len()];
        }
    }
    // Высотные пояса: зелень → бурый → белёсые пики
    let e = mountains.land_elevation[f].clamp(1, MAX_LAND_ELEVATION) as f32
        / MAX_LAND_ELEVATION as f32;
    if e < 0.4 {
        [70 + (e * 100.0) as u8, 140, 60]
    } else if e < 0.8 {
        let t = ((e - 0.4) / 0.4 * 70.0) as u8;
        [120 + t, 110, 70]
    } else {
        let t = ((e - 0.8) / 0.2 * 100.0) as u8;
        [150 + t, 150 + t, 150 + t]
    }
}

/// Растеризует превью: рельеф с водой, опционально провинции, поверх — реки
#[must_use]
pub fn render_preview(
    mesh: &MeshGraph,
    water: &WaterState,
    mountains: &MountainState,
    rivers: &RiverState,
    provinces: Option<&ProvinceGraph>,
) -> RgbImage {
    let width = mesh.width as u32;
    let height = mesh.height as u32;
    let grid = SiteGrid::build(mesh);

    // Ближайшая грань на пиксель
    let total = (width * height) as usize;
    let assign_one = |i: usize| -> usize {
        let x = (i % width as usize) as f32 + 0.5;
        let y = (i / width as usize) as f32 + 0.5;
        grid.nearest(mesh, x, y)
    };
    #[cfg(feature = "parallel")]
    let assignment: Vec<usize> = (0..total).into_par_iter().map(assign_one).collect();
    #[cfg(not(feature = "parallel"))]
    let assignment: Vec<usize> = (0..total).map(assign_one).collect();

    let mut img = RgbImage::new(width, height);
    for (i, &f) in assignment.iter().enumerate() {
        let x = (i % width as usize) as u32;
        let y = (i / width as usize) as u32;
        img.put_pixel(x, y, Rgb(face_color(f, water, mountains, provinces)));
    }

    // Реки по рёбрам меша
    for trace in &rivers.traces {
        let color = if trace.depth == 0 {
            Rgb([30, 90, 200])
        } else {
            Rgb([60, 120, 220])
        };
        for &e in &trace.edges {
            let edge = &mesh.edges[e];
            let a = mesh.vertices[edge.v0].point;
            let b = mesh.vertices[edge.v1].point;
            draw_line_segment_mut(&mut img, (a.x, a.y), (b.x, b.y), color);
        }
    }

    img
}

/// Превью поля высот в оттенках серого
#[must_use]
pub fn render_elevation(mesh: &MeshGraph, mountains: &MountainState) -> RgbImage {
    let width = mesh.width as u32;
    let height = mesh.height as u32;
    let grid = SiteGrid::build(mesh);
    let mut img = RgbImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let f = grid.nearest(mesh, x as f32 + 0.5, y as f32 + 0.5);
            let e = mountains.land_elevation[f];
            let v = if e <= 0 {
                (40 + (e.max(-8) + 8) * 5) as u8
            } else {
                (90 + e * 16).min(255) as u8
            };
            img.put_pixel(x, y, Rgb([v, v, v]));
        }
    }
    img
}

/// Сохраняет изображение в PNG
pub fn save_png(img: &RgbImage, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    img.save(path)?;
    Ok(())
}
