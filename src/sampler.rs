// src/sampler.rs
//! Расстановка сайтов меша методом Пуассона (алгоритм Бридсона)
//!
//! Дартс с ускоряющей сеткой: ячейка стороной `spacing/√2` вмещает не более
//! одной точки, поэтому проверка соседей сводится к окну 5×5 ячеек.
//! Детерминизм обеспечивается исключительно порядком запросов к ГСЧ.

use crate::geometry::Point2;
use rand::Rng;

/// Число кандидатов на одну активную точку до её отставки
const CANDIDATES_PER_POINT: u32 = 30;

/// Возвращает упорядоченный список сайтов для прямоугольника `width × height`.
///
/// Гарантий на число точек нет: выборка продолжается, пока есть активные
/// точки, у которых получается разместить кандидата.
#[must_use]
pub fn sample_sites<R: Rng>(width: f32, height: f32, spacing: f32, rng: &mut R) -> Vec<Point2> {
    // Вырожденный прямоугольник: пустая карта вместо паники
    if width <= 0.0 || height <= 0.0 || spacing <= 0.0 {
        return Vec::new();
    }
    let cell_size = spacing / std::f32::consts::SQRT_2;
    let grid_w = (width / cell_size).ceil() as usize + 1;
    let grid_h = (height / cell_size).ceil() as usize + 1;

    // В ячейке не более одной точки, храним её индекс
    let mut grid: Vec<i32> = vec![-1; grid_w * grid_h];
    let mut points: Vec<Point2> = Vec::new();
    let mut active: Vec<usize> = Vec::new();

    let grid_index = |p: Point2| -> usize {
        let gx = ((p.x / cell_size) as usize).min(grid_w - 1);
        let gy = ((p.y / cell_size) as usize).min(grid_h - 1);
        gy * grid_w + gx
    };

    // Проверка: нет ли уже точки ближе spacing в окне 5×5 ячеек
    let far_enough = |p: Point2, grid: &[i32], points: &[Point2]| -> bool {
        let gx = ((p.x / cell_size) as i64).min(grid_w as i64 - 1);
        let gy = ((p.y / cell_size) as i64).min(grid_h as i64 - 1);
        for dy in -2..=2i64 {
            for dx in -2..=2i64 {
                let nx = gx + dx;
                let ny = gy + dy;
                if nx < 0 || ny < 0 || nx >= grid_w as i64 || ny >= grid_h as i64 {
                    continue;
                }
                let slot = grid[(ny as usize) * grid_w + nx as usize];
                if slot >= 0 && points[slot as usize].dist_sq(p) < spacing * spacing {
                    return false;
                }
            }
        }
        true
    };

    // Стартовая точка
    let first = Point2::new(rng.gen_range(0.0..width), rng.gen_range(0.0..height));
    grid[grid_index(first)] = 0;
    points.push(first);
    active.push(0);

    while !active.is_empty() {
        // Случайная активная точка
        let active_slot = rng.gen_range(0..active.len());
        let parent = points[active[active_slot]];
        let mut placed = false;

        for _ in 0..CANDIDATES_PER_POINT {
            // Кандидат в кольце [spacing, 2·spacing)
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let radius = spacing * rng.gen_range(1.0..2.0);
            let candidate = Point2::new(
                parent.x + radius * angle.cos(),
                parent.y + radius * angle.sin(),
            );

            if candidate.x < 0.0 || candidate.y < 0.0 || candidate.x >= width
                || candidate.y >= height
            {
                continue;
            }
            if !far_enough(candidate, &grid, &points) {
                continue;
            }

            let id = points.len();
            grid[grid_index(candidate)] = id as i32;
            points.push(candidate);
            active.push(id);
            placed = true;
            break;
        }

        if !placed {
            // Точка в отставку: вокруг неё места больше нет
            active.swap_remove(active_slot);
        }
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{SALT_SITES, stage_rng};

    #[test]
    fn respects_minimum_spacing() {
        let mut rng = stage_rng(7, SALT_SITES);
        let spacing = 24.0;
        let points = sample_sites(256.0, 256.0, spacing, &mut rng);
        assert!(points.len() > 20);
        for (i, a) in points.iter().enumerate() {
            for b in points.iter().skip(i + 1) {
                assert!(
                    a.dist(*b) >= spacing - 1e-3,
                    "точки {a:?} и {b:?} ближе spacing"
                );
            }
        }
    }

    #[test]
    fn degenerate_rectangle_gives_no_sites() {
        let mut rng = stage_rng(3, SALT_SITES);
        assert!(sample_sites(0.0, 256.0, 16.0, &mut rng).is_empty());
        assert!(sample_sites(256.0, 0.0, 16.0, &mut rng).is_empty());
        assert!(sample_sites(256.0, 256.0, 0.0, &mut rng).is_empty());
    }

    #[test]
    fn stays_inside_bounds() {
        let mut rng = stage_rng(11, SALT_SITES);
        for p in sample_sites(200.0, 100.0, 16.0, &mut rng) {
            assert!(p.x >= 0.0 && p.x < 200.0);
            assert!(p.y >= 0.0 && p.y < 100.0);
        }
    }

    #[test]
    fn identical_rng_gives_identical_sites() {
        let mut a = stage_rng(1337, SALT_SITES);
        let mut b = stage_rng(1337, SALT_SITES);
        let pa = sample_sites(256.0, 256.0, 32.0, &mut a);
        let pb = sample_sites(256.0, 256.0, 32.0, &mut b);
        assert_eq!(pa.len(), pb.len());
        for (x, y) in pa.iter().zip(pb.iter()) {
            assert_eq!(x.x.to_bits(), y.x.to_bits());
            assert_eq!(x.y.to_bits(), y.y.to_bits());
        }
    }
}
