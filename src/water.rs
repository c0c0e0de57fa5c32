// src/water.rs
//! Классификация суши и воды
//!
//! Решение суша/вода для грани: грань не касается границы карты и её сайт
//! попадает внутрь радиальной формы острова. Форма — сумма двух синусоид от
//! угла плюс фрактальный value-шум (с опциональным доменным искажением),
//! сравниваемая с нормированным расстоянием от центра карты.
//!
//! Дальше три волны BFS:
//! 1. от береговых граней суши вглубь — `land_distance` (кольца от берега);
//! 2. от касающейся границы воды — `ocean_water` (всё прочее — озёра);
//! 3. от прибрежной воды вглубь водоёмов — убывающий `water_elevation`.

use crate::config::TerrainGenerationControls;
use crate::mesh::MeshGraph;
use fastnoise_lite::{DomainWarpType, FastNoiseLite, FractalType, NoiseType};
use rand::{Rng, RngCore};
use std::collections::VecDeque;

/// Результат классификации воды (неизменяемый выход стадии)
#[derive(Debug, Clone)]
pub struct WaterState {
    /// Грань — суша
    pub is_land: Vec<bool>,
    /// Вода, достижимая от границы карты (остальная вода — озёра)
    pub ocean_water: Vec<bool>,
    /// Кольца BFS от ближайшей береговой грани суши, −1 для воды
    pub land_distance: Vec<i32>,
    /// Отрицательная «глубина» воды для батиметрии, 0 на суше
    pub water_elevation: Vec<i32>,
}

impl WaterState {
    /// Максимальное удаление суши от берега (0, если суши нет)
    #[must_use]
    pub fn max_land_distance(&self) -> i32 {
        self.land_distance.iter().copied().max().unwrap_or(0).max(0)
    }
}

/// Радиальная форма острова: радиус как функция угла
fn island_radius_at(controls: &TerrainGenerationControls, angle: f32) -> f32 {
    let bumps = controls.shape_bump_count as f32;
    let primary =
        controls.shape_bump_amplitude * (bumps * angle + controls.shape_phase).sin();
    // Вторая синусоида с несоизмеримой частотой ломает симметрию лепестков
    let secondary = controls.shape_secondary_amplitude
        * ((bumps * 2.0 + 1.0) * angle - controls.shape_phase * 1.7).sin();
    controls.island_radius * (1.0 + primary + secondary)
}

/// Классифицирует грани меша на сушу, океан и озёра.
///
/// Из ГСЧ стадии потребляются ровно два значения — сиды шума и искажения, —
/// поэтому порядок запросов фиксирован и детерминизм гарантирован.
#[must_use]
pub fn classify_water<R: Rng>(
    mesh: &MeshGraph,
    controls: &TerrainGenerationControls,
    rng: &mut R,
) -> WaterState {
    let n = mesh.faces.len();
    let min_side = mesh.width.min(mesh.height);
    let half = min_side * 0.5;
    let cx = mesh.width * 0.5;
    let cy = mesh.height * 0.5;

    // === 1. Шум береговой линии ===
    let mut noise = FastNoiseLite::new();
    noise.set_seed(Some(rng.next_u32() as i32));
    noise.set_noise_type(Some(NoiseType::Value));
    noise.set_fractal_type(Some(FractalType::FBm));
    noise.set_fractal_octaves(Some(controls.noise_octaves as i32));
    noise.set_fractal_gain(Some(controls.noise_gain));
    noise.set_fractal_lacunarity(Some(controls.noise_lacunarity));
    noise.set_frequency(Some(controls.noise_frequency / min_side));

    let mut warp = FastNoiseLite::new();
    warp.set_seed(Some(rng.next_u32() as i32));
    warp.set_domain_warp_type(Some(DomainWarpType::OpenSimplex2));
    warp.set_domain_warp_amp(Some(controls.warp_amplitude));
    warp.set_frequency(Some(controls.noise_frequency * 0.5 / min_side));

    // === 2. Решение суша/вода по граням ===
    let mut is_land = vec![false; n];
    for (f, face) in mesh.faces.iter().enumerate() {
        if mesh.face_touches_border(f) {
            continue;
        }
        let (mut sx, mut sy) = (face.site.x, face.site.y);
        if controls.warp_enabled {
            (sx, sy) = warp.domain_warp_2d(sx, sy);
        }
        let noise_value = noise.get_noise_2d(sx, sy); // [-1, 1]

        let dx = (face.site.x - cx) / half;
        let dy = (face.site.y - cy) / half;
        let dist = (dx * dx + dy * dy).sqrt();
        let angle = dy.atan2(dx);

        let radius = island_radius_at(controls, angle) + noise_value * controls.noise_amplitude;
        is_land[f] = dist < radius;
    }

    // === 3. BFS колец от берега вглубь суши ===
    let mut land_distance = vec![-1i32; n];
    let mut queue = VecDeque::new();
    for (f, face) in mesh.faces.iter().enumerate() {
        if is_land[f] && face.neighbors.iter().any(|&nb| !is_land[nb]) {
            land_distance[f] = 0;
            queue.push_back(f);
        }
    }
    while let Some(f) = queue.pop_front() {
        for &nb in &mesh.faces[f].neighbors {
            if is_land[nb] && land_distance[nb] < 0 {
                land_distance[nb] = land_distance[f] + 1;
                queue.push_back(nb);
            }
        }
    }

    // === 4. Заливка океана от границы карты ===
    let mut ocean_water = vec![false; n];
    for f in 0..n {
        if !is_land[f] && mesh.face_touches_border(f) {
            ocean_water[f] = true;
            queue.push_back(f);
        }
    }
    while let Some(f) = queue.pop_front() {
        for &nb in &mesh.faces[f].neighbors {
            if !is_land[nb] && !ocean_water[nb] {
                ocean_water[nb] = true;
                queue.push_back(nb);
            }
        }
    }

    // === 5. Глубина воды: кольца от прибрежной воды вглубь водоёма ===
    let mut water_elevation = vec![0i32; n];
    let mut depth = vec![-1i32; n];
    for (f, face) in mesh.faces.iter().enumerate() {
        if !is_land[f] && face.neighbors.iter().any(|&nb| is_land[nb]) {
            depth[f] = 0;
            queue.push_back(f);
        }
    }
    while let Some(f) = queue.pop_front() {
        for &nb in &mesh.faces[f].neighbors {
            if !is_land[nb] && depth[nb] < 0 {
                depth[nb] = depth[f] + 1;
                queue.push_back(nb);
            }
        }
    }
    for f in 0..n {
        if !is_land[f] {
            // Вода без берега вообще (карта без суши) получает глубину 1
            water_elevation[f] = if depth[f] >= 0 { -depth[f] } else { -1 };
        }
    }

    WaterState {
        is_land,
        ocean_water,
        land_distance,
        water_elevation,
    }
}
