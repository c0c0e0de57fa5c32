// src/config.rs
//! Конфигурация генерации острова
//!
//! Этот модуль определяет все параметры, управляющие процедурной генерацией:
//! - Размер карты и плотность ячеек меша
//! - Форма острова и шум береговой линии
//! - Рельеф, хребты и плато
//! - Реки и их ветвление
//! - Провинции и их балансировка
//! - Стоимости навигации для поиска пути
//!
//! Все структуры поддерживают сериализацию в TOML/JSON. Любое числовое поле
//! перед использованием проходит через [`TerrainGenerationControls::sanitized`]:
//! нечисловые значения заменяются умолчаниями, остальные зажимаются в
//! документированные диапазоны. Генерация никогда не падает из-за плохого
//! значения контрола.

use serde::{Deserialize, Serialize};
use std::fs;

/// Размер карты в пикселях
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Ширина карты (по умолчанию 512)
    #[serde(default = "default_map_side")]
    pub width: u32,

    /// Высота карты (по умолчанию 512)
    #[serde(default = "default_map_side")]
    pub height: u32,
}

fn default_map_side() -> u32 {
    512
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
        }
    }
}

/// Полный набор контролов генерации
///
/// Плоская запись: каждое поле задокументировано вместе с диапазоном зажима.
/// Сид входит в набор — два одинаковых набора контролов дают побитово
/// идентичные карты.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainGenerationControls {
    // === Меш ===
    /// Сид генератора случайных чисел
    #[serde(default)]
    pub seed: u64,

    /// Минимальное расстояние между сайтами Пуассона, px (диапазон 8..=128)
    #[serde(default = "default_site_spacing")]
    pub site_spacing: f32,

    // === Форма острова и вода ===
    /// Базовый радиус острова как доля половины меньшей стороны карты (0.1..=0.95)
    #[serde(default = "default_island_radius")]
    pub island_radius: f32,

    /// Число "лепестков" первой синусоиды формы берега (1..=12)
    #[serde(default = "default_shape_bump_count")]
    pub shape_bump_count: u32,

    /// Амплитуда первой синусоиды (0.0..=0.5)
    #[serde(default = "default_shape_bump_amplitude")]
    pub shape_bump_amplitude: f32,

    /// Амплитуда второй, более частой синусоиды (0.0..=0.5)
    #[serde(default = "default_shape_secondary_amplitude")]
    pub shape_secondary_amplitude: f32,

    /// Фазовый сдвиг синусоид, радианы (0.0..=TAU)
    #[serde(default)]
    pub shape_phase: f32,

    /// Амплитуда фрактального шума берега (0.0..=1.0)
    #[serde(default = "default_noise_amplitude")]
    pub noise_amplitude: f32,

    /// Частота шума берега в периодах на карту (0.1..=8.0)
    #[serde(default = "default_noise_frequency")]
    pub noise_frequency: f32,

    /// Число октав фрактального шума (1..=8)
    #[serde(default = "default_noise_octaves")]
    pub noise_octaves: u32,

    /// Затухание амплитуды между октавами (0.0..=1.0)
    #[serde(default = "default_noise_gain")]
    pub noise_gain: f32,

    /// Рост частоты между октавами (1.0..=4.0)
    #[serde(default = "default_noise_lacunarity")]
    pub noise_lacunarity: f32,

    /// Включает 2D доменное искажение шума берега
    #[serde(default = "default_warp_enabled")]
    pub warp_enabled: bool,

    /// Амплитуда доменного искажения, px (0.0..=200.0)
    #[serde(default = "default_warp_amplitude")]
    pub warp_amplitude: f32,

    // === Рельеф ===
    /// Общий рельеф суши: 0 — плоский блин, 1 — максимальный перепад (0.0..=1.0)
    #[serde(default = "default_land_relief")]
    pub land_relief: f32,

    /// Желаемое число горных хребтов (0..=16)
    #[serde(default = "default_ridge_count")]
    pub ridge_count: u32,

    /// Радиус влияния хребта в шагах BFS по граням (1..=30)
    #[serde(default = "default_ridge_radius")]
    pub ridge_radius: u32,

    /// Сила подъёма хребта (0.0..=1.0)
    #[serde(default = "default_ridge_strength")]
    pub ridge_strength: f32,

    /// Экспонента спада подъёма от центра хребта (0.5..=4.0)
    #[serde(default = "default_ridge_falloff_exponent")]
    pub ridge_falloff_exponent: f32,

    /// Разнесение пиков: 0 — самые далёкие от моря, 1 — самые далёкие друг от друга (0.0..=1.0)
    #[serde(default = "default_ridge_separation")]
    pub ridge_separation: f32,

    /// Связность хребтов: >0 соединяет пики сплошными грядами (0.0..=1.0)
    #[serde(default = "default_ridge_continuity")]
    pub ridge_continuity: f32,

    /// Насколько подъём хребтов тяготеет к центру суши (0.0..=1.0)
    #[serde(default = "default_ridge_coast_affinity")]
    pub ridge_coast_affinity: f32,

    /// Ниже этой ступени высоты работает сглаживание плато (0..=MAX_LAND_ELEVATION)
    #[serde(default = "default_plateau_threshold")]
    pub plateau_threshold: u32,

    /// Сила сглаживания плато (0.0..=1.0)
    #[serde(default = "default_plateau_strength")]
    pub plateau_strength: f32,

    /// Включает линейный потолок высоты от расстояния до берега
    #[serde(default)]
    pub coast_cap_enabled: bool,

    /// Прирост потолка на одно кольцо удаления от берега (0.0..=2.0)
    #[serde(default = "default_coast_cap_slope")]
    pub coast_cap_slope: f32,

    /// Потолок высоты прямо у берега (0.0..=MAX_LAND_ELEVATION)
    #[serde(default = "default_coast_cap_offset")]
    pub coast_cap_offset: f32,

    // === Реки ===
    /// Доля береговых устьев, из которых стартуют реки (0.0..=1.0)
    #[serde(default = "default_river_density")]
    pub river_density: f32,

    /// Шанс продолжить реку по плоскому участку сверх лимита (0.0..=1.0)
    #[serde(default = "default_river_climb_chance")]
    pub river_climb_chance: f32,

    /// Шанс ветвления в каждой внутренней вершине главной реки (0.0..=1.0)
    #[serde(default = "default_river_branch_chance")]
    pub river_branch_chance: f32,

    /// Минимальная длина принятой реки в рёбрах (2..=32)
    #[serde(default = "default_river_min_length")]
    pub river_min_length: u32,

    // === Провинции ===
    /// Целевое число провинций (1..=128)
    #[serde(default = "default_province_count")]
    pub province_count: u32,

    /// Вес балансировки размеров при росте провинций (0.0..=4.0)
    #[serde(default = "default_province_balance")]
    pub province_balance: f32,

    /// Доля от всей суши, ниже которой остров становится одной провинцией (0.0..=0.2)
    #[serde(default = "default_small_island_percent")]
    pub small_island_percent: f32,

    /// Доля максимальной высоты, выше которой перевал непроходим (0.0..=1.0)
    #[serde(default = "default_mountain_passage_threshold")]
    pub mountain_passage_threshold: f32,

    // === Навигация ===
    /// Нормированная высота, ниже которой шаг стоит ровно 1 (0.0..=1.0)
    #[serde(default = "default_nav_lowland_threshold")]
    pub nav_lowland_threshold: f32,

    /// Нормированная высота, начиная с которой грань исключена из графа (0.0..=1.0)
    #[serde(default = "default_nav_impassable_threshold")]
    pub nav_impassable_threshold: f32,

    /// Максимальная надбавка стоимости за подъём (0.0..=8.0)
    #[serde(default = "default_nav_elevation_gain")]
    pub nav_elevation_gain: f32,

    /// Экспонента роста стоимости подъёма (1.0..=4.0)
    #[serde(default = "default_nav_elevation_power")]
    pub nav_elevation_power: f32,

    /// Надбавка стоимости за пересечение реки (0.0..=8.0)
    #[serde(default = "default_nav_river_penalty")]
    pub nav_river_penalty: f32,
}

fn default_site_spacing() -> f32 {
    32.0
}
fn default_island_radius() -> f32 {
    0.62
}
fn default_shape_bump_count() -> u32 {
    5
}
fn default_shape_bump_amplitude() -> f32 {
    0.15
}
fn default_shape_secondary_amplitude() -> f32 {
    0.08
}
fn default_noise_amplitude() -> f32 {
    0.3
}
fn default_noise_frequency() -> f32 {
    2.0
}
fn default_noise_octaves() -> u32 {
    4
}
fn default_noise_gain() -> f32 {
    0.5
}
fn default_noise_lacunarity() -> f32 {
    2.0
}
fn default_warp_enabled() -> bool {
    true
}
fn default_warp_amplitude() -> f32 {
    60.0
}
fn default_land_relief() -> f32 {
    0.7
}
fn default_ridge_count() -> u32 {
    4
}
fn default_ridge_radius() -> u32 {
    8
}
fn default_ridge_strength() -> f32 {
    0.8
}
fn default_ridge_falloff_exponent() -> f32 {
    1.6
}
fn default_ridge_separation() -> f32 {
    0.5
}
fn default_ridge_continuity() -> f32 {
    0.5
}
fn default_ridge_coast_affinity() -> f32 {
    0.4
}
fn default_plateau_threshold() -> u32 {
    3
}
fn default_plateau_strength() -> f32 {
    0.5
}
fn default_coast_cap_slope() -> f32 {
    0.75
}
fn default_coast_cap_offset() -> f32 {
    1.0
}
fn default_river_density() -> f32 {
    0.35
}
fn default_river_climb_chance() -> f32 {
    0.25
}
fn default_river_branch_chance() -> f32 {
    0.3
}
fn default_river_min_length() -> u32 {
    4
}
fn default_province_count() -> u32 {
    12
}
fn default_province_balance() -> f32 {
    1.0
}
fn default_small_island_percent() -> f32 {
    0.02
}
fn default_mountain_passage_threshold() -> f32 {
    0.75
}
fn default_nav_lowland_threshold() -> f32 {
    0.35
}
fn default_nav_impassable_threshold() -> f32 {
    0.9
}
fn default_nav_elevation_gain() -> f32 {
    2.0
}
fn default_nav_elevation_power() -> f32 {
    2.0
}
fn default_nav_river_penalty() -> f32 {
    1.5
}

impl Default for TerrainGenerationControls {
    fn default() -> Self {
        Self {
            seed: 0,
            site_spacing: default_site_spacing(),
            island_radius: default_island_radius(),
            shape_bump_count: default_shape_bump_count(),
            shape_bump_amplitude: default_shape_bump_amplitude(),
            shape_secondary_amplitude: default_shape_secondary_amplitude(),
            shape_phase: 0.0,
            noise_amplitude: default_noise_amplitude(),
            noise_frequency: default_noise_frequency(),
            noise_octaves: default_noise_octaves(),
            noise_gain: default_noise_gain(),
            noise_lacunarity: default_noise_lacunarity(),
            warp_enabled: true,
            warp_amplitude: default_warp_amplitude(),
            land_relief: default_land_relief(),
            ridge_count: default_ridge_count(),
            ridge_radius: default_ridge_radius(),
            ridge_strength: default_ridge_strength(),
            ridge_falloff_exponent: default_ridge_falloff_exponent(),
            ridge_separation: default_ridge_separation(),
            ridge_continuity: default_ridge_continuity(),
            ridge_coast_affinity: default_ridge_coast_affinity(),
            plateau_threshold: default_plateau_threshold(),
            plateau_strength: default_plateau_strength(),
            coast_cap_enabled: false,
            coast_cap_slope: default_coast_cap_slope(),
            coast_cap_offset: default_coast_cap_offset(),
            river_density: default_river_density(),
            river_climb_chance: default_river_climb_chance(),
            river_branch_chance: default_river_branch_chance(),
            river_min_length: default_river_min_length(),
            province_count: default_province_count(),
            province_balance: default_province_balance(),
            small_island_percent: default_small_island_percent(),
            mountain_passage_threshold: default_mountain_passage_threshold(),
            nav_lowland_threshold: default_nav_lowland_threshold(),
            nav_impassable_threshold: default_nav_impassable_threshold(),
            nav_elevation_gain: default_nav_elevation_gain(),
            nav_elevation_power: default_nav_elevation_power(),
            nav_river_penalty: default_nav_river_penalty(),
        }
    }
}

/// Зажим с подстраховкой от NaN/Inf: нечисловое значение заменяется умолчанием
fn clamp_f32(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

impl TerrainGenerationControls {
    /// Загружает контролы из TOML-файла
    ///
    /// # Ошибки
    /// Возвращает ошибку, если файл не найден или содержит недопустимый формат.
    pub fn from_toml_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let controls: Self = toml::from_str(&contents)?;
        Ok(controls)
    }

    /// Возвращает копию с зажатыми в допустимые диапазоны полями.
    ///
    /// Конвейер работает только с санированными контролами, поэтому никакое
    /// значение из внешнего мира не способно уронить генерацию.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let d = Self::default();
        let max_elev = crate::elevation::MAX_LAND_ELEVATION as f32;
        Self {
            seed: self.seed,
            site_spacing: clamp_f32(self.site_spacing, 8.0, 128.0, d.site_spacing),
            island_radius: clamp_f32(self.island_radius, 0.1, 0.95, d.island_radius),
            shape_bump_count: self.shape_bump_count.clamp(1, 12),
            shape_bump_amplitude: clamp_f32(
                self.shape_bump_amplitude,
                0.0,
                0.5,
                d.shape_bump_amplitude,
            ),
            shape_secondary_amplitude: clamp_f32(
                self.shape_secondary_amplitude,
                0.0,
                0.5,
                d.shape_secondary_amplitude,
            ),
            shape_phase: clamp_f32(self.shape_phase, 0.0, std::f32::consts::TAU, 0.0),
            noise_amplitude: clamp_f32(self.noise_amplitude, 0.0, 1.0, d.noise_amplitude),
            noise_frequency: clamp_f32(self.noise_frequency, 0.1, 8.0, d.noise_frequency),
            noise_octaves: self.noise_octaves.clamp(1, 8),
            noise_gain: clamp_f32(self.noise_gain, 0.0, 1.0, d.noise_gain),
            noise_lacunarity: clamp_f32(self.noise_lacunarity, 1.0, 4.0, d.noise_lacunarity),
            warp_enabled: self.warp_enabled,
            warp_amplitude: clamp_f32(self.warp_amplitude, 0.0, 200.0, d.warp_amplitude),
            land_relief: clamp_f32(self.land_relief, 0.0, 1.0, d.land_relief),
            ridge_count: self.ridge_count.min(16),
            ridge_radius: self.ridge_radius.clamp(1, 30),
            ridge_strength: clamp_f32(self.ridge_strength, 0.0, 1.0, d.ridge_strength),
            ridge_falloff_exponent: clamp_f32(
                self.ridge_falloff_exponent,
                0.5,
                4.0,
                d.ridge_falloff_exponent,
            ),
            ridge_separation: clamp_f32(self.ridge_separation, 0.0, 1.0, d.ridge_separation),
            ridge_continuity: clamp_f32(self.ridge_continuity, 0.0, 1.0, d.ridge_continuity),
            ridge_coast_affinity: clamp_f32(
                self.ridge_coast_affinity,
                0.0,
                1.0,
                d.ridge_coast_affinity,
            ),
            plateau_threshold: self
                .plateau_threshold
                .min(crate::elevation::MAX_LAND_ELEVATION as u32),
            plateau_strength: clamp_f32(self.plateau_strength, 0.0, 1.0, d.plateau_strength),
            coast_cap_enabled: self.coast_cap_enabled,
            coast_cap_slope: clamp_f32(self.coast_cap_slope, 0.0, 2.0, d.coast_cap_slope),
            coast_cap_offset: clamp_f32(self.coast_cap_offset, 0.0, max_elev, d.coast_cap_offset),
            river_density: clamp_f32(self.river_density, 0.0, 1.0, d.river_density),
            river_climb_chance: clamp_f32(self.river_climb_chance, 0.0, 1.0, d.river_climb_chance),
            river_branch_chance: clamp_f32(
                self.river_branch_chance,
                0.0,
                1.0,
                d.river_branch_chance,
            ),
            river_min_length: self.river_min_length.clamp(2, 32),
            province_count: self.province_count.clamp(1, 128),
            province_balance: clamp_f32(self.province_balance, 0.0, 4.0, d.province_balance),
            small_island_percent: clamp_f32(
                self.small_island_percent,
                0.0,
                0.2,
                d.small_island_percent,
            ),
            mountain_passage_threshold: clamp_f32(
                self.mountain_passage_threshold,
                0.0,
                1.0,
                d.mountain_passage_threshold,
            ),
            nav_lowland_threshold: clamp_f32(
                self.nav_lowland_threshold,
                0.0,
                1.0,
                d.nav_lowland_threshold,
            ),
            nav_impassable_threshold: clamp_f32(
                self.nav_impassable_threshold,
                0.0,
                1.0,
                d.nav_impassable_threshold,
            ),
            nav_elevation_gain: clamp_f32(self.nav_elevation_gain, 0.0, 8.0, d.nav_elevation_gain),
            nav_elevation_power: clamp_f32(
                self.nav_elevation_power,
                1.0,
                4.0,
                d.nav_elevation_power,
            ),
            nav_river_penalty: clamp_f32(self.nav_river_penalty, 0.0, 8.0, d.nav_river_penalty),
        }
    }
}

/// Снимок генерации для репликации: применение одного снимка на любом узле
/// детерминированно воспроизводит одинаковые структуры.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainSnapshot {
    pub controls: TerrainGenerationControls,
    pub map_width: u32,
    pub map_height: u32,
}

/// Отпечаток генерации: размер карты плюс сериализованные контролы.
///
/// Используется как ключ кэша конвейера и как ключ равенства для внешних
/// потребителей (рендер, репликация).
#[must_use]
pub fn generation_fingerprint(config: MapConfig, controls: &TerrainGenerationControls) -> String {
    let serialized =
        serde_json::to_string(controls).unwrap_or_else(|_| String::from("<unserializable>"));
    format!("{}x{}|{}", config.width, config.height, serialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_clamps_out_of_range() {
        let controls = TerrainGenerationControls {
            site_spacing: 1.0,
            island_radius: 7.0,
            province_count: 100_000,
            ..TerrainGenerationControls::default()
        };
        let s = controls.sanitized();
        assert!((s.site_spacing - 8.0).abs() < f32::EPSILON);
        assert!((s.island_radius - 0.95).abs() < f32::EPSILON);
        assert_eq!(s.province_count, 128);
    }

    #[test]
    fn sanitized_replaces_non_finite_with_defaults() {
        let controls = TerrainGenerationControls {
            river_density: f32::NAN,
            noise_amplitude: f32::INFINITY,
            ..TerrainGenerationControls::default()
        };
        let s = controls.sanitized();
        assert!((s.river_density - default_river_density()).abs() < f32::EPSILON);
        assert!((s.noise_amplitude - default_noise_amplitude()).abs() < f32::EPSILON);
    }

    #[test]
    fn fingerprint_depends_on_size_and_controls() {
        let controls = TerrainGenerationControls::default();
        let a = generation_fingerprint(MapConfig::default(), &controls);
        let b = generation_fingerprint(
            MapConfig {
                width: 1024,
                height: 512,
            },
            &controls,
        );
        let changed = TerrainGenerationControls {
            seed: 9,
            ..controls.clone()
        };
        let c = generation_fingerprint(MapConfig::default(), &changed);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, generation_fingerprint(MapConfig::default(), &controls));
    }

    #[test]
    fn toml_round_trip_with_partial_fields() {
        // Частичный TOML: остальные поля берутся из умолчаний
        let toml_src = "seed = 1337\nsite_spacing = 32.0\nprovince_count = 8\n";
        let controls: TerrainGenerationControls = toml::from_str(toml_src).unwrap();
        assert_eq!(controls.seed, 1337);
        assert_eq!(controls.province_count, 8);
        assert_eq!(controls.ridge_count, default_ridge_count());
    }
}
