// src/pipeline.rs
//! Оркестровка стадий генерации с грязными флагами
//!
//! Конвейер держит кэш выходов стадий под ключом-отпечатком
//! `(размер карты, контролы)`. Обновление контролов сравнивает только
//! релевантные стадии поля двух снимков (чистая функция), грязь каскадится
//! строго вниз по конвейеру: грязный меш означает грязное всё.
//! Пересчитываются только грязные стадии; чистые переиспользуют кэш.
//!
//! Регенерация всегда идёт до конца — снаружи не видно частичного
//! состояния. [`GenerationPipeline::state`] падает с ошибкой только при
//! попытке материализовать неполный кэш (нарушение контракта вызова,
//! а не пользовательская ситуация).

use crate::config::{
    MapConfig, TerrainGenerationControls, TerrainSnapshot, generation_fingerprint,
};
use crate::elevation::{MountainState, synthesize_elevation};
use crate::mesh::{MeshGraph, build_mesh};
use crate::nav::{NavCostParams, NavigationGraph, build_navigation_graph};
use crate::province::{ProvinceGraph, partition_provinces};
use crate::rivers::{RiverState, trace_rivers};
use crate::rng::{SALT_ELEVATION, SALT_RIVERS, SALT_SITES, SALT_WATER, stage_rng};
use crate::sampler::sample_sites;
use crate::water::{WaterState, classify_water};
use std::fmt;

/// Стадии конвейера в порядке зависимостей
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Mesh,
    Water,
    Elevation,
    Rivers,
    Provinces,
}

const STAGES: [Stage; 5] = [
    Stage::Mesh,
    Stage::Water,
    Stage::Elevation,
    Stage::Rivers,
    Stage::Provinces,
];

/// Состояние стадии между двумя генерациями
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageState {
    /// Кэш валиден, пересчёт не нужен
    Clean,
    /// Входы изменились, кэш инвалидирован
    #[default]
    Dirty,
    /// Стадия пересчитана в последнюю генерацию
    Recomputed,
}

/// Отчёт о грязных стадиях после обновления контролов
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyReport {
    pub mesh: bool,
    pub water: bool,
    pub elevation: bool,
    pub rivers: bool,
    pub provinces: bool,
}

/// Изменились ли поля контролов, релевантные данной стадии (без каскада)
#[must_use]
pub fn stage_controls_changed(
    stage: Stage,
    old: &TerrainGenerationControls,
    new: &TerrainGenerationControls,
) -> bool {
    match stage {
        Stage::Mesh => old.seed != new.seed || old.site_spacing != new.site_spacing,
        Stage::Water => {
            old.island_radius != new.island_radius
                || old.shape_bump_count != new.shape_bump_count
                || old.shape_bump_amplitude != new.shape_bump_amplitude
                || old.shape_secondary_amplitude != new.shape_secondary_amplitude
                || old.shape_phase != new.shape_phase
                || old.noise_amplitude != new.noise_amplitude
                || old.noise_frequency != new.noise_frequency
                || old.noise_octaves != new.noise_octaves
                || old.noise_gain != new.noise_gain
                || old.noise_lacunarity != new.noise_lacunarity
                || old.warp_enabled != new.warp_enabled
                || old.warp_amplitude != new.warp_amplitude
        }
        Stage::Elevation => {
            old.land_relief != new.land_relief
                || old.ridge_count != new.ridge_count
                || old.ridge_radius != new.ridge_radius
                || old.ridge_strength != new.ridge_strength
                || old.ridge_falloff_exponent != new.ridge_falloff_exponent
                || old.ridge_separation != new.ridge_separation
                || old.ridge_continuity != new.ridge_continuity
                || old.ridge_coast_affinity != new.ridge_coast_affinity
                || old.plateau_threshold != new.plateau_threshold
                || old.plateau_strength != new.plateau_strength
                || old.coast_cap_enabled != new.coast_cap_enabled
                || old.coast_cap_slope != new.coast_cap_slope
                || old.coast_cap_offset != new.coast_cap_offset
        }
        Stage::Rivers => {
            old.river_density != new.river_density
                || old.river_climb_chance != new.river_climb_chance
                || old.river_branch_chance != new.river_branch_chance
                || old.river_min_length != new.river_min_length
        }
        Stage::Provinces => {
            old.province_count != new.province_count
                || old.province_balance != new.province_balance
                || old.small_island_percent != new.small_island_percent
                || old.mountain_passage_threshold != new.mountain_passage_threshold
        }
    }
}

/// Грязные флаги для пары снимков контролов: собственные изменения стадии
/// плюс строгий каскад вниз
#[must_use]
pub fn dirty_report(
    old: &TerrainGenerationControls,
    new: &TerrainGenerationControls,
) -> DirtyReport {
    let mut flags = [false; 5];
    let mut upstream = false;
    for (i, stage) in STAGES.iter().enumerate() {
        upstream = upstream || stage_controls_changed(*stage, old, new);
        flags[i] = upstream;
    }
    DirtyReport {
        mesh: flags[0],
        water: flags[1],
        elevation: flags[2],
        rivers: flags[3],
        provinces: flags[4],
    }
}

/// Ошибка контракта конвейера
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Запрошено состояние при незаполненном кэше стадии
    IncompleteCache { stage: &'static str },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompleteCache { stage } => {
                write!(f, "кэш стадии '{stage}' пуст: generate() не вызывался")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// Полное состояние генерации (заимствования валидны до следующей регенерации)
#[derive(Debug)]
pub struct GenerationState<'a> {
    pub fingerprint: &'a str,
    pub mesh: &'a MeshGraph,
    pub water: &'a WaterState,
    pub mountains: &'a MountainState,
    pub rivers: &'a RiverState,
    pub provinces: &'a ProvinceGraph,
}

/// Оркестратор генерации: владеет кэшем, пересчитывает только грязное
#[derive(Debug)]
pub struct GenerationPipeline {
    config: MapConfig,
    controls: TerrainGenerationControls,
    fingerprint: String,
    states: [StageState; 5],
    mesh: Option<MeshGraph>,
    water: Option<WaterState>,
    mountains: Option<MountainState>,
    rivers: Option<RiverState>,
    provinces: Option<ProvinceGraph>,
}

impl GenerationPipeline {
    /// Создаёт конвейер с пустым кэшем (все стадии грязные).
    ///
    /// Контролы санируются на входе; генерация запускается первым вызовом
    /// [`Self::generate`] или обновлением контролов.
    #[must_use]
    pub fn new(config: MapConfig, controls: &TerrainGenerationControls) -> Self {
        let controls = controls.sanitized();
        let fingerprint = generation_fingerprint(config, &controls);
        Self {
            config,
            controls,
            fingerprint,
            states: [StageState::Dirty; 5],
            mesh: None,
            water: None,
            mountains: None,
            rivers: None,
            provinces: None,
        }
    }

    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    #[must_use]
    pub fn controls(&self) -> &TerrainGenerationControls {
        &self.controls
    }

    #[must_use]
    pub fn config(&self) -> MapConfig {
        self.config
    }

    #[must_use]
    pub fn stage_states(&self) -> [StageState; 5] {
        self.states
    }

    /// Обновляет контролы: считает грязные флаги, инвалидирует затронутые
    /// кэши и сразу регенерирует до конца.
    pub fn set_controls(&mut self, controls: &TerrainGenerationControls) -> DirtyReport {
        let new = controls.sanitized();
        let report = dirty_report(&self.controls, &new);
        self.controls = new;
        self.fingerprint = generation_fingerprint(self.config, &self.controls);

        if report.mesh {
            self.mesh = None;
            self.states[0] = StageState::Dirty;
        }
        if report.water {
            self.water = None;
            self.states[1] = StageState::Dirty;
        }
        if report.elevation {
            self.mountains = None;
            self.states[2] = StageState::Dirty;
        }
        if report.rivers {
            self.rivers = None;
            self.states[3] = StageState::Dirty;
        }
        if report.provinces {
            self.provinces = None;
            self.states[4] = StageState::Dirty;
        }

        self.generate();
        report
    }

    /// Меняет размер карты: инвалидирует всё
    pub fn set_config(&mut self, config: MapConfig) {
        if config != self.config {
            self.config = config;
            self.fingerprint = generation_fingerprint(self.config, &self.controls);
            self.states = [StageState::Dirty; 5];
            self.mesh = None;
            self.water = None;
            self.mountains = None;
            self.rivers = None;
            self.provinces = None;
        }
        self.generate();
    }

    /// Применяет сетевой снимок: детерминированно воспроизводит карту узла
    pub fn apply_snapshot(&mut self, snapshot: &TerrainSnapshot) -> DirtyReport {
        let config = MapConfig {
            width: snapshot.map_width,
            height: snapshot.map_height,
        };
        if config != self.config {
            self.config = config;
            self.states = [StageState::Dirty; 5];
            self.mesh = None;
            self.water = None;
            self.mountains = None;
            self.rivers = None;
            self.provinces = None;
        }
        self.set_controls(&snapshot.controls)
    }

    /// Снимок для репликации текущей генерации
    #[must_use]
    pub fn snapshot(&self) -> TerrainSnapshot {
        TerrainSnapshot {
            controls: self.controls.clone(),
            map_width: self.config.width,
            map_height: self.config.height,
        }
    }

    /// Пересчитывает все грязные стадии, переиспользуя чистые кэши.
    ///
    /// Работает синхронно до конца; отмены нет.
    pub fn generate(&mut self) {
        let seed = self.controls.seed;
        let (width, height) = (self.config.width as f32, self.config.height as f32);

        // Состояния описывают только текущую генерацию: прошлый `Recomputed`
        // для переиспользованного кэша становится `Clean`
        for state in &mut self.states {
            if *state == StageState::Recomputed {
                *state = StageState::Clean;
            }
        }

        let mesh = match self.mesh.take() {
            Some(cached) => cached,
            None => {
                let mut rng = stage_rng(seed, SALT_SITES);
                let sites = sample_sites(width, height, self.controls.site_spacing, &mut rng);
                self.states[0] = StageState::Recomputed;
                // Каскад: всё ниже меша пересчитывается
                self.water = None;
                self.mountains = None;
                self.rivers = None;
                self.provinces = None;
                build_mesh(&sites, width, height)
            }
        };

        let water = match self.water.take() {
            Some(cached) => cached,
            None => {
                let mut rng = stage_rng(seed, SALT_WATER);
                self.states[1] = StageState::Recomputed;
                self.mountains = None;
                self.rivers = None;
                self.provinces = None;
                classify_water(&mesh, &self.controls, &mut rng)
            }
        };

        let mountains = match self.mountains.take() {
            Some(cached) => cached,
            None => {
                let mut rng = stage_rng(seed, SALT_ELEVATION);
                self.states[2] = StageState::Recomputed;
                self.rivers = None;
                self.provinces = None;
                synthesize_elevation(&mesh, &water, &self.controls, &mut rng)
            }
        };

        let rivers = match self.rivers.take() {
            Some(cached) => cached,
            None => {
                let mut rng = stage_rng(seed, SALT_RIVERS);
                self.states[3] = StageState::Recomputed;
                self.provinces = None;
                trace_rivers(&mesh, &water, &mountains, &self.controls, &mut rng)
            }
        };

        if self.provinces.is_none() {
            self.provinces = Some(partition_provinces(
                &mesh,
                &water,
                &mountains,
                &rivers,
                &self.controls,
            ));
            self.states[4] = StageState::Recomputed;
        }

        self.mesh = Some(mesh);
        self.water = Some(water);
        self.mountains = Some(mountains);
        self.rivers = Some(rivers);
    }

    /// Материализует полное состояние генерации.
    ///
    /// # Ошибки
    /// [`PipelineError::IncompleteCache`], если какая-то стадия не посчитана —
    /// это нарушение контракта вызова (не вызван `generate`), а не
    /// пользовательская ошибка.
    pub fn state(&self) -> Result<GenerationState<'_>, PipelineError> {
        let missing = |stage: &'static str| PipelineError::IncompleteCache { stage };
        Ok(GenerationState {
            fingerprint: &self.fingerprint,
            mesh: self.mesh.as_ref().ok_or_else(|| missing("mesh"))?,
            water: self.water.as_ref().ok_or_else(|| missing("water"))?,
            mountains: self.mountains.as_ref().ok_or_else(|| missing("elevation"))?,
            rivers: self.rivers.as_ref().ok_or_else(|| missing("rivers"))?,
            provinces: self.provinces.as_ref().ok_or_else(|| missing("provinces"))?,
        })
    }

    /// Навигационный граф поверх текущей генерации (независимый потребитель)
    pub fn navigation_graph(&self) -> Result<NavigationGraph, PipelineError> {
        let state = self.state()?;
        Ok(build_navigation_graph(
            state.mesh,
            &state.water.is_land,
            &state.mountains.land_elevation,
            &state.rivers.river_edge_mask,
            NavCostParams::from_controls(&self.controls),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_controls() -> TerrainGenerationControls {
        TerrainGenerationControls {
            seed: 1337,
            site_spacing: 32.0,
            ..TerrainGenerationControls::default()
        }
    }

    #[test]
    fn state_before_generate_is_contract_violation() {
        let pipeline = GenerationPipeline::new(MapConfig::default(), &scenario_controls());
        let err = pipeline.state().unwrap_err();
        assert_eq!(err, PipelineError::IncompleteCache { stage: "mesh" });
    }

    #[test]
    fn regenerating_twice_is_byte_identical() {
        let controls = scenario_controls();
        let mut a = GenerationPipeline::new(MapConfig::default(), &controls);
        a.generate();
        let mut b = GenerationPipeline::new(MapConfig::default(), &controls);
        b.generate();

        let sa = a.state().unwrap();
        let sb = b.state().unwrap();
        assert_eq!(sa.fingerprint, sb.fingerprint);
        assert_eq!(
            sa.provinces.province_by_face,
            sb.provinces.province_by_face
        );
        assert_eq!(sa.water.is_land, sb.water.is_land);
        assert_eq!(sa.mountains.land_elevation, sb.mountains.land_elevation);
        assert_eq!(sa.rivers.river_edge_mask, sb.rivers.river_edge_mask);
        assert_eq!(sa.mesh.faces.len(), sb.mesh.faces.len());
    }

    #[test]
    fn river_control_change_dirties_only_downstream() {
        let mut pipeline = GenerationPipeline::new(MapConfig::default(), &scenario_controls());
        pipeline.generate();

        let changed = TerrainGenerationControls {
            river_branch_chance: 0.6,
            ..scenario_controls()
        };
        let report = pipeline.set_controls(&changed);
        assert!(!report.mesh);
        assert!(!report.water);
        assert!(!report.elevation);
        assert!(report.rivers);
        assert!(report.provinces);

        let states = pipeline.stage_states();
        assert_eq!(states[0], StageState::Clean);
        assert_eq!(states[1], StageState::Clean);
        assert_eq!(states[2], StageState::Clean);
        assert_eq!(states[3], StageState::Recomputed);
        assert_eq!(states[4], StageState::Recomputed);
    }

    #[test]
    fn stage_states_describe_only_latest_generation() {
        let mut pipeline = GenerationPipeline::new(MapConfig::default(), &scenario_controls());
        pipeline.generate();
        assert_eq!(pipeline.stage_states(), [StageState::Recomputed; 5]);

        // Повторная генерация без изменений: весь кэш переиспользован,
        // `Recomputed` прошлого запуска не протекает в текущий
        pipeline.generate();
        assert_eq!(pipeline.stage_states(), [StageState::Clean; 5]);
    }

    #[test]
    fn zero_size_map_degrades_to_empty_world() {
        let mut pipeline = GenerationPipeline::new(
            MapConfig {
                width: 0,
                height: 0,
            },
            &scenario_controls(),
        );
        pipeline.generate();
        let state = pipeline.state().unwrap();
        assert!(state.mesh.faces.is_empty());
        assert!(state.provinces.provinces.is_empty());
        let nav = pipeline.navigation_graph().unwrap();
        assert!(nav.nodes.is_empty());
    }

    #[test]
    fn seed_change_cascades_everything() {
        let mut pipeline = GenerationPipeline::new(MapConfig::default(), &scenario_controls());
        pipeline.generate();
        let changed = TerrainGenerationControls {
            seed: 1338,
            ..scenario_controls()
        };
        let report = pipeline.set_controls(&changed);
        assert!(report.mesh && report.water && report.elevation);
        assert!(report.rivers && report.provinces);
    }

    #[test]
    fn unchanged_controls_recompute_nothing() {
        let mut pipeline = GenerationPipeline::new(MapConfig::default(), &scenario_controls());
        pipeline.generate();
        let report = pipeline.set_controls(&scenario_controls());
        assert!(!report.mesh && !report.water && !report.elevation);
        assert!(!report.rivers && !report.provinces);
        assert_eq!(pipeline.stage_states(), [StageState::Clean; 5]);
    }

    #[test]
    fn nav_control_change_dirties_no_stage() {
        let mut pipeline = GenerationPipeline::new(MapConfig::default(), &scenario_controls());
        pipeline.generate();
        let changed = TerrainGenerationControls {
            nav_river_penalty: 4.0,
            ..scenario_controls()
        };
        let report = pipeline.set_controls(&changed);
        assert!(!report.mesh && !report.water && !report.elevation);
        assert!(!report.rivers && !report.provinces);
    }

    #[test]
    fn snapshot_replay_reproduces_identical_outputs() {
        let mut origin = GenerationPipeline::new(MapConfig::default(), &scenario_controls());
        origin.generate();
        let snapshot = origin.snapshot();

        let mut replica = GenerationPipeline::new(
            MapConfig {
                width: 256,
                height: 256,
            },
            &TerrainGenerationControls::default(),
        );
        replica.apply_snapshot(&snapshot);

        let a = origin.state().unwrap();
        let b = replica.state().unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.provinces.province_by_face, b.provinces.province_by_face);
    }
}
