pub mod config;
pub mod elevation;
pub mod geometry;
pub mod mesh;
pub mod nav;
pub mod pipeline;
pub mod province;
pub mod render;
pub mod rivers;
pub mod rng;
pub mod sampler;
pub mod water;

pub use config::{MapConfig, TerrainGenerationControls, TerrainSnapshot};
pub use elevation::{MAX_LAND_ELEVATION, MountainState};
pub use mesh::MeshGraph;
pub use nav::{NavCostParams, NavigationGraph, build_navigation_graph, find_face_path_astar};
pub use pipeline::{DirtyReport, GenerationPipeline, GenerationState};
pub use province::ProvinceGraph;
pub use rivers::RiverState;
pub use water::WaterState;
