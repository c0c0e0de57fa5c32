use clap::Parser;
use islandgen::{
    GenerationPipeline, MapConfig, TerrainGenerationControls, find_face_path_astar,
    render::{render_elevation, render_preview, save_png},
};
use std::path::PathBuf;

/// Генератор островных карт для Chronicles of Realms
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к файлу контролов генерации в формате TOML (без него — дефолты)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Сид генерации (перекрывает значение из конфига)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Ширина карты в пикселях
    #[arg(long, default_value_t = 512)]
    width: u32,

    /// Высота карты в пикселях
    #[arg(long, default_value_t = 512)]
    height: u32,

    /// Префикс выходных PNG (пишутся <prefix>_map.png и <prefix>_elevation.png)
    #[arg(short, long, default_value = "island")]
    output: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut controls = match &cli.config {
        Some(path) => {
            println!("🔍 Загрузка контролов из {path:?}...");
            TerrainGenerationControls::from_toml_file(path.to_str().unwrap())?
        }
        None => TerrainGenerationControls::default(),
    };
    if let Some(seed) = cli.seed {
        controls.seed = seed;
    }

    println!(
        "Генерация острова (размер: {}×{}, сид: {})...",
        cli.width, cli.height, controls.seed
    );
    let mut pipeline = GenerationPipeline::new(
        MapConfig {
            width: cli.width,
            height: cli.height,
        },
        &controls,
    );
    pipeline.generate();
    let state = pipeline.state()?;

    let land_count = state.water.is_land.iter().filter(|&&l| l).count();
    let main_rivers = state.rivers.traces.iter().filter(|t| t.depth == 0).count();
    println!("  граней: {} (суша: {land_count})", state.mesh.faces.len());
    println!(
        "  рек: {} (основных: {main_rivers})",
        state.rivers.traces.len()
    );
    println!(
        "  провинций: {} (4 цвета: {})",
        state.provinces.provinces.len(),
        if state.provinces.four_colored {
            "да"
        } else {
            "нет, запасная палитра"
        }
    );

    // Пробный маршрут между двумя самыми удалёнными сушевыми гранями
    let nav = pipeline.navigation_graph()?;
    let endpoints = farthest_land_pair(&state);
    if let Some((from, to)) = endpoints {
        let path = find_face_path_astar(&nav, from, to);
        if path.faces.is_empty() {
            println!("  маршрут {from} → {to}: нет пути");
        } else {
            println!(
                "  маршрут {from} → {to}: {} граней, стоимость {:.2}",
                path.faces.len(),
                path.total_cost
            );
        }
    }

    let prefix = cli.output.to_str().unwrap();
    let map_path = format!("{prefix}_map.png");
    let elev_path = format!("{prefix}_elevation.png");

    println!("Сохранение превью...");
    let preview = render_preview(
        state.mesh,
        state.water,
        state.mountains,
        state.rivers,
        Some(state.provinces),
    );
    save_png(&preview, &map_path)?;
    let elevation = render_elevation(state.mesh, state.mountains);
    save_png(&elevation, &elev_path)?;

    println!("\nГотово! Превью: {map_path}, {elev_path}");
    Ok(())
}

/// Пара сушевых граней с максимальным разбросом по расстоянию между сайтами
fn farthest_land_pair(state: &islandgen::GenerationState<'_>) -> Option<(usize, usize)> {
    let land: Vec<usize> = (0..state.mesh.faces.len())
        .filter(|&f| state.water.is_land[f])
        .collect();
    let first = *land.first()?;
    let mut best = (first, first, 0.0f32);
    for &a in &land {
        for &b in &land {
            let d = state.mesh.faces[a].site.dist_sq(state.mesh.faces[b].site);
            if d > best.2 {
                best = (a, b, d);
            }
        }
    }
    (best.0 != best.1).then_some((best.0, best.1))
}
