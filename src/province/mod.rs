// src/province/mod.rs
//! Политическое деление суши на провинции

pub mod color;
pub mod partition;

pub use partition::partition_provinces;

/// Грань без провинции (вода)
pub const NO_PROVINCE: i32 = -1;

/// Одна провинция — связный набор граней суши
#[derive(Debug, Clone)]
pub struct Province {
    pub id: u32,
    /// Грани-члены провинции
    pub faces: Vec<usize>,
    /// Индексы внешних рёбер в [`ProvinceGraph::outer_edges`]
    pub outer_edges: Vec<usize>,
    /// Смежные провинции (через общее внешнее ребро)
    pub neighbors: Vec<usize>,
    /// Соседи, достижимые через проходимое ребро (без рек и высоких перевалов)
    pub passable_neighbors: Vec<usize>,
    /// Индекс палитры раскраски (для рендера)
    pub color: u8,
}

/// Внешнее ребро: граница двух провинций либо провинции и воды
#[derive(Debug, Clone, Copy)]
pub struct OuterEdge {
    /// Ребро меша
    pub edge: usize,
    pub province_a: i32,
    /// `NO_PROVINCE`, если по ту сторону вода или край карты
    pub province_b: i32,
}

/// Результат разбиения на провинции (неизменяемый выход стадии)
#[derive(Debug, Clone)]
pub struct ProvinceGraph {
    /// id провинции по граням, `NO_PROVINCE` для воды
    pub province_by_face: Vec<i32>,
    pub provinces: Vec<Province>,
    pub outer_edges: Vec<OuterEdge>,
    /// Удалось ли раскрасить смежность в ≤4 цвета (иначе жадный запасной путь)
    pub four_colored: bool,
}
