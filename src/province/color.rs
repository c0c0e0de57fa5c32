// src/province/color.rs
//! Раскраска графа провинций малой палитрой
//!
//! Бэктрекинг в ≤4 цвета в порядке убывания степени вершин; при неудаче
//! (или исчерпании бюджета шагов) — жадный запасной путь с расширенной
//! палитрой. Запасной путь может дать соседям одинаковый цвет только если
//! 4-раскраски не существует; это принятое косметическое ограничение
//! рендера, а не ошибка разбиения.

use petgraph::graph::UnGraph;

/// Палитра рендера
pub const PALETTE_SIZE: u8 = 4;

/// Бюджет шагов бэктрекинга до перехода на жадный путь
const BACKTRACK_BUDGET: usize = 100_000;

/// Возвращает цвет на провинцию (по id-индексу) и флаг успеха 4-раскраски.
///
/// Узлы графа несут id провинции; граф неориентированный, без петель.
#[must_use]
pub fn color_provinces(graph: &UnGraph<u32, ()>, province_count: usize) -> (Vec<u8>, bool) {
    if province_count == 0 {
        return (Vec::new(), true);
    }

    // Смежность по id провинций
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); province_count];
    for edge in graph.edge_indices() {
        if let Some((a, b)) = graph.edge_endpoints(edge) {
            let (pa, pb) = (graph[a] as usize, graph[b] as usize);
            adjacency[pa].push(pb);
            adjacency[pb].push(pa);
        }
    }

    // Порядок: убывание степени, при равенстве — меньший id
    let mut order: Vec<usize> = (0..province_count).collect();
    order.sort_by_key(|&p| (std::cmp::Reverse(adjacency[p].len()), p));

    if let Some(colors) = try_backtracking(&adjacency, &order) {
        return (colors, true);
    }

    // Жадный запасной путь: первый свободный цвет, палитра не ограничена
    let mut colors = vec![u8::MAX; province_count];
    for &p in &order {
        let mut used = [false; 64];
        for &nb in &adjacency[p] {
            if colors[nb] != u8::MAX {
                used[colors[nb] as usize % 64] = true;
            }
        }
        colors[p] = (0..64u8).find(|&c| !used[c as usize]).unwrap_or(0);
    }
    (colors, false)
}

/// Итеративный бэктрекинг: стек «какой цвет пробуем для позиции k»
fn try_backtracking(adjacency: &[Vec<usize>], order: &[usize]) -> Option<Vec<u8>> {
    let mut colors = vec![u8::MAX; adjacency.len()];
    let mut attempt = vec![0u8; order.len()];
    let mut k = 0usize;
    let mut steps = 0usize;

    while k < order.len() {
        steps += 1;
        if steps > BACKTRACK_BUDGET {
            return None;
        }

        let p = order[k];
        let mut placed = false;
        while attempt[k] < PALETTE_SIZE {
            let c = attempt[k];
            attempt[k] += 1;
            let conflict = adjacency[p].iter().any(|&nb| colors[nb] == c);
            if !conflict {
                colors[p] = c;
                placed = true;
                break;
            }
        }

        if placed {
            k += 1;
        } else {
            // Откат: снимаем цвет и возвращаемся к предыдущей позиции
            attempt[k] = 0;
            colors[p] = u8::MAX;
            if k == 0 {
                return None;
            }
            k -= 1;
            colors[order[k]] = u8::MAX;
        }
    }
    Some(colors)
}
