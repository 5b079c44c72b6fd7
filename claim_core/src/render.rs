//! Text map around a focal cell.

use crate::cell::{Cell, WorldId};
use crate::grid::ClaimGrid;
use crate::groups::GroupId;

pub const OWN_SYMBOL: char = '#';
pub const OTHER_SYMBOL: char = '+';
pub const EMPTY_SYMBOL: char = '.';
pub const HIGHLIGHT_SYMBOL: char = 'X';

/// Render `2 * radius + 1` rows, north (lowest z) first.
pub fn render_map(
    grid: &ClaimGrid,
    group: GroupId,
    world: WorldId,
    center_x: i32,
    center_z: i32,
    radius: u32,
    highlight: Option<Cell>,
) -> Vec<String> {
    let r = radius as i32;
    let width = 2 * radius as usize + 1;
    (-r..=r)
        .map(|dz| {
            let mut row = String::with_capacity(width);
            for dx in -r..=r {
                let symbol = match (center_x.checked_add(dx), center_z.checked_add(dz)) {
                    (Some(x), Some(z)) => symbol_for(grid, group, Cell::new(world, x, z), highlight),
                    _ => EMPTY_SYMBOL,
                };
                row.push(symbol);
            }
            row
        })
        .collect()
}

fn symbol_for(grid: &ClaimGrid, group: GroupId, cell: Cell, highlight: Option<Cell>) -> char {
    if highlight == Some(cell) {
        return HIGHLIGHT_SYMBOL;
    }
    match grid.owner(cell) {
        Some(owner) if owner == group => OWN_SYMBOL,
        Some(_) => OTHER_SYMBOL,
        None => EMPTY_SYMBOL,
    }
}
