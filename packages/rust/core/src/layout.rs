//! Square-grid placement of flow nodes.

use flowsmith_shared::{LayoutConfig, Position};

/// Row and column of a node in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
}

/// Side of the smallest square grid holding `count` nodes (at least 1).
pub fn grid_side(count: usize) -> usize {
    let mut side = 1;
    while side * side < count {
        side += 1;
    }
    side
}

/// Cell of the node at `index`, filling rows left to right.
pub fn grid_cell(index: usize, side: usize) -> GridCell {
    let side = side.max(1);
    GridCell {
        row: index / side,
        col: index % side,
    }
}

/// Canvas positions for `count` nodes in input order.
pub fn position_nodes(count: usize, layout: &LayoutConfig) -> Vec<Position> {
    let side = grid_side(count);
    let step_x = layout.node_width + layout.margin;
    let step_y = layout.node_height + layout.margin;

    (0..count)
        .map(|i| {
            let cell = grid_cell(i, side);
            Position {
                x: cell.col as f64 * step_x,
                y: cell.row as f64 * step_y,
            }
        })
        .collect()
}
