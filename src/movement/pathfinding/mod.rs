mod finder;
mod flow_field;
mod graph;
mod grid;
mod heatmap;


// ============================================================================
// PUBLIC API
// ============================================================================

pub use finder::PathFinder;
pub use flow_field::FlowField;
pub use graph::{EdgeBuffer, PathGridGraph};
pub use grid::{load_grid, save_grid, GridData, GridError, PathGrid, GRID_VERSION};
pub use heatmap::{PathGridFlowField, DEFAULT_HEAT_PER_RADIUS_SQ};
