pub mod grid;
pub mod kernels;

pub use grid::CellGrid;
pub use grid::NeighborLists;
pub use grid::MAX_NEIGHBOURS;
