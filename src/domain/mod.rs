mod extent;
mod partition;

pub use extent::Extent;
pub use extent::CLAMP_MARGIN;
pub use partition::PartitionLayout;
pub use partition::MIN_SLAB_WIDTHS;
