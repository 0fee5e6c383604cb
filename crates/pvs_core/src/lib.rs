//! pvs_core - Potentially visible set precomputation and queries
//!
//! Space is partitioned into view cells. Offline, a sampler renders id
//! frames from every cell and records which LOD nodes are visible from it.
//! At runtime the database answers "is node N of model M visible from the
//! viewer's current cell?" with a single bit lookup.
//!
//! # Features
//!
//! - **Grids**: regular, octree and hierarchical octree view-cell layouts
//! - **Store**: text grid files plus packed binary visibility files
//! - **Database**: thread-safe runtime queries, fail-open while inactive
//! - **Optimizer**: collapses octree subtrees whose cells mostly agree
//! - **Sampler**: sweep or time-budgeted randomized sampling with LOD
//!   propagation
//! - **Analysis**: occlusion statistics report
//!
//! # Example
//!
//! ```ignore
//! use pvs_core::{Grid, PvsDatabase};
//!
//! let database = PvsDatabase::shared();
//! database.load_pvs_from_file(grid_path, pvs_path)?;
//! database.set_viewer_position(camera_position);
//! if database.get_viewer_visibility(model, node) {
//!     // draw node
//! }
//! ```

pub mod analysis;
pub mod bounds;
pub mod database;
pub mod error;
pub mod grid;
pub mod lod;
pub mod optimizer;
pub mod renderer;
pub mod sampler;
pub mod store;
pub mod types;
pub mod view_cell;

// Re-export commonly used items
pub use analysis::OcclusionReport;
pub use bounds::Aabb3d;
pub use database::PvsDatabase;
pub use error::{PvsError, Result};
pub use grid::{Grid, GridType, HierarchicalOctreeGrid, OctreeGrid, PvsGrid, RegularGrid};
pub use lod::{CompleteLodTree, LodHierarchy, LodModel};
pub use optimizer::{GridOptimizer, OptimizerConfig, OptimizerStats};
pub use renderer::{BoxRenderer, IdFrame, IdRenderer, SampleView};
pub use sampler::{PvsSampler, SamplerConfig, SamplingMode, SamplingStats};
pub use types::{ModelId, NodeCount, NodeId, NodeKey};
pub use view_cell::ViewCell;
