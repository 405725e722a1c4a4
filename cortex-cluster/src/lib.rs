//! Topic clustering over the subject co-occurrence graph: a full rebuild
//! that partitions all active facts into connected components, and an
//! incremental update that folds new facts into the existing clustering
//! when possible.

mod palette;
mod repository;
mod subject_graph;

pub use palette::color_for;
pub use repository::ClusterRepository;
pub use subject_graph::{compute_clusters, ClusterComputation, FactSubjectRow};
