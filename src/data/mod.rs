pub mod dataset;
pub mod masks;
pub mod pseudodata;
pub mod seeds;

pub use dataset::{parse_ndata, DataCounts, Dataset, DatasetInfo, PositivitySet, ReplicaDataset};
pub use masks::tr_masks;
pub use pseudodata::{generate_replicas, make_replica, replica_datasets};
pub use seeds::{derive_seed, ReplicaSeeds};
