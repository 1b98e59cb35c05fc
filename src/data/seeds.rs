use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::config::SeedConfig;
use crate::error::{FitError, Result};

const SEED_RANGE: u64 = 1 << 31;
const NAME_SEED_MODULUS: u64 = 100_000_000;

/// Seeds used by one replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaSeeds {
    pub nnseed: u64,
    pub trvlseed: u64,
    /// `None` when pseudodata generation is disabled.
    pub mcseed: Option<u64>,
}

impl ReplicaSeeds {
    pub fn for_replica(replica: u32, config: &SeedConfig) -> Result<Self> {
        Ok(ReplicaSeeds {
            nnseed: derive_seed(replica, config.nnseed)?,
            trvlseed: derive_seed(replica, config.trvlseed)?,
            mcseed: if config.genrep {
                Some(derive_seed(replica, config.mcseed)?)
            } else {
                None
            },
        })
    }
}

/// Seeds a generator with `base` and keeps the `replica`-th draw in
/// `[0, 2^31)`, so every replica gets its own reproducible seed.
pub fn derive_seed(replica: u32, base: u64) -> Result<u64> {
    if replica == 0 {
        return Err(FitError::InvalidReplica(replica));
    }
    let mut rng = StdRng::seed_from_u64(base);
    let mut seed = 0;
    for _ in 0..replica {
        seed = rng.gen_range(0..SEED_RANGE);
    }
    Ok(seed)
}

/// Stable seed derived from the dataset names, so that the same data
/// selection always starts from the same stream.
pub fn name_seed<'a>(names: impl IntoIterator<Item = &'a str>) -> u64 {
    let mut hasher = Sha256::new();
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head) % NAME_SEED_MODULUS
}
