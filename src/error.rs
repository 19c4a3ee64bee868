use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RelqError {
    #[error("requested capacity `{0}` does not fit the 32-bit index domain")]
    CapacityOverflow(usize),
    #[error("node key does not match the probe key")]
    KeyMismatch,
    #[error("node is not reachable from either candidate bucket")]
    Unreachable,
    #[error("stored hash differs from the recomputed hash")]
    HashMismatch,
    #[error("candidate buckets disagree with the fingerprint")]
    BucketMismatch,
}

pub type Result<T> = std::result::Result<T, RelqError>;
