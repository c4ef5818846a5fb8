pub mod clock;
pub mod error;
pub mod mask;
pub mod seal;
pub mod types;

pub use clock::*;
pub use error::*;
pub use mask::{
    decode, encode, encode_ids, has_permission, is_valid_mask, Permission, PermissionMask,
    MAX_MASK, SLOT_COUNT,
};
pub use seal::{
    canonical_payload, compute_seal, constant_time_eq, seal_request, verify, Seal, SealKey,
};
pub use types::*;
