//! Veil Decoy — what an unauthorized caller gets to see.
//!
//! - [`synth`]: keyed, deterministic fake banking records for Shadow.
//! - [`sanitize`]: digit masking and labelled-field redaction for Mirror.

pub mod sanitize;
pub mod synth;

pub use sanitize::sanitize;
pub use synth::{synthesize, AccountType, DecoyPayload};
