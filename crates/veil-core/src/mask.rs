//! Permission mask codec.
//!
//! A mask selects a subset of eleven ordered permission slots. Two selected
//! slots may never be neighbours: bit `i` and bit `i + 1` cannot both be set.
//! Masks built here are trusted; masks arriving on requests are raw `i64`
//! values and are only ever classified with [`is_valid_mask`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

/// Number of permission slots.
pub const SLOT_COUNT: u32 = 11;

/// Largest representable mask, `2^SLOT_COUNT - 1`.
pub const MAX_MASK: i64 = (1 << SLOT_COUNT) - 1;

// ---------------------------------------------------------------------------
// Permission — one slot of the mask
// ---------------------------------------------------------------------------

/// A permission slot. The discriminant is the slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read = 0,
    Write = 1,
    Exec = 2,
    Admin = 3,
    Audit = 4,
    Grant = 5,
    Secure = 6,
    Trace = 7,
    Debug = 8,
    Root = 9,
    Omnis = 10,
}

impl Permission {
    pub const ALL: [Permission; SLOT_COUNT as usize] = [
        Permission::Read,
        Permission::Write,
        Permission::Exec,
        Permission::Admin,
        Permission::Audit,
        Permission::Grant,
        Permission::Secure,
        Permission::Trace,
        Permission::Debug,
        Permission::Root,
        Permission::Omnis,
    ];

    pub const fn slot(self) -> u32 {
        self as u32
    }

    /// Public permission id. Ids follow the Fibonacci sequence, so the
    /// non-adjacency rule on slots mirrors Zeckendorf representations.
    pub const fn id(self) -> u32 {
        match self {
            Permission::Read => 1,
            Permission::Write => 2,
            Permission::Exec => 3,
            Permission::Admin => 5,
            Permission::Audit => 8,
            Permission::Grant => 13,
            Permission::Secure => 21,
            Permission::Trace => 34,
            Permission::Debug => 55,
            Permission::Root => 89,
            Permission::Omnis => 144,
        }
    }

    pub fn from_id(id: u32) -> CoreResult<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.id() == id)
            .ok_or(CoreError::UnknownPermission(id))
    }

    pub fn from_slot(slot: u32) -> Option<Self> {
        Self::ALL.get(slot as usize).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Exec => "exec",
            Permission::Admin => "admin",
            Permission::Audit => "audit",
            Permission::Grant => "grant",
            Permission::Secure => "secure",
            Permission::Trace => "trace",
            Permission::Debug => "debug",
            Permission::Root => "root",
            Permission::Omnis => "omnis",
        }
    }

    const fn bit(self) -> u16 {
        1 << self.slot()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts either a permission name (case-insensitive) or its numeric id.
impl FromStr for Permission {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(id) = trimmed.parse::<u32>() {
            return Self::from_id(id);
        }
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CoreError::UnknownPermissionName(trimmed.to_string()))
    }
}

// ---------------------------------------------------------------------------
// PermissionMask — validated, immutable bit pattern
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct PermissionMask(u16);

impl PermissionMask {
    pub const EMPTY: PermissionMask = PermissionMask(0);

    /// The single validating constructor for masks.
    pub fn from_permissions<I>(permissions: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = Permission>,
    {
        encode(permissions)
    }

    /// Accept an untrusted raw value only if it passes [`is_valid_mask`].
    pub fn from_raw(raw: i64) -> Option<Self> {
        // The range check in is_valid_mask guarantees the value fits in u16.
        is_valid_mask(raw).then(|| Self(raw as u16))
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn as_i64(self) -> i64 {
        i64::from(self.0)
    }

    pub fn contains(self, permission: Permission) -> bool {
        self.0 & permission.bit() != 0
    }

    pub fn permissions(self) -> BTreeSet<Permission> {
        decode(self)
    }

    /// Zero-padded binary rendering over all slots, most significant first.
    pub fn to_binary_string(self) -> String {
        format!("{:0width$b}", self.0, width = SLOT_COUNT as usize)
    }
}

impl fmt::Display for PermissionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for PermissionMask {
    type Error = String;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::from_raw(raw).ok_or_else(|| format!("invalid permission mask: {}", raw))
    }
}

impl From<PermissionMask> for i64 {
    fn from(mask: PermissionMask) -> Self {
        mask.as_i64()
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Encode a permission set. Fails when two chosen slots are neighbours.
pub fn encode<I>(permissions: I) -> CoreResult<PermissionMask>
where
    I: IntoIterator<Item = Permission>,
{
    let sorted: BTreeSet<Permission> = permissions.into_iter().collect();
    let slots: Vec<Permission> = sorted.into_iter().collect();

    for pair in slots.windows(2) {
        if pair[1].slot() - pair[0].slot() == 1 {
            return Err(CoreError::AdjacentPermissions {
                lower: pair[0],
                upper: pair[1],
            });
        }
    }

    Ok(PermissionMask(
        slots.iter().fold(0u16, |mask, p| mask | p.bit()),
    ))
}

/// Encode a set of raw permission ids, rejecting unknown ids first.
pub fn encode_ids(ids: &[u32]) -> CoreResult<PermissionMask> {
    let permissions = ids
        .iter()
        .map(|id| Permission::from_id(*id))
        .collect::<CoreResult<Vec<_>>>()?;
    encode(permissions)
}

pub fn decode(mask: PermissionMask) -> BTreeSet<Permission> {
    Permission::ALL
        .into_iter()
        .filter(|p| mask.contains(*p))
        .collect()
}

/// O(1) topological check for untrusted masks. Never fails, only classifies.
pub fn is_valid_mask(mask: i64) -> bool {
    if !(0..=MAX_MASK).contains(&mask) {
        return false;
    }
    mask & (mask >> 1) == 0
}

/// Whether the permission's bit is set in an untrusted mask.
pub fn has_permission(mask: i64, permission: Permission) -> bool {
    mask >= 0 && mask & i64::from(permission.bit()) != 0
}
