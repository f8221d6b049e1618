//! Caller identity and capability bits
//!
//! The engine does not authenticate. It consults whatever identity the
//! caller most recently installed on the volume via `set_context`, and
//! gates writes against ref permission bits. Policy lives outside the
//! engine; only the reserved capability bits below are interpreted here.

use serde::{Deserialize, Serialize};

/// Capability bit: kernel-level caller, bypasses all permission checks
pub const CAP_KERNEL: u64 = 1 << 0;

/// Capability bit: filesystem administrator, bypasses all permission checks
pub const CAP_FS_ADMIN: u64 = 1 << 1;

/// Ambient access context installed on a volume
///
/// Carries the caller's user id (recorded as the owner of new refs) and a
/// capability bitmask. A context holding [`CAP_KERNEL`] or [`CAP_FS_ADMIN`]
/// bypasses the access gate entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessContext {
    /// Caller user id, stamped as owner on refs it creates
    pub user: u64,
    /// Capability bitmask
    pub caps: u64,
}

impl AccessContext {
    /// Kernel context: user 0 with the kernel capability
    pub const KERNEL: AccessContext = AccessContext {
        user: 0,
        caps: CAP_KERNEL,
    };

    /// Create a context for an unprivileged user
    pub const fn user(user: u64) -> Self {
        AccessContext { user, caps: 0 }
    }

    /// Create a context with explicit capabilities
    pub const fn with_caps(user: u64, caps: u64) -> Self {
        AccessContext { user, caps }
    }

    /// Whether this context bypasses permission checks
    pub const fn is_privileged(&self) -> bool {
        self.caps & (CAP_KERNEL | CAP_FS_ADMIN) != 0
    }
}

impl Default for AccessContext {
    fn default() -> Self {
        AccessContext::KERNEL
    }
}
