//! Administrator capability.
//!
//! A single administrator identity gates every configuration change. The
//! controller is handed explicitly to the registry, the rate model and the
//! pool rather than living in global state.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::address::Address;

/// Capability object naming the pool administrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminController {
    admin: Address,
}

impl AdminController {
    /// Create a controller for `admin`
    pub fn new(admin: Address) -> Result<Self> {
        if admin.is_zero() {
            return Err(Error::InvalidAddress(admin));
        }
        Ok(Self { admin })
    }

    /// The administrator identity
    pub fn admin(&self) -> Address {
        self.admin
    }

    /// Check whether `caller` is the administrator
    pub fn is_admin(&self, caller: &Address) -> bool {
        self.admin == *caller
    }

    /// Fail with `Unauthorized` unless `caller` is the administrator
    pub fn authorize(&self, caller: &Address, action: &str) -> Result<()> {
        if !self.is_admin(caller) {
            return Err(Error::Unauthorized(format!(
                "{} is not the administrator (action: {})",
                caller, action
            )));
        }
        Ok(())
    }
}
