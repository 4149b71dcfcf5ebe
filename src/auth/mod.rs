/*!
 * Identity boundary.
 *
 * Authentication itself lives in an external provider; the storefront only
 * needs to know who (if anyone) is signed in when checkout begins. The
 * [`AuthRequired`](crate::errors::ServiceError::AuthRequired) path hands
 * control back to that provider's login flow, which signs the shopper in
 * here and resumes the original action.
 */

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

/// Signed-in shopper as reported by the external identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerIdentity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl CustomerIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Read-side of the external authentication service.
#[cfg_attr(test, automock)]
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<CustomerIdentity>;
}

/// Session-backed provider: whatever user the host application's login
/// flow resolved is signed in here and becomes visible to checkout.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    current: RwLock<Option<CustomerIdentity>>,
}

impl SessionIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user: CustomerIdentity) -> Self {
        Self {
            current: RwLock::new(Some(user)),
        }
    }

    pub fn sign_in(&self, user: CustomerIdentity) {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *current = Some(user);
    }

    pub fn sign_out(&self) {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *current = None;
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user(&self) -> Option<CustomerIdentity> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
