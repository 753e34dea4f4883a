//! Per-call options.

/// Cross-cutting options accepted by every gateway operation.
#[derive(Clone, Debug, Default)]
pub struct CallOptions {
    credential: Option<String>,
    include_inactive: bool,
    force_delete: bool,
}

impl CallOptions {
    /// Options with no credential and default visibility.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the credential checked against types that require
    /// authorization.
    #[must_use]
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Makes reads include soft-deleted records.
    #[must_use]
    pub fn include_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }

    /// Makes delete remove records physically even on types that normally
    /// keep them.
    #[must_use]
    pub fn force_delete(mut self) -> Self {
        self.force_delete = true;
        self
    }

    /// The supplied credential, if any.
    #[must_use]
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    /// Whether soft-deleted records are visible to this call.
    #[must_use]
    pub fn includes_inactive(&self) -> bool {
        self.include_inactive
    }

    /// Whether delete bypasses the type's keep-deleted policy.
    #[must_use]
    pub fn forces_delete(&self) -> bool {
        self.force_delete
    }
}
