use invoicechain_core::Address;

/// Caller context for a request (the authenticated account address).
///
/// Inserted by the auth middleware; present on every protected route.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CallerContext {
    address: Address,
}

impl CallerContext {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }
}
