//! Registration intake: payload parsing, the end-to-end service, and its HTTP route.

pub mod domain;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    clamp_tickets, parse_body, BodyError, LedgerStatus, MissingIdentity, PaymentChannel,
    PaymentPlan, Registration, RegistrationRequest, SheetRow, MAX_TICKETS, MIN_TICKETS,
};
pub use router::{registration_router, REGISTRATION_PATH};
pub use service::{
    format_timestamp, RegistrationError, RegistrationReceipt, RegistrationService,
    RegistrationView, ServiceSettings,
};
