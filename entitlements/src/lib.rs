//! Client for the third-party subscriber management API.
//!
//! The provider mirrors store purchases (app stores, web billing, promotional
//! grants) into named entitlements. This crate only reads subscriber state and
//! pushes best-effort events; it never decides access on its own.

pub mod source;

pub mod models {
    pub mod subscriber;
}

pub mod dtos {
    pub mod events;
    pub mod subscriber;
}

pub mod services {
    pub mod client;
}

pub use services::client::EntitlementClient;
pub use source::EntitlementSource;
