//! Subscription access: the reconciliation engine that merges the local billing
//! table with the entitlement provider, the usage presenter and the billing
//! webhook that keeps the local table current.

use actix_web::web;

pub mod store;

pub mod routes {
    pub mod access;
    pub mod webhook;
}

pub mod services {
    pub mod reconcile;
    pub mod usage;
    pub mod webhook;
}

pub mod models {
    pub mod status;
}

mod dtos {
    pub(crate) mod access;
}

pub use services::reconcile::AccessResolver;

pub fn mount_access() -> actix_web::Scope {
    web::scope("/access")
        .service(routes::access::get_status)
        .service(routes::access::get_usage)
        .service(routes::access::post_event)
}

pub fn mount_webhook() -> actix_web::Scope {
    web::scope("/billing").service(routes::webhook::post_webhook)
}
