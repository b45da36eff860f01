//! Thin proxy in front of the translation provider.

use actix_web::web;

pub mod routes {
    pub mod translate;
}

pub mod services {
    pub mod client;
}

mod dtos {
    pub(crate) mod translate;
}

pub use services::client::TranslationClient;

pub fn mount_translate() -> actix_web::Scope {
    web::scope("/translate")
        .service(routes::translate::post_detect)
        .service(routes::translate::post_localize)
}
