//! Community chat: the persisted message log, voice messages and the realtime
//! mirror that streams new messages to connected clients.

use actix_web::web;

pub mod feed;
pub mod mirror;
pub mod relay;
pub mod voice;

pub mod routes {
    pub mod chat;
}

pub mod services {
    pub mod chat;
}

mod dtos {
    pub(crate) mod chat;
}

pub fn mount_chat() -> actix_web::Scope {
    web::scope("/chat")
        .service(routes::chat::get_messages)
        .service(routes::chat::post_message)
        .service(routes::chat::post_voice)
        .service(routes::chat::get_stream)
}
