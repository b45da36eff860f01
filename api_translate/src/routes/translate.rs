use actix_web::{Responder, post, web};
use common::{error::Res, http::Success};

use crate::{
    dtos::translate::{DetectRequest, DetectResponse, LocalizeRequest, LocalizeResponse},
    services::client::TranslationClient,
};

/// Detects the locale of a piece of text. Provider failures answer 502.
#[post("/detect")]
pub async fn post_detect(
    body: web::Json<DetectRequest>,
    client: web::Data<TranslationClient>,
) -> Res<impl Responder> {
    let locale = client.detect_locale(&body.text).await?;
    Success::ok(DetectResponse { locale })
}

#[post("/localize")]
pub async fn post_localize(
    body: web::Json<LocalizeRequest>,
    client: web::Data<TranslationClient>,
) -> Res<impl Responder> {
    let localized_text = client
        .localize(&body.text, &body.source_locale, &body.target_locale)
        .await?;
    Success::ok(LocalizeResponse { localized_text })
}
