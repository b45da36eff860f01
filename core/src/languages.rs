use actix_web::{Responder, get, web};
use common::{
    catalog::LanguageCatalog,
    error::{AppError, Res},
    http::Success,
};

#[get("/languages")]
pub async fn get_languages(catalog: web::Data<LanguageCatalog>) -> Res<impl Responder> {
    Success::ok(catalog.all().to_vec())
}

#[get("/languages/{code}")]
pub async fn get_language(
    code: web::Path<String>,
    catalog: web::Data<LanguageCatalog>,
) -> Res<impl Responder> {
    let language = catalog
        .get(&code)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Language '{}'", code)))?;
    Success::ok(language)
}

#[cfg(test)]
mod tests {
    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;

    use super::*;

    #[actix_web::test]
    async fn serves_the_injected_catalog() {
        let catalog = LanguageCatalog::from_json(
            r#"[{"code": "pt-BR", "name": "Portuguese", "native_name": "Português", "flag": "🇧🇷"}]"#,
        )
        .unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(catalog))
                .service(web::scope("/api").service(get_languages).service(get_language)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/languages").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["native_name"], "Português");

        let req = test::TestRequest::get().uri("/api/languages/PT-br").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["code"], "pt-BR");

        let req = test::TestRequest::get().uri("/api/languages/xx").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
