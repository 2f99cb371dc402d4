use utoipa::OpenApi;

use crate::routes::{health, marketing, tasks};

#[derive(OpenApi)]
#[openapi(info(
    title = "promo-server",
    description = "Asynchronous marketing copy and image generation",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(marketing::MarketingApi::openapi());
    root.merge(tasks::TasksApi::openapi());
    root
}
