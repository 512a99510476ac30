use actix_web::http::header;
use actix_web::{post, web, HttpRequest, HttpResponse};
use std::sync::Arc;
use targeting_core::PageContext;
use tracing::debug;
use url::Url;

use crate::error::Result;
use crate::models::{ResolveRequest, ResolveResponse};
use crate::services::{BotClassifier, ResolutionService};

pub struct WidgetHandlerState {
    pub resolution: ResolutionService,
    pub bots: Arc<dyn BotClassifier>,
}

/// Resolves one page view into the widget payload. Called by the embed
/// script on every page load.
#[post("/v1/resolve")]
pub async fn resolve_page_view(
    body: web::Json<ResolveRequest>,
    http_req: HttpRequest,
    state: web::Data<WidgetHandlerState>,
) -> Result<HttpResponse> {
    let request = body.into_inner();

    let user_agent = http_req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok());
    if state.bots.is_bot(user_agent) {
        debug!(user_agent, url = %request.url, "bot page view, returning empty payload");
        return Ok(HttpResponse::Ok().json(ResolveResponse::empty()));
    }

    let url = Url::parse(&request.url)?;
    let ctx = PageContext::new(
        url,
        request.structured_data_section.clone(),
        request.keywords.clone(),
    );

    let response = state.resolution.resolve(&request, &ctx).await;
    Ok(HttpResponse::Ok().json(response))
}
