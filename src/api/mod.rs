pub mod queries;

use salvo::prelude::*;

use crate::utils::middleware::{inject_state, invocation_context};
use crate::utils::{get_app_state, AppError, AppState};

pub fn router(state: AppState) -> Router {
    let api_router = Router::new()
        .hoop(inject_state(state))
        .hoop(invocation_context)
        .push(Router::with_path("health").get(health_check))
        .push(queries::query_routes());

    Router::new().push(Router::with_path("api").push(api_router))
}

#[handler]
async fn health_check(res: &mut Response, depot: &mut Depot) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    if let Some(db) = &state.db {
        db.ping().await?;
    }

    res.render(Json(serde_json::json!({
        "status": "ok",
        "service": "query-engine-backend",
        "store": if state.db.is_some() { "postgres" } else { "memory" },
        "queryTimeoutMs": state.config.query_timeout.as_millis() as u64,
        "activeQueries": state.query_service.runner().active_count().await
    })));
    Ok(())
}
