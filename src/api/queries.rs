use salvo::prelude::*;
use serde::de::DeserializeOwned;

use crate::models::{ExecuteQueryRequest, PreviewQueryRequest, Query};
use crate::utils::middleware::current_context;
use crate::utils::{get_app_state, AppError};

fn path_param(req: &Request, name: &str) -> Result<String, AppError> {
    req.param::<String>(name)
        .ok_or_else(|| AppError::Validation(format!("Missing {}", name)))
}

/// Empty bodies are read as the type's default.
async fn parse_body<T: DeserializeOwned + Default>(req: &mut Request) -> Result<T, AppError> {
    let payload = req.payload().await?;
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(payload).map_err(|e| AppError::Validation(format!("Invalid JSON: {}", e)))
}

#[handler]
pub async fn list_queries(res: &mut Response, depot: &mut Depot) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let queries = state.query_service.fetch().await?;
    res.render(Json(queries));
    Ok(())
}

#[handler]
pub async fn find_query(req: &mut Request, res: &mut Response, depot: &mut Depot) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let query_id = path_param(req, "query_id")?;
    let query = state.query_service.find(&query_id).await?;
    res.render(Json(query));
    Ok(())
}

#[handler]
pub async fn save_query(req: &mut Request, res: &mut Response, depot: &mut Depot) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let query: Query = req
        .parse_json()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid JSON: {}", e)))?;

    let saved = state.query_service.save(query).await?;
    res.render(Json(saved));
    Ok(())
}

#[handler]
pub async fn preview_query(req: &mut Request, res: &mut Response, depot: &mut Depot) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let request: PreviewQueryRequest = req
        .parse_json()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid JSON: {}", e)))?;

    let response = state.query_service.preview(request, current_context(depot)).await?;
    res.render(Json(response));
    Ok(())
}

/// Bare row array
#[handler]
pub async fn execute_query_v1(req: &mut Request, res: &mut Response, depot: &mut Depot) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let query_id = path_param(req, "query_id")?;
    let request: ExecuteQueryRequest = parse_body(req).await?;

    let response = state
        .query_service
        .execute_v1(&query_id, request, current_context(depot))
        .await?;
    res.render(Json(response));
    Ok(())
}

/// `{ data, pagination, ...extra, ...info }`
#[handler]
pub async fn execute_query_v2(req: &mut Request, res: &mut Response, depot: &mut Depot) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let query_id = path_param(req, "query_id")?;
    let request: ExecuteQueryRequest = parse_body(req).await?;

    let response = state
        .query_service
        .execute_v2(&query_id, request, current_context(depot))
        .await?;
    res.render(Json(response));
    Ok(())
}

#[handler]
pub async fn delete_query(req: &mut Request, res: &mut Response, depot: &mut Depot) -> Result<(), AppError> {
    let state = get_app_state(depot)?;
    let query_id = path_param(req, "query_id")?;
    let rev_id = path_param(req, "rev_id")?;

    state.query_service.destroy(&query_id, &rev_id).await?;
    res.render(Json(serde_json::json!({
        "message": "Query deleted successfully"
    })));
    Ok(())
}

pub fn query_routes() -> Router {
    Router::new()
        .push(
            Router::with_path("queries")
                .get(list_queries)
                .post(save_query),
        )
        .push(Router::with_path("queries/preview").post(preview_query))
        .push(
            Router::with_path("queries/{query_id}")
                .get(find_query)
                .post(execute_query_v1),
        )
        .push(Router::with_path("queries/{query_id}/{rev_id}").delete(delete_query))
        .push(Router::with_path("v2/queries/{query_id}").post(execute_query_v2))
}
