use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::error::{AppError, Result};
use crate::filter::ListParams;
use crate::models::{CustomerForm, CustomerRecord};
use crate::month;
use crate::report::{self, ListReport};
use crate::store::RecordStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
}

pub fn app(store: Arc<dyn RecordStore>) -> Router {
    Router::new()
        .route("/", get(list))
        .route("/customers", post(create))
        .route("/customers/new", get(new_form))
        .route("/customers/edit/:id", get(edit_form))
        .route("/customers/update/:id", post(update))
        .route("/customers/delete/:id", post(delete))
        .route("/_liveness", get(liveness))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { store })
}

pub async fn listen(app: Router, bind: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("listening on {}", bind);
    axum::serve(listener, app).await
}

async fn liveness() -> &'static str {
    "ok"
}

async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListReport>> {
    let report = report::build_list_report(state.store.as_ref(), params).await?;
    Ok(Json(report))
}

async fn new_form() -> Json<serde_json::Value> {
    Json(json!({ "currentYearMonth": month::label(Utc::now().date_naive()) }))
}

async fn create(State(state): State<AppState>, Form(form): Form<CustomerForm>) -> Result<Response> {
    let record = form.validate()?;
    let id = state.store.create(&record).await?;
    tracing::info!(id, "created customer record");
    Ok(back_to_list())
}

async fn edit_form(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<CustomerRecord>> {
    match state.store.get(id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(AppError::NotFound(id)),
    }
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<CustomerForm>,
) -> Result<Response> {
    if state.store.get(id).await?.is_none() {
        return Err(AppError::NotFound(id));
    }
    let record = form.validate()?;
    if !state.store.update(id, &record).await? {
        return Err(AppError::NotFound(id));
    }
    tracing::info!(id, "updated customer record");
    Ok(back_to_list())
}

async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response> {
    if !state.store.soft_delete(id).await? {
        return Err(AppError::NotFound(id));
    }
    tracing::info!(id, "deleted customer record");
    Ok(back_to_list())
}

fn back_to_list() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{self, Request},
    };
    use http_body_util::BodyExt; // for `collect`
    use serde_json::Value;
    use tower::ServiceExt; // for `oneshot`

    use crate::store::memory::MemoryStore;
    use crate::test_utils::new_record;

    const VALID_FORM: &str = "recruitmentMethod=Job+board&customerName=Acme&yearMonth=2024-03\
        &monthlyFee=1500&monthlyApplications=30&monthlyRegistrations=0&monthlyPlacements=3";

    async fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .create(&new_record("X", "Acme", "2024-01", 1000, (10, 5, 2)))
            .await
            .unwrap();
        store
            .create(&new_record("X", "Acme", "2024-03", 1500, (10, 5, 3)))
            .await
            .unwrap();
        store
    }

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(http::Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn live_count(store: &MemoryStore) -> usize {
        store
            .find(&crate::filter::RecordFilter::default())
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn list_returns_records_averages_and_chart() {
        let store = seeded().await;
        let response = app(store).oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["customers"].as_array().unwrap().len(), 2);
        assert_eq!(body["averages"]["monthly_fee"], 1250.0);
        assert_eq!(body["chart_data"]["labels"], json!(["2024-01", "2024-03"]));
        let dataset = &body["chart_data"]["datasets"][0];
        assert_eq!(dataset["label"], "X - Acme");
        assert_eq!(dataset["placement_unit_price"], json!([500.0, 500.0]));
        assert_eq!(dataset["monthly_placements"], json!([2, 3]));
    }

    #[tokio::test]
    async fn list_with_no_matches_has_null_chart() {
        let store = seeded().await;
        let response = app(store)
            .oneshot(get_request("/?customerName=Nobody&sort=bogus"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["customers"], json!([]));
        assert!(body["chart_data"].is_null());
        assert_eq!(body["averages"]["placement_unit_price"], 0.0);
        assert_eq!(body["params"]["customer_name"], "Nobody");
        assert_eq!(body["params"]["sort"], "bogus");
    }

    #[tokio::test]
    async fn injected_sort_falls_back_to_default_order() {
        let store = seeded().await;
        let response = app(store)
            .oneshot(get_request(
                "/?sort=monthly_fee%3B%20DROP%20TABLE%20customer_records&order=asc",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let ids: Vec<i64> = body["customers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn create_redirects_and_persists() {
        let store = seeded().await;
        let response = app(store.clone())
            .oneshot(form_post("/customers", VALID_FORM))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/");

        let created = store.get(3).await.unwrap().unwrap();
        assert_eq!(created.customer_name, "Acme");
        assert_eq!(created.placement_unit_price, 500.0);
        assert_eq!(created.registration_unit_price, 0.0);
    }

    #[tokio::test]
    async fn create_with_bad_fee_is_rejected_without_write() {
        let store = seeded().await;
        let body = VALID_FORM.replace("monthlyFee=1500", "monthlyFee=abc");
        let response = app(store.clone())
            .oneshot(form_post("/customers", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["field"], "monthlyFee");
        assert_eq!(live_count(&store).await, 2);
    }

    #[tokio::test]
    async fn create_without_fee_is_rejected() {
        let store = seeded().await;
        let body = VALID_FORM.replace("&monthlyFee=1500", "");
        let response = app(store.clone())
            .oneshot(form_post("/customers", &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(live_count(&store).await, 2);
    }

    #[tokio::test]
    async fn edit_form_returns_record_or_404() {
        let store = seeded().await;
        let response = app(store.clone())
            .oneshot(get_request("/customers/edit/1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["year_month"], "2024-01-01");

        let response = app(store)
            .oneshot(get_request("/customers/edit/99"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_recomputes_unit_prices() {
        let store = seeded().await;
        let body = "recruitmentMethod=X&customerName=Acme&yearMonth=2024-01\
            &monthlyFee=1000&monthlyApplications=4&monthlyRegistrations=0&monthlyPlacements=0";
        let response = app(store.clone())
            .oneshot(form_post("/customers/update/1", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);

        let updated = store.get(1).await.unwrap().unwrap();
        assert_eq!(updated.application_unit_price, 250.0);
        assert_eq!(updated.registration_unit_price, 0.0);
        assert_eq!(updated.placement_unit_price, 0.0);
    }

    #[tokio::test]
    async fn update_missing_record_is_404() {
        let store = seeded().await;
        let response = app(store)
            .oneshot(form_post("/customers/update/42", VALID_FORM))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_missing_record_with_bad_form_is_404() {
        let store = seeded().await;
        let body = VALID_FORM.replace("yearMonth=2024-03", "yearMonth=March");
        let response = app(store.clone())
            .oneshot(form_post("/customers/update/42", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app(store)
            .oneshot(form_post("/customers/update/1", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_hides_record_from_list() {
        let store = seeded().await;
        let response = app(store.clone())
            .oneshot(form_post("/customers/delete/1", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(live_count(&store).await, 1);
        assert_eq!(store.total_rows(), 2);

        let response = app(store)
            .oneshot(form_post("/customers/delete/1", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn new_form_defaults_to_current_month() {
        let response = app(Arc::new(MemoryStore::new()))
            .oneshot(get_request("/customers/new"))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(
            body["currentYearMonth"],
            month::label(Utc::now().date_naive())
        );
    }
}
