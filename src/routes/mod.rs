//! HTTP handlers (JSON boundary).

pub mod extract;
pub mod medications;
pub mod user_medications;
pub mod users;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/users", post(users::create_user).get(users::list_users))
        .route(
            "/users/{user_id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/{user_id}/medications", get(users::list_user_medications))
        .route("/users/{user_id}/medication_logs", get(users::list_medication_logs))
        .route("/users/{user_id}/adherence", get(users::get_adherence))
        .route(
            "/medications",
            post(medications::create_medication).get(medications::list_medications),
        )
        .route(
            "/medications/{medication_id}",
            get(medications::get_medication)
                .patch(medications::update_medication)
                .delete(medications::delete_medication),
        )
        .route(
            "/medications/{medication_id}/log",
            post(medications::log_medication_dose),
        )
        .route(
            "/user_medications",
            post(user_medications::create_user_medication),
        )
        .route(
            "/user_medications/{id}",
            get(user_medications::get_user_medication)
                .patch(user_medications::update_user_medication)
                .delete(user_medications::delete_user_medication),
        )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
