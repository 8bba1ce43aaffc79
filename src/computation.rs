//! CPU-bound benchmark application.
//!
//! `GET /?iterations=N` runs the Leibniz series for pi and answers
//! `"<pi>;<running total>;<alternating sum>"`. `GET /instance` reports which
//! worker served the request.

use axum::{extract::Query, routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::http::context::Instance;

#[derive(Debug, Deserialize)]
pub struct ComputeQuery {
    pub iterations: usize,
}

/// Build the benchmark router. Used as the handler factory for every worker.
pub fn router() -> Router {
    Router::new()
        .route("/", get(compute))
        .route("/instance", get(served_by))
}

async fn compute(Query(query): Query<ComputeQuery>) -> String {
    let (pi, total, alternating) = calc_pi(query.iterations);
    format!("{};{};{}", pi, total, alternating)
}

async fn served_by(Instance(index): Instance) -> Json<Value> {
    Json(json!({ "instance": index }))
}

/// Leibniz approximation of pi plus two sums that depend on every step.
pub fn calc_pi(iterations: usize) -> (f64, f64, f64) {
    let mut pi = 0.0;
    let mut denominator = 1.0;
    let mut total_sum = 0.0;
    let mut alternating_sum = 0.0;

    for x in 0..iterations {
        if x % 2 == 0 {
            pi += 1.0 / denominator;
        } else {
            pi -= 1.0 / denominator;
        }
        denominator += 2.0;

        total_sum += pi;
        match x % 3 {
            0 => alternating_sum += pi,
            1 => alternating_sum -= pi,
            _ => alternating_sum /= 2.0,
        }
    }

    (pi * 4.0, total_sum, alternating_sum)
}
