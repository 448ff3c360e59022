use axum::Json;
use chrono::Utc;

/// GET /
/// Response: 200 OK with JSON
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
      "message": "Blog API on AWS Lambda with PostgreSQL",
      "status": "healthy",
      "timestamp": Utc::now().to_rfc3339()
    }))
}
