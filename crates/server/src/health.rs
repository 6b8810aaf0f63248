use axum::http::StatusCode;

pub async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::health::health;

    #[tokio::test]
    async fn health_is_always_ok() {
        let (status, body) = health().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
