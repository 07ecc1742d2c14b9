#[cfg(test)]
mod tests {
    use crate::error::{rate_limited_response, AppError};
    use crate::tests::body_json;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn test_app_error_display() {
        let error = AppError::BadRequest("Invalid input".to_string());
        assert_eq!(format!("{}", error), "Bad request: Invalid input");

        let error = AppError::RateLimited { message: "slow".to_string(), limit: 5, retry_after_seconds: 60 };
        assert_eq!(format!("{}", error), "Rate limited. Retry after 60 seconds");

        let error = AppError::SqlInjectionSuspected { field: "$.name".to_string() };
        assert_eq!(format!("{}", error), "Suspected SQL injection in $.name");
    }

    #[test]
    fn test_app_error_statuses() {
        let cases = vec![
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AppError::Unavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (AppError::CsrfValidationFailed("x".into()), StatusCode::FORBIDDEN),
            (AppError::SqlInjectionSuspected { field: "q".into() }, StatusCode::BAD_REQUEST),
            (AppError::PayloadTooLarge { max_bytes: 10 }, StatusCode::PAYLOAD_TOO_LARGE),
            (
                AppError::RateLimited { message: "x".into(), limit: 1, retry_after_seconds: 1 },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (AppError::Internal(anyhow::anyhow!("boom")), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let response = AppError::ValidationError {
            field: "category".to_string(),
            message: "unknown".to_string(),
        }
        .into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["field"], "category");
        assert_eq!(body["status"], 400);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response = AppError::Internal(anyhow::anyhow!("secret connection string")).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "An internal server error occurred");
        assert!(body["error"]["details"]["error_id"].is_string());
        assert!(!body.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn test_rate_limited_body_and_headers() {
        let response = rate_limited_response("Too many enrollment attempts", 3, 0, 42);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers["ratelimit-limit"], "3");
        assert_eq!(headers["ratelimit-remaining"], "0");
        assert_eq!(headers["ratelimit-reset"], "42");
        assert_eq!(headers["retry-after"], "42");

        let body = body_json(response).await;
        assert_eq!(body["error"], "Too many requests");
        assert_eq!(body["message"], "Too many enrollment attempts");
        assert_eq!(body["retryAfter"], 42);
    }
}
