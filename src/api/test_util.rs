use axum::body;
use axum::http::header;
use axum::response::Response;
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Client-side view of [BasicErrorResponse](crate::routing_utils::BasicErrorResponse).
/// `extra_info` is kept as raw JSON so tests can poke at validation details.
#[derive(Deserialize, Debug)]
pub struct ErrorBody {
    pub error_code: String,
    pub error_description: String,
    pub extra_info: Option<serde_json::Value>,
}

/// Used in tests to both extract the raw bytes from the HTTP response body and then deserialize them into the
/// requested type. Will panic and fail the test if either step fails somehow.
pub async fn deserialize_body<T: DeserializeOwned>(response_body: body::Body) -> T {
    let bytes = body::to_bytes(response_body, usize::MAX)
        .await
        .expect("Could not read data from response body!");

    serde_json::from_slice(&bytes).unwrap_or_else(|err| {
        panic!(
            "Could not parse body content into data structure! Error: {}, Received body: {:?}",
            err, bytes
        )
    })
}

/// Pulls the error code out of a failed response, checking the status along the way
pub async fn expect_error(response: Response, status: axum::http::StatusCode) -> ErrorBody {
    assert_eq!(status, response.status());
    deserialize_body(response.into_body()).await
}

/// Every `Set-Cookie` header on a response
pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| {
            value
                .to_str()
                .expect("Set-Cookie header was not valid text")
                .to_owned()
        })
        .collect()
}
