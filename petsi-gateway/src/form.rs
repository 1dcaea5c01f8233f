//! Form body extraction.
//!
//! Browser forms arrive either urlencoded or as `multipart/form-data`
//! (a `FormData` object). [`FormFields`] accepts both and deserializes the
//! text fields into `T`. Empty values count as missing.

use crate::error::{ApiError, ApiResult};
use axum::{
    async_trait,
    extract::{multipart::Field, FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Largest accepted text field in a multipart body.
pub const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

/// Form fields from a urlencoded or multipart body.
#[derive(Debug)]
pub struct FormFields<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for FormFields<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let fields = if is_multipart(&req) {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|r| ApiError::validation(r.body_text()))?;
            multipart_fields(multipart).await?
        } else {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state).await?;
            fields
        };

        let object: Map<String, Value> = fields
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key, Value::String(value)))
            .collect();

        serde_json::from_value(Value::Object(object))
            .map(FormFields)
            .map_err(|e| ApiError::validation(format!("Failed to deserialize form body: {e}")))
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

async fn multipart_fields(mut multipart: Multipart) -> ApiResult<HashMap<String, String>> {
    let mut fields = HashMap::new();
    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let value = read_text_field(&mut field, &name).await?;
        fields.insert(name, value);
    }
    Ok(fields)
}

/// Read a multipart text field, refusing anything over
/// [`MAX_TEXT_FIELD_BYTES`].
pub async fn read_text_field(field: &mut Field<'_>, name: &str) -> ApiResult<String> {
    let mut data = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if data.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
            return Err(ApiError::bad_request(format!(
                "Field {name} exceeds {MAX_TEXT_FIELD_BYTES} bytes"
            )));
        }
        data.extend_from_slice(&chunk);
    }
    String::from_utf8(data)
        .map_err(|_| ApiError::validation(format!("Field {name} is not valid UTF-8")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Credentials {
        username: String,
        password: String,
    }

    const BOUNDARY: &str = "form-test-boundary";

    fn multipart_body(fields: &[(&str, &str)]) -> String {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn request(content_type: &str, body: String) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap()
    }

    async fn extract(req: Request) -> ApiResult<Credentials> {
        FormFields::<Credentials>::from_request(req, &())
            .await
            .map(|FormFields(c)| c)
    }

    #[tokio::test]
    async fn test_urlencoded_fields() {
        let req = request(
            "application/x-www-form-urlencoded",
            "username=vet%40petsi.dev&password=s3cret".into(),
        );
        let creds = extract(req).await.unwrap();
        assert_eq!(creds.username, "vet@petsi.dev");
        assert_eq!(creds.password, "s3cret");
    }

    #[tokio::test]
    async fn test_multipart_fields() {
        let body = multipart_body(&[("username", "vet@petsi.dev"), ("password", "s3cret")]);
        let req = request(&format!("multipart/form-data; boundary={BOUNDARY}"), body);
        let creds = extract(req).await.unwrap();
        assert_eq!(creds.username, "vet@petsi.dev");
        assert_eq!(creds.password, "s3cret");
    }

    #[tokio::test]
    async fn test_empty_value_is_missing() {
        let req = request(
            "application/x-www-form-urlencoded",
            "username=vet%40petsi.dev&password=".into(),
        );
        let err = extract(req).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_whitespace_value_is_kept() {
        let req = request(
            "application/x-www-form-urlencoded",
            "username=vet&password=%20".into(),
        );
        assert_eq!(extract(req).await.unwrap().password, " ");
    }

    #[tokio::test]
    async fn test_oversize_multipart_field_is_rejected() {
        let big = "x".repeat(MAX_TEXT_FIELD_BYTES + 1);
        let body = multipart_body(&[("username", &big), ("password", "s3cret")]);
        let req = request(&format!("multipart/form-data; boundary={BOUNDARY}"), body);
        let err = extract(req).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
