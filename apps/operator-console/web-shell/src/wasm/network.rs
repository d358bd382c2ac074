use super::*;

    /// Fetch-backed transport shared by every mounted panel.
    pub(super) struct GlooTransport;

    #[async_trait(?Send)]
    impl ConsoleTransport for GlooTransport {
        async fn get_json(&self, endpoint: &str) -> Result<Value, TransportError> {
            let response = Request::get(endpoint)
                .header("accept", "application/json")
                .send()
                .await
                .map_err(map_network_error)?;
            decode_json_response(response).await
        }

        async fn post_json(
            &self,
            endpoint: &str,
            body: &Value,
            csrf_token: Option<&str>,
        ) -> Result<Value, TransportError> {
            let mut request_builder = Request::post(endpoint)
                .header("content-type", "application/json")
                .header("accept", "application/json");
            if let Some(token) = csrf_token {
                request_builder = request_builder.header(CSRF_HEADER, token);
            }
            let body = serde_json::to_string(body).map_err(|error| TransportError::Decode {
                message: format!("failed to serialize request body: {error}"),
            })?;
            let request = request_builder
                .body(body)
                .map_err(|error| TransportError::Network {
                    message: format!("failed to build request body: {error}"),
                })?;
            let response = request.send().await.map_err(map_network_error)?;
            decode_json_response(response).await
        }
    }

    pub(super) fn map_network_error(error: gloo_net::Error) -> TransportError {
        TransportError::Network {
            message: error.to_string(),
        }
    }

    /// Non-2xx statuses keep whatever JSON body the server sent so problem
    /// details and traces survive into the panel.
    pub(super) async fn decode_json_response(
        response: gloo_net::http::Response,
    ) -> Result<Value, TransportError> {
        let status = response.status();
        let raw = response.text().await.map_err(|error| TransportError::Network {
            message: error.to_string(),
        })?;

        if !(200..=299).contains(&status) {
            let body = serde_json::from_str::<Value>(&raw).ok();
            return Err(TransportError::Http { status, body });
        }

        if raw.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&raw).map_err(|error| TransportError::Decode {
            message: format!("failed to decode response: {error}"),
        })
    }
