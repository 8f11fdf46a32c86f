// Copyright (c) 2025 ADBC Drivers Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! `GetQueryResults` over the service's JSON 1.1 protocol.

use crate::client::{HttpClient, QueryResultsClient};
use crate::error::{Error, Result};
use crate::types::results::{
    GetQueryResultsRequest, GetQueryResultsResponse, QueryResultsPage, ServiceErrorBody,
};
use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;
use tracing::debug;

const TARGET_HEADER: &str = "X-Amz-Target";
const GET_QUERY_RESULTS_TARGET: &str = "AmazonAthena.GetQueryResults";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Query results client posting to a single service endpoint.
#[derive(Debug)]
pub struct HttpQueryResultsClient {
    http_client: Arc<HttpClient>,
    endpoint: String,
}

impl HttpQueryResultsClient {
    pub fn new(http_client: Arc<HttpClient>, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn parse_response(body: &str) -> Result<QueryResultsPage> {
        let response: GetQueryResultsResponse = serde_json::from_str(body).map_err(|e| {
            Error::Service(format!(
                "Failed to parse GetQueryResults response: {} - body: {}",
                e, body
            ))
        })?;
        Ok(response.into())
    }

    /// Replace a raw HTTP error with the service's own error type and message.
    fn service_error(err: Error) -> Error {
        match err {
            Error::Http { status, body } => match serde_json::from_str::<ServiceErrorBody>(&body) {
                Ok(ServiceErrorBody {
                    error_type,
                    message: Some(message),
                }) => {
                    let kind = error_type
                        .as_deref()
                        .map(|t| t.rsplit('#').next().unwrap_or(t))
                        .unwrap_or("ServiceError");
                    Error::Service(format!("{} (HTTP {}): {}", kind, status, message))
                }
                _ => Error::Http { status, body },
            },
            other => other,
        }
    }
}

#[async_trait]
impl QueryResultsClient for HttpQueryResultsClient {
    async fn get_query_results(
        &self,
        request: &GetQueryResultsRequest,
    ) -> Result<QueryResultsPage> {
        debug!(
            "GetQueryResults for {} (token={:?}, max_results={})",
            request.query_execution_id, request.next_token, request.max_results
        );

        let http_request = self
            .http_client
            .inner()
            .request(Method::POST, &self.endpoint)
            .header(TARGET_HEADER, GET_QUERY_RESULTS_TARGET)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(
                serde_json::to_vec(request)
                    .map_err(|e| Error::Service(format!("Failed to encode request: {}", e)))?,
            )
            .build()
            .map_err(|e| Error::Service(format!("Failed to build request: {}", e)))?;

        let response = self
            .http_client
            .execute(http_request)
            .await
            .map_err(Self::service_error)?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::Service(format!("Failed to read response: {}", e)))?;

        let page = Self::parse_response(&body)?;
        debug!(
            "GetQueryResults for {} returned {} rows (more={})",
            request.query_execution_id,
            page.rows.len(),
            page.next_token.is_some()
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let body = r#"{"NextToken":"t2","ResultSet":{"Rows":[{"Data":[{"VarCharValue":"x"}]}],"ResultSetMetadata":{"ColumnInfo":[{"Name":"x","Type":"varchar"}]}}}"#;
        let page = HttpQueryResultsClient::parse_response(body).unwrap();
        assert_eq!(page.next_token.as_deref(), Some("t2"));
        assert_eq!(page.rows[0].value(0), Some("x"));
    }

    #[test]
    fn test_parse_response_garbage() {
        let err = HttpQueryResultsClient::parse_response("<html>").unwrap_err();
        assert!(matches!(err, Error::Service(_)));
    }

    #[test]
    fn test_service_error_uses_error_body() {
        let err = HttpQueryResultsClient::service_error(Error::Http {
            status: 400,
            body: r#"{"__type":"com.amazonaws.athena#InvalidRequestException","Message":"Query has not yet finished"}"#
                .to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Service error: InvalidRequestException (HTTP 400): Query has not yet finished"
        );
    }

    #[test]
    fn test_service_error_keeps_unparseable_body() {
        let err = HttpQueryResultsClient::service_error(Error::Http {
            status: 500,
            body: "oops".to_string(),
        });
        assert!(matches!(err, Error::Http { status: 500, .. }));
    }
}
