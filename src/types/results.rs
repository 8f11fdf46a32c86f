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

//! `GetQueryResults` request/response types.
//!
//! These map directly to the JSON structures of the query service's paging
//! API. They are primarily used by `HttpQueryResultsClient` and consumed by
//! the result cursor.

use serde::{Deserialize, Serialize};

/// Hard upper bound on rows per page accepted by the query service.
pub const MAX_FETCH_SIZE: u32 = 1000;

/// Request for one page of query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetQueryResultsRequest {
    pub query_execution_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    pub max_results: u32,
}

/// Response for one page of query results.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetQueryResultsResponse {
    #[serde(default)]
    pub next_token: Option<String>,
    pub result_set: ResultSet,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultSet {
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub result_set_metadata: ResultSetMetadata,
}

/// Column descriptors for a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultSetMetadata {
    #[serde(default)]
    pub column_info: Vec<ColumnInfo>,
}

/// Information about a single column in the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnInfo {
    #[serde(default)]
    pub catalog_name: Option<String>,
    #[serde(default)]
    pub schema_name: Option<String>,
    #[serde(default)]
    pub table_name: Option<String>,
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "Type")]
    pub type_name: String,
    #[serde(default)]
    pub precision: i32,
    #[serde(default)]
    pub scale: i32,
    #[serde(default)]
    pub nullable: Option<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: Some(name.clone()),
            name,
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    /// The column label, falling back to the name.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// One row: an ordered sequence of nullable string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Row {
    #[serde(default)]
    pub data: Vec<Datum>,
}

impl Row {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            data: values
                .into_iter()
                .map(|v| Datum {
                    var_char_value: v.map(Into::into),
                })
                .collect(),
        }
    }

    /// Value of the cell at a 0-based position, `None` when NULL or missing.
    pub fn value(&self, index: usize) -> Option<&str> {
        self.data
            .get(index)
            .and_then(|d| d.var_char_value.as_deref())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Datum {
    #[serde(default)]
    pub var_char_value: Option<String>,
}

/// One page of results as seen by the cursor.
#[derive(Debug, Clone, Default)]
pub struct QueryResultsPage {
    /// Continuation token; `None` means this is the last page.
    pub next_token: Option<String>,
    pub rows: Vec<Row>,
    pub metadata: ResultSetMetadata,
}

impl From<GetQueryResultsResponse> for QueryResultsPage {
    fn from(response: GetQueryResultsResponse) -> Self {
        Self {
            next_token: response.next_token,
            rows: response.result_set.rows,
            metadata: response.result_set.result_set_metadata,
        }
    }
}

/// Error body returned by the query service.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceErrorBody {
    #[serde(default, rename = "__type")]
    pub error_type: Option<String>,
    #[serde(default, alias = "Message")]
    pub message: Option<String>,
}
