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

//! Authorization header providers for the query service.

use crate::error::{Error, Result};

/// Supplies the `Authorization` header value for each request.
pub trait AuthProvider: Send + Sync + std::fmt::Debug {
    fn get_auth_header(&self) -> Result<String>;
}

/// Static bearer token.
#[derive(Clone)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl AuthProvider for BearerToken {
    fn get_auth_header(&self) -> Result<String> {
        if self.token.is_empty() {
            return Err(Error::Configuration("bearer token is empty".to_string()));
        }
        Ok(format!("Bearer {}", self.token))
    }
}
