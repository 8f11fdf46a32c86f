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

//! Forward-only access to paginated query results.
//!
//! - `PageFetcher`: one deadline-bounded `GetQueryResults` call at a time
//! - `ResultCursor`: lazy pagination, header skip and position tracking
//! - `ResultSet`: position/bounds checks and typed accessors over a cursor

pub mod convert;
pub mod cursor;
pub mod metadata;
pub mod page_fetcher;
pub mod result_set;

pub use convert::FromCell;
pub use cursor::ResultCursor;
pub use metadata::{Nullability, ResultMetadata};
pub use page_fetcher::{PageFetcher, PageRequest};
pub use result_set::{FetchDirection, ResultSet};

/// Logical position of a cursor, derived from its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// No row has been requested yet.
    BeforeFirst,
    First,
    Middle,
    /// On the final row of the result.
    Last,
    /// Past the final row.
    AfterLast,
}
