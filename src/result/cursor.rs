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

//! ResultCursor: forward-only iteration over paginated query results.
//!
//! Pages are fetched lazily, one per `advance` at most, when the current
//! page is used up and the service returned a continuation token. The first
//! page starts with a header row of column names, which is dropped.
//!
//! A failed page fetch leaves the cursor exactly as it was, so the caller
//! may retry the same `advance`.

use crate::error::{Error, Result};
use crate::result::metadata::ResultMetadata;
use crate::result::page_fetcher::PageFetcher;
use crate::result::Position;
use crate::types::config::{validate_fetch_size, CursorConfig};
use crate::types::results::Row;
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
pub struct ResultCursor {
    fetcher: PageFetcher,
    config: CursorConfig,
    interrupt: Option<CancellationToken>,

    // Iteration state
    row_number: u64,
    current_rows: Option<VecDeque<Row>>,
    current_row: Option<Row>,
    next_token: Option<String>,
    metadata: Option<ResultMetadata>,
    closed: bool,
}

impl ResultCursor {
    pub fn new(fetcher: PageFetcher, config: CursorConfig) -> Self {
        Self {
            fetcher,
            config,
            interrupt: None,
            row_number: 0,
            current_rows: None,
            current_row: None,
            next_token: None,
            metadata: None,
            closed: false,
        }
    }

    /// Make page waits fail with [`Error::Interrupted`] once `token` is
    /// cancelled.
    pub fn with_interrupt(mut self, token: CancellationToken) -> Self {
        self.interrupt = Some(token);
        self
    }

    pub fn query_execution_id(&self) -> &str {
        self.fetcher.query_execution_id()
    }

    /// Move to the next row, loading the next page if needed.
    ///
    /// The row number grows on every successful call, including the one
    /// that reports exhaustion.
    pub fn advance(&mut self) -> Result<bool> {
        self.check_open()?;
        self.ensure_page()?;
        self.row_number += 1;
        self.current_row = self.current_rows.as_mut().and_then(VecDeque::pop_front);
        Ok(self.current_row.is_some())
    }

    /// Value of a cell in the current row, 1-based. `None` for NULL.
    pub fn get_cell(&self, column_index: usize) -> Result<Option<&str>> {
        self.check_open()?;
        let row = self
            .current_row
            .as_ref()
            .ok_or_else(|| Error::OutOfPosition("No current row".to_string()))?;
        if column_index < 1 || column_index > row.len() {
            return Err(Error::InvalidColumn(format!(
                "Column index {} not in current row of {} cells",
                column_index,
                row.len()
            )));
        }
        Ok(row.value(column_index - 1))
    }

    /// Column metadata, loading the first page if nothing was loaded yet.
    pub fn metadata(&mut self) -> Result<&ResultMetadata> {
        self.check_open()?;
        if self.metadata.is_none() {
            self.ensure_page()?;
        }
        self.metadata
            .as_ref()
            .ok_or_else(|| Error::Service("Result metadata unavailable".to_string()))
    }

    pub fn row_number(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.row_number)
    }

    pub fn position(&self) -> Result<Position> {
        self.check_open()?;
        if self.row_number == 0 {
            return Ok(Position::BeforeFirst);
        }
        let exhausted =
            self.next_token.is_none() && self.current_rows.as_ref().is_some_and(VecDeque::is_empty);
        Ok(if exhausted && self.current_row.is_none() {
            Position::AfterLast
        } else if self.row_number == 1 {
            Position::First
        } else if exhausted {
            Position::Last
        } else {
            Position::Middle
        })
    }

    pub fn fetch_size(&self) -> u32 {
        self.config.fetch_size
    }

    /// Applies to the next page request.
    pub fn set_fetch_size(&mut self, fetch_size: u32) -> Result<()> {
        self.check_open()?;
        self.config.fetch_size = validate_fetch_size(i64::from(fetch_size))?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the loaded page. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        debug!("Closing cursor for query {}", self.query_execution_id());
        self.closed = true;
        self.current_rows = None;
        self.current_row = None;
        self.next_token = None;
    }

    pub(crate) fn has_current_row(&self) -> bool {
        self.current_row.is_some()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed("Result cursor"))
        } else {
            Ok(())
        }
    }

    fn should_load_next_page(&self) -> bool {
        match self.current_rows {
            None => self.row_number == 0,
            Some(ref rows) => self.next_token.is_some() && rows.is_empty(),
        }
    }

    fn ensure_page(&mut self) -> Result<()> {
        if !self.should_load_next_page() {
            return Ok(());
        }

        let page = self.fetcher.fetch_page(
            self.next_token.as_deref(),
            self.config.fetch_size,
            self.config.api_call_timeout,
            self.interrupt.as_ref(),
        )?;

        let mut rows = VecDeque::from(page.rows);
        if self.row_number == 0 {
            rows.pop_front();
        }
        debug!(
            "Loaded page of query {} with {} rows (more={})",
            self.fetcher.query_execution_id(),
            rows.len(),
            page.next_token.is_some()
        );

        if self.metadata.is_none() {
            self.metadata = Some(ResultMetadata::new(page.metadata));
        }
        self.next_token = page.next_token;
        self.current_rows = Some(rows);
        Ok(())
    }
}
