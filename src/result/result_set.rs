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

//! ResultSet: the caller-facing, forward-only view over a `ResultCursor`.
//!
//! Every accessor validates the closed state, the row position and the
//! column index before the cursor is consulted, so misuse never triggers a
//! page fetch.

use crate::error::{Error, Result};
use crate::result::convert::FromCell;
use crate::result::cursor::ResultCursor;
use crate::result::metadata::ResultMetadata;
use crate::result::Position;

const FORWARD_ONLY: &str = "Result set movements other than forward are not supported";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDirection {
    Forward,
    Reverse,
    Unknown,
}

#[derive(Debug)]
pub struct ResultSet {
    cursor: ResultCursor,
    was_null: bool,
}

impl ResultSet {
    pub fn new(cursor: ResultCursor) -> Self {
        Self {
            cursor,
            was_null: false,
        }
    }

    pub fn query_execution_id(&self) -> &str {
        self.cursor.query_execution_id()
    }

    // --- Movement ---

    pub fn next(&mut self) -> Result<bool> {
        self.check_closed()?;
        self.cursor.advance()
    }

    /// Skip `rows` rows forward. Equivalent to calling `next` `rows` times.
    pub fn relative(&mut self, rows: i64) -> Result<bool> {
        self.check_closed()?;
        if rows < 1 {
            return Err(Error::OutOfPosition(
                "Only forward relative movement is supported".to_string(),
            ));
        }
        let mut moved = false;
        for _ in 0..rows {
            moved = self.cursor.advance()?;
        }
        Ok(moved)
    }

    pub fn previous(&mut self) -> Result<bool> {
        self.unsupported_move()
    }

    pub fn absolute(&mut self, _row: i64) -> Result<bool> {
        self.unsupported_move()
    }

    pub fn first(&mut self) -> Result<bool> {
        self.unsupported_move()
    }

    pub fn last(&mut self) -> Result<bool> {
        self.unsupported_move()
    }

    pub fn before_first(&mut self) -> Result<()> {
        self.unsupported_move().map(|_| ())
    }

    pub fn after_last(&mut self) -> Result<()> {
        self.unsupported_move().map(|_| ())
    }

    // --- Position ---

    pub fn position(&self) -> Result<Position> {
        self.check_closed()?;
        self.cursor.position()
    }

    pub fn is_before_first(&self) -> Result<bool> {
        Ok(self.position()? == Position::BeforeFirst)
    }

    pub fn is_first(&self) -> Result<bool> {
        Ok(self.position()? == Position::First)
    }

    pub fn is_last(&self) -> Result<bool> {
        Ok(self.position()? == Position::Last)
    }

    pub fn is_after_last(&self) -> Result<bool> {
        Ok(self.position()? == Position::AfterLast)
    }

    /// Current row number, or 0 when not positioned on a row.
    pub fn row(&self) -> Result<u64> {
        match self.position()? {
            Position::BeforeFirst | Position::AfterLast => Ok(0),
            _ => self.cursor.row_number(),
        }
    }

    // --- Values ---

    /// Typed value of a column in the current row, 1-based.
    pub fn get<T: FromCell>(&mut self, column_index: usize) -> Result<T> {
        T::from_cell(self.cell(column_index)?)
    }

    pub fn get_by_label<T: FromCell>(&mut self, column_label: &str) -> Result<T> {
        let column_index = self.find_column(column_label)?;
        self.get(column_index)
    }

    pub fn get_string(&mut self, column_index: usize) -> Result<Option<String>> {
        self.get(column_index)
    }

    pub fn get_string_by_label(&mut self, column_label: &str) -> Result<Option<String>> {
        self.get_by_label(column_label)
    }

    /// Whether the last value read was NULL.
    pub fn was_null(&self) -> Result<bool> {
        self.check_closed()?;
        Ok(self.was_null)
    }

    pub fn find_column(&mut self, column_label: &str) -> Result<usize> {
        self.check_closed()?;
        self.cursor
            .metadata()?
            .find_column(column_label)
            .ok_or_else(|| {
                Error::InvalidColumn(format!(
                    "Result set does not contain any column with label \"{}\"",
                    column_label
                ))
            })
    }

    // --- Settings and lifecycle ---

    pub fn metadata(&mut self) -> Result<&ResultMetadata> {
        self.check_closed()?;
        self.cursor.metadata()
    }

    pub fn fetch_size(&self) -> Result<u32> {
        self.check_closed()?;
        Ok(self.cursor.fetch_size())
    }

    pub fn set_fetch_size(&mut self, fetch_size: u32) -> Result<()> {
        self.check_closed()?;
        self.cursor.set_fetch_size(fetch_size)
    }

    pub fn fetch_direction(&self) -> Result<FetchDirection> {
        self.check_closed()?;
        Ok(FetchDirection::Forward)
    }

    pub fn set_fetch_direction(&mut self, direction: FetchDirection) -> Result<()> {
        self.check_closed()?;
        match direction {
            FetchDirection::Forward => Ok(()),
            _ => Err(Error::NotSupported(FORWARD_ONLY.to_string())),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cursor.is_closed()
    }

    pub fn close(&mut self) {
        self.cursor.close();
    }

    fn check_closed(&self) -> Result<()> {
        if self.cursor.is_closed() {
            Err(Error::Closed("Result set"))
        } else {
            Ok(())
        }
    }

    fn unsupported_move(&self) -> Result<bool> {
        self.check_closed()?;
        Err(Error::NotSupported(FORWARD_ONLY.to_string()))
    }

    fn check_vertical_position(&self) -> Result<()> {
        if self.cursor.position()? == Position::BeforeFirst {
            return Err(Error::OutOfPosition(
                "Cannot read from a result set positioned before the first row".to_string(),
            ));
        }
        if !self.cursor.has_current_row() {
            return Err(Error::OutOfPosition(
                "Cannot read from a result set positioned after the last row".to_string(),
            ));
        }
        Ok(())
    }

    fn check_horizontal_position(&mut self, column_index: usize) -> Result<()> {
        if column_index < 1 {
            return Err(Error::InvalidColumn(format!(
                "Invalid column index {}",
                column_index
            )));
        }
        let column_count = self.cursor.metadata()?.column_count();
        if column_index > column_count {
            return Err(Error::InvalidColumn(format!(
                "Column index out of bounds ({} > {})",
                column_index, column_count
            )));
        }
        Ok(())
    }

    fn cell(&mut self, column_index: usize) -> Result<Option<&str>> {
        self.check_closed()?;
        self.check_vertical_position()?;
        self.check_horizontal_position(column_index)?;
        let value = self.cursor.get_cell(column_index)?;
        self.was_null = value.is_none();
        Ok(value)
    }
}
