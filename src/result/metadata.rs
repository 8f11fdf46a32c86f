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

//! Column metadata of a query result, addressed with 1-based indexes.

use crate::error::{Error, Result};
use crate::types::results::{ColumnInfo, ResultSetMetadata};

/// Whether a column may hold NULLs, as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nullability {
    NotNull,
    Nullable,
    Unknown,
}

impl Nullability {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("NOT_NULL") => Nullability::NotNull,
            Some(v) if v.eq_ignore_ascii_case("NULLABLE") => Nullability::Nullable,
            _ => Nullability::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultMetadata {
    columns: Vec<ColumnInfo>,
}

impl ResultMetadata {
    pub fn new(metadata: ResultSetMetadata) -> Self {
        Self {
            columns: metadata.column_info,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Result<&ColumnInfo> {
        if index < 1 {
            return Err(Error::InvalidColumn(format!("Invalid column index {}", index)));
        }
        self.columns.get(index - 1).ok_or_else(|| {
            Error::InvalidColumn(format!(
                "Column index out of bounds ({} > {})",
                index,
                self.columns.len()
            ))
        })
    }

    pub fn column_label(&self, index: usize) -> Result<&str> {
        self.column(index).map(ColumnInfo::label)
    }

    pub fn column_name(&self, index: usize) -> Result<&str> {
        self.column(index).map(|c| c.name.as_str())
    }

    pub fn column_type_name(&self, index: usize) -> Result<&str> {
        self.column(index).map(|c| c.type_name.as_str())
    }

    pub fn precision(&self, index: usize) -> Result<i32> {
        self.column(index).map(|c| c.precision)
    }

    pub fn scale(&self, index: usize) -> Result<i32> {
        self.column(index).map(|c| c.scale)
    }

    pub fn nullability(&self, index: usize) -> Result<Nullability> {
        self.column(index)
            .map(|c| Nullability::parse(c.nullable.as_deref()))
    }

    pub fn is_case_sensitive(&self, index: usize) -> Result<bool> {
        self.column(index).map(|c| c.case_sensitive)
    }

    pub fn catalog_name(&self, index: usize) -> Result<Option<&str>> {
        self.column(index).map(|c| c.catalog_name.as_deref())
    }

    pub fn schema_name(&self, index: usize) -> Result<Option<&str>> {
        self.column(index).map(|c| c.schema_name.as_deref())
    }

    pub fn table_name(&self, index: usize) -> Result<Option<&str>> {
        self.column(index).map(|c| c.table_name.as_deref())
    }

    /// 1-based index of the first column with this label.
    pub fn find_column(&self, label: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.label() == label)
            .map(|i| i + 1)
    }
}
