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

//! Conversion of string cells into typed values.
//!
//! Every cell arrives as an optional string. Numeric types read NULL as
//! zero; booleans are permissive and only `NULL`, `"0"` and `"false"` (any
//! case) are false. Use `Option<T>` to observe NULLs.

use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};

pub trait FromCell: Sized {
    fn from_cell(value: Option<&str>) -> Result<Self>;
}

impl FromCell for bool {
    fn from_cell(value: Option<&str>) -> Result<Self> {
        Ok(match value {
            None => false,
            Some(v) => !(v == "0" || v.eq_ignore_ascii_case("false")),
        })
    }
}

macro_rules! numeric_from_cell {
    ($($ty:ty => $target:literal),* $(,)?) => {
        $(
            impl FromCell for $ty {
                fn from_cell(value: Option<&str>) -> Result<Self> {
                    match value {
                        None => Ok(0 as $ty),
                        Some(v) => v.parse().map_err(|_| Error::conversion(v, $target)),
                    }
                }
            }
        )*
    };
}

numeric_from_cell!(
    i8 => "byte",
    i16 => "short",
    i32 => "integer",
    i64 => "long",
    f32 => "float",
    f64 => "double",
);

impl FromCell for String {
    fn from_cell(value: Option<&str>) -> Result<Self> {
        value
            .map(str::to_string)
            .ok_or_else(|| Error::conversion("NULL", "string"))
    }
}

impl FromCell for NaiveDate {
    fn from_cell(value: Option<&str>) -> Result<Self> {
        let v = value.ok_or_else(|| Error::conversion("NULL", "date"))?;
        NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|_| Error::conversion(v, "date"))
    }
}

impl FromCell for NaiveDateTime {
    fn from_cell(value: Option<&str>) -> Result<Self> {
        let v = value.ok_or_else(|| Error::conversion("NULL", "timestamp"))?;
        NaiveDateTime::parse_from_str(v, "%Y-%m-%d %H:%M:%S%.f")
            .map_err(|_| Error::conversion(v, "timestamp"))
    }
}

impl<T: FromCell> FromCell for Option<T> {
    fn from_cell(value: Option<&str>) -> Result<Self> {
        value.map(|v| T::from_cell(Some(v))).transpose()
    }
}
