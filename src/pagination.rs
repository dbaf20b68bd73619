use serde::Deserialize;
use std::num::IntErrorKind;

use crate::error::AppError;

/// Posts per feed page.
pub const PAGE_SIZE: i64 = 10;

/// PageQuery
///
/// `?page=` query parameter shared by every feed endpoint. Kept as a raw string so a
/// malformed value can be recovered from instead of rejecting the request.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct PageQuery {
    /// 1-based page number, or `last`.
    pub page: Option<String>,
}

/// A page request after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNumber {
    Number(i64),
    Last,
}

/// parse_page
///
/// Absent or empty input means the first page. A positive integer too large for `i64`
/// is still a page past the end and resolves to the last page. Anything else that is
/// neither `last` nor a positive integer is a `Validation` error.
pub fn parse_page(raw: Option<&str>) -> Result<PageNumber, AppError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(PageNumber::Number(1)),
        Some(raw) => raw,
    };
    if raw == "last" {
        return Ok(PageNumber::Last);
    }
    match raw.parse::<i64>() {
        Ok(n) if n >= 1 => Ok(PageNumber::Number(n)),
        Ok(n) => Err(AppError::Validation(format!("page {n} is less than 1"))),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Ok(PageNumber::Number(i64::MAX)),
        Err(_) => Err(AppError::Validation(format!("page '{raw}' is not an integer"))),
    }
}

/// PageWindow
///
/// The slice of a result set a feed serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: i64,
    pub num_pages: i64,
    pub offset: i64,
    pub limit: i64,
    pub clamped: bool,
}

impl PageWindow {
    /// Resolves `requested` against `total` items, clamping to `1..=num_pages`.
    /// An empty result set still has one (empty) page.
    pub fn resolve(requested: PageNumber, total: i64, per_page: i64) -> Self {
        let num_pages = ((total.max(0) + per_page - 1) / per_page).max(1);
        let (number, clamped) = match requested {
            PageNumber::Last => (num_pages, false),
            PageNumber::Number(n) if n > num_pages => (num_pages, true),
            PageNumber::Number(n) if n < 1 => (1, true),
            PageNumber::Number(n) => (n, false),
        };
        Self {
            number,
            num_pages,
            offset: (number - 1) * per_page,
            limit: per_page,
            clamped,
        }
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}
