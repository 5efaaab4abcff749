//! Single byte-range resolution against a payload of known length.

use crate::{Error, Result};

/// A satisfiable byte span `start..=end` of a `total`-byte payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
    pub total: usize,
}

impl ByteRange {
    /// The whole payload.
    pub fn full(total: usize) -> Result<Self> {
        if total == 0 {
            return Err(Error::RangeNotSatisfiable { length: 0 });
        }
        Ok(Self {
            start: 0,
            end: total - 1,
            total,
        })
    }

    /// Resolves an optional `Range` header value.
    ///
    /// A missing header, a unit other than `bytes`, or a range with neither
    /// bound selects the whole payload. `bytes=N-` runs to the end and
    /// `bytes=-N` selects the last `N` bytes. Non-numeric bounds, multiple
    /// ranges, `start > end` and `end >= total` are all unsatisfiable.
    pub fn resolve(header: Option<&str>, total: usize) -> Result<Self> {
        let unsatisfiable = || Error::RangeNotSatisfiable { length: total };

        let Some(value) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
            return Self::full(total);
        };
        let value = value.trim();
        if value.is_empty() {
            return Self::full(total);
        }
        if value.contains(',') {
            return Err(unsatisfiable());
        }

        let (first, last) = value.split_once('-').ok_or_else(unsatisfiable)?;
        let parse = |s: &str| s.trim().parse::<usize>().map_err(|_| unsatisfiable());
        let (first, last) = (first.trim(), last.trim());

        let (start, end) = match (first.is_empty(), last.is_empty()) {
            (true, true) => return Self::full(total),
            (true, false) => {
                let suffix = parse(last)?;
                if suffix == 0 {
                    return Err(unsatisfiable());
                }
                (total.saturating_sub(suffix), total.saturating_sub(1))
            }
            (false, true) => (parse(first)?, total.saturating_sub(1)),
            (false, false) => (parse(first)?, parse(last)?),
        };

        if total == 0 || start > end || end >= total {
            return Err(unsatisfiable());
        }
        Ok(Self { start, end, total })
    }

    /// Number of bytes in the span.
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Whether the span is the entire payload.
    pub fn is_full(&self) -> bool {
        self.start == 0 && self.end + 1 == self.total
    }

    /// `Content-Range` value for a partial response.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}
