//! SQL fragment builder with flat chunk storage.

use std::borrow::Cow;
use std::fmt::Write;

use quickdata_core::Value;
use smallvec::SmallVec;

/// One piece of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SQLChunk<'a> {
    /// Keywords, operators and punctuation, written as-is
    Raw(Cow<'a, str>),
    /// Double-quoted identifier
    Ident(Cow<'a, str>),
    /// Bound value, written as `?`
    Param(Cow<'a, Value>),
}

impl SQLChunk<'_> {
    fn write(&self, buf: &mut String) {
        match self {
            Self::Raw(text) => buf.push_str(text),
            Self::Ident(name) => {
                buf.push('"');
                buf.push_str(&name.replace('"', "\"\""));
                buf.push('"');
            }
            Self::Param(_) => buf.push('?'),
        }
    }

    fn is_raw(&self, text: &str) -> bool {
        matches!(self, Self::Raw(raw) if raw == text)
    }

    fn opens_group(&self) -> bool {
        matches!(self, Self::Raw(raw) if raw.ends_with('('))
    }
}

/// Uses `SmallVec<[SQLChunk; 8]>` so short fragments (a single predicate, a
/// column list) stay inline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SQL<'a> {
    pub chunks: SmallVec<[SQLChunk<'a>; 8]>,
}

impl<'a> SQL<'a> {
    #[inline]
    pub const fn empty() -> Self {
        Self {
            chunks: SmallVec::new_const(),
        }
    }

    #[inline]
    pub fn raw(text: impl Into<Cow<'a, str>>) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::Raw(text.into())],
        }
    }

    #[inline]
    pub fn ident(name: impl Into<Cow<'a, str>>) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::Ident(name.into())],
        }
    }

    #[inline]
    pub fn param(value: impl Into<Value>) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::Param(Cow::Owned(value.into()))],
        }
    }

    #[inline]
    pub fn param_borrowed(value: &'a Value) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::Param(Cow::Borrowed(value))],
        }
    }

    /// `name(args)`
    pub fn func(name: &str, args: SQL<'a>) -> Self {
        SQL::raw(format!("{name}(")).append(args).push_raw(")")
    }

    /// Append another fragment (flat extend)
    #[inline]
    pub fn append(mut self, other: SQL<'a>) -> Self {
        self.append_mut(other);
        self
    }

    #[inline]
    pub fn append_mut(&mut self, other: SQL<'a>) {
        if self.chunks.is_empty() {
            self.chunks = other.chunks;
        } else {
            self.chunks.extend(other.chunks);
        }
    }

    #[inline]
    pub fn push_raw(mut self, text: impl Into<Cow<'a, str>>) -> Self {
        self.chunks.push(SQLChunk::Raw(text.into()));
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Joins fragments with a separator such as `","` or `"AND"`.
    pub fn join<I>(sqls: I, separator: &'static str) -> SQL<'a>
    where
        I: IntoIterator<Item = SQL<'a>>,
    {
        let mut iter = sqls.into_iter();
        let Some(mut result) = iter.next() else {
            return SQL::empty();
        };
        for item in iter {
            result.chunks.push(SQLChunk::Raw(Cow::Borrowed(separator)));
            result.chunks.extend(item.chunks);
        }
        result
    }

    /// Wrap in parentheses: (self)
    #[inline]
    pub fn parens(self) -> Self {
        SQL::raw("(").append(self).push_raw(")")
    }

    /// `(?, ?, ...)` with one placeholder per value.
    pub fn param_list<I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        SQL::join(values.into_iter().map(SQL::param_borrowed), ",").parens()
    }

    /// `"a", "b", ...`
    pub fn ident_list<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Cow<'a, str>>,
    {
        SQL::join(names.into_iter().map(SQL::ident), ",")
    }

    /// `"a" = ?, "b" = ?`
    pub fn assignments<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, &'a Value)>,
        S: Into<Cow<'a, str>>,
    {
        SQL::join(
            pairs.into_iter().map(|(column, value)| {
                SQL::ident(column)
                    .push_raw("=")
                    .append(SQL::param_borrowed(value))
            }),
            ",",
        )
    }

    fn needs_space(&self, index: usize) -> bool {
        let Some(next) = self.chunks.get(index + 1) else {
            return false;
        };
        let current = &self.chunks[index];
        !(current.opens_group() || next.is_raw(")") || next.is_raw(","))
    }

    /// SQL text only.
    pub fn sql(&self) -> String {
        self.build().0
    }

    /// Renders the statement and collects parameter references in order.
    pub fn build(&self) -> (String, SmallVec<[&Value; 8]>) {
        let mut buf = String::with_capacity(self.chunks.len().saturating_mul(8).max(64));
        let mut params: SmallVec<[&Value; 8]> = SmallVec::new();
        for (i, chunk) in self.chunks.iter().enumerate() {
            chunk.write(&mut buf);
            if let SQLChunk::Param(value) = chunk {
                params.push(value.as_ref());
            }
            if self.needs_space(i) {
                let _ = buf.write_char(' ');
            }
        }
        (buf, params)
    }
}
