use std::fmt::{Display, Formatter, Result as FmtResult};

/// Renders one item per line with a right-aligned index.
pub struct IndexedDisplayer<'a, T> {
    items: &'a [T],
}

impl<'a, T> IndexedDisplayer<'a, T> {
    pub fn new(items: &'a [T]) -> Self {
        Self { items }
    }
}

impl<T: Display> Display for IndexedDisplayer<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (i, item) in self.items.iter().enumerate() {
            writeln!(f, "{:4}: {}", i + 1, item)?;
        }
        Ok(())
    }
}

/// Renders items separated by commas and surrounded by brackets.
pub struct ListDisplayer<'a, T> {
    items: &'a [T],
}

impl<'a, T> ListDisplayer<'a, T> {
    pub fn new(items: &'a [T]) -> Self {
        Self { items }
    }
}

impl<T: Display> Display for ListDisplayer<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "[")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{item}")?;
        }
        write!(f, "]")
    }
}
