/// Values that occupy a variable number of slots
///
/// On the JVM, `long` and `double` values take up two slots (both in the locals and when counting
/// against the maximum stack size), everything else takes one.
pub trait Width {
    fn width(&self) -> usize;
}

/// Total number of slots occupied by a sequence of values
pub fn total_width<'a, T: Width + 'a>(values: impl IntoIterator<Item = &'a T>) -> usize {
    values.into_iter().map(Width::width).sum()
}
