use std::fmt;

/// Opaque label marking a position in a method body
///
/// Labels are placed with [`Node::Label`](super::Node::Label) and referred to by branch
/// instructions and exception handlers.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Label(usize);

impl Label {
    /// Get the next fresh label
    pub fn next(&self) -> Label {
        Label(self.0 + 1)
    }
}

/// Generates new labels
pub trait LabelGenerator {
    /// Generate a fresh label
    fn fresh_label(&mut self) -> Label;
}

/// Label generator counting up from `l0`
///
/// Cloning does not split the generator source - the cloned generator will produce the same
/// sequence of labels as the original.
#[derive(Clone, Default)]
pub struct Labels(usize);

impl Labels {
    pub fn new() -> Labels {
        Labels(0)
    }
}

impl LabelGenerator for Labels {
    fn fresh_label(&mut self) -> Label {
        let to_return = Label(self.0);
        self.0 += 1;
        to_return
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("l{}", self.0))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("l{}", self.0))
    }
}
