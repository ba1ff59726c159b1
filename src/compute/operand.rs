use sensorthings_types::ValueKind;

/// A compiled operand, tagged by the kind of value it produces.
///
/// `T` is the backend's term type (a SQL field, an in-memory value) and `C`
/// its condition type. Operator rules match on this enum exhaustively, so a
/// new kind cannot be added without deciding how every operator treats it.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand<T, C> {
    /// Known to be null. Carries no term.
    Null,
    /// Numbers, strings, booleans used as values.
    Scalar(T),
    Instant(T),
    Duration(T),
    Interval { start: T, end: T },
    Condition(C),
}

impl<T, C> Operand<T, C> {
    pub fn kind(&self) -> ValueKind {
        match self {
            Operand::Null => ValueKind::Null,
            Operand::Scalar(_) => ValueKind::Scalar,
            Operand::Instant(_) => ValueKind::Instant,
            Operand::Duration(_) => ValueKind::Duration,
            Operand::Interval { .. } => ValueKind::Interval,
            Operand::Condition(_) => ValueKind::Boolean,
        }
    }
}
