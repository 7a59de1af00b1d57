use std::fmt;

/// Maximum number of distinct argument slots an operator node accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Unbounded,
}

impl Arity {
    pub fn of(operator_symbol: &str) -> Self {
        match operator_symbol {
            "!" | "!!" => Arity::Fixed(1),
            "if" | "?:" => Arity::Fixed(3),
            "and" | "or" | "+" => Arity::Unbounded,
            _ => Arity::Fixed(2),
        }
    }

    /// Whether an operator already holding `used` arguments can take one more.
    pub fn admits(self, used: usize) -> bool {
        match self {
            Arity::Fixed(max) => used < max,
            Arity::Unbounded => true,
        }
    }

    pub fn limit(self) -> Option<usize> {
        match self {
            Arity::Fixed(max) => Some(max),
            Arity::Unbounded => None,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Fixed(n) => write!(f, "{}", n),
            Arity::Unbounded => f.write_str("unbounded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_families() {
        assert_eq!(Arity::of("!"), Arity::Fixed(1));
        assert_eq!(Arity::of("!!"), Arity::Fixed(1));
        assert_eq!(Arity::of("if"), Arity::Fixed(3));
        assert_eq!(Arity::of("?:"), Arity::Fixed(3));
        assert_eq!(Arity::of("and"), Arity::Unbounded);
        assert_eq!(Arity::of("or"), Arity::Unbounded);
        assert_eq!(Arity::of("+"), Arity::Unbounded);
        assert_eq!(Arity::of("=="), Arity::Fixed(2));
        assert_eq!(Arity::of("-"), Arity::Fixed(2));
        assert_eq!(Arity::of(""), Arity::Fixed(2));
    }

    #[test]
    fn admits_up_to_limit() {
        assert!(Arity::Fixed(2).admits(1));
        assert!(!Arity::Fixed(2).admits(2));
        assert!(Arity::Unbounded.admits(1000));
    }
}
