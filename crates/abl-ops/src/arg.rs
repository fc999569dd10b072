use serde_json::Value;

use crate::operator::RandomOperator;

/// An operator argument: a constant, a list of arguments, or a nested
/// operator evaluated through the owning [`crate::Assignment`].
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// A fully resolved JSON value.
    Literal(Value),
    /// An array whose elements are resolved one by one.
    List(Vec<Arg>),
    /// A nested random operator.
    Op(Box<RandomOperator>),
}

impl Arg {
    /// Wraps anything convertible into a JSON value.
    pub fn literal(value: impl Into<Value>) -> Self {
        Arg::Literal(value.into())
    }

    /// Returns the literal value if the argument needs no evaluation.
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Arg::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Returns `true` when resolving this argument runs an operator.
    pub fn is_operator(&self) -> bool {
        match self {
            Arg::Literal(_) => false,
            Arg::List(items) => items.iter().any(Arg::is_operator),
            Arg::Op(_) => true,
        }
    }
}

impl From<RandomOperator> for Arg {
    fn from(op: RandomOperator) -> Self {
        Arg::Op(Box::new(op))
    }
}

impl From<Vec<Arg>> for Arg {
    fn from(items: Vec<Arg>) -> Self {
        Arg::List(items)
    }
}

macro_rules! literal_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::Literal(Value::from(value))
                }
            }
        )*
    };
}

literal_from!(Value, &str, String, bool, i32, i64, u32, u64, usize, f64);
