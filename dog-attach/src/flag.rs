//! Coercion of free-form "remove this attachment" input into a boolean.
//!
//! Falsy: absent, `false`, `""`, `"0"`, `"false"`. Everything else is truthy.

/// Parse a form value. Matching is exact, so `"False"` is truthy.
pub fn parse_flag(value: &str) -> bool {
    !matches!(value, "" | "0" | "false")
}

/// Values accepted by [`Attacher::set_remove`](crate::Attacher::set_remove)
pub trait IntoRemoveFlag {
    fn into_remove_flag(self) -> bool;
}

impl IntoRemoveFlag for bool {
    fn into_remove_flag(self) -> bool {
        self
    }
}

impl IntoRemoveFlag for &str {
    fn into_remove_flag(self) -> bool {
        parse_flag(self)
    }
}

impl IntoRemoveFlag for String {
    fn into_remove_flag(self) -> bool {
        parse_flag(&self)
    }
}

impl IntoRemoveFlag for &String {
    fn into_remove_flag(self) -> bool {
        parse_flag(self)
    }
}

impl<T: IntoRemoveFlag> IntoRemoveFlag for Option<T> {
    fn into_remove_flag(self) -> bool {
        self.is_some_and(IntoRemoveFlag::into_remove_flag)
    }
}

/// JSON form bodies: null and the falsy strings are false, numbers by their text
impl IntoRemoveFlag for &serde_json::Value {
    fn into_remove_flag(self) -> bool {
        match self {
            serde_json::Value::Null => false,
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::String(s) => parse_flag(s),
            serde_json::Value::Number(n) => parse_flag(&n.to_string()),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
        }
    }
}

impl IntoRemoveFlag for serde_json::Value {
    fn into_remove_flag(self) -> bool {
        (&self).into_remove_flag()
    }
}
