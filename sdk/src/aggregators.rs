//! Stream aggregators
//!
//! Stateless reducers that fold a sequence of partial values into one
//! materialized value. Each factory returns a closure of the shape
//! `(Option<Acc>, Item) -> Option<Acc>`; the accumulator starts as `None`.
//!
//! ```
//! use sdk::aggregators::{append_string, fold};
//!
//! let text = fold(["Hel", "lo"], append_string());
//! assert_eq!(text.as_deref(), Some("Hello"));
//! ```

/// Concatenate string chunks into one cumulative string.
pub fn append_string<S: AsRef<str>>() -> impl Fn(Option<String>, S) -> Option<String> {
    |current, next| {
        let mut acc = current.unwrap_or_default();
        acc.push_str(next.as_ref());
        Some(acc)
    }
}

/// Keep only the most recent value.
pub fn last<T>() -> impl Fn(Option<T>, T) -> Option<T> {
    |_, next| Some(next)
}

/// Collect every value into an ordered list.
pub fn collect<T>() -> impl Fn(Option<Vec<T>>, T) -> Option<Vec<T>> {
    |list, item| {
        let mut list = list.unwrap_or_default();
        list.push(item);
        Some(list)
    }
}

/// Apply a reducer over a whole sequence. Returns `None` for an empty sequence.
pub fn fold<I, A, F>(items: I, reducer: F) -> Option<A>
where
    I: IntoIterator,
    F: Fn(Option<A>, I::Item) -> Option<A>,
{
    items.into_iter().fold(None, reducer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_string() {
        let reduce = append_string();
        let acc = reduce(None, "PM: ");
        let acc = reduce(acc, "hello");
        assert_eq!(acc.as_deref(), Some("PM: hello"));
    }

    #[test]
    fn test_append_owned_strings() {
        let chunks = vec!["a".to_string(), "b".to_string()];
        assert_eq!(fold(chunks, append_string()).as_deref(), Some("ab"));
    }

    #[test]
    fn test_last_keeps_latest() {
        assert_eq!(fold(["thinking", "writing", "done"], last()), Some("done"));
    }

    #[test]
    fn test_collect_preserves_order() {
        assert_eq!(fold([3, 1, 2], collect()), Some(vec![3, 1, 2]));
    }

    #[test]
    fn test_empty_sequence() {
        let empty: Vec<&str> = Vec::new();
        assert_eq!(fold(empty, append_string()), None);
        assert_eq!(fold(Vec::<u8>::new(), collect()), None);
    }
}
