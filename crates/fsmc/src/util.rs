use std::fmt;

pub fn display_fn<F>(f: F) -> impl fmt::Display
where
    F: Fn(&mut fmt::Formatter<'_>) -> fmt::Result,
{
    struct DisplayFn<F> {
        f: F,
    }
    impl<F> fmt::Display for DisplayFn<F>
    where
        F: Fn(&mut fmt::Formatter<'_>) -> fmt::Result,
    {
        fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            (self.f)(formatter)
        }
    }
    DisplayFn { f }
}

/// Render `items` separated by `sep`.
pub fn join<'a, I, T>(items: I, sep: &'a str) -> impl fmt::Display + 'a
where
    I: IntoIterator<Item = T> + Clone + 'a,
    T: fmt::Display,
{
    display_fn(move |f| {
        for (i, item) in items.clone().into_iter().enumerate() {
            if i > 0 {
                f.write_str(sep)?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    })
}

/// Quote `s` as a C string literal body.
pub fn escape_c_str(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_separates_items() {
        assert_eq!(join(["a", "b", "c"], ", ").to_string(), "a, b, c");
        assert_eq!(join(Vec::<&str>::new(), ", ").to_string(), "");
    }

    #[test]
    fn escape_c_str_escapes_quotes_and_backslashes() {
        assert_eq!(escape_c_str(r#"C:\fsm\"a".fsm"#), r#"C:\\fsm\\\"a\".fsm"#);
    }
}
