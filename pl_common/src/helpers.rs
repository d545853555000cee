/// Parse an optional numeric setting. Returns `Ok(None)` when unset and `Err` with the raw text when it does not parse.
pub fn parse_number<T: std::str::FromStr>(value: Option<String>) -> Result<Option<T>, String> {
    match value {
        None => Ok(None),
        Some(v) => v.trim().parse::<T>().map(Some).map_err(|_| v),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn numbers() {
        assert_eq!(parse_number::<i64>(Some(" 42".into())), Ok(Some(42)));
        assert_eq!(parse_number::<i64>(None), Ok(None));
        assert_eq!(parse_number::<u32>(Some("-1".into())), Err("-1".to_string()));
    }
}
