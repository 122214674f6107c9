use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid --set format: '{0}'. Expected KEY=VALUE (e.g., 'energy.max=-3.5').")]
    MissingEquals(String),

    #[error("Key cannot be empty in '{0}'.")]
    EmptyKey(String),

    #[error("Value cannot be empty for key '{0}'. Use 'null' to clear a bound.")]
    EmptyValue(String),
}

/// Splits a `--set` argument into its trimmed key and value.
pub fn parse_set_value(kv_pair: &str) -> Result<(&str, &str), ParseError> {
    let (key, value) = kv_pair
        .split_once('=')
        .ok_or_else(|| ParseError::MissingEquals(kv_pair.to_string()))?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() {
        return Err(ParseError::EmptyKey(kv_pair.to_string()));
    }
    if value.is_empty() {
        return Err(ParseError::EmptyValue(key.to_string()));
    }
    Ok((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_equals_sign() {
        assert_eq!(parse_set_value("energy.min=-5"), Ok(("energy.min", "-5")));
        assert_eq!(parse_set_value(" options.skip = 3 "), Ok(("options.skip", "3")));
        assert_eq!(parse_set_value("a.b=c=d"), Ok(("a.b", "c=d")));
    }

    #[test]
    fn rejects_malformed_pairs() {
        assert_eq!(
            parse_set_value("energy.min"),
            Err(ParseError::MissingEquals("energy.min".into()))
        );
        assert_eq!(
            parse_set_value("=1"),
            Err(ParseError::EmptyKey("=1".into()))
        );
        assert_eq!(
            parse_set_value("energy.max= "),
            Err(ParseError::EmptyValue("energy.max".into()))
        );
    }
}
