//! Text-line decoding for bench meters.

/// First numeric token of `line` (a run of digits and dots), as `f64`.
///
/// `"HI 301.5 ft.lb"` → `Some(301.5)`. Signs are not part of a token. A token
/// that does not parse (`"1.2.3"`, a lone `"."`) yields `None`.
pub fn parse_torque_value(line: &str) -> Option<f64> {
    let is_tok = |c: char| c.is_ascii_digit() || c == '.';
    let start = line.find(is_tok)?;
    let rest = &line[start..];
    let end = rest.find(|c: char| !is_tok(c)).unwrap_or(rest.len());
    rest[..end].parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("301.5", Some(301.5))]
    #[case("HI 301.5 ft.lb", Some(301.5))]
    #[case("  70.1\r", Some(70.1))]
    #[case("T=45 NM", Some(45.0))]
    #[case("-12.5", Some(12.5))]
    #[case(".5", Some(0.5))]
    #[case("ERR", None)]
    #[case("", None)]
    #[case("1.2.3", None)]
    #[case(". ok", None)]
    fn decodes_first_token(#[case] line: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_torque_value(line), expected);
    }
}
