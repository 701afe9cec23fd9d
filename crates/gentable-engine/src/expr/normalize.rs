//! Surface-to-canonical rewriting.

use super::parser::parse;
use crate::error::ParseError;

/// Rewrite formula text into the canonical grammar.
///
/// `a > 5 ? STOP : CONTINUE` becomes `(True) if (a > 5) else (False)`.
/// Text already in canonical form parses to the same tree, so normalizing
/// twice is the same as normalizing once.
pub fn normalize(raw: &str) -> Result<String, ParseError> {
    Ok(parse(raw)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_condition_rewrite() {
        assert_eq!(
            normalize("a > 5 ? STOP : CONTINUE").unwrap(),
            "(True) if (a > 5) else (False)"
        );
    }

    #[test]
    fn test_surface_logic_operators() {
        assert_eq!(
            normalize("a > 1 && !b || c").unwrap(),
            "((a > 1) and (not b)) or c"
        );
    }

    #[test]
    fn test_nested_ternary_is_right_associative() {
        assert_eq!(
            normalize("a ? b : c ? d : e").unwrap(),
            "(b) if (a) else ((d) if (c) else (e))"
        );
    }

    #[test]
    fn test_idempotent() {
        for raw in [
            "x < 0 ? -x : x",
            "sqrt(a) * 2 + b ** 2",
            "not a and b or c",
            "'it\\'s' == s",
            "[1, 2.5, True][i]",
            "c - 1e-9 <= 0 ? 0 : c",
        ] {
            let once = normalize(raw).unwrap();
            let twice = normalize(&once).unwrap();
            assert_eq!(once, twice, "normalizing {:?}", raw);
        }
    }

    #[test]
    fn test_left_chains_print_flat() {
        assert_eq!(normalize("a - b + c").unwrap(), "a - b + c");
        assert_eq!(normalize("a - (b + c)").unwrap(), "a - (b + c)");
        assert_eq!(normalize("a * b + c * d").unwrap(), "(a * b) + (c * d)");
        assert_eq!(normalize("a || b || c").unwrap(), "a or b or c");

        let long = vec!["x"; 300].join(" + ");
        assert_eq!(normalize(&long).unwrap(), long);
    }

    #[test]
    fn test_syntax_error_is_reported() {
        assert!(normalize("a ? b").is_err());
        assert!(normalize("").is_err());
    }
}
