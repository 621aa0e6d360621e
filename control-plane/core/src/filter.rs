//! Syntax checking for Consul's boolean filter expressions.
//!
//! The grammar accepted here is the one Consul uses for subset filters and
//! catalog queries:
//!
//! ```text
//! or        = and ("or" and)*
//! and       = not ("and" not)*
//! not       = "not" not | "(" or ")" | match
//! match     = selector ("==" | "!=" | ["not"] "contains" | ["not"] "matches") value
//!           | selector "is" ["not"] "empty"
//!           | value ["not"] "in" selector
//! selector  = ident ("." ident | "." digits | "[" string "]")*
//! value     = selector | number | string
//! ```
//!
//! Only syntax is checked. Whether a selector names a real field depends on
//! the data the filter is later applied to.

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid filter expression at offset {offset}: expected {expected}")]
pub struct FilterError {
    pub offset: usize,
    pub expected: &'static str,
}

/// Checks that `expr` is a well-formed filter expression.
pub fn validate(expr: &str) -> Result<(), FilterError> {
    let mut p = Parser {
        input: expr.as_bytes(),
        pos: 0,
        furthest: (0, "expression"),
    };

    p.skip_ws();
    if p.or_expr() {
        p.skip_ws();
        if p.at_end() {
            return Ok(());
        }
        p.fail("end of input");
    }

    let (offset, expected) = p.furthest;
    Err(FilterError { offset, expected })
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    furthest: (usize, &'static str),
}

impl Parser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn fail(&mut self, expected: &'static str) {
        if self.pos >= self.furthest.0 {
            self.furthest = (self.pos, expected);
        }
    }

    /// Consumes whitespace, returning whether any was present.
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn literal(&mut self, lit: &str) -> bool {
        if self.input[self.pos..].starts_with(lit.as_bytes()) {
            self.pos += lit.len();
            true
        } else {
            self.fail("keyword or operator");
            false
        }
    }

    /// Matches `ws keyword ws` with mandatory whitespace on both sides.
    fn keyword(&mut self, words: &[&str]) -> bool {
        let start = self.pos;
        for word in words {
            if !(self.skip_ws() && self.literal(word)) {
                self.pos = start;
                return false;
            }
        }
        true
    }

    fn or_expr(&mut self) -> bool {
        if !self.and_expr() {
            return false;
        }
        loop {
            let start = self.pos;
            if self.keyword(&["or"]) && self.skip_ws() && self.and_expr() {
                continue;
            }
            self.pos = start;
            return true;
        }
    }

    fn and_expr(&mut self) -> bool {
        if !self.not_expr() {
            return false;
        }
        loop {
            let start = self.pos;
            if self.keyword(&["and"]) && self.skip_ws() && self.not_expr() {
                continue;
            }
            self.pos = start;
            return true;
        }
    }

    fn not_expr(&mut self) -> bool {
        let start = self.pos;
        if self.literal("not") && self.skip_ws() && self.not_expr() {
            return true;
        }
        self.pos = start;

        if self.literal("(") {
            self.skip_ws();
            if self.or_expr() {
                self.skip_ws();
                if self.literal(")") {
                    return true;
                }
                self.fail("closing parenthesis");
            }
            self.pos = start;
            return false;
        }

        self.match_expr()
    }

    fn match_expr(&mut self) -> bool {
        let start = self.pos;

        // selector <op> value
        if self.selector() {
            let after_selector = self.pos;
            if self.binary_op() && self.value() {
                return true;
            }
            self.pos = after_selector;

            // selector is [not] empty
            if self.keyword(&["is", "not", "empty"]) || self.keyword(&["is", "empty"]) {
                return true;
            }
        }
        self.pos = start;

        // value [not] in selector
        if self.value()
            && (self.keyword(&["not", "in"]) || self.keyword(&["in"]))
            && self.skip_ws()
            && self.selector()
        {
            return true;
        }
        self.pos = start;
        self.fail("match expression");
        false
    }

    fn binary_op(&mut self) -> bool {
        let start = self.pos;
        for op in ["==", "!="] {
            self.skip_ws();
            if self.literal(op) {
                self.skip_ws();
                return true;
            }
            self.pos = start;
        }

        for words in [
            &["contains"][..],
            &["not", "contains"],
            &["matches"],
            &["not", "matches"],
        ] {
            if self.keyword(words) && self.skip_ws() {
                return true;
            }
            self.pos = start;
        }
        false
    }

    fn identifier(&mut self) -> bool {
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() => self.pos += 1,
            _ => {
                self.fail("identifier");
                return false;
            }
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_' || c == b'/')
        {
            self.pos += 1;
        }
        true
    }

    fn selector(&mut self) -> bool {
        if !self.identifier() {
            return false;
        }
        loop {
            let start = self.pos;
            if self.literal(".") {
                if self.identifier() {
                    continue;
                }
                if self.digits() {
                    continue;
                }
            } else if self.literal("[") {
                self.skip_ws();
                if self.string() {
                    self.skip_ws();
                    if self.literal("]") {
                        continue;
                    }
                }
                self.fail("index expression");
            }
            self.pos = start;
            return true;
        }
    }

    fn digits(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn value(&mut self) -> bool {
        self.selector() || self.number() || self.string()
    }

    fn number(&mut self) -> bool {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        match self.peek() {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => {
                self.digits();
            }
            _ => {
                self.pos = start;
                self.fail("number");
                return false;
            }
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            if !self.digits() {
                self.pos = start;
                self.fail("number");
                return false;
            }
        }
        // Numbers must be followed by whitespace, a closing paren or the end.
        if matches!(
            self.peek(),
            None | Some(b' ' | b'\t' | b'\r' | b'\n' | b')')
        ) {
            return true;
        }
        self.pos = start;
        self.fail("number");
        false
    }

    fn string(&mut self) -> bool {
        let start = self.pos;
        match self.peek() {
            Some(b'`') => {
                self.pos += 1;
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    if c == b'`' {
                        return true;
                    }
                }
            }
            Some(b'"') => {
                self.pos += 1;
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    match c {
                        b'"' => return true,
                        b'\\' => {
                            if self.peek().is_none() {
                                break;
                            }
                            self.pos += 1;
                        }
                        b'\n' => break,
                        _ => {}
                    }
                }
            }
            _ => {
                self.fail("string");
                return false;
            }
        }
        self.pos = start;
        self.fail("terminated string");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Service.Meta.version == v1")]
    #[case("Service.Meta.version == \"v1\"")]
    #[case("Service.Meta.version != `v1`")]
    #[case("Service.Tags contains primary")]
    #[case("Service.Tags not contains primary")]
    #[case("Service.Meta is empty")]
    #[case("Service.Meta is not empty")]
    #[case("primary in Service.Tags")]
    #[case("primary not in Service.Tags")]
    #[case("Service.Meta[\"version\"] == v1")]
    #[case("Node.Meta.rack matches \"^r[0-9]+$\"")]
    #[case("Checks.0.Status == passing")]
    #[case("Service.Port == 8080 and Service.Weights.Passing == -1.5")]
    #[case("not Service.Meta is empty")]
    #[case("(Service.Meta.version == v1 or Service.Meta.version == v2) and not Service.Tags contains canary")]
    #[case("  Service.ID == web  ")]
    fn accepts_valid_expressions(#[case] expr: &str) {
        assert_eq!(validate(expr), Ok(()), "{expr}");
    }

    #[rstest]
    #[case("")]
    #[case("random string")]
    #[case("Service.Meta.version ==")]
    #[case("Service.Meta.version == \"v1")]
    #[case("(Service.Meta.version == v1")]
    #[case("Service.Meta.version == v1 and")]
    #[case("Service.Meta.version == v1 v2")]
    #[case("== v1")]
    #[case("Service.Meta[version] == v1")]
    #[case("Service.Port == 12ab")]
    fn rejects_invalid_expressions(#[case] expr: &str) {
        assert!(validate(expr).is_err(), "{expr}");
    }
}
