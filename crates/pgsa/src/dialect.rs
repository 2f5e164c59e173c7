//! PostgreSQL dialect configuration.
//!
//! A [`Dialect`] describes how statements are rendered: which server features
//! may be assumed and how literals are escaped. Rendering always targets named
//! placeholders (`:name`); the positional form (`$n`) is produced afterwards by
//! placeholder substitution.

/// How an explicit null in a parameter row is treated by default resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullPolicy {
    /// An explicitly supplied null is a value; only missing keys get defaults.
    #[default]
    ExplicitNull,
    /// A missing key and an explicit null both receive the column default.
    NullAsMissing,
}

/// Rendering configuration for PostgreSQL.
///
/// `Dialect::default()` is the configuration used by the connection layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    /// Append `RETURNING <pk>` to single-row inserts that leave an
    /// autoincrement primary key to the server.
    pub implicit_returning: bool,
    /// Enum columns use native `CREATE TYPE ... AS ENUM` types.
    pub supports_native_enum: bool,
    /// Autoincrement `SMALLINT` primary keys render as `SMALLSERIAL`.
    pub supports_smallserial: bool,
    /// Backslashes inside string literals are escape characters.
    pub backslash_escapes: bool,
    /// Affected-row counts are reliable for multi-row statements.
    pub supports_sane_multi_rowcount: bool,
    /// The `hstore` extension type is available.
    pub has_native_hstore: bool,
    /// Treatment of explicit nulls during default resolution.
    pub null_policy: NullPolicy,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::postgres()
    }
}

impl Dialect {
    /// The PostgreSQL dialect used by the connection layer.
    pub fn postgres() -> Self {
        Self {
            implicit_returning: true,
            supports_native_enum: true,
            supports_smallserial: true,
            backslash_escapes: false,
            supports_sane_multi_rowcount: true,
            has_native_hstore: true,
            null_policy: NullPolicy::ExplicitNull,
        }
    }

    pub fn implicit_returning(mut self, enabled: bool) -> Self {
        self.implicit_returning = enabled;
        self
    }

    pub fn native_enum(mut self, enabled: bool) -> Self {
        self.supports_native_enum = enabled;
        self
    }

    pub fn smallserial(mut self, enabled: bool) -> Self {
        self.supports_smallserial = enabled;
        self
    }

    pub fn backslash_escapes(mut self, enabled: bool) -> Self {
        self.backslash_escapes = enabled;
        self
    }

    pub fn sane_multi_rowcount(mut self, enabled: bool) -> Self {
        self.supports_sane_multi_rowcount = enabled;
        self
    }

    pub fn native_hstore(mut self, enabled: bool) -> Self {
        self.has_native_hstore = enabled;
        self
    }

    /// Set the null policy for default resolution.
    pub fn null_policy(mut self, policy: NullPolicy) -> Self {
        self.null_policy = policy;
        self
    }

    /// Quote a string literal.
    pub fn quote_literal(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len() + 2);
        out.push('\'');
        for c in s.chars() {
            match c {
                '\'' => out.push_str("''"),
                '\\' if self.backslash_escapes => out.push_str("\\\\"),
                c => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    /// Quote an identifier when it would not survive unquoted.
    ///
    /// Lowercase names made of `[a-z0-9_$]` that are not reserved words are
    /// emitted as-is.
    pub fn quote_identifier(&self, name: &str) -> String {
        if is_plain_identifier(name) {
            name.to_string()
        } else {
            format!("\"{}\"", name.replace('"', "\"\""))
        }
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_lowercase() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$') {
        return false;
    }
    !RESERVED_WORDS.contains(&name)
}

const RESERVED_WORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both",
    "case", "cast", "check", "collate", "column", "constraint", "create", "current_catalog",
    "current_date", "current_role", "current_time", "current_timestamp", "current_user",
    "default", "deferrable", "desc", "distinct", "do", "else", "end", "except", "false",
    "fetch", "for", "foreign", "from", "grant", "group", "having", "in", "initially",
    "intersect", "into", "lateral", "leading", "limit", "localtime", "localtimestamp", "not",
    "null", "offset", "on", "only", "or", "order", "placing", "primary", "references",
    "returning", "select", "session_user", "some", "symmetric", "table", "then", "to",
    "trailing", "true", "union", "unique", "user", "using", "variadic", "when", "where",
    "window", "with",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_postgres() {
        let d = Dialect::default();
        assert!(d.implicit_returning);
        assert!(d.supports_native_enum);
        assert!(d.supports_smallserial);
        assert!(!d.backslash_escapes);
        assert!(d.supports_sane_multi_rowcount);
        assert!(d.has_native_hstore);
        assert_eq!(d.null_policy, NullPolicy::ExplicitNull);
    }

    #[test]
    fn quotes_identifiers_only_when_needed() {
        let d = Dialect::postgres();
        assert_eq!(d.quote_identifier("users"), "users");
        assert_eq!(d.quote_identifier("t_string"), "t_string");
        assert_eq!(d.quote_identifier("user"), "\"user\"");
        assert_eq!(d.quote_identifier("CamelCase"), "\"CamelCase\"");
        assert_eq!(d.quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
