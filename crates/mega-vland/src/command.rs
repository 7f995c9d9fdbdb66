//! Alias registration command sent to peers.
//!
//! The wire form is a single line of CLI text:
//!
//! ```text
//! namespace "<ns>" vlans add "<alias>" <vlan>
//! ```
//!
//! Namespace and alias are double-quoted with `"` and `\` escaped, so any
//! text survives the trip. A bare single-word namespace is accepted too.

use mega_types::VlanId;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fmt;
use thiserror::Error;

/// Characters escaped inside quoted fields.
static QUOTE_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(["\\])"#).expect("Invalid regex pattern"));

/// Escape sequences inside quoted fields.
static QUOTE_UNESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(.)").expect("Invalid regex pattern"));

/// Full command line.
static REGISTRATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^namespace (?:"((?:[^"\\]|\\.)*)"|([^\s"]+)) vlans add "((?:[^"\\]|\\.)*)" (\d+)$"#,
    )
    .expect("Invalid regex pattern")
});

/// Registration command errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("not a registration command: {0:?}")]
    Unrecognized(String),

    #[error("invalid VLAN in registration command: {0}")]
    InvalidVlan(String),
}

/// Registration of one alias binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationCommand {
    pub namespace: String,
    pub alias: String,
    pub vlan: VlanId,
    /// Whether the command goes into replay history.
    pub record: bool,
    /// Namespace the command originated from.
    pub source: Option<String>,
}

impl RegistrationCommand {
    pub fn new(namespace: impl Into<String>, alias: impl Into<String>, vlan: VlanId) -> Self {
        Self {
            namespace: namespace.into(),
            alias: alias.into(),
            vlan,
            record: true,
            source: None,
        }
    }

    pub fn with_record(mut self, record: bool) -> Self {
        self.record = record;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Renders the command line.
    pub fn compile(&self) -> String {
        format!(
            "namespace {} vlans add {} {}",
            quote(&self.namespace),
            quote(&self.alias),
            self.vlan
        )
    }

    /// Parses a command line produced by [`compile`](Self::compile).
    ///
    /// The result is marked not-recorded; commands that arrive over the mesh
    /// are never replayed.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let caps = REGISTRATION_RE
            .captures(text.trim())
            .ok_or_else(|| CommandError::Unrecognized(text.to_string()))?;

        let vlan = caps[4]
            .parse::<VlanId>()
            .map_err(|_| CommandError::InvalidVlan(caps[4].to_string()))?;

        let namespace = match (caps.get(1), caps.get(2)) {
            (Some(quoted), _) => unquote(quoted.as_str()),
            (None, Some(bare)) => bare.as_str().to_string(),
            (None, None) => return Err(CommandError::Unrecognized(text.to_string())),
        };

        Ok(Self::new(namespace, unquote(&caps[3]), vlan).with_record(false))
    }
}

impl fmt::Display for RegistrationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.compile())
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", QUOTE_ESCAPE_RE.replace_all(s, r"\$1"))
}

fn unquote(s: &str) -> String {
    QUOTE_UNESCAPE_RE
        .replace_all(s, |caps: &Captures| caps[1].to_string())
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vlan(id: u16) -> VlanId {
        VlanId::new(id).unwrap()
    }

    #[test]
    fn test_compile() {
        let cmd = RegistrationCommand::new("alpha", "DMZ", vlan(101));
        assert_eq!(cmd.compile(), r#"namespace "alpha" vlans add "DMZ" 101"#);
        assert_eq!(cmd.to_string(), cmd.compile());
    }

    #[test]
    fn test_compile_escapes_quotes() {
        let cmd = RegistrationCommand::new("alpha", r#"a "b" \c"#, vlan(7));
        assert_eq!(
            cmd.compile(),
            r#"namespace "alpha" vlans add "a \"b\" \\c" 7"#
        );
    }

    #[test]
    fn test_parse_roundtrip_awkward_alias() {
        let cmd = RegistrationCommand::new("alpha", r#"a "b" \c, d"#, vlan(7))
            .with_record(false)
            .with_source("alpha");
        let parsed = RegistrationCommand::parse(&cmd.compile()).unwrap();
        assert_eq!(parsed.alias, cmd.alias);
        assert_eq!(parsed.namespace, "alpha");
        assert_eq!(parsed.vlan, vlan(7));
        assert!(!parsed.record);
        assert_eq!(parsed.source, None);
    }

    #[test]
    fn test_namespace_with_whitespace_roundtrips() {
        for namespace in ["my ns", "", r#"q"uote"#] {
            let cmd = RegistrationCommand::new(namespace, "DMZ", vlan(200));
            let parsed = RegistrationCommand::parse(&cmd.compile()).unwrap();
            assert_eq!(parsed.namespace, namespace);
            assert_eq!(parsed.alias, "DMZ");
        }
    }

    #[test]
    fn test_parse_bare_namespace() {
        let parsed = RegistrationCommand::parse(r#"namespace alpha vlans add "DMZ" 200"#).unwrap();
        assert_eq!(parsed.namespace, "alpha");
        assert!(matches!(
            RegistrationCommand::parse(r#"namespace my ns vlans add "DMZ" 200"#),
            Err(CommandError::Unrecognized(_))
        ));
    }

    #[test]
    fn test_builder_flags() {
        let cmd = RegistrationCommand::new("ns", "x", vlan(1))
            .with_record(false)
            .with_source("ns");
        assert!(!cmd.record);
        assert_eq!(cmd.source.as_deref(), Some("ns"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            RegistrationCommand::parse("vm launch kvm foo"),
            Err(CommandError::Unrecognized(_))
        ));
        assert!(matches!(
            RegistrationCommand::parse(r#"namespace a vlans add "x" 4095"#),
            Err(CommandError::InvalidVlan(_))
        ));
        assert!(RegistrationCommand::parse(r#"namespace a vlans add "x" 1"#).is_ok());
    }
}
