//! Cell addressing and the two text codecs spoken on the wire.
//!
//! - [`request`] builds the outbound bytes for one polling cycle
//! - [`response`] extracts `(cell, value)` pairs from inbound lines
//! - [`echo`] decides which raw lines are mirrored to the diagnostic channel

pub mod echo;
pub mod request;
pub mod response;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, num::NonZeroU8, str::FromStr};

/// Numeric cell address in the range 1..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u8")]
pub struct CellId(NonZeroU8);

impl CellId {
    pub fn new(raw: u32) -> Option<Self> {
        u8::try_from(raw).ok().and_then(NonZeroU8::new).map(Self)
    }

    pub fn get(self) -> u8 {
        self.0.get()
    }
}

impl TryFrom<u32> for CellId {
    type Error = String;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        CellId::new(raw).ok_or_else(|| format!("cell address {raw} is outside 1..=255"))
    }
}

impl From<CellId> for u8 {
    fn from(id: CellId) -> Self {
        id.get()
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CellId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw: u32 = s
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid cell address '{s}': {e}"))?;
        CellId::try_from(raw).map_err(|e| anyhow!(e))
    }
}

/// A requested cell together with the label used for display and log columns.
///
/// Serialized in its command line form, `<Addr>` or `<Name>:<Addr>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellSpec {
    pub name: String,
    pub id: CellId,
}

impl CellSpec {
    pub fn new(id: CellId) -> Self {
        Self {
            name: id.to_string(),
            id,
        }
    }

    pub fn named(name: impl Into<String>, id: CellId) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

impl FromStr for CellSpec {
    type Err = anyhow::Error;

    /// Accepts `<Addr>` or `<Name>:<Addr>`.
    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim();
        if token.is_empty() {
            return Err(anyhow!("Empty cell token"));
        }
        match token.split_once(':') {
            Some((name, addr)) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(anyhow!("Cell '{token}' has an empty name"));
                }
                if name.contains([',', '"', '\r', '\n']) {
                    return Err(anyhow!(
                        "Cell name {name:?} must not contain ',', '\"' or a line break"
                    ));
                }
                Ok(CellSpec::named(name, addr.parse()?))
            }
            None => Ok(CellSpec::new(token.parse()?)),
        }
    }
}

impl fmt::Display for CellSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == self.id.to_string() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{}:{}", self.name, self.id)
        }
    }
}

impl TryFrom<String> for CellSpec {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<CellSpec> for String {
    fn from(cell: CellSpec) -> Self {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_id_bounds() {
        assert!(CellId::new(0).is_none());
        assert!(CellId::new(256).is_none());
        assert_eq!(CellId::new(1).map(CellId::get), Some(1));
        assert_eq!(CellId::new(255).map(CellId::get), Some(255));
    }

    #[test]
    fn parse_bare_and_named_cells() -> Result<()> {
        let bare: CellSpec = "12".parse()?;
        assert_eq!(bare.name, "12");
        assert_eq!(bare.id.get(), 12);

        let named: CellSpec = " temp : 7 ".parse()?;
        assert_eq!(named.name, "temp");
        assert_eq!(named.id.get(), 7);
        Ok(())
    }

    #[test]
    fn reject_bad_cells() {
        assert!("0".parse::<CellSpec>().is_err());
        assert!("300".parse::<CellSpec>().is_err());
        assert!("abc".parse::<CellSpec>().is_err());
        assert!(":5".parse::<CellSpec>().is_err());
        assert!("a,b:5".parse::<CellSpec>().is_err());
        assert!("".parse::<CellSpec>().is_err());
    }

    #[test]
    fn line_breaks_in_names_are_rejected() {
        assert!("in\nside:5".parse::<CellSpec>().is_err());
        assert!("in\rside:5".parse::<CellSpec>().is_err());
        assert!(serde_json::from_str::<CellSpec>(r#""a\nb:5""#).is_err());
    }

    #[test]
    fn cell_spec_round_trips_through_text() -> Result<()> {
        for token in ["7", "temp:7"] {
            let cell: CellSpec = token.parse()?;
            assert_eq!(cell.to_string(), token);
        }
        let cells: Vec<CellSpec> = serde_json::from_str(r#"["1", "flow:2"]"#)?;
        assert_eq!(cells[1], CellSpec::named("flow", CellId::new(2).unwrap()));
        Ok(())
    }

    #[test]
    fn cell_id_serde_range_check() {
        let ok: CellId = serde_json::from_str("42").unwrap();
        assert_eq!(ok.get(), 42);
        assert!(serde_json::from_str::<CellId>("0").is_err());
        assert!(serde_json::from_str::<CellId>("1000").is_err());
    }
}
