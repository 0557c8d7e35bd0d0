use anyhow::{Result, anyhow, bail};
use std::fmt;
use std::str::FromStr;

/// A dotted-numeric object identifier such as `.1.3.6.1.2.1.2.2.1.14.59`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn from_arcs(arcs: Vec<u32>) -> Result<Self> {
        validate(&arcs)?;
        Ok(Self(arcs))
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Returns a copy with `arc` appended, e.g. an interface index.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.0.clone();
        arcs.push(arc);
        Oid(arcs)
    }
}

fn validate(arcs: &[u32]) -> Result<()> {
    match arcs {
        [first, second, ..] => {
            if *first > 2 {
                bail!("first arc must be 0, 1 or 2, got {}", first);
            }
            if *first < 2 && *second >= 40 {
                bail!("second arc must be below 40 under {}, got {}", first, second);
            }
            if *first == 2 && *second > u32::MAX - 80 {
                bail!("second arc {} is too large", second);
            }
            Ok(())
        }
        _ => bail!("an OID needs at least two arcs"),
    }
}

impl FromStr for Oid {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let body = trimmed.strip_prefix('.').unwrap_or(trimmed);
        if body.is_empty() {
            bail!("empty OID");
        }

        let arcs = body
            .split('.')
            .map(|arc| {
                arc.parse::<u32>()
                    .map_err(|e| anyhow!("invalid arc {:?} in OID {:?}: {}", arc, s, e))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_arcs(arcs)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for arc in &self.0 {
            write!(f, ".{}", arc)?;
        }
        Ok(())
    }
}
