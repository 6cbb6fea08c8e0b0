//! Supported Solana DEX venues
//!
//! Each venue maps 1:1 to the on-chain program id used in trade filters
//! and in inbound trade frames.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A decentralized exchange the live feed can filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dex {
    Orca,
    Raydium,
    Meteora,
    Phoenix,
    Pumpfun,
}

impl Dex {
    pub const ALL: [Dex; 5] = [
        Dex::Orca,
        Dex::Raydium,
        Dex::Meteora,
        Dex::Phoenix,
        Dex::Pumpfun,
    ];

    /// Venue name as used in subscription requests and URLs
    pub fn as_str(self) -> &'static str {
        match self {
            Dex::Orca => "orca",
            Dex::Raydium => "raydium",
            Dex::Meteora => "meteora",
            Dex::Phoenix => "phoenix",
            Dex::Pumpfun => "pumpfun",
        }
    }

    /// On-chain program id
    pub fn program_id(self) -> &'static str {
        match self {
            Dex::Orca => "9W959DqEETiGZocYWCQPaJ6sBmUzgfxXfqGeTEdp3aQP",
            Dex::Raydium => "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8",
            Dex::Meteora => "Eo7WjKq67rjJQSZxS6z3YkapzY3eMj6Xy8X5EQVn5UaB",
            Dex::Phoenix => "PhoeNiXZ8ByJGLkxNfZRnkUfjvmuYqLR89jjFHGqdXY",
            Dex::Pumpfun => "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P",
        }
    }

    /// Reverse lookup by program id
    pub fn from_program_id(program_id: &str) -> Option<Dex> {
        Dex::ALL.into_iter().find(|d| d.program_id() == program_id)
    }

    /// Capitalized name for display ("Orca", "Pumpfun")
    pub fn display_name(self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Dex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDex(pub String);

impl fmt::Display for UnknownDex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown dex: {}", self.0)
    }
}

impl std::error::Error for UnknownDex {}

impl FromStr for Dex {
    type Err = UnknownDex;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dex::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| UnknownDex(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_known_venues() {
        assert_eq!("orca".parse::<Dex>().unwrap(), Dex::Orca);
        assert_eq!("pumpfun".parse::<Dex>().unwrap(), Dex::Pumpfun);
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!("Orca".parse::<Dex>().is_err());
        assert_eq!(
            "uniswap".parse::<Dex>().unwrap_err(),
            UnknownDex("uniswap".to_string())
        );
    }

    #[test]
    fn test_program_ids_are_distinct_and_round_trip() {
        let ids: HashSet<_> = Dex::ALL.iter().map(|d| d.program_id()).collect();
        assert_eq!(ids.len(), Dex::ALL.len());

        for dex in Dex::ALL {
            assert_eq!(Dex::from_program_id(dex.program_id()), Some(dex));
        }
        assert_eq!(Dex::from_program_id("11111111111111111111111111111111"), None);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(Dex::Raydium.display_name(), "Raydium");
        assert_eq!(Dex::Pumpfun.to_string(), "pumpfun");
    }
}
