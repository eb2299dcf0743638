use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Settings shared by every front-end. Every field is optional so that
/// environment, config file and command line layers can be merged.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub source: Option<String>,
    pub backup_dir: Option<String>,
    pub zip_dir: Option<String>,
    pub config: Option<String>,
    pub dry: Option<bool>,
    pub skip: Option<Vec<String>>,
    pub zip_collision: Option<CollisionPolicy>,
}

/// What to do when the zip file to be written already exists.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Replace the existing archive once the new one is complete.
    #[default]
    Overwrite,
    /// Refuse to touch the existing archive.
    Fail,
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "fail" => Ok(Self::Fail),
            other => Err(format!(
                "unknown collision policy '{other}' (expected 'overwrite' or 'fail')"
            )),
        }
    }
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overwrite => f.write_str("overwrite"),
            Self::Fail => f.write_str("fail"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collision_policy_parses_case_insensitively() {
        assert_eq!("Overwrite".parse(), Ok(CollisionPolicy::Overwrite));
        assert_eq!(" fail ".parse(), Ok(CollisionPolicy::Fail));
        assert!("merge".parse::<CollisionPolicy>().is_err());
    }

    #[test]
    fn collision_policy_defaults_to_overwrite() {
        assert_eq!(CollisionPolicy::default(), CollisionPolicy::Overwrite);
        assert_eq!(CollisionPolicy::Fail.to_string(), "fail");
    }
}
