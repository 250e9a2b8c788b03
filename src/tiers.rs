use serde::{Deserialize, Serialize};

/// Subscription tier controlling feature quotas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Starter,
    Trial,
    Plus,
    Pro,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Starter => "starter",
            Tier::Trial => "trial",
            Tier::Plus => "plus",
            Tier::Pro => "pro",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Tier::Starter => 0,
            Tier::Trial => 1,
            Tier::Plus => 2,
            Tier::Pro => 3,
        }
    }

    pub fn at_least(&self, other: Tier) -> bool {
        self.rank() >= other.rank()
    }

    /// Maximum job-search results returned per query.
    pub fn job_search_limit(&self) -> usize {
        match self {
            Tier::Starter => 5,
            Tier::Trial => 10,
            Tier::Plus => 25,
            Tier::Pro => 50,
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = ();

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim() {
            "starter" => Ok(Tier::Starter),
            "trial" => Ok(Tier::Trial),
            "plus" => Ok(Tier::Plus),
            "pro" => Ok(Tier::Pro),
            _ => Err(()),
        }
    }
}
