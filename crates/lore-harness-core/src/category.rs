//! Lore categories.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the five lore domains. [`Category::ALL`] fixes the iteration
/// order used everywhere results from several categories are concatenated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Characters,
    Creatures,
    Realms,
    Plots,
    Magic,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Characters,
        Category::Creatures,
        Category::Realms,
        Category::Plots,
        Category::Magic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Characters => "characters",
            Category::Creatures => "creatures",
            Category::Realms => "realms",
            Category::Plots => "plots",
            Category::Magic => "magic",
        }
    }

    /// Environment variable consulted for this category's remote database id.
    pub fn database_env_var(&self) -> &'static str {
        match self {
            Category::Characters => "CHARACTER_DB_ID",
            Category::Creatures => "CREATURES_DB_ID",
            Category::Realms => "REALMS_DB_ID",
            Category::Plots => "PLOTS_DB_ID",
            Category::Magic => "MAGIC_DB_ID",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "characters" | "character" => Ok(Category::Characters),
            "creatures" | "creature" => Ok(Category::Creatures),
            "realms" | "realm" => Ok(Category::Realms),
            "plots" | "plot" => Ok(Category::Plots),
            "magic" => Ok(Category::Magic),
            other => anyhow::bail!(
                "Unknown category: '{}'. Must be one of characters, creatures, realms, plots, magic.",
                other
            ),
        }
    }
}
