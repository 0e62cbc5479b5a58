//! Consent categories and the per-visitor decision.

use ccg_core::Error;
use serde::{Deserialize, Serialize};

/// Cookie categories a visitor can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Core site functionality, security and load balancing. Always on.
    Necessary,
    Analytics,
    Marketing,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[Self::Necessary, Self::Analytics, Self::Marketing]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Necessary => "necessary",
            Self::Analytics => "analytics",
            Self::Marketing => "marketing",
        }
    }

    /// Whether the visitor is unable to switch this category off.
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Necessary)
    }

    /// Heading shown next to the toggle in the settings panel.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Necessary => "Strictly Necessary",
            Self::Analytics => "Performance & Analytics",
            Self::Marketing => "Marketing",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Necessary => "Required for core site functionality, security, and load balancing.",
            Self::Analytics => {
                "Helps us understand usage and improve content (e.g., Google Analytics, Vercel Insights)."
            }
            Self::Marketing => {
                "Used for remarketing/ads if implemented (e.g., Google Ads, Meta Pixel)."
            }
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "necessary" => Ok(Self::Necessary),
            "analytics" => Ok(Self::Analytics),
            "marketing" => Ok(Self::Marketing),
            other => Err(Error::UnknownCategory(other.to_string())),
        }
    }
}

/// The visitor's decision for each category.
///
/// `necessary` is private and only ever `true`; there is no constructor or
/// setter that can produce anything else, and deserializing a value with
/// `necessary: false` fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CategoryFlags")]
pub struct ConsentCategories {
    necessary: bool,
    analytics: bool,
    marketing: bool,
}

impl ConsentCategories {
    pub fn new(analytics: bool, marketing: bool) -> Self {
        Self {
            necessary: true,
            analytics,
            marketing,
        }
    }

    /// Only strictly necessary cookies. The default before any decision.
    pub fn opted_out() -> Self {
        Self::new(false, false)
    }

    pub fn all_granted() -> Self {
        Self::new(true, true)
    }

    pub fn necessary(&self) -> bool {
        self.necessary
    }

    pub fn analytics(&self) -> bool {
        self.analytics
    }

    pub fn marketing(&self) -> bool {
        self.marketing
    }

    pub fn allows(&self, category: Category) -> bool {
        match category {
            Category::Necessary => true,
            Category::Analytics => self.analytics,
            Category::Marketing => self.marketing,
        }
    }

    /// Copy with one category changed. Turning `necessary` off is refused.
    pub fn with(self, category: Category, enabled: bool) -> Result<Self, Error> {
        match category {
            Category::Necessary if !enabled => {
                Err(Error::LockedCategory(Category::Necessary.to_string()))
            }
            Category::Necessary => Ok(self),
            Category::Analytics => Ok(Self {
                analytics: enabled,
                ..self
            }),
            Category::Marketing => Ok(Self {
                marketing: enabled,
                ..self
            }),
        }
    }
}

impl Default for ConsentCategories {
    fn default() -> Self {
        Self::opted_out()
    }
}

/// Wire shape of [`ConsentCategories`] before validation.
#[derive(Deserialize)]
struct CategoryFlags {
    necessary: bool,
    analytics: bool,
    marketing: bool,
}

impl TryFrom<CategoryFlags> for ConsentCategories {
    type Error = String;

    fn try_from(flags: CategoryFlags) -> Result<Self, Self::Error> {
        if !flags.necessary {
            return Err("necessary cookies cannot be disabled".into());
        }
        Ok(Self::new(flags.analytics, flags.marketing))
    }
}
