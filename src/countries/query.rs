//! Client-side search, region filter and sort over a country list.

use clap::ValueEnum;
use std::cmp::Ordering;
use std::fmt;

use super::Country;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Region {
    Africa,
    Americas,
    Asia,
    Europe,
    Oceania,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Africa => "Africa",
            Region::Americas => "Americas",
            Region::Asia => "Asia",
            Region::Europe => "Europe",
            Region::Oceania => "Oceania",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort order for country lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortKey {
    /// Alphabetical by common name
    #[default]
    Name,
    /// Most populous first
    Population,
    /// Largest first
    Area,
}

impl SortKey {
    pub fn compare(&self, a: &Country, b: &Country) -> Ordering {
        match self {
            SortKey::Name => a
                .name
                .common
                .to_lowercase()
                .cmp(&b.name.common.to_lowercase()),
            SortKey::Population => b.population.cmp(&a.population),
            SortKey::Area => b.area.total_cmp(&a.area),
        }
    }
}

/// Search/filter/sort settings for a country listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryQuery {
    pub search: Option<String>,
    pub region: Option<Region>,
    pub sort: SortKey,
}

impl CountryQuery {
    pub fn matches(&self, country: &Country) -> bool {
        if let Some(region) = self.region {
            if !country.region.eq_ignore_ascii_case(region.as_str()) {
                return false;
            }
        }

        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                country.name.common.to_lowercase().contains(&term)
                    || country.name.official.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }

    /// Filter then sort. The sort is stable.
    pub fn apply(&self, countries: Vec<Country>) -> Vec<Country> {
        let mut selected: Vec<Country> = countries.into_iter().filter(|c| self.matches(c)).collect();
        selected.sort_by(|a, b| self.sort.compare(a, b));
        selected
    }
}
