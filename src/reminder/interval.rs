//! Repeat kinds and the fixed interval each one advances a reminder by.

use std::str::FromStr;

/// How often a repeating reminder fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepeatKind {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    HalfYearly,
    Yearly,
}

/// Catalog row: kind, chat tag, interval length in days.
const CATALOG: &[(RepeatKind, &str, i64)] = &[
    (RepeatKind::Daily, "daily", 1),
    (RepeatKind::Weekly, "weekly", 7),
    (RepeatKind::Monthly, "monthly", 30),
    (RepeatKind::Quarterly, "quarterly", 90),
    (RepeatKind::HalfYearly, "half-yearly", 182),
    (RepeatKind::Yearly, "yearly", 365),
];

impl RepeatKind {
    /// All recognized kinds in catalog order.
    pub fn all() -> impl Iterator<Item = RepeatKind> {
        CATALOG.iter().map(|(kind, _, _)| *kind)
    }

    /// Look up a kind by its chat tag (case-insensitive).
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        CATALOG
            .iter()
            .find(|(_, name, _)| name.eq_ignore_ascii_case(tag))
            .map(|(kind, _, _)| *kind)
    }

    /// The chat tag for this kind.
    #[must_use]
    pub fn tag(self) -> &'static str {
        self.row().1
    }

    /// Duration added to `next_time` after each occurrence.
    #[must_use]
    pub fn interval(self) -> chrono::Duration {
        chrono::Duration::days(self.row().2)
    }

    fn row(self) -> &'static (RepeatKind, &'static str, i64) {
        // Every variant has exactly one row.
        CATALOG
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .unwrap_or(&CATALOG[0])
    }
}

impl std::fmt::Display for RepeatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for RepeatKind {
    type Err = crate::NudgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| {
            let known: Vec<&str> = CATALOG.iter().map(|(_, tag, _)| *tag).collect();
            crate::NudgeError::Validation(format!(
                "unknown repeat kind `{s}`; expected one of {}",
                known.join(", ")
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn every_kind_has_a_catalog_row() {
        for kind in [
            RepeatKind::Daily,
            RepeatKind::Weekly,
            RepeatKind::Monthly,
            RepeatKind::Quarterly,
            RepeatKind::HalfYearly,
            RepeatKind::Yearly,
        ] {
            assert_eq!(RepeatKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(RepeatKind::all().count(), 6);
    }

    #[test]
    fn intervals_match_catalog() {
        assert_eq!(RepeatKind::Daily.interval(), chrono::Duration::days(1));
        assert_eq!(RepeatKind::Weekly.interval(), chrono::Duration::weeks(1));
        assert_eq!(RepeatKind::Yearly.interval(), chrono::Duration::days(365));
        assert!(RepeatKind::Quarterly.interval() > RepeatKind::Monthly.interval());
        assert!(RepeatKind::HalfYearly.interval() < RepeatKind::Yearly.interval());
    }

    #[test]
    fn tags_are_case_insensitive() {
        assert_eq!(RepeatKind::from_tag("DAILY"), Some(RepeatKind::Daily));
        assert_eq!(
            RepeatKind::from_tag("Half-Yearly"),
            Some(RepeatKind::HalfYearly)
        );
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert!(RepeatKind::from_tag("hourly").is_none());
        assert!(RepeatKind::from_tag("").is_none());
        let err = "fortnightly".parse::<RepeatKind>().unwrap_err();
        assert!(err.to_string().contains("fortnightly"));
    }
}
