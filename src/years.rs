use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    static ref HYPHEN_RANGE: Regex = Regex::new(r"\b(20[0-9]{2})-(20[0-9]{2})\b").unwrap();
    static ref WORDED_RANGE: Regex =
        Regex::new(r"(?i)(?:between|from)\s*(20[0-9]{2})\s*(?:and|to)\s*(20[0-9]{2})").unwrap();
    static ref BARE_YEAR: Regex = Regex::new(r"\b20[0-9]{2}\b").unwrap();
}

/// Financial years mentioned in free text.
///
/// Ranges (`2017-2020`, `between 2018 and 2020`, `from 2014 to 2019`) expand
/// to every year they cover. The result is deduplicated and sorted ascending.
pub fn extract_years(text: &str) -> Vec<String> {
    let mut years = BTreeSet::new();

    for re in [&*HYPHEN_RANGE, &*WORDED_RANGE] {
        for caps in re.captures_iter(text) {
            let (Ok(start), Ok(end)) = (caps[1].parse::<u16>(), caps[2].parse::<u16>()) else {
                continue;
            };
            // An inverted range expands to nothing; its endpoints still count as bare years
            years.extend(start..=end);
        }
    }

    for m in BARE_YEAR.find_iter(text) {
        if let Ok(year) = m.as_str().parse::<u16>() {
            years.insert(year);
        }
    }

    years.into_iter().map(|y| y.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_between_range() {
        assert_eq!(
            extract_years("Total spent on infrastructure in cape town between 2018 and 2021"),
            vec!["2018", "2019", "2020", "2021"]
        );
    }

    #[test]
    fn test_hyphen_range_has_no_duplicates() {
        assert_eq!(
            extract_years("Water spend 2019-2022, especially 2020 and 2022"),
            vec!["2019", "2020", "2021", "2022"]
        );
    }

    #[test]
    fn test_non_ascii_digits_never_widen_a_range() {
        let years = extract_years("spend 20\u{0662}\u{0662}-2024");
        assert_eq!(years, vec!["2024"]);

        let years = extract_years("between 20\u{0661}8 and 2020");
        assert_eq!(years, vec!["2020"]);
    }

    #[test]
    fn test_from_to_case_insensitive() {
        assert_eq!(extract_years("FROM 2014 TO 2016"), vec!["2014", "2015", "2016"]);
    }

    #[test]
    fn test_disjoint_mentions_sorted() {
        assert_eq!(
            extract_years("compare 2023 with 2010-2011"),
            vec!["2010", "2011", "2023"]
        );
    }

    #[test]
    fn test_inverted_range_keeps_endpoints_only() {
        assert_eq!(extract_years("2022-2019"), vec!["2019", "2022"]);
    }

    #[test]
    fn test_no_years() {
        assert!(extract_years("revenue for Johannesburg").is_empty());
        assert!(extract_years("item 1999 and 20201").is_empty());
    }
}
