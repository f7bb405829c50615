use url::Url;

const INCEXP_PATH: &str = "/api/cubes/incexp/";

/// Sanity check on an assembled URL: INCEXP cube path and a non-empty query.
/// Anything that fails to parse is invalid.
pub fn is_valid_incexp_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            parsed.path().contains(INCEXP_PATH) && parsed.query().map_or(false, |q| !q.is_empty())
        }
        Err(_) => false,
    }
}
