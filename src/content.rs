use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static REFRESH_URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)url\s*=\s*['"]?\s*([^'"\s;]+)"#).unwrap());

/// Joins text fragments and collapses runs of whitespace, so a table row reads
/// the way it renders.
pub fn collapse_text<'a, I>(fragments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let joined = fragments.into_iter().collect::<Vec<_>>().join(" ");
    WHITESPACE_REGEX.replace_all(joined.trim(), " ").into_owned()
}

/// Removes parenthesis characters and surrounding whitespace from a scraped name.
pub fn clean_name(raw: &str) -> String {
    raw.replace(['(', ')'], "").trim().to_string()
}

/// Strips every whitespace character, including ones inside the value.
pub fn strip_whitespace(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses "7" as 7.0 and "5-6" as the mean of the endpoints.
pub fn parse_hardness(raw: &str, separator: &str) -> Option<f64> {
    if let Some(value) = parse_number(raw) {
        return Some(value);
    }
    if separator.is_empty() {
        return None;
    }
    let endpoints = raw
        .split(separator)
        .map(parse_number)
        .collect::<Option<Vec<f64>>>()?;
    if endpoints.is_empty() {
        return None;
    }
    Some(endpoints.iter().sum::<f64>() / endpoints.len() as f64)
}

/// Resolves `href` against the page it was found on. Unparseable links come back as-is.
pub fn resolve_href(base: &str, href: &str) -> String {
    let href = href.trim();
    match Url::parse(base).and_then(|b| b.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}

/// Compares two URLs after normalisation, falling back to plain string equality.
pub fn same_url(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.trim() == b.trim(),
    }
}

/// Target of a `<meta http-equiv="refresh" content="0; url=...">` directive.
pub fn refresh_target(content: &str) -> Option<String> {
    REFRESH_URL_REGEX
        .captures(content)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}
