use crate::config::{ReferenceUrls, SiteProfile};
use crate::content::{
    clean_name, collapse_text, parse_hardness, parse_number, refresh_target, resolve_href,
    same_url,
};
use crate::errors::{ConfigError, FetchError};
use crate::fetch::Page;
use crate::models::MineralRecord;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use tracing::trace;

/// Result of parsing one detail page.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Record(MineralRecord),
    Skip(SkipReason),
    /// The page carries no title but a meta refresh pointing elsewhere.
    Redirect(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TitleMissing,
    NameMismatch,
    Excluded(String),
    Timeout,
    FetchFailed(String),
    RedirectLoop,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TitleMissing => write!(f, "no title region"),
            SkipReason::NameMismatch => write!(f, "title did not match the name pattern"),
            SkipReason::Excluded(name) => write!(f, "name '{name}' is excluded"),
            SkipReason::Timeout => write!(f, "page fetch timed out"),
            SkipReason::FetchFailed(reason) => write!(f, "page fetch failed: {reason}"),
            SkipReason::RedirectLoop => write!(f, "redirect chain too long or cyclic"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementsState {
    SeekingHeader,
    Accumulating,
    Done,
}

/// One table row as the walk sees it.
struct Row {
    text: String,
    lower: String,
    link: Option<String>,
}

/// Lower-cased keywords, compiled once.
struct Keywords {
    elements: String,
    density: String,
    hardness: String,
}

pub struct RecordParser {
    title: Selector,
    row: Selector,
    row_link: Selector,
    meta_refresh: Selector,
    name: Regex,
    exclude: Regex,
    element: Regex,
    density: Regex,
    hardness: Regex,
    hardness_separator: String,
    sentinel: String,
    keywords: Keywords,
    references: ReferenceUrls,
}

fn compile(name: &'static str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern { name, source })
}

pub(crate) fn selector(name: &'static str, css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|_| ConfigError::InvalidSelector {
        name,
        selector: css.to_string(),
    })
}

/// Value of capture group 1, or the whole match for patterns without groups.
fn first_group<'t>(regex: &Regex, text: &'t str) -> Option<&'t str> {
    let caps = regex.captures(text)?;
    caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
}

impl RecordParser {
    pub fn new(profile: &SiteProfile) -> Result<Self, ConfigError> {
        let patterns = &profile.patterns;
        Ok(Self {
            title: selector("title", &profile.selectors.title)?,
            row: selector("row", &profile.selectors.row)?,
            row_link: selector("row_link", &profile.selectors.row_link)?,
            meta_refresh: selector("meta_refresh", "meta[http-equiv]")?,
            name: compile("name", &patterns.name)?,
            exclude: compile("exclude", &patterns.exclude)?,
            element: compile("element", &patterns.element)?,
            density: compile("density", &patterns.density)?,
            hardness: compile("hardness", &patterns.hardness)?,
            hardness_separator: patterns.hardness_separator.clone(),
            sentinel: patterns.elements_sentinel.clone(),
            keywords: Keywords {
                elements: profile.titles.elements.to_lowercase(),
                density: profile.titles.density.to_lowercase(),
                hardness: profile.titles.hardness.to_lowercase(),
            },
            references: profile.references.clone(),
        })
    }

    /// Folds a failed fetch into a skip, otherwise parses the page.
    pub fn parse_fetched(&self, fetched: Result<Page, FetchError>) -> ParseOutcome {
        match fetched {
            Ok(page) => self.parse(&page),
            Err(e) if e.is_timeout() => ParseOutcome::Skip(SkipReason::Timeout),
            Err(e) => ParseOutcome::Skip(SkipReason::FetchFailed(e.to_string())),
        }
    }

    pub fn parse(&self, page: &Page) -> ParseOutcome {
        let document = Html::parse_document(&page.body);

        let title = match document.select(&self.title).next() {
            Some(el) => collapse_text(el.text()),
            None => {
                return match self.redirect_target(&document, &page.url) {
                    Some(target) => ParseOutcome::Redirect(target),
                    None => ParseOutcome::Skip(SkipReason::TitleMissing),
                };
            }
        };

        let name = match first_group(&self.name, &title) {
            Some(raw) => clean_name(raw),
            None => return ParseOutcome::Skip(SkipReason::NameMismatch),
        };
        if name.is_empty() {
            return ParseOutcome::Skip(SkipReason::NameMismatch);
        }
        if self.exclude.is_match(&name) {
            return ParseOutcome::Skip(SkipReason::Excluded(name));
        }

        let mut record = MineralRecord::new(name);
        let mut walk = Walk::new(self);
        for row in document.select(&self.row) {
            let row = self.read_row(row, &page.url);
            walk.step(&mut record, &row);
            if walk.finished() {
                break;
            }
        }

        ParseOutcome::Record(record)
    }

    fn read_row(&self, row: ElementRef<'_>, page_url: &str) -> Row {
        let text = collapse_text(row.text());
        let link = row
            .select(&self.row_link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| resolve_href(page_url, href));
        Row {
            lower: text.to_lowercase(),
            text,
            link,
        }
    }

    fn redirect_target(&self, document: &Html, page_url: &str) -> Option<String> {
        document
            .select(&self.meta_refresh)
            .filter(|m| {
                m.value()
                    .attr("http-equiv")
                    .is_some_and(|v| v.eq_ignore_ascii_case("refresh"))
            })
            .find_map(|m| m.value().attr("content").and_then(refresh_target))
            .map(|target| resolve_href(page_url, &target))
    }
}

/// Per-page walk state: one small state machine per field.
struct Walk<'p> {
    parser: &'p RecordParser,
    elements: ElementsState,
    density_done: bool,
    hardness_done: bool,
}

impl<'p> Walk<'p> {
    fn new(parser: &'p RecordParser) -> Self {
        Self {
            parser,
            elements: ElementsState::SeekingHeader,
            density_done: false,
            hardness_done: false,
        }
    }

    fn finished(&self) -> bool {
        self.elements == ElementsState::Done && self.density_done && self.hardness_done
    }

    fn links_to(row: &Row, reference: &str) -> bool {
        row.link.as_deref().is_some_and(|l| same_url(l, reference))
    }

    /// Feeds one row to the field machines. A row is consumed by at most one field.
    fn step(&mut self, record: &mut MineralRecord, row: &Row) {
        let p = self.parser;

        match self.elements {
            ElementsState::SeekingHeader if row.lower.contains(&p.keywords.elements) => {
                if Self::links_to(row, &p.references.elements) {
                    trace!(name = %record.name, "Composition block found");
                    self.elements = ElementsState::Accumulating;
                    return;
                }
                // Keyword without any link is incidental text; a different link
                // falls through to the other fields.
                if row.link.is_none() {
                    return;
                }
            }
            ElementsState::Accumulating => {
                self.accumulate(record, row);
                return;
            }
            _ => {}
        }

        if !self.density_done && row.lower.contains(&p.keywords.density) {
            if Self::links_to(row, &p.references.density) {
                if let Some(value) = first_group(&p.density, &row.text).and_then(parse_number) {
                    record.density = Some(value);
                    self.density_done = true;
                }
            }
            return;
        }

        if !self.hardness_done && row.lower.contains(&p.keywords.hardness) {
            if Self::links_to(row, &p.references.hardness) {
                if let Some(value) = first_group(&p.hardness, &row.text)
                    .and_then(|raw| parse_hardness(raw, &p.hardness_separator))
                {
                    record.hardness = Some(value);
                    self.hardness_done = true;
                }
            }
        }
    }

    fn accumulate(&mut self, record: &mut MineralRecord, row: &Row) {
        let p = self.parser;
        let pair = p.element.captures(&row.text).and_then(|caps| {
            let percent = caps.get(1).and_then(|m| parse_number(m.as_str()))?;
            let symbol = caps.get(2)?.as_str();
            Some((symbol.to_string(), percent))
        });

        match pair {
            Some((symbol, percent)) => record.add_element(&symbol, percent),
            None if !p.sentinel.is_empty() && row.text.contains(&p.sentinel) => {
                self.elements = ElementsState::Done;
            }
            // formatting rows inside the block carry no data
            None => {}
        }
    }
}
