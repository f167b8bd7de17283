use crate::config::{DiscoveryStrategy, SiteProfile, MAX_INDEX_PAGES, PROGRESS_INTERVAL};
use crate::content::resolve_href;
use crate::errors::{ConfigError, FetchError};
use crate::fetch::PageFetcher;
use crate::models::SkippedLink;
use crate::parser::selector;
use indicatif::ProgressBar;
use rustc_hash::FxHashSet;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

/// Detail-page URLs in index order, plus everything that was not one.
#[derive(Debug, Default, Clone)]
pub struct DiscoveredLinks {
    pub links: Vec<String>,
    pub skipped: Vec<SkippedLink>,
}

enum Strategy {
    Positional {
        template: String,
        first: u32,
        last: Option<u32>,
    },
    Structural {
        row: Selector,
        link: Selector,
        next_page: Option<Selector>,
    },
}

pub struct LinkDiscoverer {
    index_url: String,
    detail_suffix: String,
    strategy: Strategy,
}

/// Accepts candidates in order, once each.
struct Collector<'a> {
    detail_suffix: &'a str,
    seen: FxHashSet<String>,
    found: DiscoveredLinks,
}

impl<'a> Collector<'a> {
    fn new(detail_suffix: &'a str) -> Self {
        Self {
            detail_suffix,
            seen: FxHashSet::default(),
            found: DiscoveredLinks::default(),
        }
    }

    fn offer(&mut self, url: String) {
        if !url.contains(self.detail_suffix) {
            debug!(url = %url, "Not a detail link");
            self.found.skipped.push(url);
        } else if self.seen.insert(url.clone()) {
            self.found.links.push(url);
        }
    }

    fn skip(&mut self, marker: String) {
        self.found.skipped.push(marker);
    }
}

impl LinkDiscoverer {
    pub fn new(profile: &SiteProfile) -> Result<Self, ConfigError> {
        let strategy = match &profile.discovery {
            DiscoveryStrategy::Positional {
                selector_template,
                first,
                last,
            } => {
                if !selector_template.contains("{i}") {
                    return Err(ConfigError::InvalidTemplate(selector_template.clone()));
                }
                Strategy::Positional {
                    template: selector_template.clone(),
                    first: *first,
                    last: *last,
                }
            }
            DiscoveryStrategy::Structural {
                row_selector,
                link_selector,
                next_page_selector,
            } => Strategy::Structural {
                row: selector("row_selector", row_selector)?,
                link: selector("link_selector", link_selector)?,
                next_page: next_page_selector
                    .as_deref()
                    .map(|css| selector("next_page_selector", css))
                    .transpose()?,
            },
        };

        Ok(Self {
            index_url: profile.site.index_url.clone(),
            detail_suffix: profile.site.detail_suffix.clone(),
            strategy,
        })
    }

    /// Walks the index. Only a failure to fetch the first index page is fatal;
    /// an empty result means the index genuinely listed nothing.
    pub fn discover<F>(&self, fetcher: &F) -> Result<DiscoveredLinks, FetchError>
    where
        F: PageFetcher + ?Sized,
    {
        info!("Discovering links from: {}", self.index_url);
        let found = match &self.strategy {
            Strategy::Positional {
                template,
                first,
                last,
            } => self.walk_positions(fetcher, template, *first, *last)?,
            Strategy::Structural {
                row,
                link,
                next_page,
            } => self.walk_rows(fetcher, row, link, next_page.as_ref())?,
        };

        info!(
            links = found.links.len(),
            skipped = found.skipped.len(),
            "Link discovery complete"
        );
        Ok(found)
    }

    fn walk_positions<F>(
        &self,
        fetcher: &F,
        template: &str,
        first: u32,
        last: Option<u32>,
    ) -> Result<DiscoveredLinks, FetchError>
    where
        F: PageFetcher + ?Sized,
    {
        let page = fetcher.fetch(&self.index_url)?;
        let document = Html::parse_document(&page.body);
        let mut collector = Collector::new(&self.detail_suffix);
        let pb = ProgressBar::new_spinner();

        for i in first.. {
            if last.is_some_and(|last| i > last) {
                break;
            }
            let css = template.replace("{i}", &i.to_string());
            let Ok(position) = Selector::parse(&css) else {
                debug!(position = i, "Unparseable positional selector, treating as end of list");
                break;
            };
            let Some(element) = document.select(&position).next() else {
                debug!(position = i, "No element at position, end of list");
                break;
            };

            match element.value().attr("href") {
                Some(href) => collector.offer(resolve_href(&page.url, href)),
                None => collector.skip(format!("{}#position-{}", page.url, i)),
            }

            if (i - first) % PROGRESS_INTERVAL == 0 {
                pb.set_message(format!("Acquiring links, at #{}", i - first));
                pb.tick();
            }
        }

        pb.finish_and_clear();
        Ok(collector.found)
    }

    fn walk_rows<F>(
        &self,
        fetcher: &F,
        row: &Selector,
        link: &Selector,
        next_page: Option<&Selector>,
    ) -> Result<DiscoveredLinks, FetchError>
    where
        F: PageFetcher + ?Sized,
    {
        let mut collector = Collector::new(&self.detail_suffix);
        let mut visited = FxHashSet::default();
        let mut next = Some(self.index_url.clone());
        let pb = ProgressBar::new_spinner();

        while let Some(url) = next.take() {
            if visited.len() >= MAX_INDEX_PAGES {
                warn!(pages = visited.len(), "Index page limit reached");
                break;
            }
            visited.insert(url.clone());

            let page = match fetcher.fetch(&url) {
                Ok(page) => page,
                Err(e) if visited.len() == 1 => return Err(e),
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to fetch index page, stopping pagination");
                    collector.skip(url);
                    break;
                }
            };
            let document = Html::parse_document(&page.body);

            for (n, element) in document.select(row).enumerate() {
                let href = element
                    .select(link)
                    .next()
                    .and_then(|a| a.value().attr("href"));
                match href {
                    Some(href) => collector.offer(resolve_href(&page.url, href)),
                    None => collector.skip(format!("{}#row-{}", page.url, n + 1)),
                }
            }

            pb.set_message(format!(
                "Acquiring links, {} so far",
                collector.found.links.len()
            ));
            pb.tick();

            next = next_page
                .and_then(|sel| document.select(sel).next())
                .and_then(|a| a.value().attr("href"))
                .map(|href| resolve_href(&page.url, href))
                .filter(|target| !visited.contains(target));
        }

        pb.finish_and_clear();
        Ok(collector.found)
    }
}
