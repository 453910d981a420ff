//! Declarative description of every monitored bulletin board.
//!
//! A [`SiteSpec`] names the extraction strategy for one site and carries the
//! selectors, date pattern and pagination bounds that strategy needs. The
//! `id` is the join key into history and must be unique across the table.

use serde::{Deserialize, Serialize};

/// Container selector used by the gendered boards when none is configured.
pub const DEFAULT_GENDER_CONTAINER: &str = "dl.contributor";

/// Date pattern used by every known board.
pub const DEFAULT_DATE_FORMAT: &str = "%Y/%m/%d";

const IMAGE_BASE: &str = "/static/images";

/// One monitored site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSpec {
    /// Stable key, used as `site_id` in history.
    pub id: String,
    /// Human-readable label for the dashboard.
    pub display_name: String,
    /// Icon reference shown next to the label. Not persisted.
    #[serde(default)]
    pub image_url: String,
    #[serde(flatten)]
    pub kind: SiteKind,
}

/// Extraction strategy and its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SiteKind {
    /// A single page with the running count in one element.
    SimpleCounter(CounterSpec),
    /// Paginated board, counting posts dated on the target day.
    PagedByDate(DatedSpec),
    /// Paginated board, counting posts on the target day split by poster gender.
    PagedByDateAndGender(GenderedSpec),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSpec {
    pub url: String,
    pub selector: String,
}

/// Pagination bounds shared by the paged strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    /// URL of the first page, fetched verbatim.
    pub base_url: String,
    /// Later pages are `page_url_prefix` followed by the page number.
    pub page_url_prefix: String,
    pub start_page: u32,
    pub max_page: u32,
    pub step: u32,
}

impl Paging {
    /// Page numbers in visiting order: `start_page, start_page + step, ..` up to `max_page`.
    pub fn pages(&self) -> impl Iterator<Item = u32> + '_ {
        (self.start_page..=self.max_page).step_by(self.step.max(1) as usize)
    }

    /// URL for a page number. The start page always uses `base_url`.
    pub fn url_for(&self, page: u32) -> String {
        if page == self.start_page { self.base_url.clone() } else { format!("{}{}", self.page_url_prefix, page) }
    }
}

/// Where the date string of a matched date node lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateText {
    /// The text content of the matched node.
    #[default]
    NodeText,
    /// The text node immediately following the matched node (icon followed by a bare date).
    NextSiblingText,
}

/// Drops posts written by the board owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorExclusion {
    /// Author node, looked up inside each post container.
    pub selector: String,
    /// Posts whose author text contains this are skipped.
    pub contains: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedSpec {
    #[serde(flatten)]
    pub paging: Paging,
    pub date_selector: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// When set, posts are containers and `date_selector` is resolved inside each one.
    #[serde(default)]
    pub container_selector: Option<String>,
    #[serde(default)]
    pub date_text: DateText,
    #[serde(default)]
    pub exclude_author: Option<AuthorExclusion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderedSpec {
    #[serde(flatten)]
    pub paging: Paging,
    #[serde(default = "default_gender_container")]
    pub container_selector: String,
    pub date_selector: String,
    pub gender_selector: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.into()
}

fn default_gender_container() -> String {
    DEFAULT_GENDER_CONTAINER.into()
}

impl SiteSpec {
    /// URL linked from the dashboard: the counter page or the board's first page.
    pub fn landing_url(&self) -> &str {
        match &self.kind {
            SiteKind::SimpleCounter(c) => &c.url,
            SiteKind::PagedByDate(d) => &d.paging.base_url,
            SiteKind::PagedByDateAndGender(g) => &g.paging.base_url,
        }
    }

    /// Whether results carry a gender breakdown.
    pub fn is_gendered(&self) -> bool {
        matches!(self.kind, SiteKind::PagedByDateAndGender(_))
    }

    /// Every CSS selector this site relies on, for up-front validation.
    pub fn selectors(&self) -> Vec<&str> {
        match &self.kind {
            SiteKind::SimpleCounter(c) => vec![c.selector.as_str()],
            SiteKind::PagedByDate(d) => {
                let mut all = vec![d.date_selector.as_str()];
                all.extend(d.container_selector.as_deref());
                all.extend(d.exclude_author.as_ref().map(|a| a.selector.as_str()));
                all
            }
            SiteKind::PagedByDateAndGender(g) => {
                vec![g.container_selector.as_str(), g.date_selector.as_str(), g.gender_selector.as_str()]
            }
        }
    }

    pub fn paging(&self) -> Option<&Paging> {
        match &self.kind {
            SiteKind::SimpleCounter(_) => None,
            SiteKind::PagedByDate(d) => Some(&d.paging),
            SiteKind::PagedByDateAndGender(g) => Some(&g.paging),
        }
    }

    pub fn date_format(&self) -> Option<&str> {
        match &self.kind {
            SiteKind::SimpleCounter(_) => None,
            SiteKind::PagedByDate(d) => Some(&d.date_format),
            SiteKind::PagedByDateAndGender(g) => Some(&g.date_format),
        }
    }
}

fn image(id: &str) -> String {
    format!("{IMAGE_BASE}/{id}.png")
}

fn gendered_board(id: &str, display_name: &str, host: &str) -> SiteSpec {
    SiteSpec {
        id: id.into(),
        display_name: display_name.into(),
        image_url: image(id),
        kind: SiteKind::PagedByDateAndGender(GenderedSpec {
            paging: Paging {
                base_url: format!("https://{host}/bbs/index.php?page=0"),
                page_url_prefix: format!("https://{host}/bbs/index.php?page="),
                start_page: 0,
                max_page: 10,
                step: 10,
            },
            container_selector: default_gender_container(),
            date_selector: "span.date".into(),
            gender_selector: "span.sex".into(),
            date_format: default_date_format(),
        }),
    }
}

/// The site table of the monitored deployment.
pub fn default_sites() -> Vec<SiteSpec> {
    vec![
        SiteSpec {
            id: "mogura".into(),
            display_name: "ノンハプバーもぐら".into(),
            image_url: image("mogura"),
            kind: SiteKind::SimpleCounter(CounterSpec {
                url: "https://member.nonhapumogura.com/".into(),
                selector: "#count-num".into(),
            }),
        },
        SiteSpec {
            id: "440".into(),
            display_name: "440".into(),
            image_url: image("440"),
            kind: SiteKind::PagedByDate(DatedSpec {
                paging: Paging {
                    base_url: "https://rara.jp/bar440/".into(),
                    page_url_prefix: "https://rara.jp/bar440/link".into(),
                    start_page: 1,
                    max_page: 10,
                    step: 1,
                },
                date_selector: "div.user-meta".into(),
                date_format: default_date_format(),
                container_selector: Some("table.layer_pop".into()),
                date_text: DateText::NodeText,
                exclude_author: Some(AuthorExclusion { selector: "div.user-name".into(), contains: "440".into() }),
            }),
        },
        gendered_board("canelo", "カネロ", "barcanelo.com"),
        gendered_board("retreatbar", "リトリートバー", "retreatbar.jp"),
        gendered_board("bar-face", "バーフェイス", "bar-face.jp"),
        SiteSpec {
            id: "colors".into(),
            display_name: "カラーズバー".into(),
            image_url: image("colors"),
            kind: SiteKind::SimpleCounter(CounterSpec {
                url: "https://t-colors.net/".into(),
                selector: "span.sum".into(),
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paging(start: u32, max: u32, step: u32) -> Paging {
        Paging {
            base_url: "https://bbs.example/".into(),
            page_url_prefix: "https://bbs.example/?page=".into(),
            start_page: start,
            max_page: max,
            step,
        }
    }

    #[test]
    fn test_pages_inclusive_with_step() {
        let pages: Vec<u32> = paging(0, 10, 10).pages().collect();
        assert_eq!(pages, vec![0, 10]);

        let pages: Vec<u32> = paging(1, 4, 1).pages().collect();
        assert_eq!(pages, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_url_for_start_page_uses_base_url() {
        let p = paging(1, 4, 1);
        assert_eq!(p.url_for(1), "https://bbs.example/");
        assert_eq!(p.url_for(3), "https://bbs.example/?page=3");
    }

    #[test]
    fn test_default_sites_have_unique_ids() {
        let sites = default_sites();
        let mut ids: Vec<&str> = sites.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), sites.len());
    }

    #[test]
    fn test_board_owner_replies_are_excluded() {
        let sites = default_sites();
        let board = sites.iter().find(|s| s.id == "440").unwrap();
        let SiteKind::PagedByDate(spec) = &board.kind else { panic!("wrong kind") };
        assert_eq!(spec.container_selector.as_deref(), Some("table.layer_pop"));
        let exclusion = spec.exclude_author.as_ref().unwrap();
        assert_eq!((exclusion.selector.as_str(), exclusion.contains.as_str()), ("div.user-name", "440"));
        assert!(board.selectors().contains(&"div.user-name"));
    }

    #[test]
    fn test_site_spec_json_shape() {
        let json = r#"{
            "id": "board",
            "display_name": "Board",
            "kind": "paged_by_date",
            "base_url": "https://bbs.example/",
            "page_url_prefix": "https://bbs.example/link",
            "start_page": 1,
            "max_page": 5,
            "step": 1,
            "date_selector": "i.clock",
            "date_text": "next_sibling_text"
        }"#;
        let site: SiteSpec = serde_json::from_str(json).unwrap();
        let SiteKind::PagedByDate(spec) = &site.kind else { panic!("wrong kind") };
        assert_eq!(spec.date_text, DateText::NextSiblingText);
        assert_eq!(spec.date_format, DEFAULT_DATE_FORMAT);
        assert_eq!(spec.paging.max_page, 5);
        assert!(site.image_url.is_empty());
        assert_eq!(site.landing_url(), "https://bbs.example/");
    }

    #[test]
    fn test_gendered_defaults_container() {
        let json = r#"{
            "id": "g",
            "display_name": "G",
            "kind": "paged_by_date_and_gender",
            "base_url": "https://g.example/?page=0",
            "page_url_prefix": "https://g.example/?page=",
            "start_page": 0,
            "max_page": 10,
            "step": 10,
            "date_selector": "span.date",
            "gender_selector": "span.sex"
        }"#;
        let site: SiteSpec = serde_json::from_str(json).unwrap();
        assert!(site.is_gendered());
        assert_eq!(site.selectors(), vec!["dl.contributor", "span.date", "span.sex"]);
    }
}
