//! Profiles derived from HTML pages.
//!
//! Every `<script src>` after the loader script and every `dojo.require`
//! call on a page becomes a layer. A layer excludes the layers loaded
//! before it, narrowed to those that precede it on every page it shows up on.

use std::path::Path;
use std::sync::LazyLock;

use indexmap::{IndexMap, IndexSet};
use regex::Regex;

use crate::error::{ConfigError, Result};
use crate::profile::{BuildProfile, LayerDecl, PackagePrefix};

static SCRIPT_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<script [^>]*src=["']([^'"]+)["']"#).expect("valid regex"));
static LEGACY_REQUIRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"dojo\.require\(["']([^'"]+)["']\)"#).expect("valid regex"));

/// Script path that marks where module paths are rooted.
const LOADER_SCRIPT: &str = "dojo/dojo.js";

/// Packages every derived profile maps, whether or not a page names them.
const IMPLIED_PACKAGES: &[&str] = &["dijit", "dojox"];

/// Build a profile from HTML page sources, in page order.
pub fn profile_from_html<'a>(pages: impl IntoIterator<Item = &'a str>) -> BuildProfile {
    let base = BuildProfile::default().base_package;
    let mut layers = PageLayers::new(base);
    for page in pages {
        layers.page(page);
    }
    layers.into_profile()
}

/// Read `paths` and build a profile from them.
pub fn load_profile_from_html<P: AsRef<Path>>(paths: &[P]) -> Result<BuildProfile> {
    let mut pages = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        pages.push(std::fs::read_to_string(path)?);
    }
    let profile = profile_from_html(pages.iter().map(String::as_str));
    tracing::info!(
        pages = paths.len(),
        layers = profile.layers.len(),
        "derived profile from html"
    );
    Ok(profile)
}

struct PageLayers {
    base: String,
    /// Layer id to the layers it excludes.
    layers: IndexMap<String, Vec<String>>,
    packages: IndexSet<String>,
    /// Prefix before the loader script; shared by all pages once seen.
    script_root: String,
}

impl PageLayers {
    fn new(base: String) -> Self {
        Self {
            base,
            layers: IndexMap::new(),
            packages: IMPLIED_PACKAGES.iter().map(|p| (*p).to_string()).collect(),
            script_root: String::new(),
        }
    }

    fn page(&mut self, html: &str) {
        let mut prior = Vec::new();
        for caps in SCRIPT_SRC.captures_iter(html) {
            let src = &caps[1];
            if let Some(at) = src.find(LOADER_SCRIPT) {
                self.script_root = src[..at].to_string();
                continue;
            }
            let relative = src.strip_prefix(self.script_root.as_str()).unwrap_or(src);
            let id = relative.strip_suffix(".js").unwrap_or(relative).replace('/', ".");
            self.add(id, &mut prior);
        }
        for caps in LEGACY_REQUIRE.captures_iter(html) {
            self.add(caps[1].to_string(), &mut prior);
        }
    }

    fn add(&mut self, id: String, prior: &mut Vec<String>) {
        match self.layers.get_mut(&id) {
            Some(excluded) => excluded.retain(|layer| prior.contains(layer)),
            None => {
                self.layers.insert(id.clone(), prior.clone());
            }
        }
        match id.split_once('.') {
            Some((top, _)) if top != self.base => {
                self.packages.insert(top.to_string());
            }
            _ => {}
        }
        prior.push(id);
    }

    fn into_profile(self) -> BuildProfile {
        let layers = self
            .layers
            .iter()
            .map(|(id, excluded)| {
                LayerDecl::new(layer_file(id))
                    .dependencies([id.as_str()])
                    .layer_dependencies(excluded.iter().map(|layer| layer_file(layer)))
            })
            .collect();
        let prefixes = self
            .packages
            .iter()
            .map(|name| PackagePrefix::new(name.as_str(), format!("../{name}")))
            .collect();
        BuildProfile {
            prefixes,
            layers,
            ..BuildProfile::default()
        }
    }
}

/// `app.main` -> `../app/main.js`
fn layer_file(id: &str) -> String {
    format!("../{}.js", id.replace('.', "/"))
}
