//! Page metadata tags: verification, prefetch, sitemap, stylesheet and feed links.
//!
//! Recognized options: `root_url` (links are placed under its path) and
//! `sitemap_title`.

use anyhow::bail;
use async_trait::async_trait;

use super::{escape_attr, join_under_root};
use crate::domain::errors::EngineResult;
use crate::domain::models::{DirtyFlag, Metadata, Options};
use crate::domain::ports::{ElementReplacer, HandlerContext, TreeMutator};
use crate::infrastructure::dom::{Document, Element};
use crate::services::handler_group::{HandlerGroup, Member};

pub const GROUP_NAME: &str = "metadata";

/// Build the metadata group.
pub fn group(options: Options) -> EngineResult<HandlerGroup> {
    let mut group = HandlerGroup::new(GROUP_NAME, options);
    group
        .add(Member::replacer(SiteVerification))?
        .add(Member::replacer(DnsPrefetch))?
        .add(Member::replacer(XmlSitemap))?
        .add(Member::replacer(ExternalStylesheet))?
        .add(Member::replacer(RssHeaderMeta))?
        .add(Member::mutator(BodyAddClass))?;
    Ok(group)
}

fn root_relative(ctx: &HandlerContext<'_>, href: &str) -> String {
    match ctx.options().get_str("root_url") {
        Some(root_url) => join_under_root(root_url, href),
        None => href.to_string(),
    }
}

/// `<site-verification google="...">` becomes the Google verification meta tag.
pub struct SiteVerification;

#[async_trait(?Send)]
impl ElementReplacer for SiteVerification {
    fn element_name(&self) -> &str {
        "site-verification"
    }

    async fn process(
        &self,
        element: &Element,
        _metadata: &mut Metadata,
        _dirty: &DirtyFlag,
        _ctx: &HandlerContext<'_>,
    ) -> anyhow::Result<Option<String>> {
        let mut out = String::new();
        if let Some(google) = element.non_empty_attr("google") {
            out.push_str(&format!(
                r#"<meta name="google-site-verification" content="{}">"#,
                escape_attr(&google)
            ));
        }
        Ok(Some(out))
    }
}

/// `<dns-prefetch control="on" dnslist="a,b">`
pub struct DnsPrefetch;

#[async_trait(?Send)]
impl ElementReplacer for DnsPrefetch {
    fn element_name(&self) -> &str {
        "dns-prefetch"
    }

    async fn process(
        &self,
        element: &Element,
        _metadata: &mut Metadata,
        _dirty: &DirtyFlag,
        _ctx: &HandlerContext<'_>,
    ) -> anyhow::Result<Option<String>> {
        let control = element.non_empty_attr("control");
        let dnslist = element.non_empty_attr("dnslist");

        let dnslist = match (&control, dnslist) {
            (None, None) => bail!("No control and no dnslist parameters"),
            (_, None) => bail!("No dnslist parameters"),
            (_, Some(list)) => list,
        };

        let mut out = String::new();
        if let Some(control) = control {
            out.push_str(&format!(
                r#"<meta http-equiv="x-dns-prefetch-control" content="{}">"#,
                escape_attr(&control)
            ));
        }
        for host in dnslist.split(',').map(str::trim).filter(|h| !h.is_empty()) {
            out.push_str(&format!(
                r#"<link rel="dns-prefetch" href="{}">"#,
                escape_attr(host)
            ));
        }
        Ok(Some(out))
    }
}

/// `<xml-sitemap href="..." title="...">`, both optional.
pub struct XmlSitemap;

#[async_trait(?Send)]
impl ElementReplacer for XmlSitemap {
    fn element_name(&self) -> &str {
        "xml-sitemap"
    }

    async fn process(
        &self,
        element: &Element,
        _metadata: &mut Metadata,
        _dirty: &DirtyFlag,
        ctx: &HandlerContext<'_>,
    ) -> anyhow::Result<Option<String>> {
        let href = element
            .non_empty_attr("href")
            .unwrap_or_else(|| "/sitemap.xml".to_string());
        let href = root_relative(ctx, &href);

        let title = element
            .non_empty_attr("title")
            .or_else(|| ctx.options().get_str("sitemap_title").map(str::to_string))
            .unwrap_or_else(|| "Sitemap".to_string());

        Ok(Some(format!(
            r#"<link rel="sitemap" type="application/xml" href="{}" title="{}">"#,
            escape_attr(&href),
            escape_attr(&title)
        )))
    }
}

/// `<external-stylesheet href="..." media="...">`
pub struct ExternalStylesheet;

#[async_trait(?Send)]
impl ElementReplacer for ExternalStylesheet {
    fn element_name(&self) -> &str {
        "external-stylesheet"
    }

    async fn process(
        &self,
        element: &Element,
        _metadata: &mut Metadata,
        _dirty: &DirtyFlag,
        _ctx: &HandlerContext<'_>,
    ) -> anyhow::Result<Option<String>> {
        let Some(href) = element.non_empty_attr("href") else {
            bail!("No href supplied");
        };
        let media = element
            .non_empty_attr("media")
            .map(|media| format!(r#" media="{}""#, escape_attr(&media)))
            .unwrap_or_default();

        Ok(Some(format!(
            r#"<link rel="stylesheet" type="text/css" href="{}"{media}>"#,
            escape_attr(&href)
        )))
    }
}

/// `<rss-header-meta href="...">` becomes an RSS alternate link.
pub struct RssHeaderMeta;

#[async_trait(?Send)]
impl ElementReplacer for RssHeaderMeta {
    fn element_name(&self) -> &str {
        "rss-header-meta"
    }

    async fn process(
        &self,
        element: &Element,
        _metadata: &mut Metadata,
        _dirty: &DirtyFlag,
        ctx: &HandlerContext<'_>,
    ) -> anyhow::Result<Option<String>> {
        let Some(href) = element.non_empty_attr("href") else {
            bail!("No href in rss-header-meta tag");
        };
        Ok(Some(format!(
            r#"<link rel="alternate" type="application/rss+xml" href="{}">"#,
            escape_attr(&root_relative(ctx, &href))
        )))
    }
}

/// `<body-add-class class="...">` adds the class to `body` and removes itself.
///
/// Documents without a `body` are left untouched.
pub struct BodyAddClass;

#[async_trait(?Send)]
impl TreeMutator for BodyAddClass {
    fn selector(&self) -> &str {
        "body-add-class"
    }

    async fn process(
        &self,
        doc: &mut Document,
        element: &Element,
        _metadata: &mut Metadata,
        _dirty: &DirtyFlag,
        _ctx: &HandlerContext<'_>,
    ) -> anyhow::Result<()> {
        let Some(body) = doc.body() else {
            return Ok(());
        };
        let Some(class_name) = element.non_empty_attr("class") else {
            bail!("No class in body-add-class tag");
        };
        body.add_class(&class_name);
        doc.remove(element);
        Ok(())
    }
}
