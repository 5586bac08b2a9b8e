use markdown_it::{
    generics::inline::full_link,
    plugins::cmark::{
        block::{heading::ATXHeading, lheading::SetextHeader},
        inline::autolink::Autolink,
    },
    MarkdownIt,
    Node,
    NodeValue,
    Renderer,
};
use std::sync::OnceLock;

/// Renders article markdown to html. Raw html and images are not supported, and headings are
/// made one level smaller so that they dont compete with the article title.
pub fn render_markdown(text: &str) -> String {
    static INSTANCE: OnceLock<MarkdownIt> = OnceLock::new();
    let mut parsed = INSTANCE.get_or_init(article_markdown).parse(text);

    parsed.walk_mut(|node, _| {
        if let Some(heading) = node.cast_mut::<ATXHeading>() {
            heading.level = (heading.level + 1).min(6);
        }
        if let Some(heading) = node.cast_mut::<SetextHeader>() {
            heading.level = (heading.level + 1).min(6);
        }
        if node.is::<Autolink>() {
            node.attrs.push(("target", "_blank".to_string()));
            node.attrs.push(("rel", "noopener".to_string()));
        }
    });
    parsed.render().trim_end_matches('\n').to_string()
}

fn article_markdown() -> MarkdownIt {
    let mut parser = MarkdownIt::new();
    let p = &mut parser;
    {
        // Image and html are intentionally missing
        use markdown_it::plugins::cmark::inline::*;
        newline::add(p);
        escape::add(p);
        backticks::add(p);
        emphasis::add(p);
        autolink::add(p);
        entity::add(p);
    }
    new_tab_link(p);

    {
        use markdown_it::plugins::cmark::block::*;
        code::add(p);
        fence::add(p);
        blockquote::add(p);
        hr::add(p);
        list::add(p);
        reference::add(p);
        heading::add(p);
        lheading::add(p);
        paragraph::add(p);
    }

    markdown_it::plugins::extra::strikethrough::add(p);

    parser
}

/// Same as `markdown_it::plugins::cmark::inline::link::Link`, but opens in a new tab.
#[derive(Debug)]
struct NewTabLink {
    url: String,
    title: Option<String>,
}

impl NodeValue for NewTabLink {
    fn render(&self, node: &Node, fmt: &mut dyn Renderer) {
        let mut attrs = node.attrs.clone();
        attrs.push(("href", self.url.clone()));
        if let Some(title) = &self.title {
            attrs.push(("title", title.clone()));
        }
        attrs.push(("target", "_blank".to_string()));
        attrs.push(("rel", "noopener".to_string()));

        fmt.open("a", &attrs);
        fmt.contents(&node.children);
        fmt.close("a");
    }
}

fn new_tab_link(md: &mut MarkdownIt) {
    full_link::add::<false>(md, |href, title| {
        Node::new(NewTabLink {
            url: href.unwrap_or_default(),
            title,
        })
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text() {
        assert_eq!("<p>Hello world</p>", render_markdown("Hello world"));
        let escaped = "1 &lt; 2 &amp; 3 &gt; 2";
        assert_eq!(format!("<p>{escaped}</p>"), render_markdown(escaped));
        assert_eq!(format!("<p>{escaped}</p>"), render_markdown("1 < 2 & 3 > 2"));
    }

    #[test]
    fn test_headings_demoted() {
        assert_eq!(
            "<h2>Title</h2>\n<h3>Sub</h3>",
            render_markdown("# Title\n## Sub")
        );
        assert_eq!("<h6>Deep</h6>", render_markdown("###### Deep"));
    }

    #[test]
    fn test_links_open_in_new_tab() {
        assert_eq!(
            r#"<p><a href="https://glitchrealm.ca" target="_blank" rel="noopener">site</a></p>"#,
            render_markdown("[site](https://glitchrealm.ca)")
        );
        let autolink = render_markdown("<https://glitchrealm.ca>");
        assert!(autolink.contains(r#"target="_blank""#), "{autolink}");
        assert!(autolink.contains(r#"rel="noopener""#), "{autolink}");
    }

    #[test]
    fn test_no_raw_html() {
        let html = render_markdown("<script>alert(1)</script>");
        assert!(!html.contains("<script>"), "{html}");
    }

    #[test]
    fn test_no_images() {
        let html = render_markdown("![logo](https://glitchrealm.ca/logo.png)");
        assert!(!html.contains("<img"), "{html}");
    }

    #[test]
    fn test_inline_formatting() {
        assert_eq!(
            "<p><strong>bold</strong> <em>it</em> <code>x</code> <s>gone</s></p>",
            render_markdown("**bold** *it* `x` ~~gone~~")
        );
        assert_eq!(
            "<pre><code class=\"language-rust\">fn main() {}\n</code></pre>",
            render_markdown("```rust\nfn main() {}\n```")
        );
    }
}
