use dulai_engine::{
    extract_hyperlinks, extract_visible_text, format_hyperlinks, select_top_links, Hyperlink,
    TOP_LINKS,
};
use pretty_assertions::assert_eq;

#[test]
fn script_and_style_text_is_removed() {
    assert_eq!(
        extract_visible_text("Hello <script>x</script> World"),
        "Hello  World"
    );

    let html = r#"<html><head><style>p { color: red }</style><title>T</title></head>
<body><p>Visible</p><style>.x{}</style><noscript>enable js</noscript><script>var a = 1;</script><p>Also</p></body></html>"#;
    assert_eq!(extract_visible_text(html), "VisibleAlso");
}

#[test]
fn links_resolve_against_the_page_url() {
    let html = r##"<body>
        <a href="/docs">Docs</a>
        <a href="https://other.example/a?b=1">  Other
            site </a>
        <a href="#top">Top</a>
        <a href="javascript:void(0)">Click</a>
        <a href="mailto:me@example.com">Mail</a>
    </body>"##;

    let links = extract_hyperlinks(html, Some("https://example.com/blog/post"));

    assert_eq!(
        links,
        vec![
            Hyperlink::new("Docs", "https://example.com/docs"),
            Hyperlink::new("Other site", "https://other.example/a?b=1"),
            Hyperlink::new("Mail", "mailto:me@example.com"),
        ]
    );
}

#[test]
fn relative_links_without_base_are_dropped() {
    let links = extract_hyperlinks(r#"<a href="/x">X</a><a href="http://y.example">Y</a>"#, None);
    assert_eq!(links, vec![Hyperlink::new("Y", "http://y.example/")]);
}

#[test]
fn top_links_policy() {
    let links = vec![
        Hyperlink::new("", "https://a.example/empty-text"),
        Hyperlink::new("Mail", "mailto:me@example.com"),
        Hyperlink::new("One", "https://a.example/1"),
        Hyperlink::new("One again", "https://a.example/1"),
        Hyperlink::new("Two", "https://a.example/2"),
        Hyperlink::new("Three", "http://a.example/3"),
        Hyperlink::new("Four", "https://a.example/4"),
        Hyperlink::new("Five", "https://a.example/5"),
        Hyperlink::new("Six", "https://a.example/6"),
    ];

    let top = select_top_links(&links, TOP_LINKS);

    assert_eq!(
        format_hyperlinks(&top),
        vec![
            "One (https://a.example/1)",
            "Two (https://a.example/2)",
            "Three (http://a.example/3)",
            "Four (https://a.example/4)",
            "Five (https://a.example/5)",
        ]
    );
}
