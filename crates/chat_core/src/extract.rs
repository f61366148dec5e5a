//! HTML からテキストを抜き出す
//!
//! 決められたノード種別の順番でテキストを連結するだけで、区切り文字は入れない。
//! script / style / meta など画面に出ない要素も含める。この順序と対象は
//! 既存の出力と互換を取るために固定している。

use lazy_static::lazy_static;
use scraper::{Html, Selector};

/// 連結順。見出しはレベル1〜6をまとめて文書順に扱う。
pub const NODE_CLASSES: [&str; 13] = [
    "p",
    "span",
    "h1, h2, h3, h4, h5, h6",
    "a",
    "img",
    "ul, ol",
    "table",
    "form",
    "script",
    "style",
    "meta",
    "title",
    "head",
];

lazy_static! {
    static ref SELECTORS: Vec<Selector> = NODE_CLASSES
        .iter()
        .map(|css| Selector::parse(css).expect("static selector must parse"))
        .collect();
}

/// パース済みドキュメントからテキストを抽出する。
/// 存在しないノード種別の寄与は空文字列。
pub fn extract(document: &Html) -> String {
    let mut out = String::new();
    for selector in SELECTORS.iter() {
        for element in document.select(selector) {
            for text in element.text() {
                out.push_str(text);
            }
        }
    }
    out
}

/// 生の HTML 文字列をパースして [`extract`] する。
/// `Html` は `Send` ではないので、await をまたがずにここで使い切る。
pub fn extract_text(body: &str) -> String {
    let document = Html::parse_document(body);
    extract(&document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_classes_are_concatenated_in_fixed_order() {
        // 文書上の並びとは逆順に置いて、出力が種別順になることを確認
        let html = r#"<html><head><title>TITLE</title><meta name="x" content="ignored"><style>STYLE</style><script>SCRIPT</script></head>
            <body>
              <form><label>FORM</label></form>
              <table><tr><td>TABLE</td></tr></table>
              <ul><li>LIST</li></ul>
              <img src="x.png" alt="IMGALT">
              <a href="/">LINK</a>
              <h3>HEADING</h3>
              <span>SPAN</span>
              <p>PARA</p>
            </body></html>"#;
        let text = extract_text(html);

        let markers = ["PARA", "SPAN", "HEADING", "LINK", "LIST", "TABLE", "FORM", "SCRIPT", "STYLE", "TITLE"];
        let mut last = 0;
        for m in markers {
            let pos = text[last..].find(m).map(|p| p + last).unwrap_or_else(|| panic!("{m} missing or out of order in {text:?}"));
            last = pos + m.len();
        }
        // head 要素の中身 (title/style/script) が最後にもう一度現れる
        assert!(text.ends_with("TITLESTYLESCRIPT"), "got {text:?}");
        // img/meta はテキストを持たないので属性値は出てこない
        assert!(!text.contains("IMGALT"));
        assert!(!text.contains("ignored"));
    }

    #[test]
    fn nested_nodes_are_counted_for_every_matching_class() {
        let text = extract_text("<p>a<span>b</span></p>");
        assert_eq!(text, "abb");
    }

    #[test]
    fn headings_follow_document_order() {
        let text = extract_text("<h2>two</h2><h1>one</h1><h6>six</h6>");
        assert_eq!(text, "twoonesix");
    }

    #[test]
    fn empty_document_yields_empty_string() {
        assert_eq!(extract_text(""), "");
        assert_eq!(extract_text("<div>only a div</div>"), "");
    }

    #[test]
    fn extraction_is_deterministic() {
        let html = "<p>same</p><a>link</a><script>var x = 1;</script>";
        assert_eq!(extract_text(html), extract_text(html));
    }
}
