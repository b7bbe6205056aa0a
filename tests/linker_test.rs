//! Behavioral tests for the internal link engine

use proptest::prelude::*;
use seo_autolink::linker::{LinkEngine, LinkOptions, LinkStatus, apply_rules, remove_internal_links};

mod common;
use common::{anchor_count, anchors_to, rule};

const U1: &str = "https://shop.test/alpha";
const U2: &str = "https://shop.test/beta";

#[test]
fn test_second_pass_changes_nothing() {
    let rules = vec![rule("alpha", U1), rule("beta", U2)];
    let content = "<p>alpha and beta</p>\n<ul><li>more alpha</li><li>beta again</li></ul>";

    let once = apply_rules(content, &rules);
    let twice = apply_rules(&once, &rules);

    assert_eq!(once, twice);
    assert_eq!(anchors_to(&once, U1), 1);
    assert_eq!(anchors_to(&once, U2), 1);
}

#[test]
fn test_shortcode_and_protected_block_text_stays_unlinked() {
    let rules = vec![rule("keyword", U1)];
    let content = concat!(
        "[note]keyword inside[/note]",
        "<!-- wp:html --><div>keyword in html</div><!-- /wp:html -->",
        "<p>plain prose</p>"
    );
    assert_eq!(apply_rules(content, &rules), content);

    let with_prose = format!("{content}<p>the keyword here</p>");
    let linked = apply_rules(&with_prose, &rules);
    assert!(linked.starts_with(content));
    assert_eq!(anchors_to(&linked, U1), 1);
}

#[test]
fn test_keyword_touching_a_shortcode_is_linked() {
    let rules = vec![rule("alpha", U1)];
    let linked = apply_rules("<p>alpha[note]alpha[/note]</p>", &rules);

    assert_eq!(anchors_to(&linked, U1), 1);
    assert!(linked.starts_with("<p><a "));
    assert!(linked.ends_with(">alpha</a>[note]alpha[/note]</p>"));
}

#[test]
fn test_whole_words_only() {
    let rules = vec![rule("keyword", U1), rule("كلمة", U2)];
    let content = "<p>keywordish text and كلمات كثيرة</p>";
    assert_eq!(apply_rules(content, &rules), content);

    let linked = apply_rules("<p>a keyword, then كلمة.</p>", &rules);
    assert!(linked.contains(">keyword</a>,"));
    assert!(linked.contains(">كلمة</a>."));
}

#[test]
fn test_paragraph_cap_of_one() {
    let engine = LinkEngine::new(LinkOptions::default().with_paragraph_cap(1));
    let rules = vec![rule("alpha", U1), rule("beta", U2)];

    let linked = engine.apply_rules("<p>alpha beta alpha</p><p>beta alpha beta</p>", &rules);

    for paragraph in linked.split("</p>").filter(|p| !p.is_empty()) {
        assert_eq!(anchor_count(paragraph), 1, "in {paragraph:?}");
    }
    assert_eq!(anchors_to(&linked, U1), 1);
    assert_eq!(anchors_to(&linked, U2), 1);
}

#[test]
fn test_unparsable_input_is_returned_as_is() {
    let engine = LinkEngine::default();
    let rules = vec![rule("keyword", U1)];

    for content in [
        "<p>keyword</p><!-- comment never closed",
        "<p>keyword</p><img src=\"broken",
        "<html><body><p>keyword</p></body></html>",
        "<td>keyword</td>",
        "<caption>keyword</caption>",
    ] {
        let outcome = engine.apply_rules_detailed(content, &rules);
        assert_eq!(outcome.content, content);
        assert_eq!(outcome.status, LinkStatus::ParseFailed);
        assert!(outcome.inserted.is_empty());
    }
}

#[test]
fn test_arabic_scenario_with_shortcode() {
    let url = "https://example.com/keyword";
    let rules = vec![rule("كلمة", url)];
    let content = "<p>هذه كلمة خارجية</p>[custom]كلمة[/custom]";

    let linked = apply_rules(content, &rules);

    assert_eq!(anchors_to(&linked, url), 1);
    assert!(linked.starts_with("<p>هذه <a "));
    assert!(linked.ends_with("</p>[custom]كلمة[/custom]"));
}

#[test]
fn test_headings_code_and_existing_links_are_skipped() {
    let rules = vec![rule("alpha", U1)];
    let content = concat!(
        "<h2>alpha heading</h2>",
        "<p><code>alpha()</code> and <a href=\"https://other.test\">alpha</a></p>"
    );
    assert_eq!(apply_rules(content, &rules), content);
}

#[test]
fn test_unlink_then_relink_round() {
    let rules = vec![rule("alpha", U1)];
    let content = "<p>about alpha</p>";

    let linked = apply_rules(content, &rules);
    assert_ne!(linked, content);
    assert_eq!(remove_internal_links(&linked, "https://shop.test"), content);
}

fn arb_paragraphs() -> impl Strategy<Value = String> {
    let word = prop::sample::select(vec!["alpha", "beta", "gamma", "delta", "prose", "text"]);
    let paragraph = prop::collection::vec(word, 1..8).prop_map(|words| words.join(" "));
    let tag = prop::sample::select(vec!["p", "li", "td"]);
    prop::collection::vec((tag, paragraph), 1..6).prop_map(|blocks| {
        blocks
            .into_iter()
            .map(|(tag, text)| match tag {
                "li" => format!("<ul><li>{text}</li></ul>"),
                "td" => format!("<table><tbody><tr><td>{text}</td></tr></tbody></table>"),
                _ => format!("<p>{text}</p>"),
            })
            .collect::<String>()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_linking_is_idempotent(
        content in arb_paragraphs(),
        cap in 0usize..3,
    ) {
        let engine = LinkEngine::new(LinkOptions::default().with_paragraph_cap(cap));
        let rules = vec![
            rule("alpha", U1),
            rule("beta", U2),
            rule("gamma delta", "https://shop.test/gd"),
        ];

        let once = engine.apply_rules(&content, &rules);
        let twice = engine.apply_rules(&once, &rules);

        prop_assert_eq!(&once, &twice);
        for url in [U1, U2, "https://shop.test/gd"] {
            prop_assert!(anchors_to(&once, url) <= 1);
        }
    }

    #[test]
    fn test_suffixed_words_are_never_linked(
        suffix in "[a-z]{1,6}",
        prefix in "[a-z]{1,6}",
    ) {
        let rules = vec![rule("alpha", U1)];
        let content = format!("<p>alpha{suffix} {prefix}alpha</p>");
        prop_assert_eq!(apply_rules(&content, &rules), content);
    }
}
