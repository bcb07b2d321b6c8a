use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Strip markup, decode entities and collapse whitespace.
///
/// Passes repeat until nothing changes, so entity-encoded tags (`&lt;b&gt;`)
/// are removed too and the result is a fixed point of `normalize`.
pub fn normalize(markup: &str) -> String {
    let mut current = clean_once(markup);
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_once(text: &str) -> String {
    let stripped = TAG_RE.replace_all(text, " ");
    let decoded = html_escape::decode_html_entities(&stripped);
    SPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_entities() {
        let raw = concat!(
            "<p><strong>Требования:</strong></p>",
            "<ul><li>SQL &amp; Python</li>\n<li>BPMN&nbsp;2.0</li></ul>",
        );
        assert_eq!(normalize(raw), "Требования: SQL & Python BPMN 2.0");
    }

    #[test]
    fn empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("  <br/>\n\t "), "");
    }

    #[test]
    fn tags_become_word_breaks() {
        assert_eq!(normalize("one<br>two"), "one two");
    }

    #[test]
    fn idempotent_on_encoded_markup() {
        let samples = [
            "&lt;b&gt;bold&lt;/b&gt; text",
            "&amp;lt;i&amp;gt;twice&amp;lt;/i&amp;gt;",
            "a &lt; b and c &gt; d",
            "plain   text\r\nwith\u{a0}spaces",
            "<div>Опыт &laquo;от 3 лет&raquo;</div>",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn escaped_angle_brackets_are_read_as_a_tag() {
        // decoded `<3 лет, SQL >` looks like markup on the next pass
        let text = "опыт &lt;3 лет, SQL &gt; 100";
        assert_eq!(normalize(text), "опыт 100");
        assert_eq!(normalize("a &lt; b"), "a < b");
    }

    #[test]
    fn fixture_description() {
        let html = std::fs::read_to_string("tests/fixtures/description_analyst.html")
            .unwrap();
        let text = normalize(&html);
        assert!(!text.contains('<'));
        assert!(!text.contains("  "));
        assert!(text.contains("BPMN"));
        assert!(text.contains("гибридный"));
    }
}
