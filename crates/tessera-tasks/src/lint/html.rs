//! HTML linter.
//!
//! A tag-level scan, not a full parser: it sees tags, attributes and the
//! text between them, and skips the bodies of `script`, `style` and
//! `textarea`.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use super::{LineIndex, Violation};

static MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<!--.*?-->|<![^>]*>|<(?P<close>/?)(?P<name>[A-Za-z][^\s/>]*)(?P<attrs>(?:[^>"']|"[^"]*"|'[^']*')*)>"#,
    )
    .expect("markup pattern is valid")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?P<name>[^\s"'>/=]+)(?:\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[^\s"'=<>`]+)))?"#,
    )
    .expect("attribute pattern is valid")
});

static DASH_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z\d]+(-[a-z\d]+)*$").expect("dash pattern is valid"));

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea"];

/// Elements whose `src` must not be empty.
const SRC_ELEMENTS: &[&str] = &[
    "img", "script", "embed", "iframe", "frame", "audio", "video", "source", "track", "input",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Double,
    Single,
    Bare,
    Missing,
}

#[derive(Debug)]
struct Attribute<'a> {
    name: &'a str,
    value: &'a str,
    quote: Quote,
}

fn parse_attributes(raw: &str) -> Vec<Attribute<'_>> {
    ATTRIBUTE
        .captures_iter(raw)
        .filter_map(|caps| {
            let name = caps.name("name")?.as_str();
            let (value, quote) = if let Some(v) = caps.name("dq") {
                (v.as_str(), Quote::Double)
            } else if let Some(v) = caps.name("sq") {
                (v.as_str(), Quote::Single)
            } else if let Some(v) = caps.name("bare") {
                (v.as_str(), Quote::Bare)
            } else {
                ("", Quote::Missing)
            };
            Some(Attribute { name, value, quote })
        })
        .collect()
}

struct HtmlLinter {
    index: LineIndex,
    violations: Vec<Violation>,
    open: Vec<(String, usize)>,
    ids: HashMap<String, usize>,
}

/// Lint an HTML document.
pub fn lint(source: &str) -> Vec<Violation> {
    let mut linter = HtmlLinter {
        index: LineIndex::new(source),
        violations: Vec::new(),
        open: Vec::new(),
        ids: HashMap::new(),
    };

    let mut pos = 0;
    while pos < source.len() {
        let Some(caps) = MARKUP.captures_at(source, pos) else {
            linter.check_text(&source[pos..], pos);
            break;
        };
        let Some(whole) = caps.get(0) else { break };

        linter.check_text(&source[pos..whole.start()], pos);
        pos = whole.end();

        let Some(name) = caps.name("name") else {
            continue;
        };
        let line = linter.index.line(whole.start());
        let closing = caps.name("close").is_some_and(|c| !c.as_str().is_empty());

        if closing {
            linter.close_tag(name.as_str(), line);
            continue;
        }

        let attrs = caps.name("attrs").map_or("", |a| a.as_str());
        let self_closed = attrs.trim_end().ends_with('/');
        linter.open_tag(name.as_str(), attrs, self_closed, line);

        let lower = name.as_str().to_ascii_lowercase();
        if RAW_TEXT_ELEMENTS.contains(&lower.as_str()) && !self_closed {
            let end_tag = format!("</{}", lower);
            pos = match source[pos..].to_ascii_lowercase().find(&end_tag) {
                Some(offset) => pos + offset,
                None => source.len(),
            };
        }
    }

    linter.finish()
}

impl HtmlLinter {
    fn push(&mut self, rule: &'static str, line: usize, message: String) {
        self.violations.push(Violation::new(rule, line, message));
    }

    fn check_text(&mut self, text: &str, offset: usize) {
        if let Some(i) = text.find(['<', '>']) {
            let line = self.index.line(offset + i);
            self.push(
                "spec-char-escape",
                line,
                "Special characters must be escaped".to_string(),
            );
        }
    }

    fn open_tag(&mut self, name: &str, raw_attrs: &str, self_closed: bool, line: usize) {
        let lower = name.to_ascii_lowercase();

        if name != lower {
            self.push(
                "tagname-lowercase",
                line,
                format!("The html element name of [ {} ] must be in lowercase", name),
            );
        }

        if lower == "style" {
            self.push("style-disabled", line, "<style> tags cannot be used".to_string());
        }

        let attrs = parse_attributes(raw_attrs.trim_end().trim_end_matches('/'));
        let mut seen = HashSet::new();

        for attr in &attrs {
            let attr_lower = attr.name.to_ascii_lowercase();

            if !seen.insert(attr_lower.clone()) {
                self.push(
                    "attr-no-duplication",
                    line,
                    format!("Duplicate of attribute name [ {} ] was found", attr.name),
                );
            }

            if attr.name != attr_lower {
                self.push(
                    "attr-lowercase",
                    line,
                    format!("The attribute name of [ {} ] must be in lowercase", attr.name),
                );
            }

            match attr.quote {
                Quote::Single | Quote::Bare => self.push(
                    "attr-value-double-quotes",
                    line,
                    format!(
                        "The value of attribute [ {} ] must be in double quotes",
                        attr.name
                    ),
                ),
                Quote::Missing => self.push(
                    "attr-value-not-empty",
                    line,
                    format!("The attribute [ {} ] must have a value", attr.name),
                ),
                Quote::Double => {}
            }

            match attr_lower.as_str() {
                "id" => {
                    self.check_id_class("id", attr.value, line);
                    if !attr.value.is_empty() {
                        if let Some(first) = self.ids.get(attr.value).copied() {
                            self.push(
                                "id-unique",
                                line,
                                format!(
                                    "The id value [ {} ] must be unique (first used on line {})",
                                    attr.value, first
                                ),
                            );
                        } else {
                            self.ids.insert(attr.value.to_string(), line);
                        }
                    }
                }
                "class" => {
                    for class in attr.value.split_whitespace() {
                        self.check_id_class("class", class, line);
                    }
                }
                _ => {}
            }
        }

        let attr_value = |wanted: &str| {
            attrs
                .iter()
                .find(|a| a.name.eq_ignore_ascii_case(wanted))
                .map(|a| a.value)
        };

        let empty_ref = match lower.as_str() {
            "link" => attr_value("href").filter(|v| v.trim().is_empty()).map(|_| "href"),
            "object" => attr_value("data").filter(|v| v.trim().is_empty()).map(|_| "data"),
            tag if SRC_ELEMENTS.contains(&tag) => {
                attr_value("src").filter(|v| v.trim().is_empty()).map(|_| "src")
            }
            _ => None,
        };
        if let Some(attr) = empty_ref {
            self.push(
                "src-not-empty",
                line,
                format!("The attribute [ {} ] of the tag [ {} ] must have a value", attr, lower),
            );
        }

        let needs_alt = match lower.as_str() {
            "img" => true,
            "area" => attr_value("href").is_some(),
            "input" => attr_value("type").is_some_and(|t| t.eq_ignore_ascii_case("image")),
            _ => false,
        };
        if needs_alt && attr_value("alt").is_none() {
            self.push(
                "alt-require",
                line,
                format!("An alt attribute must be present on <{}> elements", lower),
            );
        }

        if !self_closed && !VOID_ELEMENTS.contains(&lower.as_str()) {
            self.open.push((lower, line));
        }
    }

    fn check_id_class(&mut self, attr: &str, value: &str, line: usize) {
        if !value.is_empty() && !DASH_VALUE.is_match(value) {
            self.push(
                "id-class-value",
                line,
                format!(
                    "The {} value [ {} ] must be lowercase words separated by dashes",
                    attr, value
                ),
            );
        }
    }

    fn close_tag(&mut self, name: &str, line: usize) {
        let lower = name.to_ascii_lowercase();
        if VOID_ELEMENTS.contains(&lower.as_str()) {
            return;
        }

        match self.open.iter().rposition(|(open, _)| *open == lower) {
            Some(i) => {
                let unclosed: Vec<(String, usize)> = self.open.drain(i..).skip(1).collect();
                for (tag, open_line) in unclosed {
                    self.push(
                        "tag-pair",
                        open_line,
                        format!("Tag must be paired, missing: [ </{}> ] before line {}", tag, line),
                    );
                }
            }
            None => self.push(
                "tag-pair",
                line,
                format!("Tag must be paired, no start tag: [ </{}> ]", lower),
            ),
        }
    }

    fn finish(mut self) -> Vec<Violation> {
        let unclosed = std::mem::take(&mut self.open);
        for (tag, line) in unclosed {
            self.push(
                "tag-pair",
                line,
                format!("Tag must be paired, missing: [ </{}> ]", tag),
            );
        }
        self.violations.sort_by_key(|v| v.line);
        self.violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rules(source: &str) -> Vec<&'static str> {
        lint(source).into_iter().map(|v| v.rule).collect()
    }

    #[test]
    fn clean_document_has_no_violations() {
        let html = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <link rel="stylesheet" href="css/main.css">
  <!-- comment with <b> inside -->
</head>
<body>
  <div id="page" class="page-wrap main">
    <img src="img/logo.png" alt="">
    <script>if (a < b && c > d) {}</script>
  </div>
</body>
</html>
"#;
        assert_eq!(lint(html), vec![]);
    }

    #[test]
    fn reports_missing_alt_and_empty_src() {
        assert_eq!(
            rules(r#"<img src="">"#),
            vec!["src-not-empty", "alt-require"]
        );
    }

    #[test]
    fn reports_unclosed_and_stray_tags() {
        let violations = lint("<div>\n<span>\n</div>\n</p>\n");
        let tag_pairs: Vec<usize> = violations
            .iter()
            .filter(|v| v.rule == "tag-pair")
            .map(|v| v.line)
            .collect();
        assert_eq!(tag_pairs, vec![2, 4]);
    }

    #[test]
    fn reports_attribute_problems() {
        let found = rules(r#"<input type='text' DISABLED value=x disabled>"#);
        assert!(found.contains(&"attr-value-double-quotes"));
        assert!(found.contains(&"attr-lowercase"));
        assert!(found.contains(&"attr-value-not-empty"));
        assert!(found.contains(&"attr-no-duplication"));
    }

    #[test]
    fn reports_duplicate_ids_with_line() {
        let violations = lint("<p id=\"a\"></p>\n<p id=\"a\"></p>");
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, "id-unique");
        assert_eq!(violations[0].line, 2);
    }

    #[test]
    fn reports_style_tags_and_unescaped_text() {
        assert_eq!(
            rules("<style>p { color: red; }</style>\n<p>a > b</p>"),
            vec!["style-disabled", "spec-char-escape"]
        );
    }

    #[test]
    fn reports_uppercase_tags_and_bad_class_names() {
        let found = rules(r#"<DIV class="mainNav"></DIV>"#);
        assert!(found.contains(&"tagname-lowercase"));
        assert!(found.contains(&"id-class-value"));
    }
}
