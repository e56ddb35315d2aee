//! Minimal XPath evaluation over a parsed HTML document.
//!
//! Templates written for the original engine use a small, regular slice
//! of XPath: absolute and descendant paths, name tests, attribute
//! predicates, positional indexes, and `text()` / `@attr` terminals.
//! This module evaluates exactly that slice against `scraper`'s DOM;
//! anything outside it fails the variant, and the parser falls through
//! to the next selector.
//!
//! Supported grammar:
//! `('/'|'//') step ( ('/'|'//') step )* ( '/' ('text()'|'@name') )?`
//! where a step is `name | *` with optional `[@attr]`, `[@attr='v']`,
//! or `[n]` predicates.

use scraper::{ElementRef, Html};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone)]
enum Predicate {
    AttrExists(String),
    AttrEquals(String, String),
    /// 1-based position among the step's matches
    Position(usize),
}

#[derive(Debug, Clone)]
struct Step {
    axis: Axis,
    /// None means `*`
    name: Option<String>,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Terminal {
    Node,
    Text,
    Attribute(String),
}

#[derive(Debug)]
struct Path {
    steps: Vec<Step>,
    terminal: Terminal,
}

/// Evaluate an XPath expression, returning the string value of every
/// match in document order.
pub fn evaluate(html: &Html, expr: &str) -> Result<Vec<String>, String> {
    let path = parse(expr)?;
    let root = html.root_element();
    let matches = select(root, &path.steps);

    Ok(matches
        .into_iter()
        .filter_map(|el| match &path.terminal {
            Terminal::Node | Terminal::Text => {
                let text = el.text().collect::<String>().trim().to_string();
                (!text.is_empty()).then_some(text)
            }
            Terminal::Attribute(name) => el.attr(name).map(str::to_string),
        })
        .collect())
}

/// Evaluate and return matching elements' inner HTML (for body extraction).
pub fn evaluate_html(html: &Html, expr: &str) -> Result<Vec<String>, String> {
    let path = parse(expr)?;
    if path.terminal != Terminal::Node {
        return Err(format!("expression '{expr}' does not select elements"));
    }
    let root = html.root_element();
    Ok(select(root, &path.steps)
        .into_iter()
        .map(|el| el.html())
        .collect())
}

fn select<'a>(root: ElementRef<'a>, steps: &[Step]) -> Vec<ElementRef<'a>> {
    let mut current = vec![root];
    for step in steps {
        let mut next: Vec<ElementRef<'a>> = Vec::new();
        for el in &current {
            let candidates: Vec<ElementRef<'a>> = match step.axis {
                Axis::Child => el
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|c| name_matches(c, step.name.as_deref()))
                    .collect(),
                Axis::Descendant => el
                    .descendants()
                    .skip(1)
                    .filter_map(ElementRef::wrap)
                    .filter(|c| name_matches(c, step.name.as_deref()))
                    .collect(),
            };
            next.extend(apply_predicates(candidates, &step.predicates));
        }
        // Dedup while preserving document order; descendant axes from
        // nested contexts can yield the same element twice
        let mut seen = Vec::new();
        next.retain(|el| {
            let id = el.id();
            if seen.contains(&id) {
                false
            } else {
                seen.push(id);
                true
            }
        });
        current = next;
        if current.is_empty() {
            break;
        }
    }
    current
}

fn name_matches(el: &ElementRef<'_>, name: Option<&str>) -> bool {
    name.map_or(true, |n| el.value().name().eq_ignore_ascii_case(n))
}

fn apply_predicates<'a>(
    mut candidates: Vec<ElementRef<'a>>,
    predicates: &[Predicate],
) -> Vec<ElementRef<'a>> {
    for pred in predicates {
        candidates = match pred {
            Predicate::AttrExists(attr) => candidates
                .into_iter()
                .filter(|el| el.attr(attr).is_some())
                .collect(),
            Predicate::AttrEquals(attr, value) => candidates
                .into_iter()
                .filter(|el| el.attr(attr) == Some(value.as_str()))
                .collect(),
            Predicate::Position(n) => candidates
                .into_iter()
                .nth(n.saturating_sub(1))
                .into_iter()
                .collect(),
        };
    }
    candidates
}

fn parse(expr: &str) -> Result<Path, String> {
    let expr = expr.trim();
    if !expr.starts_with('/') {
        return Err(format!("not an absolute XPath: '{expr}'"));
    }

    let mut steps = Vec::new();
    let mut terminal = Terminal::Node;
    let mut rest = expr;

    while !rest.is_empty() {
        let axis = if let Some(r) = rest.strip_prefix("//") {
            rest = r;
            Axis::Descendant
        } else if let Some(r) = rest.strip_prefix('/') {
            rest = r;
            Axis::Child
        } else {
            return Err(format!("expected '/' in '{expr}'"));
        };

        let (token, remainder) = take_step(rest);
        rest = remainder;

        if token.is_empty() {
            return Err(format!("empty step in '{expr}'"));
        }
        if token == "text()" {
            terminal = Terminal::Text;
            break;
        }
        if let Some(attr) = token.strip_prefix('@') {
            terminal = Terminal::Attribute(attr.to_string());
            break;
        }

        steps.push(parse_step(axis, token)?);
    }

    if !rest.is_empty() {
        return Err(format!("trailing content after terminal in '{expr}'"));
    }
    if steps.is_empty() {
        return Err(format!("no element steps in '{expr}'"));
    }
    Ok(Path { steps, terminal })
}

/// Take one step token, honoring brackets (predicates may contain '/').
fn take_step(input: &str) -> (&str, &str) {
    let mut depth = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => return (&input[..i], &input[i..]),
            _ => {}
        }
    }
    (input, "")
}

fn parse_step(axis: Axis, token: &str) -> Result<Step, String> {
    let (name_part, mut rest) = match token.find('[') {
        Some(idx) => (&token[..idx], &token[idx..]),
        None => (token, ""),
    };

    let name = match name_part {
        "*" => None,
        "" => return Err(format!("step with no name test: '{token}'")),
        n => Some(n.to_lowercase()),
    };

    let mut predicates = Vec::new();
    while let Some(stripped) = rest.strip_prefix('[') {
        let end = stripped
            .find(']')
            .ok_or_else(|| format!("unclosed predicate in '{token}'"))?;
        let body = &stripped[..end];
        rest = &stripped[end + 1..];
        predicates.push(parse_predicate(body)?);
    }

    Ok(Step {
        axis,
        name,
        predicates,
    })
}

fn parse_predicate(body: &str) -> Result<Predicate, String> {
    let body = body.trim();
    if let Ok(n) = body.parse::<usize>() {
        if n == 0 {
            return Err("XPath positions are 1-based".to_string());
        }
        return Ok(Predicate::Position(n));
    }
    let Some(attr_expr) = body.strip_prefix('@') else {
        return Err(format!("unsupported predicate '[{body}]'"));
    };
    match attr_expr.split_once('=') {
        None => Ok(Predicate::AttrExists(attr_expr.trim().to_string())),
        Some((attr, value)) => {
            let value = value
                .trim()
                .trim_matches(|c| c == '\'' || c == '"')
                .to_string();
            Ok(Predicate::AttrEquals(attr.trim().to_string(), value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
        <html><body>
          <div id="main" class="article">
            <h1>Headline</h1>
            <p>first</p>
            <p>second</p>
            <img src="/a.png">
            <img src="/b.png">
          </div>
          <div class="sidebar"><p>aside</p></div>
        </body></html>
    "#;

    fn doc() -> Html {
        Html::parse_document(DOC)
    }

    #[test]
    fn descendant_name_test() {
        let out = evaluate(&doc(), "//h1").unwrap();
        assert_eq!(out, vec!["Headline"]);
    }

    #[test]
    fn attribute_equals_predicate() {
        let out = evaluate(&doc(), "//div[@id='main']/h1").unwrap();
        assert_eq!(out, vec!["Headline"]);
        let none = evaluate(&doc(), "//div[@id='other']/h1").unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn positional_predicate_is_one_based() {
        let out = evaluate(&doc(), "//div[@id='main']/p[2]").unwrap();
        assert_eq!(out, vec!["second"]);
    }

    #[test]
    fn attribute_terminal() {
        let out = evaluate(&doc(), "//div[@id='main']//img/@src").unwrap();
        assert_eq!(out, vec!["/a.png", "/b.png"]);
    }

    #[test]
    fn text_terminal() {
        let out = evaluate(&doc(), "//div[@class='sidebar']/p/text()").unwrap();
        assert_eq!(out, vec!["aside"]);
    }

    #[test]
    fn element_html_extraction() {
        let out = evaluate_html(&doc(), "//div[@id='main']").unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].contains("<h1>Headline</h1>"));
    }

    #[test]
    fn unsupported_expressions_error_cleanly() {
        assert!(evaluate(&doc(), "h1").is_err());
        assert!(evaluate(&doc(), "//div[contains(@class, 'x')]").is_err());
        assert!(evaluate_html(&doc(), "//img/@src").is_err());
    }
}
