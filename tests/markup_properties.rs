/// Property checks for the markup parser and renderers.
use livemud::markup::{
    escape, parse, parse_or_plain, plain_text, to_markup, Color, Segment, MAX_DEPTH,
};
use proptest::prelude::*;

/// Authored markup, kept as a tree so the expected result is known.
#[derive(Debug, Clone)]
enum Authored {
    Text(String),
    Tag {
        color: Option<Color>,
        bold: bool,
        italic: bool,
        children: Vec<Authored>,
    },
}

impl Authored {
    fn render(&self, out: &mut String) {
        match self {
            Authored::Text(text) => out.push_str(&escape(text)),
            Authored::Tag {
                color,
                bold,
                italic,
                children,
            } => {
                let mut parts: Vec<&str> = Vec::new();
                if *italic {
                    parts.push("i");
                }
                if let Some(color) = color {
                    parts.push(color.name());
                }
                if *bold {
                    parts.push("bold");
                }
                out.push('<');
                out.push_str(&parts.join(":"));
                out.push('>');
                for child in children {
                    child.render(out);
                }
                out.push_str("</>");
            }
        }
    }

    /// Literal text runs with the style each should end up in.
    fn runs(&self, color: Color, bold: bool, italic: bool, out: &mut Vec<(String, Color, bool, bool)>) {
        match self {
            Authored::Text(text) => out.push((text.clone(), color, bold, italic)),
            Authored::Tag {
                color: inner,
                bold: b,
                italic: i,
                children,
            } => {
                for child in children {
                    child.runs(inner.unwrap_or(color), bold || *b, italic || *i, out);
                }
            }
        }
    }
}

fn tag_style() -> impl Strategy<Value = (Option<Color>, bool, bool)> {
    (
        prop::option::of(prop::sample::select(Color::ALL.to_vec())),
        any::<bool>(),
        any::<bool>(),
    )
        // A tag needs at least one part.
        .prop_map(|(color, bold, italic)| {
            let bold = bold || (color.is_none() && !italic);
            (color, bold, italic)
        })
}

fn authored() -> impl Strategy<Value = Vec<Authored>> {
    let leaf = "[a-z <>:/\\\\\"]{1,6}".prop_map(Authored::Text);
    let node = leaf.prop_recursive(MAX_DEPTH as u32 - 1, 96, 4, |inner| {
        (tag_style(), prop::collection::vec(inner, 0..4)).prop_map(
            |((color, bold, italic), children)| Authored::Tag {
                color,
                bold,
                italic,
                children,
            },
        )
    });
    prop::collection::vec(node, 1..4)
}

fn render_all(nodes: &[Authored]) -> String {
    let mut out = String::new();
    for node in nodes {
        node.render(&mut out);
    }
    out
}

fn styled(segments: &[Segment]) -> Vec<(String, Color, bool, bool)> {
    segments
        .iter()
        .map(|s| (s.text.clone(), s.color, s.modifiers.bold, s.modifiers.italic))
        .collect()
}

proptest! {
    #[test]
    fn escaped_text_renders_verbatim(raw in "\\PC*") {
        let segments = parse(&escape(&raw)).unwrap();
        prop_assert_eq!(plain_text(&segments), raw);
    }

    #[test]
    fn tagged_markup_keeps_its_text_and_styles(nodes in authored()) {
        let markup = render_all(&nodes);
        let segments = parse(&markup).unwrap();

        let mut expected = Vec::new();
        for node in &nodes {
            node.runs(Color::Default, false, false, &mut expected);
        }
        let literal: String = expected.iter().map(|run| run.0.as_str()).collect();
        prop_assert_eq!(plain_text(&segments), literal);

        // Same style run by run, once adjacent equal styles are merged.
        let mut merged: Vec<(String, Color, bool, bool)> = Vec::new();
        for (text, color, bold, italic) in expected {
            match merged.last_mut() {
                Some(last) if (last.1, last.2, last.3) == (color, bold, italic) => {
                    last.0.push_str(&text)
                }
                _ => merged.push((text, color, bold, italic)),
            }
        }
        prop_assert_eq!(styled(&segments), merged);

        let canonical = to_markup(&segments);
        prop_assert_eq!(parse(&canonical).unwrap(), segments);
    }

    #[test]
    fn fallback_never_loses_text(input in "[a-z<>/ ]{0,40}") {
        let segments = parse_or_plain(&input);
        if parse(&input).is_err() {
            prop_assert_eq!(plain_text(&segments), input);
        }
    }
}

#[test]
fn styled_names_nest_inside_sentences() {
    let segments = parse("<yellow>Ann</> says, <cyan:b>\"hi\"</>").unwrap();
    assert_eq!(plain_text(&segments), "Ann says, \"hi\"");
    assert_eq!(parse(&to_markup(&segments)).unwrap(), segments);
}

#[test]
fn nesting_stops_at_the_depth_limit() {
    let deepest = format!("{}x{}", "<b>".repeat(MAX_DEPTH), "</>".repeat(MAX_DEPTH));
    assert!(parse(&deepest).is_ok());
    let too_deep = format!("<i>{}", deepest) + "</>";
    assert!(parse(&too_deep).is_err());
}
