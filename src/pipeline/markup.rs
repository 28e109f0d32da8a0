//! Cell markup: escape raw cell text, and read the escaped form back as lines.
//!
//! Every paragraph in the document (title, header, body cells) is built from
//! a tiny XML-like markup: `&amp;`, `&lt;` and `&gt;` entities plus an
//! explicit `<br/>` line-break marker. Raw text never reaches the layout
//! engine directly, so a cell containing `<br/>` literally is drawn as those
//! five characters, not as a break.

/// Explicit line-break marker inserted in place of embedded newlines.
pub const LINE_BREAK: &str = "<br/>";

/// Escape raw text into paragraph markup.
///
/// Order matters: `&` first so entities introduced by the `<`/`>` passes are
/// not escaped again, and newlines last so the inserted `<br/>` marker is
/// never itself escaped. CRLF and lone CR count as one newline.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', LINE_BREAK)
}

/// Split paragraph markup into its explicit lines, resolving entities.
///
/// Accepts `<br/>`, `<br />` and `<br>` as breaks. Unknown entities are kept
/// verbatim.
pub fn lines(markup: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut rest = markup;

    while let Some(pos) = rest.find(|c: char| c == '&' || c == '<') {
        current.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if rest.starts_with('<') {
            if let Some(len) = break_tag_len(rest) {
                out.push(std::mem::take(&mut current));
                rest = &rest[len..];
            } else {
                current.push('<');
                rest = &rest[1..];
            }
            continue;
        }

        match ENTITIES.iter().find(|(ent, _)| rest.starts_with(ent)) {
            Some((ent, ch)) => {
                current.push(*ch);
                rest = &rest[ent.len()..];
            }
            None => {
                current.push('&');
                rest = &rest[1..];
            }
        }
    }
    current.push_str(rest);
    out.push(current);
    out
}

const ENTITIES: [(&str, char); 5] = [
    ("&amp;", '&'),
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&quot;", '"'),
    ("&#39;", '\''),
];

fn break_tag_len(s: &str) -> Option<usize> {
    ["<br/>", "<br />", "<br>"]
        .iter()
        .find(|tag| s.starts_with(*tag))
        .map(|tag| tag.len())
}
