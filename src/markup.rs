use std::borrow::Cow;

/// Escapes text for HTML/XML element content and quoted attributes.
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_borrowed() {
        assert!(matches!(escape("NRD Compras"), Cow::Borrowed("NRD Compras")));
    }

    #[test]
    fn specials_are_escaped() {
        assert_eq!(
            escape("Panadería|Nueva Río D'or & <co>"),
            "Panadería|Nueva Río D&apos;or &amp; &lt;co&gt;"
        );
        assert_eq!(escape("\"q\""), "&quot;q&quot;");
    }
}
