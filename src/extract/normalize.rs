use unicode_normalization::UnicodeNormalization;

const BULLET_GLYPHS: [char; 9] = [
    '\u{2022}', '\u{25AA}', '\u{25E6}', '\u{2023}', '\u{2013}', '\u{2014}', '-', '*', '\u{00B7}',
];

pub fn normalize(text: &str) -> String {
    let composed = text.nfkc().collect::<String>();

    let joined = composed
        .split(|character: char| character == '\n' || character == '\r')
        .map(strip_bullet)
        .collect::<Vec<&str>>()
        .join(" ");

    let collapsed = joined.split_whitespace().collect::<Vec<&str>>().join(" ");
    tighten_commas(&collapsed)
}

fn strip_bullet(line: &str) -> &str {
    let trimmed = line.trim_start();
    if !starts_with_bullet(trimmed) {
        return line;
    }

    let mut rest = trimmed;
    while starts_with_bullet(rest) || rest.starts_with(char::is_whitespace) {
        let mut chars = rest.chars();
        chars.next();
        rest = chars.as_str();
    }
    rest
}

// A hyphen directly before a digit is a sign, not a list marker.
fn starts_with_bullet(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some('-') => !chars.next().is_some_and(|next| next.is_ascii_digit()),
        Some(glyph) => BULLET_GLYPHS.contains(&glyph),
        None => false,
    }
}

fn tighten_commas(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut after_comma = false;

    for character in text.chars() {
        if character == ',' {
            let kept = output.trim_end().len();
            output.truncate(kept);
            if !output.ends_with(',') {
                output.push(',');
            }
            after_comma = true;
            continue;
        }

        if after_comma && character.is_whitespace() {
            continue;
        }

        after_comma = false;
        output.push(character);
    }

    if output.ends_with(',') {
        output.pop();
    }

    output.trim().to_string()
}

pub fn digits_only(text: &str) -> String {
    text.chars()
        .filter(|character| character.is_ascii_digit())
        .collect()
}
