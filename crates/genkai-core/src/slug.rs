//! URL slugs for titles, translators and tags.
//!
//! Cyrillic is transliterated to Latin first so that most catalog names end
//! up with ASCII slugs; any other letters and digits are kept as-is.

/// Latin rendering of a lowercase Russian letter, or `None` if `c` is not one.
fn translit(c: char) -> Option<&'static str> {
  let latin = match c {
    'а' => "a",
    'б' => "b",
    'в' => "v",
    'г' => "g",
    'д' => "d",
    'е' | 'ё' | 'э' => "e",
    'ж' => "zh",
    'з' => "z",
    'и' => "i",
    'й' => "j",
    'к' => "k",
    'л' => "l",
    'м' => "m",
    'н' => "n",
    'о' => "o",
    'п' => "p",
    'р' => "r",
    'с' => "s",
    'т' => "t",
    'у' => "u",
    'ф' => "f",
    'х' => "h",
    'ц' => "ts",
    'ч' => "ch",
    'ш' => "sh",
    'щ' => "sch",
    'ъ' | 'ь' => "",
    'ы' => "y",
    'ю' => "ju",
    'я' => "ja",
    _ => return None,
  };
  Some(latin)
}

/// Build a slug: lowercase, transliterate, drop punctuation, and join words
/// with single hyphens.
pub fn slugify(input: &str) -> String {
  let mut out = String::with_capacity(input.len());
  let mut pending_dash = false;

  for c in input.trim().to_lowercase().chars() {
    if c.is_whitespace() || c == '-' {
      pending_dash = !out.is_empty();
      continue;
    }

    let piece: Option<String> = match translit(c) {
      Some(latin) => Some(latin.to_owned()),
      None if c.is_alphanumeric() || c == '_' => Some(c.to_string()),
      None => None,
    };

    if let Some(piece) = piece.filter(|p| !p.is_empty()) {
      if pending_dash {
        out.push('-');
        pending_dash = false;
      }
      out.push_str(&piece);
    }
  }

  out.trim_matches(|c| c == '-' || c == '_').to_owned()
}
