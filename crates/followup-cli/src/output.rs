use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Display width in characters; task texts and statuses are often Cyrillic,
/// so byte length would misalign columns.
fn width(s: &str) -> usize {
    s.chars().count()
}

fn pad(s: &str, w: usize) -> String {
    let mut out = s.to_string();
    out.extend(std::iter::repeat(' ').take(w.saturating_sub(width(s))));
    out
}

pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| width(h)).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(width(cell));
        }
    }

    let line = |cells: Vec<String>| println!("{}", cells.join("  ").trim_end());
    line(headers.iter().zip(&widths).map(|(h, w)| pad(h, *w)).collect());
    line(widths.iter().map(|w| "-".repeat(*w)).collect());
    for row in rows {
        line(row.iter().zip(&widths).map(|(c, w)| pad(c, *w)).collect());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_counts_characters_not_bytes() {
        assert_eq!(pad("новый", 7), "новый  ");
        assert_eq!(pad("toolong", 3), "toolong");
    }
}
