//! Plain Org table rendering for generated block bodies.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Cells(Vec<String>),
    Rule,
}

impl Row {
    pub fn cells<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Row::Cells(cells.into_iter().map(Into::into).collect())
    }
}

/// Cell text safe for a table: `|` would split the cell.
pub fn escape_cell(value: &str) -> String {
    value.replace('|', "\\vert").replace(['\n', '\r'], " ")
}

/// Render rows as an aligned table. Every column is as wide as its widest cell,
/// padded with one space on each side. The result ends with a newline.
pub fn render(rows: &[Row]) -> String {
    let columns = rows
        .iter()
        .map(|r| match r {
            Row::Cells(c) => c.len(),
            Row::Rule => 0,
        })
        .max()
        .unwrap_or(0);
    if columns == 0 {
        return String::new();
    }

    let mut widths = vec![0usize; columns];
    for row in rows {
        if let Row::Cells(cells) = row {
            for (w, cell) in widths.iter_mut().zip(cells) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    for row in rows {
        match row {
            Row::Rule => {
                let dashes: Vec<String> = widths.iter().map(|w| "-".repeat(w + 2)).collect();
                out.push('|');
                out.push_str(&dashes.join("+"));
                out.push('|');
            }
            Row::Cells(cells) => {
                out.push('|');
                for (i, w) in widths.iter().enumerate() {
                    let cell = cells.get(i).map(String::as_str).unwrap_or("");
                    let pad = w - cell.chars().count();
                    out.push(' ');
                    out.push_str(cell);
                    out.push_str(&" ".repeat(pad + 1));
                    out.push('|');
                }
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn columns_align_to_widest_cell() {
        let rows = vec![
            Row::cells(["ITEM", "TODO"]),
            Row::Rule,
            Row::cells(["Write report", "TODO"]),
            Row::cells(["Café"]),
        ];
        assert_eq!(
            render(&rows),
            "| ITEM         | TODO |\n\
             |--------------+------|\n\
             | Write report | TODO |\n\
             | Café         |      |\n"
        );
    }

    #[test]
    fn no_cells_renders_nothing() {
        assert_eq!(render(&[Row::Rule]), "");
    }

    #[test]
    fn pipes_are_escaped() {
        assert_eq!(escape_cell("a|b"), "a\\vertb");
    }
}
