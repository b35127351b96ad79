//! Column alignment for help output.
//!
//! Each input line is split into cells on a delimiter, and each cell into
//! sub-rows on embedded newlines. Output row *i* of an input line takes
//! sub-row *i* from every cell, so a multi-line cell is measured line by
//! line instead of as one wide cell. Column widths are global across all
//! produced rows. Cell content is never trimmed.

/// Settings for [`align`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignOptions {
    /// Separator between cells of one input line.
    pub delimiter: String,
    /// Lower bound for every column's width.
    pub min_column_width: usize,
    /// Spaces placed between columns.
    pub column_padding: usize,
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            delimiter: "\t".to_string(),
            min_column_width: 10,
            column_padding: 2,
        }
    }
}

/// Renders `lines` as equal-width columns.
///
/// # Examples
///
/// ```
/// use flagtree_core::{align, AlignOptions};
///
/// let options = AlignOptions { min_column_width: 0, ..AlignOptions::default() };
/// let rows = align(&["-v\tverbose", "--output\twhere to write\n(created if missing)"], &options);
/// assert_eq!(
///     rows,
///     vec![
///         "-v        verbose             ",
///         "--output  where to write      ",
///         "          (created if missing)",
///     ]
/// );
/// ```
pub fn align<S: AsRef<str>>(lines: &[S], options: &AlignOptions) -> Vec<String> {
    let rows: Vec<Vec<&str>> = lines
        .iter()
        .flat_map(|line| split_line(line.as_ref(), &options.delimiter))
        .collect();

    let mut widths: Vec<usize> = Vec::new();
    for row in &rows {
        for (column, cell) in row.iter().enumerate() {
            if widths.len() <= column {
                widths.push(options.min_column_width);
            }
            widths[column] = widths[column].max(cell.chars().count());
        }
    }

    let gap = " ".repeat(options.column_padding);
    rows.iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(column, cell)| pad(cell, widths[column]))
                .collect::<Vec<_>>()
                .join(&gap)
        })
        .collect()
}

/// Splits one input line into output rows of cells.
fn split_line<'a>(line: &'a str, delimiter: &str) -> Vec<Vec<&'a str>> {
    let cells: Vec<Vec<&str>> = if delimiter.is_empty() {
        vec![line.split('\n').collect()]
    } else {
        line.split(delimiter)
            .map(|cell| cell.split('\n').collect())
            .collect()
    };

    let height = cells.iter().map(Vec::len).max().unwrap_or(0);
    (0..height)
        .map(|index| {
            cells
                .iter()
                .map(|sub_rows| sub_rows.get(index).copied().unwrap_or(""))
                .collect()
        })
        .collect()
}

fn pad(cell: &str, width: usize) -> String {
    let fill = width.saturating_sub(cell.chars().count());
    format!("{cell}{}", " ".repeat(fill))
}
