//! Strict structural validation.
//!
//! The mapper normalizes what can be normalized; this is the gate callers
//! run before persisting or sending. Nothing here mutates the tree.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::blocks::Block;
use crate::document::{Column, Email, Row};
use crate::error::{EsmlError, EsmlResult};

/// Validate the whole document: positive integer width, 12-unit grid rows,
/// unique ids, spans in range, and hex-format colors.
pub fn validate(email: &Email) -> EsmlResult<()> {
    match email.width.parse::<u32>() {
        Ok(w) if w > 0 => {}
        _ => {
            return Err(EsmlError::InvalidWidth {
                value: email.width.clone(),
            })
        }
    }

    validate_color(&email.color)?;
    validate_color(&email.background_color)?;

    let mut seen = HashSet::new();
    insert_id(&mut seen, &email.id)?;

    for row in &email.rows {
        validate_row(row, &mut seen)?;
    }
    Ok(())
}

fn validate_row(row: &Row, seen: &mut HashSet<String>) -> EsmlResult<()> {
    insert_id(seen, &row.id)?;
    opt_color(&row.background_color)?;
    opt_color(&row.border.color)?;

    for column in &row.columns {
        validate_column(column, seen)?;
    }

    let sum = row.span_sum();
    if sum != 12 {
        return Err(EsmlError::GridSum {
            row_id: row.id.clone(),
            sum,
        });
    }
    Ok(())
}

fn validate_column(column: &Column, seen: &mut HashSet<String>) -> EsmlResult<()> {
    insert_id(seen, &column.id)?;
    if !(1..=12).contains(&column.span) {
        return Err(EsmlError::InvalidSpan {
            column_id: column.id.clone(),
            span: column.span as u32,
        });
    }
    opt_color(&column.border.color)?;
    for block in &column.blocks {
        validate_block(block, seen)?;
    }
    Ok(())
}

fn validate_block(block: &Block, seen: &mut HashSet<String>) -> EsmlResult<()> {
    insert_id(seen, block.id())?;
    match block {
        Block::Heading(b) => opt_color(&b.color)?,
        Block::Text(b) => opt_color(&b.color)?,
        Block::Button(b) => {
            opt_color(&b.background_color)?;
            opt_color(&b.color)?;
            opt_color(&b.border.color)?;
        }
        Block::Divider(b) => opt_color(&b.border_color)?,
        Block::Link(b) => {
            opt_color(&b.color)?;
            for child in &b.children {
                validate_block(child, seen)?;
            }
        }
        Block::List(b) => opt_color(&b.color)?,
        Block::Table(b) => opt_color(&b.border_color)?,
        Block::Image(_)
        | Block::Spacer(_)
        | Block::Socials(_)
        | Block::CartItem(_)
        | Block::Survey(_)
        | Block::Raw(_) => {}
    }
    Ok(())
}

fn insert_id(seen: &mut HashSet<String>, id: &str) -> EsmlResult<()> {
    if !seen.insert(id.to_string()) {
        return Err(EsmlError::DuplicateId { id: id.to_string() });
    }
    Ok(())
}

fn opt_color(color: &Option<String>) -> EsmlResult<()> {
    match color {
        Some(c) => validate_color(c),
        None => Ok(()),
    }
}

/// `#rgb` / `#rrggbb` hex colors, plus `transparent`.
pub fn validate_color(color: &str) -> EsmlResult<()> {
    static HEX_COLOR_REGEX: OnceLock<Regex> = OnceLock::new();
    let hex = HEX_COLOR_REGEX
        .get_or_init(|| Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap());

    if hex.is_match(color) || color == "transparent" {
        Ok(())
    } else {
        Err(EsmlError::InvalidColor {
            value: color.to_string(),
            reason: "must be a hex color like #1a2b3c (or 'transparent')".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::parse_markup;
    use crate::mapper::to_document;

    fn doc(src: &str) -> Email {
        to_document(&parse_markup(src).unwrap()).unwrap()
    }

    #[test]
    fn mapper_output_validates() {
        let email = doc(
            "<EMAIL><ROW><COLUMN width=4><TEXT>a</TEXT></COLUMN>\
             <COLUMN width=8><TEXT color=\"#ff0000\">b</TEXT></COLUMN></ROW></EMAIL>",
        );
        assert!(validate(&email).is_ok());
    }

    #[test]
    fn hex_colors() {
        assert!(validate_color("#fff").is_ok());
        assert!(validate_color("#1a2b3c").is_ok());
        assert!(validate_color("#1A2B3C").is_ok());
        assert!(validate_color("transparent").is_ok());
        assert!(validate_color("#ff00").is_err());
        assert!(validate_color("red").is_err());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let email = doc(
            "<EMAIL><ROW id=\"dup\"><TEXT>a</TEXT></ROW><ROW id=\"dup\"><TEXT>b</TEXT></ROW></EMAIL>",
        );
        assert_eq!(
            validate(&email),
            Err(EsmlError::DuplicateId { id: "dup".to_string() })
        );
    }

    #[test]
    fn broken_grid_is_rejected() {
        let mut email = doc("<EMAIL><ROW><TEXT>a</TEXT></ROW></EMAIL>");
        email.rows[0].columns[0].span = 7;
        assert!(matches!(validate(&email), Err(EsmlError::GridSum { .. })));
    }

    #[test]
    fn bad_width_is_rejected() {
        let mut email = doc("<EMAIL><ROW><TEXT>a</TEXT></ROW></EMAIL>");
        email.width = "wide".to_string();
        assert_eq!(
            validate(&email),
            Err(EsmlError::InvalidWidth { value: "wide".to_string() })
        );

        email.width = "0".to_string();
        assert!(validate(&email).is_err());
    }

    #[test]
    fn bad_block_color_is_rejected() {
        let email = doc("<EMAIL><ROW><TEXT color=\"reddish\">a</TEXT></ROW></EMAIL>");
        assert!(matches!(validate(&email), Err(EsmlError::InvalidColor { .. })));
    }
}
